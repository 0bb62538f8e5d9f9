//! Identity tokens, redacted secrets, and the authorizer capability.

pub mod authorizer;
pub mod token;

pub use authorizer::*;
pub use token::{access::*, secret::*};
