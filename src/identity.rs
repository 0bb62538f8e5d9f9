//! Identity-authorizer collaborators: one constructor per identity strategy.
//!
//! [`IdentityBackend`] is the seam between the resolution engine and concrete identity
//! protocols. Constructors only validate and assemble local material; proving that the
//! identity actually works is the probe's job, which requests one token right away.

#[cfg(feature = "reqwest")] pub mod azure;

#[cfg(feature = "reqwest")] pub use azure::AzureIdentityBackend;

// self
use crate::{_prelude::*, auth::Authorizer, config::HelperOptions, deadline::Deadline};

/// Boxed future returned by every [`IdentityBackend`] constructor.
pub type IdentityFuture<'a> = Pin<Box<dyn Future<Output = Result<Arc<dyn Authorizer>>> + 'a + Send>>;

/// Library of identity-strategy constructors.
///
/// Each constructor reads the subset of [`HelperOptions`] it needs and returns an
/// [`Authorizer`] or fails. Implementations must honor `deadline` for any I/O performed during
/// construction.
pub trait IdentityBackend
where
	Self: Send + Sync,
{
	/// Client-certificate identity.
	fn client_certificate<'a>(
		&'a self,
		deadline: Deadline,
		options: &'a HelperOptions,
	) -> IdentityFuture<'a>;

	/// Client-secret identity.
	fn client_secret<'a>(&'a self, deadline: Deadline, options: &'a HelperOptions)
	-> IdentityFuture<'a>;

	/// Ambient managed identity exposed by the hosting platform.
	fn managed_identity<'a>(
		&'a self,
		deadline: Deadline,
		options: &'a HelperOptions,
	) -> IdentityFuture<'a>;

	/// Workload identity federation using a CI-issued OIDC token.
	fn federated_token<'a>(
		&'a self,
		deadline: Deadline,
		options: &'a HelperOptions,
	) -> IdentityFuture<'a>;

	/// Locally authenticated Azure CLI session.
	fn azure_cli<'a>(&'a self, deadline: Deadline, options: &'a HelperOptions) -> IdentityFuture<'a>;
}
