//! Single-slot authorizer cache owned by one helper instance.
//!
//! The slot is populated at most once. A failed resolution leaves it empty so the next
//! credential request retries; a populated slot is reused for the lifetime of the instance
//! with no expiry or invalidation (the cached authorizer refreshes its own tokens).
//!
//! The slot is an [`OnceCell`], so concurrent first requests on one instance wait for a single
//! in-flight resolution instead of racing to populate it.

// self
use crate::{
	_prelude::*,
	config::HelperOptions,
	deadline::Deadline,
	resolver::{FallbackResolver, Resolved},
};

/// When the slot is first populated.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CacheMode {
	/// Resolve while the helper instance is constructed; fall back to lazy on failure.
	Eager,
	/// Resolve on the first credential request.
	Lazy,
}
impl CacheMode {
	/// Mode selected by the parameter set.
	pub fn from_options(options: &HelperOptions) -> Self {
		if options.cache_authorizer_at_construction() { Self::Eager } else { Self::Lazy }
	}
}

/// Holds at most one resolved authorizer.
#[derive(Debug, Default)]
pub struct AuthorizerCache {
	slot: OnceCell<Resolved>,
}
impl AuthorizerCache {
	/// Empty cache.
	pub fn new() -> Self {
		Self::default()
	}

	/// Cached authorizer, if the slot is populated.
	pub fn get(&self) -> Option<&Resolved> {
		self.slot.get()
	}

	/// Returns `true` once the slot is populated.
	pub fn is_populated(&self) -> bool {
		self.slot.is_initialized()
	}

	/// Returns the cached authorizer, resolving and storing it on first use.
	pub async fn get_or_resolve(
		&self,
		resolver: &FallbackResolver,
		options: &HelperOptions,
		deadline: Deadline,
	) -> Result<&Resolved> {
		self.slot.get_or_try_init(|| resolver.resolve(options, deadline)).await
	}
}
