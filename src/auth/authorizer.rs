//! The authorizer capability and its token-caching decorator.
//!
//! An [`Authorizer`] represents one established identity: it can be asked for a bearer token
//! at any time and handles refresh internally. Strategies produce raw authorizers; the probe
//! wraps every usable one in a [`CachingAuthorizer`] before handing it to the cache so
//! repeated credential requests reuse a still-valid token.

// self
use crate::{_prelude::*, auth::AccessToken, deadline::Deadline};

/// Boxed future returned by [`Authorizer::token`].
pub type AuthorizerFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + 'a + Send>>;

/// Object capable of producing a bearer identity token on demand.
///
/// Implementations must honor `deadline` for any network or process I/O they perform.
pub trait Authorizer
where
	Self: Send + Sync,
{
	/// Returns a bearer token, refreshing it when necessary.
	fn token(&self, deadline: Deadline) -> AuthorizerFuture<'_, AccessToken>;
}
impl<A> Authorizer for Arc<A>
where
	A: ?Sized + Authorizer,
{
	fn token(&self, deadline: Deadline) -> AuthorizerFuture<'_, AccessToken> {
		self.as_ref().token(deadline)
	}
}

/// Decorator that reuses the last token until it is close to expiry.
pub struct CachingAuthorizer {
	inner: Arc<dyn Authorizer>,
	current: AsyncMutex<Option<AccessToken>>,
}
impl CachingAuthorizer {
	/// Tokens closer than this to expiry are refreshed.
	pub const REFRESH_MARGIN: Duration = Duration::minutes(5);

	/// Wraps `inner` with an empty token cache.
	pub fn new(inner: Arc<dyn Authorizer>) -> Self {
		Self { inner, current: AsyncMutex::new(None) }
	}

	/// Wraps `inner`, seeding the cache with a token it already produced.
	pub fn primed(inner: Arc<dyn Authorizer>, token: AccessToken) -> Self {
		Self { inner, current: AsyncMutex::new(Some(token)) }
	}
}
impl Authorizer for CachingAuthorizer {
	fn token(&self, deadline: Deadline) -> AuthorizerFuture<'_, AccessToken> {
		Box::pin(async move {
			let mut current = self.current.lock().await;

			if let Some(token) = current
				.as_ref()
				.filter(|token| token.is_fresh_at(OffsetDateTime::now_utc(), Self::REFRESH_MARGIN))
			{
				return Ok(token.clone());
			}

			let fresh = self.inner.token(deadline).await?;

			*current = Some(fresh.clone());

			Ok(fresh)
		})
	}
}
impl Debug for CachingAuthorizer {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("CachingAuthorizer(..)")
	}
}
