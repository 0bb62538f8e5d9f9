//! Bearer access tokens issued by identity strategies.

// self
use crate::{_prelude::*, error::ConfigError};

/// Bearer token plus the instant it stops being valid.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AccessToken {
	/// Bearer value; callers must avoid logging it.
	pub secret: TokenSecret,
	/// Expiry instant reported by the issuer.
	pub expires_at: OffsetDateTime,
}
impl AccessToken {
	/// Creates a token expiring at `expires_at`.
	pub fn new(secret: impl Into<String>, expires_at: OffsetDateTime) -> Self {
		Self { secret: TokenSecret::new(secret), expires_at }
	}

	/// Creates a token expiring `expires_in` after `issued_at`.
	///
	/// Lifetimes that push the expiry past the representable range are rejected.
	pub fn expiring_in(
		secret: impl Into<String>,
		issued_at: OffsetDateTime,
		expires_in: Duration,
	) -> Result<Self, ConfigError> {
		let expires_at =
			issued_at.checked_add(expires_in).ok_or(ConfigError::ExpiresInOutOfRange)?;

		Ok(Self::new(secret, expires_at))
	}

	/// Returns `true` when the token stays valid for longer than `margin` after `now`.
	pub fn is_fresh_at(&self, now: OffsetDateTime, margin: Duration) -> bool {
		self.expires_at - now > margin
	}
}
