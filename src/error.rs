//! Helper-level error types shared across resolution, exchange, and the credential-store surface.

// self
use crate::_prelude::*;

/// Helper-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical helper error exposed by public APIs.
///
/// Messages never embed secret material; per-strategy failures stay inside the resolver and
/// only [`Error::ResolutionExhausted`] reaches the caller when every strategy is unusable.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Temporary upstream failure; the caller may retry.
	#[error(transparent)]
	Transient(#[from] TransientError),
	/// Transport failure (DNS, TCP, TLS, process spawn).
	#[error(transparent)]
	Transport(#[from] TransportError),

	/// Every identity strategy was unusable.
	#[error("No valid authorizer could be found.")]
	ResolutionExhausted,
	/// The identity provider rejected the client credentials.
	#[error("Client authentication failed: {reason}.")]
	InvalidClient {
		/// Provider-supplied reason string.
		reason: String,
	},
	/// The registry refused to exchange the identity token.
	#[error("Registry rejected the token exchange: {reason}.")]
	ExchangeRejected {
		/// Registry-supplied reason string.
		reason: String,
	},
	/// The operation deadline elapsed before the stage completed.
	#[error("Deadline exceeded during {stage}.")]
	DeadlineExceeded {
		/// Stage label (`resolve`, `probe`, `exchange`, ...).
		stage: &'static str,
	},
	/// Credential-store operation intentionally left unimplemented.
	#[error("method {method}() is not implemented.")]
	NotImplemented {
		/// Credential-store method name.
		method: &'static str,
	},
}
impl Error {
	/// Returns `true` when the caller may reasonably retry the whole request.
	pub fn is_retryable(&self) -> bool {
		matches!(self, Self::DeadlineExceeded { .. } | Self::Transient(_) | Self::Transport(_))
	}

	/// Returns `true` for deadline failures.
	pub fn is_deadline(&self) -> bool {
		matches!(self, Self::DeadlineExceeded { .. })
	}
}

/// Configuration and validation failures raised while constructing authorizers.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// HTTP request construction failed.
	#[error(transparent)]
	HttpRequest(#[from] oauth2::http::Error),
	/// An endpoint URL could not be built.
	#[error("The {endpoint} endpoint is invalid.")]
	InvalidEndpoint {
		/// Which endpoint failed to parse.
		endpoint: &'static str,
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// A required option is empty.
	#[error("The {option} option is required by the {strategy} strategy.")]
	MissingOption {
		/// Option name.
		option: &'static str,
		/// Strategy label.
		strategy: &'static str,
	},
	/// Certificate material could not be loaded or used.
	#[error("Client certificate is unusable: {reason}.")]
	Certificate {
		/// What went wrong while reading the bundle.
		reason: String,
	},
	/// Client assertion could not be signed.
	#[error("Client assertion could not be signed.")]
	Assertion(#[from] jsonwebtoken::errors::Error),
	/// Registry host cannot be turned into an exchange endpoint.
	#[error("Registry host `{host}` is invalid.")]
	InvalidRegistry {
		/// Offending host value.
		host: String,
	},
	/// Credentials handed to `store` are not a valid credentials document.
	#[error("Credentials payload is malformed at line {line}, column {column}.")]
	MalformedCredentials {
		/// One-based line of the first syntax or type error.
		line: usize,
		/// One-based column of the first syntax or type error.
		column: usize,
	},
	/// Token endpoint response omitted its lifetime.
	#[error("Token endpoint response is missing expires_in.")]
	MissingExpiresIn,
	/// Token endpoint returned an excessively large lifetime.
	#[error("The expires_in value exceeds the supported range.")]
	ExpiresInOutOfRange,
	/// Token endpoint returned a non-positive lifetime.
	#[error("The expires_in value must be positive.")]
	NonPositiveExpiresIn,
	/// The Azure CLI exited unsuccessfully.
	#[error("Azure CLI exited with status {status}: {message}.")]
	CliFailed {
		/// Exit code, or -1 when terminated by a signal.
		status: i32,
		/// First line of the CLI's standard error.
		message: String,
	},
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}

/// Temporary failure variants (safe to retry).
#[derive(Debug, ThisError)]
pub enum TransientError {
	/// Upstream returned an unexpected but non-fatal response.
	#[error("{endpoint} endpoint returned an unexpected response: {message}.")]
	Endpoint {
		/// Endpoint label (`token`, `identity`, `exchange`).
		endpoint: &'static str,
		/// Summary of the failure.
		message: String,
		/// HTTP status code, when available.
		status: Option<u16>,
		/// Retry-After hint from upstream, if supplied.
		retry_after: Option<Duration>,
	},
	/// Upstream responded with JSON that could not be parsed.
	#[error("{endpoint} endpoint returned malformed JSON.")]
	ResponseParse {
		/// Endpoint label.
		endpoint: &'static str,
		/// Structured parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::error::Error>,
		/// HTTP status code, when available.
		status: Option<u16>,
	},
}

/// Transport-level failures (network, IO).
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while calling the {endpoint} endpoint.")]
	Network {
		/// Endpoint label.
		endpoint: &'static str,
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// Underlying IO failure (process spawn, file read).
	#[error("I/O error occurred while acquiring credentials.")]
	Io(#[from] std::io::Error),
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(endpoint: &'static str, src: impl 'static + Send + Sync + StdError) -> Self {
		Self::Network { endpoint, source: Box::new(src) }
	}
}
