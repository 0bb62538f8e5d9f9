//! Managed identity via the instance metadata service (or an `MSI_ENDPOINT` override).

// crates.io
use reqwest::header::{ACCEPT, HeaderValue};
// self
use crate::{
	_prelude::*,
	auth::{AccessToken, Authorizer, AuthorizerFuture},
	config::HelperOptions,
	deadline::Deadline,
	error::{ConfigError, TransientError, TransportError},
	http,
};

const ENDPOINT: &str = "identity";
const IMDS_TOKEN_URL: &str = "http://169.254.169.254/metadata/identity/oauth2/token";
const IMDS_API_VERSION: &str = "2018-02-01";
// Hosts without a metadata service usually drop packets to it instead of refusing them.
const REQUEST_TIMEOUT: StdDuration = StdDuration::from_secs(2);

/// Authorizer backed by the hosting platform's managed identity.
#[derive(Clone, Debug)]
pub struct ManagedIdentityAuthorizer {
	client: ReqwestClient,
	endpoint: Url,
	resource: String,
	client_id: String,
	request_timeout: StdDuration,
}
impl ManagedIdentityAuthorizer {
	/// Builds the authorizer; `client_id` selects a user-assigned identity when set.
	pub fn from_options(
		client: ReqwestClient,
		options: &HelperOptions,
	) -> Result<Self, ConfigError> {
		let raw = match options.msi_endpoint() {
			"" => IMDS_TOKEN_URL,
			custom => custom,
		};
		let endpoint = Url::parse(raw)
			.map_err(|source| ConfigError::InvalidEndpoint { endpoint: ENDPOINT, source })?;

		Ok(Self {
			client,
			endpoint,
			resource: options.environment().audience().to_owned(),
			client_id: options.client_id().to_owned(),
			request_timeout: REQUEST_TIMEOUT,
		})
	}

	/// Bounds each token request independently of the caller's deadline.
	pub fn with_request_timeout(mut self, timeout: StdDuration) -> Self {
		self.request_timeout = timeout;

		self
	}

	/// Token URL with the query the metadata service expects.
	pub fn request_url(&self) -> Url {
		let mut url = self.endpoint.clone();

		{
			let mut query = url.query_pairs_mut();

			query
				.append_pair("api-version", IMDS_API_VERSION)
				.append_pair("resource", &self.resource);

			if !self.client_id.is_empty() {
				query.append_pair("client_id", &self.client_id);
			}
		}

		url
	}

	async fn fetch(&self) -> Result<AccessToken> {
		let response = self
			.client
			.get(self.request_url())
			.header("Metadata", HeaderValue::from_static("true"))
			.header(ACCEPT, HeaderValue::from_static("application/json"))
			.send()
			.await
			.map_err(|e| http::map_reqwest_error(ENDPOINT, e))?;
		let status = response.status();
		let retry_after = http::parse_retry_after(response.headers());
		let body = response.text().await.map_err(|e| TransportError::network(ENDPOINT, e))?;

		if !status.is_success() {
			let message = managed_error_reason(&body).unwrap_or_else(|| http::body_preview(&body));

			return Err(match status.as_u16() {
				code @ (429 | 500..=599) => TransientError::Endpoint {
					endpoint: ENDPOINT,
					message,
					status: Some(code),
					retry_after,
				}
				.into(),
				_ => Error::InvalidClient { reason: message },
			});
		}

		let parsed: ManagedTokenResponse = http::parse_json(ENDPOINT, &body, Some(status.as_u16()))?;
		let expires_in = parsed.expires_in.seconds()?;

		Ok(AccessToken::expiring_in(
			parsed.access_token,
			OffsetDateTime::now_utc(),
			Duration::seconds(expires_in),
		)?)
	}
}
impl Authorizer for ManagedIdentityAuthorizer {
	fn token(&self, deadline: Deadline) -> AuthorizerFuture<'_, AccessToken> {
		Box::pin(async move {
			match deadline.capped(self.request_timeout).run("token", self.fetch()).await {
				Err(e) if e.is_deadline() && !deadline.is_elapsed() =>
					Err(TransientError::Endpoint {
						endpoint: ENDPOINT,
						message: format!("no response within {:?}", self.request_timeout),
						status: None,
						retry_after: None,
					}
					.into()),
				result => result,
			}
		})
	}
}

#[derive(Deserialize)]
struct ManagedTokenResponse {
	access_token: String,
	expires_in: Seconds,
}

// The metadata service reports numbers as JSON strings; App Service reports real numbers.
#[derive(Deserialize)]
#[serde(untagged)]
enum Seconds {
	Number(i64),
	Text(String),
}
impl Seconds {
	fn seconds(&self) -> Result<i64, ConfigError> {
		let value = match self {
			Seconds::Number(value) => *value,
			Seconds::Text(text) => text.trim().parse().map_err(|_| ConfigError::ExpiresInOutOfRange)?,
		};

		if value <= 0 {
			return Err(ConfigError::NonPositiveExpiresIn);
		}

		Ok(value)
	}
}

fn managed_error_reason(body: &str) -> Option<String> {
	#[derive(Deserialize)]
	struct ErrorBody {
		error: String,
		error_description: Option<String>,
	}

	let parsed: ErrorBody = serde_json::from_str(body).ok()?;

	Some(match parsed.error_description {
		Some(description) => format!("{}: {description}", parsed.error),
		None => parsed.error,
	})
}
