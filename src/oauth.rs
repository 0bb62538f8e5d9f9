//! Token-endpoint facade for confidential-client grants.
//!
//! Every confidential strategy (certificate, secret, federated token) ends up issuing the same
//! `client_credentials` request against the Entra token endpoint and only differs in how the
//! client proves itself. [`TokenEndpoint`] owns that request and normalizes the response and
//! its failures into the helper taxonomy.

pub use oauth2;

// crates.io
use oauth2::{
	AuthType, ClientId, ClientSecret, EndpointNotSet, EndpointSet, HttpClientError,
	RequestTokenError, Scope, TokenResponse, TokenUrl,
	basic::{BasicClient, BasicErrorResponse, BasicRequestTokenError, BasicTokenResponse},
};
// self
use crate::{
	_prelude::*,
	auth::AccessToken,
	config::{HelperOptions, TokenVersion},
	error::{ConfigError, TransientError, TransportError},
	http::{self, ReqwestHttpClient, ResponseMetadata, ResponseMetadataSlot},
};

type ConfiguredBasicClient =
	BasicClient<EndpointNotSet, EndpointNotSet, EndpointNotSet, EndpointNotSet, EndpointSet>;
type FacadeFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + 'a + Send>>;

const ENDPOINT: &str = "token";
const CLIENT_ASSERTION_TYPE: &str = "urn:ietf:params:oauth:client-assertion-type:jwt-bearer";

/// How a confidential client authenticates to the token endpoint.
#[derive(Clone, Copy)]
pub enum ClientAuth<'a> {
	/// Shared secret sent in the request body.
	Secret(&'a str),
	/// Signed JWT sent as `client_assertion`.
	Assertion(&'a str),
}
impl Debug for ClientAuth<'_> {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		match self {
			ClientAuth::Secret(_) => f.write_str("ClientAuth::Secret(..)"),
			ClientAuth::Assertion(_) => f.write_str("ClientAuth::Assertion(..)"),
		}
	}
}

/// Tenant-scoped Entra token endpoint bound to one client id.
#[derive(Clone, Debug)]
pub struct TokenEndpoint {
	http_client: ReqwestHttpClient,
	token_url: Url,
	client_id: String,
	version: TokenVersion,
	audience: String,
}
impl TokenEndpoint {
	/// Builds the endpoint for `strategy`, requiring tenant and client id.
	pub fn from_options(
		http_client: ReqwestHttpClient,
		options: &HelperOptions,
		strategy: &'static str,
	) -> Result<Self, ConfigError> {
		if options.tenant_id().is_empty() {
			return Err(ConfigError::MissingOption { option: "tenant_id", strategy });
		}
		if options.client_id().is_empty() {
			return Err(ConfigError::MissingOption { option: "client_id", strategy });
		}

		let environment = options.environment();
		let token_url = environment.token_url(options.tenant_id(), options.token_version())?;

		Ok(Self {
			http_client,
			token_url,
			client_id: options.client_id().to_owned(),
			version: options.token_version(),
			audience: environment.audience().to_owned(),
		})
	}

	/// Token endpoint URL (also the audience of client assertions).
	pub fn token_url(&self) -> &Url {
		&self.token_url
	}

	/// Client id presented to the endpoint.
	pub fn client_id(&self) -> &str {
		&self.client_id
	}

	/// Runs a `client_credentials` grant for the configured audience.
	pub fn exchange_client_credentials<'a>(
		&'a self,
		auth: ClientAuth<'a>,
	) -> FacadeFuture<'a, AccessToken> {
		let meta = ResponseMetadataSlot::default();

		Box::pin(async move {
			let instrumented = self.http_client.instrumented(meta.clone());
			let oauth_client = self.oauth_client(auth);
			let mut request = oauth_client.exchange_client_credentials();

			match self.version {
				TokenVersion::V1 => request = request.add_extra_param("resource", &self.audience),
				TokenVersion::V2 =>
					request = request.add_scope(Scope::new(format!("{}/.default", self.audience))),
			}
			if let ClientAuth::Assertion(assertion) = auth {
				request = request
					.add_extra_param("client_assertion_type", CLIENT_ASSERTION_TYPE)
					.add_extra_param("client_assertion", assertion);
			}

			let response = request
				.request_async(&instrumented)
				.await
				.map_err(|e| map_request_error(meta.take(), e))?;

			map_token_response(response)
		})
	}

	fn oauth_client(&self, auth: ClientAuth<'_>) -> ConfiguredBasicClient {
		let client = BasicClient::new(ClientId::new(self.client_id.clone()))
			.set_token_uri(TokenUrl::from_url(self.token_url.clone()))
			.set_auth_type(AuthType::RequestBody);

		match auth {
			ClientAuth::Secret(secret) =>
				client.set_client_secret(ClientSecret::new(secret.to_owned())),
			ClientAuth::Assertion(_) => client,
		}
	}
}

fn map_token_response(response: BasicTokenResponse) -> Result<AccessToken> {
	let expires_in = response.expires_in().ok_or(ConfigError::MissingExpiresIn)?.as_secs();
	let expires_in = i64::try_from(expires_in).map_err(|_| ConfigError::ExpiresInOutOfRange)?;

	if expires_in <= 0 {
		return Err(ConfigError::NonPositiveExpiresIn.into());
	}

	Ok(AccessToken::expiring_in(
		response.access_token().secret().to_owned(),
		OffsetDateTime::now_utc(),
		Duration::seconds(expires_in),
	)?)
}

fn map_request_error(
	meta: Option<ResponseMetadata>,
	err: BasicRequestTokenError<HttpClientError<ReqwestError>>,
) -> Error {
	let meta = meta.as_ref();

	match err {
		RequestTokenError::ServerResponse(response) => map_server_response_error(response, meta),
		RequestTokenError::Request(error) => map_transport_error(meta, error),
		RequestTokenError::Parse(source, _body) =>
			TransientError::ResponseParse { endpoint: ENDPOINT, source, status: meta_status(meta) }
				.into(),
		RequestTokenError::Other(message) => TransientError::Endpoint {
			endpoint: ENDPOINT,
			message,
			status: meta_status(meta),
			retry_after: meta_retry_after(meta),
		}
		.into(),
	}
}

fn map_server_response_error(response: BasicErrorResponse, meta: Option<&ResponseMetadata>) -> Error {
	let code = response.error().as_ref().to_owned();
	let message = match response.error_description() {
		Some(description) => format!("{code}: {}", first_line(description)),
		None => code.clone(),
	};
	let status = meta_status(meta);
	let upstream_unavailable =
		matches!(status, Some(429) | Some(500..=599)) || code == "temporarily_unavailable";

	if upstream_unavailable {
		return TransientError::Endpoint {
			endpoint: ENDPOINT,
			message,
			status,
			retry_after: meta_retry_after(meta),
		}
		.into();
	}

	Error::InvalidClient { reason: message }
}

fn map_transport_error(meta: Option<&ResponseMetadata>, err: HttpClientError<ReqwestError>) -> Error {
	match err {
		HttpClientError::Reqwest(inner) => http::map_reqwest_error(ENDPOINT, *inner),
		HttpClientError::Http(inner) => ConfigError::from(inner).into(),
		HttpClientError::Io(inner) => TransportError::Io(inner).into(),
		HttpClientError::Other(message) => TransientError::Endpoint {
			endpoint: ENDPOINT,
			message,
			status: meta_status(meta),
			retry_after: meta_retry_after(meta),
		}
		.into(),
		_ => TransientError::Endpoint {
			endpoint: ENDPOINT,
			message: "HTTP client error".into(),
			status: meta_status(meta),
			retry_after: meta_retry_after(meta),
		}
		.into(),
	}
}

// Entra descriptions append trace and correlation ids on later lines.
fn first_line(text: &str) -> &str {
	text.lines().next().unwrap_or_default().trim()
}

fn meta_status(meta: Option<&ResponseMetadata>) -> Option<u16> {
	meta.and_then(|value| value.status)
}

fn meta_retry_after(meta: Option<&ResponseMetadata>) -> Option<Duration> {
	meta.and_then(|value| value.retry_after)
}
