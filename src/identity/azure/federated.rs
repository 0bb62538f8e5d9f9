//! GitHub Actions OIDC tokens used as federated client assertions.

// self
use crate::{
	_prelude::*,
	config::HelperOptions,
	error::{ConfigError, TransientError, TransportError},
	http,
	strategy::StrategyKind,
};

const ENDPOINT: &str = "oidc";
const AUDIENCE: &str = "api://AzureADTokenExchange";

/// Fetches a fresh OIDC token from the CI runner for every assertion.
#[derive(Clone)]
pub struct FederatedAssertionSource {
	client: ReqwestClient,
	request_url: Url,
	request_token: TokenSecret,
}
impl FederatedAssertionSource {
	/// Validates the request URL and bearer value.
	pub fn from_options(
		client: ReqwestClient,
		options: &HelperOptions,
	) -> Result<Self, ConfigError> {
		let strategy = StrategyKind::FederatedToken.as_str();

		if options.federated_token_url().is_empty() {
			return Err(ConfigError::MissingOption { option: "federated_token_url", strategy });
		}
		if options.federated_token().is_empty() {
			return Err(ConfigError::MissingOption { option: "federated_token", strategy });
		}

		let mut request_url = Url::parse(options.federated_token_url())
			.map_err(|source| ConfigError::InvalidEndpoint { endpoint: ENDPOINT, source })?;

		request_url.query_pairs_mut().append_pair("audience", AUDIENCE);

		Ok(Self { client, request_url, request_token: TokenSecret::new(options.federated_token()) })
	}

	/// Request URL including the token-exchange audience.
	pub fn request_url(&self) -> &Url {
		&self.request_url
	}

	/// Requests one OIDC token from the runner.
	pub async fn fetch(&self) -> Result<TokenSecret> {
		let response = self
			.client
			.get(self.request_url.clone())
			.bearer_auth(self.request_token.expose())
			.send()
			.await
			.map_err(|e| http::map_reqwest_error(ENDPOINT, e))?;
		let status = response.status();
		let retry_after = http::parse_retry_after(response.headers());
		let body = response.text().await.map_err(|e| TransportError::network(ENDPOINT, e))?;

		match status.as_u16() {
			200..=299 => {
				let parsed: OidcTokenResponse =
					http::parse_json(ENDPOINT, &body, Some(status.as_u16()))?;

				Ok(TokenSecret::new(parsed.value))
			},
			401 | 403 => Err(Error::InvalidClient { reason: http::body_preview(&body) }),
			code => Err(TransientError::Endpoint {
				endpoint: ENDPOINT,
				message: http::body_preview(&body),
				status: Some(code),
				retry_after,
			}
			.into()),
		}
	}
}
impl Debug for FederatedAssertionSource {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("FederatedAssertionSource").field("request_url", &self.request_url).finish()
	}
}

#[derive(Deserialize)]
struct OidcTokenResponse {
	value: String,
}

#[cfg(test)]
mod tests {
	// crates.io
	use httpmock::prelude::*;
	// self
	use super::*;

	#[test]
	fn both_runner_values_are_required() {
		let options =
			HelperOptions::builder().federated_token_url("https://runner.test/token").build();
		let err = FederatedAssertionSource::from_options(ReqwestClient::new(), &options)
			.expect_err("A missing bearer value should be rejected.");

		assert!(matches!(err, ConfigError::MissingOption { option: "federated_token", .. }));
	}

	#[test]
	fn audience_is_appended_to_existing_query() {
		let options = HelperOptions::builder()
			.federated_token_url("https://runner.test/token?api-version=2.0")
			.federated_token("runner-bearer")
			.build();
		let source = FederatedAssertionSource::from_options(ReqwestClient::new(), &options)
			.expect("Source should build.");

		assert_eq!(
			source.request_url().as_str(),
			"https://runner.test/token?api-version=2.0&audience=api%3A%2F%2FAzureADTokenExchange"
		);
		assert!(!format!("{source:?}").contains("runner-bearer"));
	}

	#[tokio::test]
	async fn fetch_sends_runner_bearer() {
		let server = MockServer::start_async().await;
		let mock = server
			.mock_async(|when, then| {
				when.method(GET)
					.path("/token")
					.query_param("audience", AUDIENCE)
					.header("authorization", "Bearer runner-bearer");
				then.status(200)
					.header("content-type", "application/json")
					.body("{\"count\":1,\"value\":\"oidc-jwt\"}");
			})
			.await;
		let options = HelperOptions::builder()
			.federated_token_url(server.url("/token"))
			.federated_token("runner-bearer")
			.build();
		let source = FederatedAssertionSource::from_options(ReqwestClient::new(), &options)
			.expect("Source should build.");
		let assertion = source.fetch().await.expect("Runner token should be returned.");

		mock.assert_async().await;

		assert_eq!(assertion.expose(), "oidc-jwt");
	}
}
