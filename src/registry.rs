//! Registry token exchange: identity token in, registry-scoped secret out.
//!
//! [`RegistryExchange`] is the collaborator boundary; [`AcrRegistryClient`] implements the
//! Azure Container Registry `/oauth2/exchange` handshake. Exchanges are never retried here.

// self
use crate::{_prelude::*, auth::Authorizer, deadline::Deadline, error::ConfigError};
#[cfg(feature = "reqwest")]
use crate::{
	error::{TransientError, TransportError},
	http,
};

/// Boxed future returned by [`RegistryExchange::exchange`].
pub type RegistryFuture<'a> = Pin<Box<dyn Future<Output = Result<TokenSecret>> + 'a + Send>>;

/// Registry client able to trade a bearer identity token for a registry secret.
pub trait RegistryExchange
where
	Self: Send + Sync,
{
	/// Exchanges a token from `authorizer` for a secret scoped to `registry`.
	///
	/// `tenant` is a hint forwarded to the registry and may be empty.
	fn exchange<'a>(
		&'a self,
		deadline: Deadline,
		authorizer: &'a dyn Authorizer,
		registry: &'a str,
		tenant: &'a str,
	) -> RegistryFuture<'a>;
}

/// Reduces a server URL (`https://name.azurecr.io/v2/`) to its host (`name.azurecr.io`).
pub fn registry_host(server_url: &str) -> Result<String, ConfigError> {
	let trimmed = server_url.trim();
	let without_scheme = trimmed
		.strip_prefix("https://")
		.or_else(|| trimmed.strip_prefix("http://"))
		.unwrap_or(trimmed);
	let host = without_scheme.split('/').next().unwrap_or_default();

	if host.is_empty() || host.contains(char::is_whitespace) {
		return Err(ConfigError::InvalidRegistry { host: server_url.to_owned() });
	}

	Ok(host.to_ascii_lowercase())
}

/// Azure Container Registry exchange client.
#[cfg(feature = "reqwest")]
#[derive(Clone, Debug, Default)]
pub struct AcrRegistryClient {
	client: ReqwestClient,
	base_url: Option<Url>,
}
#[cfg(feature = "reqwest")]
impl AcrRegistryClient {
	const ENDPOINT: &'static str = "exchange";

	/// Wraps an existing reqwest client.
	pub fn with_client(client: ReqwestClient) -> Self {
		Self { client, base_url: None }
	}

	/// Sends exchanges to `base_url` instead of `https://<registry>`.
	pub fn with_base_url(mut self, base_url: Url) -> Self {
		self.base_url = Some(base_url);

		self
	}

	fn exchange_url(&self, host: &str) -> Result<Url, ConfigError> {
		let base = match &self.base_url {
			Some(url) => url.as_str().trim_end_matches('/').to_owned(),
			None => format!("https://{host}"),
		};

		Url::parse(&format!("{base}/oauth2/exchange"))
			.map_err(|source| ConfigError::InvalidEndpoint { endpoint: Self::ENDPOINT, source })
	}

	async fn exchange_token(
		&self,
		token: &TokenSecret,
		host: &str,
		tenant: &str,
	) -> Result<TokenSecret> {
		let url = self.exchange_url(host)?;
		let mut form = vec![
			("grant_type", "access_token"),
			("service", host),
			("access_token", token.expose()),
		];

		if !tenant.is_empty() {
			form.push(("tenant", tenant));
		}

		let response = self
			.client
			.post(url)
			.form(&form)
			.send()
			.await
			.map_err(|e| http::map_reqwest_error(Self::ENDPOINT, e))?;
		let status = response.status();
		let retry_after = http::parse_retry_after(response.headers());
		let body = response.text().await.map_err(|e| TransportError::network(Self::ENDPOINT, e))?;

		if status.is_success() {
			let parsed: ExchangeResponse =
				http::parse_json(Self::ENDPOINT, &body, Some(status.as_u16()))?;

			return Ok(TokenSecret::new(parsed.refresh_token));
		}

		let reason = exchange_error_reason(&body).unwrap_or_else(|| http::body_preview(&body));

		match status.as_u16() {
			400 | 401 | 403 | 404 => Err(Error::ExchangeRejected { reason }),
			code => Err(TransientError::Endpoint {
				endpoint: Self::ENDPOINT,
				message: reason,
				status: Some(code),
				retry_after,
			}
			.into()),
		}
	}
}
#[cfg(feature = "reqwest")]
impl RegistryExchange for AcrRegistryClient {
	fn exchange<'a>(
		&'a self,
		deadline: Deadline,
		authorizer: &'a dyn Authorizer,
		registry: &'a str,
		tenant: &'a str,
	) -> RegistryFuture<'a> {
		Box::pin(async move {
			let host = registry_host(registry)?;

			deadline
				.run("exchange", async {
					let token = authorizer.token(deadline).await?;

					self.exchange_token(&token.secret, &host, tenant).await
				})
				.await
		})
	}
}

#[cfg(feature = "reqwest")]
#[derive(Deserialize)]
struct ExchangeResponse {
	refresh_token: String,
}

#[cfg(feature = "reqwest")]
fn exchange_error_reason(body: &str) -> Option<String> {
	#[derive(Deserialize)]
	struct ErrorBody {
		errors: Vec<ErrorEntry>,
	}
	#[derive(Deserialize)]
	struct ErrorEntry {
		code: Option<String>,
		message: Option<String>,
	}

	let parsed: ErrorBody = serde_json::from_str(body).ok()?;
	let entry = parsed.errors.into_iter().next()?;

	match (entry.code, entry.message) {
		(Some(code), Some(message)) => Some(format!("{code}: {message}")),
		(code, message) => code.or(message),
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn registry_host_strips_scheme_and_path() {
		assert_eq!(
			registry_host("https://Contoso.azurecr.io/v2/").expect("URL should normalize."),
			"contoso.azurecr.io"
		);
		assert_eq!(
			registry_host(" contoso.azurecr.io ").expect("Host should normalize."),
			"contoso.azurecr.io"
		);
		assert!(matches!(registry_host(""), Err(ConfigError::InvalidRegistry { .. })));
		assert!(matches!(registry_host("https:///v2"), Err(ConfigError::InvalidRegistry { .. })));
	}

	#[cfg(feature = "reqwest")]
	#[test]
	fn exchange_error_reason_reads_registry_errors() {
		let body = "{\"errors\":[{\"code\":\"UNAUTHORIZED\",\"message\":\"tenant not trusted\"}]}";

		assert_eq!(
			exchange_error_reason(body).as_deref(),
			Some("UNAUTHORIZED: tenant not trusted")
		);
		assert_eq!(exchange_error_reason("<html>"), None);
	}

	#[cfg(feature = "reqwest")]
	#[test]
	fn exchange_url_honors_base_override() {
		let client = AcrRegistryClient::default();

		assert_eq!(
			client.exchange_url("contoso.azurecr.io").expect("Default URL should build.").as_str(),
			"https://contoso.azurecr.io/oauth2/exchange"
		);

		let client = client.with_base_url(
			Url::parse("http://127.0.0.1:5000/").expect("Override URL should parse."),
		);

		assert_eq!(
			client.exchange_url("contoso.azurecr.io").expect("Override URL should build.").as_str(),
			"http://127.0.0.1:5000/oauth2/exchange"
		);
	}
}
