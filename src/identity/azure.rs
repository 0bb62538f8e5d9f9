//! Built-in Microsoft Entra identity backend.
//!
//! Constructors only validate options and load local material (certificate bundles). The
//! resulting authorizers touch the network or spawn `az` when asked for a token, and every
//! such call is bounded by the caller's [`Deadline`].

mod certificate;
mod cli;
mod federated;
mod managed;

pub use certificate::ClientCertificate;
pub use cli::AzureCliAuthorizer;
pub use federated::FederatedAssertionSource;
pub use managed::ManagedIdentityAuthorizer;

// crates.io
use reqwest::redirect::Policy;
// self
use crate::{
	_prelude::*,
	auth::{AccessToken, Authorizer, AuthorizerFuture},
	config::HelperOptions,
	deadline::Deadline,
	error::ConfigError,
	http::ReqwestHttpClient,
	identity::{IdentityBackend, IdentityFuture},
	oauth::{ClientAuth, TokenEndpoint},
	strategy::StrategyKind,
};

/// Default [`IdentityBackend`] speaking to Microsoft Entra, IMDS, GitHub OIDC, and `az`.
#[derive(Clone, Debug)]
pub struct AzureIdentityBackend {
	http_client: ReqwestHttpClient,
}
impl AzureIdentityBackend {
	/// Backend with a dedicated reqwest client that never follows redirects.
	pub fn new() -> Result<Self> {
		let client =
			ReqwestClient::builder().redirect(Policy::none()).build().map_err(ConfigError::from)?;

		Ok(Self::with_client(client))
	}

	/// Backend reusing an existing reqwest client.
	pub fn with_client(client: ReqwestClient) -> Self {
		Self { http_client: ReqwestHttpClient::with_client(client) }
	}

	fn token_endpoint(
		&self,
		options: &HelperOptions,
		kind: StrategyKind,
	) -> Result<TokenEndpoint, ConfigError> {
		TokenEndpoint::from_options(self.http_client.clone(), options, kind.as_str())
	}
}
impl IdentityBackend for AzureIdentityBackend {
	fn client_certificate<'a>(
		&'a self,
		deadline: Deadline,
		options: &'a HelperOptions,
	) -> IdentityFuture<'a> {
		Box::pin(async move {
			let endpoint = self.token_endpoint(options, StrategyKind::ClientCertificate)?;
			let certificate = ClientCertificate::load(options, deadline).await?;

			Ok(Arc::new(ConfidentialClientAuthorizer {
				endpoint,
				credential: ClientCredential::Certificate(certificate),
			}) as Arc<dyn Authorizer>)
		})
	}

	fn client_secret<'a>(
		&'a self,
		_deadline: Deadline,
		options: &'a HelperOptions,
	) -> IdentityFuture<'a> {
		Box::pin(async move {
			if options.client_secret().is_empty() {
				return Err(ConfigError::MissingOption {
					option: "client_secret",
					strategy: StrategyKind::ClientSecret.as_str(),
				}
				.into());
			}

			let endpoint = self.token_endpoint(options, StrategyKind::ClientSecret)?;

			Ok(Arc::new(ConfidentialClientAuthorizer {
				endpoint,
				credential: ClientCredential::Secret(TokenSecret::new(options.client_secret())),
			}) as Arc<dyn Authorizer>)
		})
	}

	fn managed_identity<'a>(
		&'a self,
		_deadline: Deadline,
		options: &'a HelperOptions,
	) -> IdentityFuture<'a> {
		Box::pin(async move {
			let authorizer =
				ManagedIdentityAuthorizer::from_options(self.http_client.0.clone(), options)?;

			Ok(Arc::new(authorizer) as Arc<dyn Authorizer>)
		})
	}

	fn federated_token<'a>(
		&'a self,
		_deadline: Deadline,
		options: &'a HelperOptions,
	) -> IdentityFuture<'a> {
		Box::pin(async move {
			let source =
				FederatedAssertionSource::from_options(self.http_client.0.clone(), options)?;
			let endpoint = self.token_endpoint(options, StrategyKind::FederatedToken)?;

			Ok(Arc::new(ConfidentialClientAuthorizer {
				endpoint,
				credential: ClientCredential::Federated(source),
			}) as Arc<dyn Authorizer>)
		})
	}

	fn azure_cli<'a>(
		&'a self,
		_deadline: Deadline,
		options: &'a HelperOptions,
	) -> IdentityFuture<'a> {
		Box::pin(async move {
			Ok(Arc::new(AzureCliAuthorizer::from_options(options)) as Arc<dyn Authorizer>)
		})
	}
}

enum ClientCredential {
	Secret(TokenSecret),
	Certificate(ClientCertificate),
	Federated(FederatedAssertionSource),
}

/// Confidential client: one token endpoint, one way of proving the client identity.
struct ConfidentialClientAuthorizer {
	endpoint: TokenEndpoint,
	credential: ClientCredential,
}
impl Authorizer for ConfidentialClientAuthorizer {
	fn token(&self, deadline: Deadline) -> AuthorizerFuture<'_, AccessToken> {
		Box::pin(deadline.run("token", async move {
			match &self.credential {
				ClientCredential::Secret(secret) =>
					self.endpoint
						.exchange_client_credentials(ClientAuth::Secret(secret.expose()))
						.await,
				ClientCredential::Certificate(certificate) => {
					let assertion = certificate
						.sign_assertion(self.endpoint.client_id(), self.endpoint.token_url())?;

					self.endpoint
						.exchange_client_credentials(ClientAuth::Assertion(assertion.expose()))
						.await
				},
				ClientCredential::Federated(source) => {
					let assertion = source.fetch().await?;

					self.endpoint
						.exchange_client_credentials(ClientAuth::Assertion(assertion.expose()))
						.await
				},
			}
		}))
	}
}
impl Debug for ConfidentialClientAuthorizer {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		let credential = match self.credential {
			ClientCredential::Secret(_) => "secret",
			ClientCredential::Certificate(_) => "certificate",
			ClientCredential::Federated(_) => "federated",
		};

		f.debug_struct("ConfidentialClientAuthorizer")
			.field("endpoint", self.endpoint.token_url())
			.field("credential", &credential)
			.finish()
	}
}
