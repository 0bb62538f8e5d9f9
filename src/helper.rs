//! Credential-store boundary: the operations a container runtime invokes on the helper.
//!
//! [`AcrHelper`] owns one parameter set, one fallback resolver, and one authorizer cache slot.
//! `get` is the only implemented operation; `add`, `delete`, and `list` exist because the
//! credential-store protocol requires them and always report [`Error::NotImplemented`].

// self
use crate::{
	_prelude::*,
	cache::{AuthorizerCache, CacheMode},
	config::HelperOptions,
	deadline::Deadline,
	error::ConfigError,
	identity::IdentityBackend,
	obs::{self, Stage, StageOutcome, StageSpan},
	registry::RegistryExchange,
	resolver::FallbackResolver,
	strategy::StrategyKind,
};
#[cfg(feature = "reqwest")]
use crate::{identity::AzureIdentityBackend, registry::AcrRegistryClient};

/// Username returned with every registry secret; registries recognize it as "token follows".
pub const TOKEN_USERNAME: &str = "<token>";

/// Boxed future returned by [`CredentialHelper`] operations.
pub type HelperFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + 'a + Send>>;

/// Credentials handed to a credential store by its host.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
	/// Registry server URL.
	#[serde(rename = "ServerURL")]
	pub server_url: String,
	/// Registry username.
	#[serde(rename = "Username")]
	pub username: String,
	/// Registry secret.
	#[serde(rename = "Secret")]
	pub secret: TokenSecret,
}
impl Credentials {
	/// Parses the JSON document a host writes to `store`.
	///
	/// Only the error position is reported so a rejected payload never echoes its secret.
	pub fn from_json(payload: &str) -> Result<Self, ConfigError> {
		serde_json::from_str(payload).map_err(|e| ConfigError::MalformedCredentials {
			line: e.line(),
			column: e.column(),
		})
	}
}

/// Result of a successful credential lookup.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExchangeResult {
	/// Always [`TOKEN_USERNAME`].
	pub username: String,
	/// Registry-scoped secret.
	pub secret: TokenSecret,
}
impl ExchangeResult {
	/// Wraps a registry secret with the placeholder username.
	pub fn from_secret(secret: TokenSecret) -> Self {
		Self { username: TOKEN_USERNAME.into(), secret }
	}
}

/// Credential-store protocol surface.
pub trait CredentialHelper
where
	Self: Send + Sync,
{
	/// Stores credentials for a server.
	fn add<'a>(&'a self, credentials: &'a Credentials) -> HelperFuture<'a, ()>;

	/// Removes credentials for a server.
	fn delete<'a>(&'a self, server_url: &'a str) -> HelperFuture<'a, ()>;

	/// Lists stored server URLs with their usernames.
	fn list(&self) -> HelperFuture<'_, BTreeMap<String, String>>;

	/// Returns credentials for a server.
	fn get<'a>(&'a self, server_url: &'a str) -> HelperFuture<'a, ExchangeResult>;
}

/// Azure Container Registry credential helper.
///
/// The cache slot is filled at most once per instance. Concurrent first requests wait for a
/// single in-flight resolution.
pub struct AcrHelper {
	options: HelperOptions,
	resolver: FallbackResolver,
	cache: AuthorizerCache,
	registry: Arc<dyn RegistryExchange>,
}
impl AcrHelper {
	/// Builds a helper over caller-supplied collaborators.
	///
	/// In eager mode the resolver runs once under the configured timeout. A failure is logged
	/// and deferred to the first credential request; construction itself never fails.
	pub async fn with_collaborators(
		options: HelperOptions,
		backend: Arc<dyn IdentityBackend>,
		registry: Arc<dyn RegistryExchange>,
	) -> Self {
		let resolver = FallbackResolver::new(backend);
		let cache = AuthorizerCache::new();

		if CacheMode::from_options(&options) == CacheMode::Eager {
			let span = StageSpan::new(Stage::Construct);

			obs::record_stage_outcome(Stage::Construct, StageOutcome::Attempt);

			let deadline = Deadline::after(options.timeout());

			match span.instrument(cache.get_or_resolve(&resolver, &options, deadline)).await {
				Ok(_) => obs::record_stage_outcome(Stage::Construct, StageOutcome::Success),
				Err(e) => {
					obs::log_deferred(Stage::Construct, &e);
					obs::record_stage_outcome(Stage::Construct, StageOutcome::Failure);
				},
			}
		}

		Self { options, resolver, cache, registry }
	}

	/// Parameter set this instance was built with.
	pub fn options(&self) -> &HelperOptions {
		&self.options
	}

	/// Strategy held by the cache slot, if it is populated.
	pub fn resolved_strategy(&self) -> Option<StrategyKind> {
		self.cache.get().map(|resolved| resolved.strategy)
	}

	/// Looks up credentials for `server_url` under the configured timeout.
	pub async fn get_credentials(&self, server_url: &str) -> Result<ExchangeResult> {
		self.get_credentials_until(server_url, Deadline::after(self.options.timeout())).await
	}

	/// Looks up credentials for `server_url`, abandoning the work at `deadline`.
	pub async fn get_credentials_until(
		&self,
		server_url: &str,
		deadline: Deadline,
	) -> Result<ExchangeResult> {
		let span = StageSpan::new(Stage::Exchange);

		obs::record_stage_outcome(Stage::Exchange, StageOutcome::Attempt);

		let result = span
			.instrument(async move {
				let resolved =
					self.cache.get_or_resolve(&self.resolver, &self.options, deadline).await?;
				let secret = deadline
					.run(
						"exchange",
						self.registry.exchange(
							deadline,
							resolved.authorizer.as_ref(),
							server_url,
							self.options.tenant_id(),
						),
					)
					.await?;

				Ok(ExchangeResult::from_secret(secret))
			})
			.await;

		match &result {
			Ok(_) => obs::record_stage_outcome(Stage::Exchange, StageOutcome::Success),
			Err(_) => obs::record_stage_outcome(Stage::Exchange, StageOutcome::Failure),
		}

		result
	}
}
#[cfg(feature = "reqwest")]
impl AcrHelper {
	/// Builds a helper with the built-in Azure backend and registry client.
	pub async fn new(options: HelperOptions) -> Result<Self> {
		let backend = AzureIdentityBackend::new()?;

		Ok(Self::with_collaborators(
			options,
			Arc::new(backend),
			Arc::new(AcrRegistryClient::default()),
		)
		.await)
	}

	/// Builds a helper configured from the process environment.
	pub async fn from_env() -> Result<Self> {
		Self::new(HelperOptions::from_env()).await
	}
}
impl CredentialHelper for AcrHelper {
	fn add<'a>(&'a self, _credentials: &'a Credentials) -> HelperFuture<'a, ()> {
		Box::pin(async { Err(Error::NotImplemented { method: "Add" }) })
	}

	fn delete<'a>(&'a self, _server_url: &'a str) -> HelperFuture<'a, ()> {
		Box::pin(async { Err(Error::NotImplemented { method: "Delete" }) })
	}

	fn list(&self) -> HelperFuture<'_, BTreeMap<String, String>> {
		Box::pin(async { Err(Error::NotImplemented { method: "List" }) })
	}

	fn get<'a>(&'a self, server_url: &'a str) -> HelperFuture<'a, ExchangeResult> {
		Box::pin(self.get_credentials(server_url))
	}
}
impl Debug for AcrHelper {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("AcrHelper")
			.field("options", &self.options)
			.field("resolver", &self.resolver)
			.field("resolved", &self.resolved_strategy())
			.finish()
	}
}
