//! Helper configuration: the immutable parameter set consumed by every other component.
//!
//! [`HelperOptions`] is built once per helper instance, either from defaults
//! ([`HelperOptions::builder`]) or from the process environment
//! ([`HelperOptions::from_env`]). Explicit [`HelperOption`] overrides are applied on top in the
//! order supplied, last writer wins. Every string is trimmed on the way in and absence is an
//! empty string, so strategies only ever test for emptiness.

pub mod cloud;

pub use cloud::*;

// self
use crate::_prelude::*;

/// Environment variable names read by [`HelperOptions::from_env`].
pub mod env {
	/// Tenant identifier.
	pub const TENANT_ID: &str = "AZURE_TENANT_ID";
	/// Client (application) identifier.
	pub const CLIENT_ID: &str = "AZURE_CLIENT_ID";
	/// Client secret.
	pub const CLIENT_SECRET: &str = "AZURE_CLIENT_SECRET";
	/// Path to a PEM bundle holding the client certificate and key.
	pub const CERTIFICATE_PATH: &str = "AZURE_CERTIFICATE_PATH";
	/// Password protecting the certificate bundle.
	pub const CERTIFICATE_PASSWORD: &str = "AZURE_CERTIFICATE_PASSWORD";
	/// GitHub Actions OIDC token request URL.
	pub const FEDERATED_TOKEN_URL: &str = "ACTIONS_ID_TOKEN_REQUEST_URL";
	/// GitHub Actions OIDC token request bearer value.
	pub const FEDERATED_TOKEN: &str = "ACTIONS_ID_TOKEN_REQUEST_TOKEN";
	/// Managed identity endpoint override.
	pub const MSI_ENDPOINT: &str = "MSI_ENDPOINT";
}

/// Immutable parameter set for one helper instance.
#[derive(Clone, PartialEq, Eq)]
pub struct HelperOptions {
	environment: CloudEnvironment,
	token_version: TokenVersion,
	tenant_id: String,
	client_id: String,
	client_secret: String,
	client_cert_path: String,
	client_cert_data: Vec<u8>,
	client_cert_password: String,
	federated_token_url: String,
	federated_token: String,
	msi_endpoint: String,
	timeout: StdDuration,
	cache_authorizer_at_construction: bool,
}
impl HelperOptions {
	/// Per-operation timeout used when none is configured.
	pub const DEFAULT_TIMEOUT: StdDuration = StdDuration::from_secs(10);

	/// Builder seeded with defaults only (no environment).
	pub fn builder() -> HelperOptionsBuilder {
		HelperOptionsBuilder::default()
	}

	/// Defaults overlaid with the process environment.
	pub fn from_env() -> Self {
		HelperOptionsBuilder::from_env().build()
	}

	/// Defaults, then the process environment, then `overrides` in order.
	pub fn from_env_with(overrides: impl IntoIterator<Item = HelperOption>) -> Self {
		HelperOptionsBuilder::from_env().apply_all(overrides).build()
	}

	/// Cloud endpoint set.
	pub fn environment(&self) -> &CloudEnvironment {
		&self.environment
	}

	/// Token endpoint version.
	pub fn token_version(&self) -> TokenVersion {
		self.token_version
	}

	/// Tenant identifier (empty when unset).
	pub fn tenant_id(&self) -> &str {
		&self.tenant_id
	}

	/// Client identifier (empty when unset).
	pub fn client_id(&self) -> &str {
		&self.client_id
	}

	/// Client secret (empty when unset). Never log this value.
	pub fn client_secret(&self) -> &str {
		&self.client_secret
	}

	/// Certificate bundle path (empty when unset).
	pub fn client_cert_path(&self) -> &str {
		&self.client_cert_path
	}

	/// In-memory certificate bundle (empty when unset).
	pub fn client_cert_data(&self) -> &[u8] {
		&self.client_cert_data
	}

	/// Certificate bundle password (empty when unset). Never log this value.
	pub fn client_cert_password(&self) -> &str {
		&self.client_cert_password
	}

	/// Federated token request URL (empty when unset).
	pub fn federated_token_url(&self) -> &str {
		&self.federated_token_url
	}

	/// Federated token request bearer value (empty when unset). Never log this value.
	pub fn federated_token(&self) -> &str {
		&self.federated_token
	}

	/// Managed identity endpoint override (empty means the platform default).
	pub fn msi_endpoint(&self) -> &str {
		&self.msi_endpoint
	}

	/// Per-operation timeout.
	pub fn timeout(&self) -> StdDuration {
		self.timeout
	}

	/// Whether the helper resolves its authorizer at construction.
	pub fn cache_authorizer_at_construction(&self) -> bool {
		self.cache_authorizer_at_construction
	}

	/// Returns `true` when certificate material is configured.
	pub fn has_certificate(&self) -> bool {
		!self.client_cert_path.is_empty() || !self.client_cert_data.is_empty()
	}
}
impl Default for HelperOptions {
	fn default() -> Self {
		HelperOptionsBuilder::default().build()
	}
}
impl Debug for HelperOptions {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("HelperOptions")
			.field("environment", &self.environment.name)
			.field("token_version", &self.token_version)
			.field("tenant_id", &self.tenant_id)
			.field("client_id", &self.client_id)
			.field("client_secret_set", &!self.client_secret.is_empty())
			.field("client_cert_path", &self.client_cert_path)
			.field("client_cert_data_set", &!self.client_cert_data.is_empty())
			.field("client_cert_password_set", &!self.client_cert_password.is_empty())
			.field("federated_token_url", &self.federated_token_url)
			.field("federated_token_set", &!self.federated_token.is_empty())
			.field("msi_endpoint", &self.msi_endpoint)
			.field("timeout", &self.timeout)
			.field("cache_authorizer_at_construction", &self.cache_authorizer_at_construction)
			.finish()
	}
}

/// One named override applied on top of defaults and environment values.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HelperOption {
	/// Cloud endpoint set. Default: [`CloudEnvironment::GLOBAL`].
	Environment(CloudEnvironment),
	/// Token endpoint version. Default: [`TokenVersion::V2`].
	TokenVersion(TokenVersion),
	/// Tenant identifier. Default: `AZURE_TENANT_ID`.
	TenantId(String),
	/// Client identifier. Default: `AZURE_CLIENT_ID`.
	ClientId(String),
	/// Client secret. Default: `AZURE_CLIENT_SECRET`.
	ClientSecret(String),
	/// Certificate bundle path. Default: `AZURE_CERTIFICATE_PATH`.
	ClientCertPath(String),
	/// In-memory certificate bundle. Default: empty.
	ClientCertData(Vec<u8>),
	/// Certificate bundle password. Default: `AZURE_CERTIFICATE_PASSWORD`.
	ClientCertPassword(String),
	/// Federated token request URL. Default: `ACTIONS_ID_TOKEN_REQUEST_URL`.
	FederatedTokenUrl(String),
	/// Federated token request bearer value. Default: `ACTIONS_ID_TOKEN_REQUEST_TOKEN`.
	FederatedToken(String),
	/// Managed identity endpoint. Default: `MSI_ENDPOINT`.
	MsiEndpoint(String),
	/// Per-operation timeout. Default: 10 seconds.
	Timeout(StdDuration),
	/// Resolve the authorizer at construction. Default: `true`.
	CacheAuthorizerAtConstruction(bool),
}

/// Builder for [`HelperOptions`]; every setter trims and overwrites.
#[derive(Clone, Debug)]
pub struct HelperOptionsBuilder {
	options: HelperOptions,
}
impl HelperOptionsBuilder {
	/// Builder seeded from the process environment.
	pub fn from_env() -> Self {
		Self::from_lookup(|key| std::env::var(key).ok())
	}

	/// Builder seeded from an arbitrary variable lookup.
	pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
		let read = |key: &str| lookup(key).unwrap_or_default();

		Self::default()
			.tenant_id(read(env::TENANT_ID))
			.client_id(read(env::CLIENT_ID))
			.client_secret(read(env::CLIENT_SECRET))
			.client_cert_path(read(env::CERTIFICATE_PATH))
			.client_cert_password(read(env::CERTIFICATE_PASSWORD))
			.federated_token_url(read(env::FEDERATED_TOKEN_URL))
			.federated_token(read(env::FEDERATED_TOKEN))
			.msi_endpoint(read(env::MSI_ENDPOINT))
	}

	/// Applies a single override.
	pub fn apply(self, option: HelperOption) -> Self {
		match option {
			HelperOption::Environment(value) => self.environment(value),
			HelperOption::TokenVersion(value) => self.token_version(value),
			HelperOption::TenantId(value) => self.tenant_id(value),
			HelperOption::ClientId(value) => self.client_id(value),
			HelperOption::ClientSecret(value) => self.client_secret(value),
			HelperOption::ClientCertPath(value) => self.client_cert_path(value),
			HelperOption::ClientCertData(value) => self.client_cert_data(value),
			HelperOption::ClientCertPassword(value) => self.client_cert_password(value),
			HelperOption::FederatedTokenUrl(value) => self.federated_token_url(value),
			HelperOption::FederatedToken(value) => self.federated_token(value),
			HelperOption::MsiEndpoint(value) => self.msi_endpoint(value),
			HelperOption::Timeout(value) => self.timeout(value),
			HelperOption::CacheAuthorizerAtConstruction(value) =>
				self.cache_authorizer_at_construction(value),
		}
	}

	/// Applies overrides in order.
	pub fn apply_all(self, overrides: impl IntoIterator<Item = HelperOption>) -> Self {
		overrides.into_iter().fold(self, Self::apply)
	}

	/// Sets the cloud endpoint set.
	pub fn environment(mut self, environment: CloudEnvironment) -> Self {
		self.options.environment = environment;

		self
	}

	/// Sets the token endpoint version.
	pub fn token_version(mut self, version: TokenVersion) -> Self {
		self.options.token_version = version;

		self
	}

	/// Sets the tenant identifier.
	pub fn tenant_id(mut self, value: impl AsRef<str>) -> Self {
		self.options.tenant_id = trimmed(value);

		self
	}

	/// Sets the client identifier.
	pub fn client_id(mut self, value: impl AsRef<str>) -> Self {
		self.options.client_id = trimmed(value);

		self
	}

	/// Sets the client secret.
	pub fn client_secret(mut self, value: impl AsRef<str>) -> Self {
		self.options.client_secret = trimmed(value);

		self
	}

	/// Sets the certificate bundle path.
	pub fn client_cert_path(mut self, value: impl AsRef<str>) -> Self {
		self.options.client_cert_path = trimmed(value);

		self
	}

	/// Sets an in-memory certificate bundle.
	pub fn client_cert_data(mut self, value: impl Into<Vec<u8>>) -> Self {
		self.options.client_cert_data = value.into();

		self
	}

	/// Sets the certificate bundle password.
	pub fn client_cert_password(mut self, value: impl AsRef<str>) -> Self {
		self.options.client_cert_password = trimmed(value);

		self
	}

	/// Sets the federated token request URL.
	pub fn federated_token_url(mut self, value: impl AsRef<str>) -> Self {
		self.options.federated_token_url = trimmed(value);

		self
	}

	/// Sets the federated token request bearer value.
	pub fn federated_token(mut self, value: impl AsRef<str>) -> Self {
		self.options.federated_token = trimmed(value);

		self
	}

	/// Sets the managed identity endpoint override.
	pub fn msi_endpoint(mut self, value: impl AsRef<str>) -> Self {
		self.options.msi_endpoint = trimmed(value);

		self
	}

	/// Sets the per-operation timeout.
	pub fn timeout(mut self, timeout: StdDuration) -> Self {
		self.options.timeout = timeout;

		self
	}

	/// Enables or disables construction-time resolution.
	pub fn cache_authorizer_at_construction(mut self, enabled: bool) -> Self {
		self.options.cache_authorizer_at_construction = enabled;

		self
	}

	/// Finalizes the parameter set.
	pub fn build(self) -> HelperOptions {
		self.options
	}
}
impl Default for HelperOptionsBuilder {
	fn default() -> Self {
		Self {
			options: HelperOptions {
				environment: CloudEnvironment::GLOBAL,
				token_version: TokenVersion::V2,
				tenant_id: String::new(),
				client_id: String::new(),
				client_secret: String::new(),
				client_cert_path: String::new(),
				client_cert_data: Vec::new(),
				client_cert_password: String::new(),
				federated_token_url: String::new(),
				federated_token: String::new(),
				msi_endpoint: String::new(),
				timeout: HelperOptions::DEFAULT_TIMEOUT,
				cache_authorizer_at_construction: true,
			},
		}
	}
}

fn trimmed(value: impl AsRef<str>) -> String {
	value.as_ref().trim().to_owned()
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn lookup(pairs: &'static [(&'static str, &'static str)]) -> impl Fn(&str) -> Option<String> {
		move |key| pairs.iter().find(|(k, _)| *k == key).map(|(_, v)| (*v).to_owned())
	}

	#[test]
	fn defaults_are_empty_with_ten_second_timeout() {
		let options = HelperOptions::default();

		assert_eq!(options.environment(), &CloudEnvironment::GLOBAL);
		assert_eq!(options.token_version(), TokenVersion::V2);
		assert_eq!(options.tenant_id(), "");
		assert_eq!(options.client_secret(), "");
		assert!(!options.has_certificate());
		assert_eq!(options.timeout(), StdDuration::from_secs(10));
		assert!(options.cache_authorizer_at_construction());
	}

	#[test]
	fn environment_values_are_trimmed() {
		let options = HelperOptionsBuilder::from_lookup(lookup(&[
			(env::TENANT_ID, "  tenant \n"),
			(env::CLIENT_ID, "\tclient"),
			(env::CLIENT_SECRET, " secret "),
			(env::CERTIFICATE_PATH, " /tmp/cert.pem "),
			(env::CERTIFICATE_PASSWORD, " pw "),
			(env::FEDERATED_TOKEN_URL, " https://token.actions.test/request "),
			(env::FEDERATED_TOKEN, " bearer "),
		]))
		.build();

		assert_eq!(options.tenant_id(), "tenant");
		assert_eq!(options.client_id(), "client");
		assert_eq!(options.client_secret(), "secret");
		assert_eq!(options.client_cert_path(), "/tmp/cert.pem");
		assert_eq!(options.client_cert_password(), "pw");
		assert_eq!(options.federated_token_url(), "https://token.actions.test/request");
		assert_eq!(options.federated_token(), "bearer");
		assert_eq!(options.msi_endpoint(), "");
	}

	#[test]
	fn overrides_apply_in_order_last_writer_wins() {
		let options = HelperOptionsBuilder::from_lookup(lookup(&[(env::TENANT_ID, "from-env")]))
			.apply_all([
				HelperOption::Environment(CloudEnvironment::CANARY),
				HelperOption::TokenVersion(TokenVersion::V1),
				HelperOption::TenantId("first".into()),
				HelperOption::ClientId("ze-client-id".into()),
				HelperOption::ClientSecret("ze-client-secret".into()),
				HelperOption::ClientCertPath("ze-client-cert-path".into()),
				HelperOption::ClientCertPassword("ze-client-cert-password".into()),
				HelperOption::FederatedTokenUrl("ze-github-request-token-url".into()),
				HelperOption::FederatedToken("ze-github-request-token".into()),
				HelperOption::Timeout(StdDuration::from_millis(1337)),
				HelperOption::CacheAuthorizerAtConstruction(false),
				HelperOption::TenantId(" second ".into()),
			])
			.build();

		assert_eq!(options.environment(), &CloudEnvironment::CANARY);
		assert_eq!(options.token_version(), TokenVersion::V1);
		assert_eq!(options.tenant_id(), "second");
		assert_eq!(options.client_id(), "ze-client-id");
		assert_eq!(options.client_secret(), "ze-client-secret");
		assert_eq!(options.client_cert_path(), "ze-client-cert-path");
		assert_eq!(options.client_cert_password(), "ze-client-cert-password");
		assert_eq!(options.federated_token_url(), "ze-github-request-token-url");
		assert_eq!(options.federated_token(), "ze-github-request-token");
		assert_eq!(options.timeout(), StdDuration::from_millis(1337));
		assert!(!options.cache_authorizer_at_construction());
	}

	#[test]
	fn debug_output_redacts_secrets() {
		let options = HelperOptions::builder()
			.client_secret("super-secret")
			.client_cert_password("cert-password")
			.federated_token("bearer-value")
			.build();
		let rendered = format!("{options:?}");

		assert!(!rendered.contains("super-secret"));
		assert!(!rendered.contains("cert-password"));
		assert!(!rendered.contains("bearer-value"));
		assert!(rendered.contains("client_secret_set: true"));
	}
}
