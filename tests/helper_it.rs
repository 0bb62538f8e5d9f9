// std
use std::sync::atomic::Ordering;
// crates.io
use color_eyre::Result;
use httpmock::prelude::*;
use tokio::net::TcpListener;
// self
use acr_credential_helper::{
	_preludet::*,
	auth::Authorizer,
	config::{CloudEnvironment, HelperOptions, HelperOptionsBuilder},
	deadline::Deadline,
	helper::{AcrHelper, CredentialHelper, TOKEN_USERNAME},
	identity::{AzureIdentityBackend, IdentityBackend, IdentityFuture},
	registry::AcrRegistryClient,
	strategy::StrategyKind,
};

const REGISTRY: &str = "contoso.azurecr.io";
const AUDIENCE: &str = "https://management.test";

async fn helper(server: &MockServer, options: HelperOptions) -> AcrHelper {
	let backend = AzureIdentityBackend::new().expect("Backend should build.");
	let registry = AcrRegistryClient::default()
		.with_base_url(Url::parse(&server.base_url()).expect("Mock base URL should parse."));

	AcrHelper::with_collaborators(options, Arc::new(backend), Arc::new(registry)).await
}

/// Built-in backend whose CLI strategy is replaced by a fixed local session.
struct LocalSessionBackend {
	azure: AzureIdentityBackend,
	session: Arc<StaticAuthorizer>,
}
impl IdentityBackend for LocalSessionBackend {
	fn client_certificate<'a>(
		&'a self,
		deadline: Deadline,
		options: &'a HelperOptions,
	) -> IdentityFuture<'a> {
		self.azure.client_certificate(deadline, options)
	}

	fn client_secret<'a>(
		&'a self,
		deadline: Deadline,
		options: &'a HelperOptions,
	) -> IdentityFuture<'a> {
		self.azure.client_secret(deadline, options)
	}

	fn managed_identity<'a>(
		&'a self,
		deadline: Deadline,
		options: &'a HelperOptions,
	) -> IdentityFuture<'a> {
		self.azure.managed_identity(deadline, options)
	}

	fn federated_token<'a>(
		&'a self,
		deadline: Deadline,
		options: &'a HelperOptions,
	) -> IdentityFuture<'a> {
		self.azure.federated_token(deadline, options)
	}

	fn azure_cli<'a>(
		&'a self,
		_deadline: Deadline,
		_options: &'a HelperOptions,
	) -> IdentityFuture<'a> {
		let session = self.session.clone() as Arc<dyn Authorizer>;

		Box::pin(async move { Ok(session) })
	}
}

fn options(server: &MockServer) -> HelperOptionsBuilder {
	HelperOptions::builder()
		.environment(CloudEnvironment::custom("mock", server.base_url(), AUDIENCE))
		.tenant_id("tenant")
		.client_id("client")
		.msi_endpoint(server.url("/msi/token"))
		.timeout(std::time::Duration::from_secs(10))
}

#[tokio::test]
async fn rejected_secret_falls_back_to_managed_identity() {
	let server = MockServer::start_async().await;
	let secret = server
		.mock_async(|when, then| {
			when.method(POST)
				.path("/tenant/oauth2/v2.0/token")
				.form_urlencoded_tuple("client_secret", "stale-secret");
			then.status(401).header("content-type", "application/json").body(
				"{\"error\":\"invalid_client\",\"error_description\":\"AADSTS7000215: Invalid client secret.\"}",
			);
		})
		.await;
	let managed = server
		.mock_async(|when, then| {
			when.method(GET)
				.path("/msi/token")
				.query_param("api-version", "2018-02-01")
				.query_param("resource", AUDIENCE)
				.query_param("client_id", "client")
				.header("metadata", "true");
			then.status(200)
				.header("content-type", "application/json")
				.body("{\"access_token\":\"msi-token\",\"expires_in\":\"3599\",\"token_type\":\"Bearer\"}");
		})
		.await;
	let exchange = server
		.mock_async(|when, then| {
			when.method(POST)
				.path("/oauth2/exchange")
				.form_urlencoded_tuple("access_token", "msi-token")
				.form_urlencoded_tuple("service", REGISTRY);
			then.status(200)
				.header("content-type", "application/json")
				.body("{\"refresh_token\":\"registry-secret\"}");
		})
		.await;
	let helper = helper(&server, options(&server).client_secret("stale-secret").build()).await;

	assert_eq!(helper.resolved_strategy(), Some(StrategyKind::ManagedIdentity));

	let first = helper.get(REGISTRY).await.expect("First lookup should succeed.");
	let second = helper.get(REGISTRY).await.expect("Second lookup should succeed.");

	assert_eq!(first.username, TOKEN_USERNAME);
	assert_eq!(first.secret.expose(), "registry-secret");
	assert_eq!(first, second);

	secret.assert_calls_async(1).await;
	managed.assert_calls_async(1).await;
	exchange.assert_calls_async(2).await;
}

#[tokio::test]
async fn certificate_outranks_secret() {
	let server = MockServer::start_async().await;
	let certificate = server
		.mock_async(|when, then| {
			when.method(POST)
				.path("/tenant/oauth2/v2.0/token")
				.form_urlencoded_tuple(
					"client_assertion_type",
					"urn:ietf:params:oauth:client-assertion-type:jwt-bearer",
				)
				.form_urlencoded_tuple("scope", "https://management.test/.default");
			then.status(200).header("content-type", "application/json").body(
				"{\"access_token\":\"cert-token\",\"token_type\":\"Bearer\",\"expires_in\":3599}",
			);
		})
		.await;
	let exchange = server
		.mock_async(|when, then| {
			when.method(POST)
				.path("/oauth2/exchange")
				.form_urlencoded_tuple("access_token", "cert-token");
			then.status(200)
				.header("content-type", "application/json")
				.body("{\"refresh_token\":\"registry-secret\"}");
		})
		.await;
	let options = options(&server)
		.client_secret("unused-secret")
		.client_cert_path(concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures/client.pem"))
		.cache_authorizer_at_construction(false)
		.build();
	let helper = helper(&server, options).await;

	assert_eq!(helper.resolved_strategy(), None);

	let result = helper
		.get("https://contoso.azurecr.io/v2/")
		.await
		.expect("Lookup should succeed with the certificate.");

	assert_eq!(result.secret.expose(), "registry-secret");
	assert_eq!(helper.resolved_strategy(), Some(StrategyKind::ClientCertificate));

	certificate.assert_calls_async(1).await;
	exchange.assert_calls_async(1).await;
}

#[tokio::test]
async fn password_protected_archive_selects_certificate() -> Result<()> {
	let server = MockServer::start_async().await;
	let certificate = server
		.mock_async(|when, then| {
			when.method(POST)
				.path("/tenant/oauth2/v2.0/token")
				.form_urlencoded_tuple(
					"client_assertion_type",
					"urn:ietf:params:oauth:client-assertion-type:jwt-bearer",
				);
			then.status(200).header("content-type", "application/json").body(
				"{\"access_token\":\"pfx-token\",\"token_type\":\"Bearer\",\"expires_in\":3599}",
			);
		})
		.await;
	let exchange = server
		.mock_async(|when, then| {
			when.method(POST)
				.path("/oauth2/exchange")
				.form_urlencoded_tuple("access_token", "pfx-token");
			then.status(200)
				.header("content-type", "application/json")
				.body("{\"refresh_token\":\"registry-secret\"}");
		})
		.await;
	let options = options(&server)
		.client_cert_path(concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures/client.pfx"))
		.client_cert_password("fixture-password")
		.build();
	let helper = helper(&server, options).await;

	assert_eq!(helper.resolved_strategy(), Some(StrategyKind::ClientCertificate));

	let result = helper.get(REGISTRY).await?;

	assert_eq!(result.secret.expose(), "registry-secret");

	certificate.assert_calls_async(1).await;
	exchange.assert_calls_async(1).await;

	Ok(())
}

#[tokio::test]
async fn registry_rejection_surfaces_after_resolution() {
	let server = MockServer::start_async().await;
	let _managed = server
		.mock_async(|when, then| {
			when.method(GET).path("/msi/token");
			then.status(200)
				.header("content-type", "application/json")
				.body("{\"access_token\":\"msi-token\",\"expires_in\":3599}");
		})
		.await;
	let _exchange = server
		.mock_async(|when, then| {
			when.method(POST).path("/oauth2/exchange");
			then.status(401).body("unauthorized");
		})
		.await;
	let helper = helper(&server, options(&server).build()).await;
	let err = helper.get(REGISTRY).await.expect_err("Registry rejection should be reported.");

	assert!(matches!(err, Error::ExchangeRejected { .. }));
	assert_eq!(helper.resolved_strategy(), Some(StrategyKind::ManagedIdentity));
}

#[tokio::test]
async fn silent_metadata_service_falls_back_to_cli_session() -> Result<()> {
	let listener = TcpListener::bind("127.0.0.1:0").await?;
	let address = listener.local_addr()?;
	let _held = tokio::spawn(async move {
		let mut sockets = Vec::new();

		while let Ok((socket, _)) = listener.accept().await {
			sockets.push(socket);
		}
	});
	let session = Arc::new(StaticAuthorizer::ok("cli-token"));
	let backend =
		LocalSessionBackend { azure: AzureIdentityBackend::new()?, session: session.clone() };
	let registry = Arc::new(EchoRegistry::default());
	let options = HelperOptions::builder()
		.msi_endpoint(format!("http://{address}/metadata/identity/oauth2/token"))
		.timeout(StdDuration::from_secs(10))
		.cache_authorizer_at_construction(false)
		.build();
	let helper = AcrHelper::with_collaborators(options, Arc::new(backend), registry.clone()).await;
	let result = helper.get(REGISTRY).await?;

	assert_eq!(result.secret.expose(), "contoso.azurecr.io:cli-token");
	assert_eq!(helper.resolved_strategy(), Some(StrategyKind::AzureCli));
	assert_eq!(session.calls.load(Ordering::SeqCst), 1);
	assert_eq!(registry.calls.load(Ordering::SeqCst), 1);

	Ok(())
}

#[tokio::test]
async fn store_operations_are_not_implemented() {
	let server = MockServer::start_async().await;
	let helper =
		helper(&server, options(&server).cache_authorizer_at_construction(false).build()).await;
	let err = helper.list().await.expect_err("List should not be implemented.");

	assert_eq!(err.to_string(), "method List() is not implemented.");
}
