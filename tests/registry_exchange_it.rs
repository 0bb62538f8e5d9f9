// std
use std::sync::atomic::Ordering;
// crates.io
use color_eyre::Result;
use httpmock::prelude::*;
// self
use acr_credential_helper::{
	_preludet::*,
	deadline::Deadline,
	error::TransientError,
	registry::{AcrRegistryClient, RegistryExchange},
};

const REGISTRY: &str = "contoso.azurecr.io";

fn client(server: &MockServer) -> Result<AcrRegistryClient> {
	Ok(AcrRegistryClient::default().with_base_url(Url::parse(&server.base_url())?))
}

fn deadline() -> Deadline {
	Deadline::after(StdDuration::from_secs(5))
}

#[tokio::test]
async fn exchange_returns_refresh_token() -> Result<()> {
	let server = MockServer::start_async().await;
	let mock = server
		.mock_async(|when, then| {
			when.method(POST)
				.path("/oauth2/exchange")
				.form_urlencoded_tuple("grant_type", "access_token")
				.form_urlencoded_tuple("service", REGISTRY)
				.form_urlencoded_tuple("access_token", "identity-token")
				.form_urlencoded_tuple("tenant", "contoso-tenant");
			then.status(200)
				.header("content-type", "application/json")
				.body("{\"refresh_token\":\"registry-secret\"}");
		})
		.await;
	let authorizer = StaticAuthorizer::ok("identity-token");
	let secret = client(&server)?
		.exchange(deadline(), &authorizer, "https://contoso.azurecr.io/v2/", "contoso-tenant")
		.await?;

	mock.assert_async().await;

	assert_eq!(secret, TokenSecret::new("registry-secret"));
	assert_eq!(authorizer.calls.load(Ordering::SeqCst), 1);

	Ok(())
}

#[tokio::test]
async fn unauthorized_exchange_is_rejected() -> Result<()> {
	let server = MockServer::start_async().await;
	let _mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/oauth2/exchange");
			then.status(401).header("content-type", "application/json").body(
				"{\"errors\":[{\"code\":\"UNAUTHORIZED\",\"message\":\"identity not allowed\"}]}",
			);
		})
		.await;
	let err = client(&server)?
		.exchange(deadline(), &StaticAuthorizer::ok("identity-token"), REGISTRY, "")
		.await
		.expect_err("A 401 should reject the exchange.");

	match err {
		Error::ExchangeRejected { reason } =>
			assert_eq!(reason, "UNAUTHORIZED: identity not allowed"),
		other => panic!("Unexpected error: {other:?}."),
	}

	Ok(())
}

#[tokio::test]
async fn unavailable_registry_is_transient() -> Result<()> {
	let server = MockServer::start_async().await;
	let _mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/oauth2/exchange");
			then.status(503).header("retry-after", "7").body("maintenance");
		})
		.await;
	let err = client(&server)?
		.exchange(deadline(), &StaticAuthorizer::ok("identity-token"), REGISTRY, "")
		.await
		.expect_err("A 503 should fail the exchange.");

	assert!(err.is_retryable());

	match err {
		Error::Transient(TransientError::Endpoint { status, retry_after, .. }) => {
			assert_eq!(status, Some(503));
			assert_eq!(retry_after, Some(Duration::seconds(7)));
		},
		other => panic!("Unexpected error: {other:?}."),
	}

	Ok(())
}

#[tokio::test]
async fn rejected_identity_never_reaches_the_registry() -> Result<()> {
	let server = MockServer::start_async().await;
	let mock = server
		.mock_async(|when, then| {
			when.any_request();
			then.status(200);
		})
		.await;
	let err = client(&server)?
		.exchange(deadline(), &StaticAuthorizer::rejecting(), REGISTRY, "")
		.await
		.expect_err("A failing authorizer should fail the exchange.");

	assert!(matches!(err, Error::InvalidClient { .. }));
	assert_eq!(mock.hits_async().await, 0);

	Ok(())
}

#[tokio::test]
async fn blank_registry_never_reaches_the_network() -> Result<()> {
	let server = MockServer::start_async().await;
	let mock = server
		.mock_async(|when, then| {
			when.any_request();
			then.status(200);
		})
		.await;
	let authorizer = StaticAuthorizer::ok("identity-token");
	let err = client(&server)?
		.exchange(deadline(), &authorizer, "   ", "")
		.await
		.expect_err("A blank registry should be rejected.");

	assert!(matches!(err, Error::Config(_)));
	assert_eq!(mock.hits_async().await, 0);
	assert_eq!(authorizer.calls.load(Ordering::SeqCst), 0);

	Ok(())
}
