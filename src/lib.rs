//! Azure Container Registry credential helper—probe an ordered chain of identity strategies,
//! cache the first usable authorizer, and exchange it for registry-scoped credentials.

#![deny(clippy::all, missing_docs)]

pub mod auth;
pub mod cache;
pub mod config;
pub mod deadline;
pub mod error;
pub mod helper;
#[cfg(feature = "reqwest")] pub mod http;
pub mod identity;
#[cfg(feature = "reqwest")] pub mod oauth;
pub mod obs;
pub mod registry;
pub mod resolver;
pub mod strategy;
#[cfg(any(test, feature = "test"))]
pub mod _preludet {
	//! Convenience re-exports and fakes for unit tests; enabled via `cfg(test)` or the `test`
	//! crate feature.

	pub use crate::_prelude::*;

	// std
	use std::sync::atomic::{AtomicUsize, Ordering};
	// self
	use crate::{
		auth::{AccessToken, Authorizer, AuthorizerFuture},
		config::HelperOptions,
		deadline::Deadline,
		identity::{IdentityBackend, IdentityFuture},
		registry::{RegistryExchange, RegistryFuture},
		strategy::StrategyKind,
	};

	/// Authorizer that hands out a fixed token (or a fixed failure) and counts calls.
	#[derive(Debug, Default)]
	pub struct StaticAuthorizer {
		/// Token value returned on success; `None` simulates a rejected credential.
		pub token: Option<String>,
		/// Number of times [`Authorizer::token`] was invoked.
		pub calls: AtomicUsize,
	}
	impl StaticAuthorizer {
		/// Authorizer whose token requests always succeed.
		pub fn ok(token: impl Into<String>) -> Self {
			Self { token: Some(token.into()), calls: AtomicUsize::new(0) }
		}

		/// Authorizer whose token requests always fail with `InvalidClient`.
		pub fn rejecting() -> Self {
			Self { token: None, calls: AtomicUsize::new(0) }
		}
	}
	impl Authorizer for StaticAuthorizer {
		fn token(&self, _deadline: Deadline) -> AuthorizerFuture<'_, AccessToken> {
			self.calls.fetch_add(1, Ordering::SeqCst);

			let token = self.token.clone();

			Box::pin(async move {
				match token {
					Some(value) =>
						Ok(AccessToken::new(value, OffsetDateTime::now_utc() + Duration::hours(1))),
					None => Err(Error::InvalidClient { reason: "credential rejected".into() }),
				}
			})
		}
	}

	/// Authorizer whose token requests hit their own short timeout.
	#[derive(Debug)]
	pub struct StalledAuthorizer;
	impl Authorizer for StalledAuthorizer {
		fn token(&self, _deadline: Deadline) -> AuthorizerFuture<'_, AccessToken> {
			Box::pin(async { Err(Error::DeadlineExceeded { stage: "token" }) })
		}
	}

	/// Behavior a [`ScriptedBackend`] applies to one strategy.
	#[derive(Clone, Copy, Debug, PartialEq, Eq)]
	pub enum Script {
		/// Construction and validation both succeed.
		Succeed,
		/// Construction fails.
		FailConstruction,
		/// Construction succeeds but the validation token request fails.
		FailValidation,
		/// Construction never completes (simulates a hung network call).
		Hang,
		/// The validation token request runs into a timeout local to the strategy.
		TimeOutValidation,
	}

	/// Identity backend whose per-strategy behavior is scripted and whose constructor calls
	/// are counted.
	#[derive(Debug)]
	pub struct ScriptedBackend {
		scripts: [Script; 5],
		calls: [AtomicUsize; 5],
	}
	impl ScriptedBackend {
		/// Backend where every strategy uses `script`.
		pub fn uniform(script: Script) -> Self {
			Self { scripts: [script; 5], calls: Default::default() }
		}

		/// Overrides the script for one strategy.
		pub fn with(mut self, kind: StrategyKind, script: Script) -> Self {
			self.scripts[kind.position()] = script;

			self
		}

		/// Number of constructor invocations for `kind`.
		pub fn calls(&self, kind: StrategyKind) -> usize {
			self.calls[kind.position()].load(Ordering::SeqCst)
		}

		/// Total constructor invocations across all strategies.
		pub fn total_calls(&self) -> usize {
			self.calls.iter().map(|count| count.load(Ordering::SeqCst)).sum()
		}

		fn construct(&self, kind: StrategyKind) -> IdentityFuture<'_> {
			self.calls[kind.position()].fetch_add(1, Ordering::SeqCst);

			let script = self.scripts[kind.position()];

			Box::pin(async move {
				match script {
					Script::Succeed => Ok(Arc::new(StaticAuthorizer::ok(format!("{kind}-token")))
						as Arc<dyn Authorizer>),
					Script::FailConstruction => Err(Error::InvalidClient {
						reason: format!("{kind} could not be constructed"),
					}),
					Script::FailValidation =>
						Ok(Arc::new(StaticAuthorizer::rejecting()) as Arc<dyn Authorizer>),
					Script::Hang => std::future::pending().await,
					Script::TimeOutValidation =>
						Ok(Arc::new(StalledAuthorizer) as Arc<dyn Authorizer>),
				}
			})
		}
	}
	impl IdentityBackend for ScriptedBackend {
		fn client_certificate<'a>(
			&'a self,
			_deadline: Deadline,
			_options: &'a HelperOptions,
		) -> IdentityFuture<'a> {
			self.construct(StrategyKind::ClientCertificate)
		}

		fn client_secret<'a>(
			&'a self,
			_deadline: Deadline,
			_options: &'a HelperOptions,
		) -> IdentityFuture<'a> {
			self.construct(StrategyKind::ClientSecret)
		}

		fn managed_identity<'a>(
			&'a self,
			_deadline: Deadline,
			_options: &'a HelperOptions,
		) -> IdentityFuture<'a> {
			self.construct(StrategyKind::ManagedIdentity)
		}

		fn federated_token<'a>(
			&'a self,
			_deadline: Deadline,
			_options: &'a HelperOptions,
		) -> IdentityFuture<'a> {
			self.construct(StrategyKind::FederatedToken)
		}

		fn azure_cli<'a>(
			&'a self,
			_deadline: Deadline,
			_options: &'a HelperOptions,
		) -> IdentityFuture<'a> {
			self.construct(StrategyKind::AzureCli)
		}
	}

	/// Registry fake that echoes the bearer token back as the registry secret.
	#[derive(Debug, Default)]
	pub struct EchoRegistry {
		/// Number of exchanges performed.
		pub calls: AtomicUsize,
	}
	impl RegistryExchange for EchoRegistry {
		fn exchange<'a>(
			&'a self,
			deadline: Deadline,
			authorizer: &'a dyn Authorizer,
			registry: &'a str,
			_tenant: &'a str,
		) -> RegistryFuture<'a> {
			self.calls.fetch_add(1, Ordering::SeqCst);

			Box::pin(async move {
				let token = authorizer.token(deadline).await?;

				Ok(TokenSecret::new(format!("{registry}:{}", token.secret.expose())))
			})
		}
	}
}

mod _prelude {
	pub use std::{
		collections::BTreeMap,
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		str::FromStr,
		sync::Arc,
		time::Duration as StdDuration,
	};

	pub use async_lock::{Mutex as AsyncMutex, OnceCell};
	#[cfg(feature = "reqwest")]
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use url::Url;

	pub use crate::{
		auth::TokenSecret,
		error::{Error, Result},
	};
}

#[cfg(feature = "reqwest")] pub use reqwest;
pub use url;
#[cfg(test)] use color_eyre as _;
