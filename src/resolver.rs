//! Ordered fallback resolution across identity strategies.

// self
use crate::{
	_prelude::*,
	auth::Authorizer,
	config::HelperOptions,
	deadline::Deadline,
	identity::IdentityBackend,
	obs::{self, Stage, StageOutcome, StageSpan},
	strategy::{self, DEFAULT_STRATEGIES, ProbeOutcome, StrategyDescriptor, StrategyKind, Unusable},
};

/// Authorizer selected by the resolver, tagged with the strategy that produced it.
#[derive(Clone)]
pub struct Resolved {
	/// Winning strategy.
	pub strategy: StrategyKind,
	/// Validated, token-caching authorizer.
	pub authorizer: Arc<dyn Authorizer>,
}
impl Debug for Resolved {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Resolved").field("strategy", &self.strategy).finish()
	}
}

/// Walks an ordered strategy list and returns the first usable authorizer.
///
/// Strategy failures are absorbed here. The caller only ever sees
/// [`Error::ResolutionExhausted`] (every strategy unusable) or
/// [`Error::DeadlineExceeded`] (the deadline ran out mid-walk, which would make every
/// remaining probe fail anyway).
#[derive(Clone)]
pub struct FallbackResolver {
	backend: Arc<dyn IdentityBackend>,
	strategies: Vec<StrategyDescriptor>,
}
impl FallbackResolver {
	/// Resolver over the default strategy order.
	pub fn new(backend: Arc<dyn IdentityBackend>) -> Self {
		Self::with_strategies(backend, DEFAULT_STRATEGIES)
	}

	/// Resolver over a caller-supplied strategy order.
	pub fn with_strategies(
		backend: Arc<dyn IdentityBackend>,
		strategies: impl IntoIterator<Item = StrategyDescriptor>,
	) -> Self {
		Self { backend, strategies: strategies.into_iter().collect() }
	}

	/// Strategies in the order they are probed.
	pub fn strategies(&self) -> &[StrategyDescriptor] {
		&self.strategies
	}

	/// Probes strategies in order until one is usable.
	pub async fn resolve(&self, options: &HelperOptions, deadline: Deadline) -> Result<Resolved> {
		let span = StageSpan::new(Stage::Resolve);

		obs::record_stage_outcome(Stage::Resolve, StageOutcome::Attempt);

		let result = span
			.instrument(async move {
				for descriptor in &self.strategies {
					if descriptor.is_applicable(options) {
						deadline.check("resolve")?;
					}

					match strategy::probe(self.backend.as_ref(), descriptor, options, deadline).await
					{
						ProbeOutcome::Usable(authorizer) => {
							obs::log_resolved(descriptor.kind);

							return Ok(Resolved { strategy: descriptor.kind, authorizer });
						},
						ProbeOutcome::Unusable(Unusable::DeadlineExceeded) =>
							return Err(Error::DeadlineExceeded { stage: "resolve" }),
						ProbeOutcome::Unusable(_) => continue,
					}
				}

				Err(Error::ResolutionExhausted)
			})
			.await;

		match &result {
			Ok(_) => obs::record_stage_outcome(Stage::Resolve, StageOutcome::Success),
			Err(_) => obs::record_stage_outcome(Stage::Resolve, StageOutcome::Failure),
		}

		result
	}
}
impl Debug for FallbackResolver {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("FallbackResolver").field("strategies", &self.strategies).finish()
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::_preludet::*;

	fn deadline() -> Deadline {
		Deadline::after(StdDuration::from_secs(5))
	}

	fn never(_: &HelperOptions) -> bool {
		false
	}

	#[tokio::test]
	async fn no_applicable_strategy_exhausts_without_io() {
		let backend = Arc::new(ScriptedBackend::uniform(Script::Succeed));
		let strategies = DEFAULT_STRATEGIES.map(|descriptor| descriptor.with_applicability(never));
		let resolver = FallbackResolver::with_strategies(backend.clone(), strategies);
		let err = resolver
			.resolve(&HelperOptions::default(), deadline())
			.await
			.expect_err("Resolution should fail when no strategy applies.");

		assert!(matches!(err, Error::ResolutionExhausted));
		assert_eq!(backend.total_calls(), 0);
	}

	#[tokio::test]
	async fn first_usable_strategy_short_circuits() {
		let backend = Arc::new(ScriptedBackend::uniform(Script::Succeed));
		let resolver = FallbackResolver::new(backend.clone());
		let options = HelperOptions::builder()
			.tenant_id("tenant")
			.client_id("client")
			.client_secret("secret")
			.client_cert_path("/tmp/cert.pem")
			.build();
		let resolved =
			resolver.resolve(&options, deadline()).await.expect("Certificate should resolve.");

		assert_eq!(resolved.strategy, StrategyKind::ClientCertificate);
		assert_eq!(backend.calls(StrategyKind::ClientCertificate), 1);
		assert_eq!(backend.calls(StrategyKind::ClientSecret), 0);
		assert_eq!(backend.total_calls(), 1);
	}

	#[tokio::test]
	async fn failing_strategies_fall_through_in_order() {
		let backend = Arc::new(
			ScriptedBackend::uniform(Script::FailConstruction)
				.with(StrategyKind::ClientSecret, Script::FailValidation)
				.with(StrategyKind::FederatedToken, Script::Succeed),
		);
		let resolver = FallbackResolver::new(backend.clone());
		let options = HelperOptions::builder()
			.tenant_id("tenant")
			.client_id("client")
			.client_secret("invalid")
			.federated_token_url("https://token.actions.test")
			.federated_token("bearer")
			.build();
		let resolved =
			resolver.resolve(&options, deadline()).await.expect("Federated token should resolve.");

		assert_eq!(resolved.strategy, StrategyKind::FederatedToken);
		assert_eq!(backend.calls(StrategyKind::ClientCertificate), 0);
		assert_eq!(backend.calls(StrategyKind::ClientSecret), 1);
		assert_eq!(backend.calls(StrategyKind::ManagedIdentity), 1);
		assert_eq!(backend.calls(StrategyKind::FederatedToken), 1);
		assert_eq!(backend.calls(StrategyKind::AzureCli), 0);
	}

	#[tokio::test]
	async fn exhaustion_hides_strategy_details() {
		let backend = Arc::new(ScriptedBackend::uniform(Script::FailValidation));
		let resolver = FallbackResolver::new(backend.clone());
		let options = HelperOptions::builder()
			.tenant_id("tenant")
			.client_id("client")
			.client_secret("do-not-leak")
			.build();
		let err = resolver
			.resolve(&options, deadline())
			.await
			.expect_err("Every strategy failing should exhaust resolution.");

		assert!(matches!(err, Error::ResolutionExhausted));
		assert!(!err.to_string().contains("do-not-leak"));
		assert!(!err.to_string().contains("client_secret"));
		assert_eq!(backend.total_calls(), 3);
	}

	#[tokio::test]
	async fn hung_strategy_surfaces_deadline() {
		let backend = Arc::new(ScriptedBackend::uniform(Script::Hang));
		let resolver = FallbackResolver::new(backend.clone());
		let err = resolver
			.resolve(&HelperOptions::default(), Deadline::after(StdDuration::from_millis(20)))
			.await
			.expect_err("A hung probe should run into the deadline.");

		assert!(matches!(err, Error::DeadlineExceeded { stage: "resolve" }));
		assert_eq!(backend.calls(StrategyKind::ManagedIdentity), 1);
		assert_eq!(backend.calls(StrategyKind::AzureCli), 0);
	}

	#[tokio::test]
	async fn strategy_timeout_falls_through_to_the_next_strategy() {
		let backend = Arc::new(
			ScriptedBackend::uniform(Script::Succeed)
				.with(StrategyKind::ManagedIdentity, Script::TimeOutValidation),
		);
		let resolver = FallbackResolver::new(backend.clone());
		let resolved = resolver
			.resolve(&HelperOptions::default(), deadline())
			.await
			.expect("A strategy-local timeout should not end resolution.");

		assert_eq!(resolved.strategy, StrategyKind::AzureCli);
		assert_eq!(backend.calls(StrategyKind::ManagedIdentity), 1);
		assert_eq!(backend.calls(StrategyKind::AzureCli), 1);
	}

	#[tokio::test]
	async fn elapsed_deadline_fails_before_probing() {
		let backend = Arc::new(ScriptedBackend::uniform(Script::Succeed));
		let resolver = FallbackResolver::new(backend.clone());
		let err = resolver
			.resolve(&HelperOptions::default(), Deadline::after(StdDuration::ZERO))
			.await
			.expect_err("An elapsed deadline should fail fast.");

		assert!(err.is_deadline());
		assert_eq!(backend.total_calls(), 0);
	}
}
