// self
use crate::{_prelude::*, obs::Stage, strategy::StrategyKind};

/// Type alias that resolves to an instrumented future when tracing is enabled.
#[cfg(feature = "tracing")]
pub type InstrumentedStage<F> = tracing::instrument::Instrumented<F>;
/// Passthrough future type when tracing is disabled.
#[cfg(not(feature = "tracing"))]
pub type InstrumentedStage<F> = F;

/// A span builder used by helper stages.
#[derive(Clone, Debug)]
pub struct StageSpan {
	#[cfg(feature = "tracing")]
	span: tracing::Span,
}
impl StageSpan {
	/// Creates a new span tagged with the provided stage.
	pub fn new(stage: Stage) -> Self {
		#[cfg(feature = "tracing")]
		{
			let span = tracing::info_span!(
				"acr_credential_helper.stage",
				stage = stage.as_str(),
				strategy = tracing::field::Empty
			);

			Self { span }
		}
		#[cfg(not(feature = "tracing"))]
		{
			let _ = stage;

			Self {}
		}
	}

	/// Creates a probe span tagged with the strategy under test.
	pub fn probe(kind: StrategyKind) -> Self {
		let span = Self::new(Stage::Probe);

		#[cfg(feature = "tracing")]
		span.span.record("strategy", kind.as_str());
		#[cfg(not(feature = "tracing"))]
		let _ = kind;

		span
	}

	/// Instruments an async block without holding a guard across `.await` points.
	pub fn instrument<Fut>(&self, fut: Fut) -> InstrumentedStage<Fut>
	where
		Fut: Future,
	{
		#[cfg(feature = "tracing")]
		{
			use tracing::Instrument;

			fut.instrument(self.span.clone())
		}
		#[cfg(not(feature = "tracing"))]
		{
			fut
		}
	}
}

/// Emits a `debug` event describing why a strategy was skipped or rejected.
///
/// Only the error's display text is logged; it never carries secret material.
pub fn log_unusable(kind: StrategyKind, reason: &dyn Display) {
	#[cfg(feature = "tracing")]
	tracing::debug!(strategy = kind.as_str(), %reason, "identity strategy unusable");
	#[cfg(not(feature = "tracing"))]
	let _ = (kind, reason);
}

/// Emits an `info` event naming the strategy that won resolution.
pub fn log_resolved(kind: StrategyKind) {
	#[cfg(feature = "tracing")]
	tracing::info!(strategy = kind.as_str(), "identity strategy resolved");
	#[cfg(not(feature = "tracing"))]
	let _ = kind;
}

/// Emits a `warn` event for failures that are swallowed rather than returned.
pub fn log_deferred(stage: Stage, error: &Error) {
	#[cfg(feature = "tracing")]
	tracing::warn!(stage = stage.as_str(), %error, "stage failed; deferring to first use");
	#[cfg(not(feature = "tracing"))]
	let _ = (stage, error);
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn probe_span_builds_without_subscriber() {
		let _span = StageSpan::probe(StrategyKind::ManagedIdentity);

		log_unusable(StrategyKind::ManagedIdentity, &"not applicable");
		log_resolved(StrategyKind::AzureCli);
	}

	#[tokio::test]
	async fn instrument_wraps_future() {
		let span = StageSpan::new(Stage::Exchange);
		let value = span.instrument(async { 42 }).await;

		assert_eq!(value, 42);
	}
}
