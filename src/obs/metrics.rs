// self
use crate::{
	obs::{Stage, StageOutcome},
	strategy::StrategyKind,
};

/// Records a stage outcome via the global metrics recorder (when enabled).
pub fn record_stage_outcome(stage: Stage, outcome: StageOutcome) {
	#[cfg(feature = "metrics")]
	{
		metrics::counter!(
			"acr_credential_helper_stage_total",
			"stage" => stage.as_str(),
			"outcome" => outcome.as_str()
		)
		.increment(1);
	}

	#[cfg(not(feature = "metrics"))]
	{
		let _ = (stage, outcome);
	}
}

/// Records a per-strategy probe outcome (`usable` or an unusable reason label).
pub fn record_probe_outcome(kind: StrategyKind, outcome: &'static str) {
	#[cfg(feature = "metrics")]
	{
		metrics::counter!(
			"acr_credential_helper_probe_total",
			"strategy" => kind.as_str(),
			"outcome" => outcome
		)
		.increment(1);
	}

	#[cfg(not(feature = "metrics"))]
	{
		let _ = (kind, outcome);
	}
}
