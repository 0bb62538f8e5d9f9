//! Optional observability helpers for helper stages.
//!
//! # Feature Flags
//!
//! - Enable `tracing` to emit structured spans named `acr_credential_helper.stage` with the
//!   `stage` and `strategy` fields, plus `debug` events for every probe outcome.
//! - Enable `metrics` to increment `acr_credential_helper_stage_total` (labeled by `stage` +
//!   `outcome`) and `acr_credential_helper_probe_total` (labeled by `strategy` + `outcome`).

mod metrics;
mod tracing;

pub use metrics::*;
pub use tracing::*;

// self
use crate::_prelude::*;

/// Stages observed by the helper.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Stage {
	/// Construction-time (eager) authorizer resolution.
	Construct,
	/// Walking the ordered strategy list.
	Resolve,
	/// Constructing and validating one strategy.
	Probe,
	/// Exchanging the identity token for registry credentials.
	Exchange,
}
impl Stage {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			Stage::Construct => "construct",
			Stage::Resolve => "resolve",
			Stage::Probe => "probe",
			Stage::Exchange => "exchange",
		}
	}
}
impl Display for Stage {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Outcome labels recorded for each stage.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StageOutcome {
	/// Entry to a stage.
	Attempt,
	/// Successful completion.
	Success,
	/// Failure propagated back to the caller.
	Failure,
}
impl StageOutcome {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			StageOutcome::Attempt => "attempt",
			StageOutcome::Success => "success",
			StageOutcome::Failure => "failure",
		}
	}
}
impl Display for StageOutcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
