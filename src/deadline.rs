//! Operation deadlines propagated through every network-touching step.
//!
//! A [`Deadline`] is created once per externally visible operation and handed by value to
//! each stage. Stages wrap their futures with [`Deadline::run`], which drops (and therefore
//! cancels) the in-flight work when the instant passes and reports
//! [`Error::DeadlineExceeded`].

// crates.io
use tokio::time::{self, Instant};
// self
use crate::_prelude::*;

/// Absolute instant after which in-flight work is abandoned.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct Deadline(Instant);
impl Deadline {
	/// Deadline `timeout` from now.
	pub fn after(timeout: StdDuration) -> Self {
		Self(Instant::now() + timeout)
	}

	/// Deadline at an absolute instant.
	pub fn at(instant: Instant) -> Self {
		Self(instant)
	}

	/// Underlying instant.
	pub fn instant(self) -> Instant {
		self.0
	}

	/// The earlier of this deadline and `timeout` from now.
	pub fn capped(self, timeout: StdDuration) -> Self {
		self.min(Self::after(timeout))
	}

	/// Time left before the deadline (zero once elapsed).
	pub fn remaining(self) -> StdDuration {
		self.0.saturating_duration_since(Instant::now())
	}

	/// Returns `true` once the deadline has passed.
	pub fn is_elapsed(self) -> bool {
		Instant::now() >= self.0
	}

	/// Fails fast with [`Error::DeadlineExceeded`] when the deadline already passed.
	pub fn check(self, stage: &'static str) -> Result<()> {
		if self.is_elapsed() { Err(Error::DeadlineExceeded { stage }) } else { Ok(()) }
	}

	/// Drives `fut` to completion unless the deadline passes first.
	pub async fn run<T, Fut>(self, stage: &'static str, fut: Fut) -> Result<T>
	where
		Fut: Future<Output = Result<T>>,
	{
		match time::timeout_at(self.0, fut).await {
			Ok(result) => result,
			Err(_) => Err(Error::DeadlineExceeded { stage }),
		}
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[tokio::test]
	async fn run_cancels_pending_work() {
		let deadline = Deadline::after(StdDuration::from_millis(20));
		let err = deadline
			.run("probe", std::future::pending::<Result<()>>())
			.await
			.expect_err("Pending work should be cut off by the deadline.");

		assert!(matches!(err, Error::DeadlineExceeded { stage: "probe" }));
		assert!(deadline.is_elapsed());
	}

	#[tokio::test]
	async fn run_passes_through_results() {
		let deadline = Deadline::after(StdDuration::from_secs(5));
		let value = deadline.run("exchange", async { Ok(7) }).await.expect("Work should finish.");

		assert_eq!(value, 7);
		assert!(deadline.remaining() > StdDuration::ZERO);
		assert!(deadline.check("exchange").is_ok());
	}

	#[test]
	fn capped_never_extends_the_deadline() {
		let outer = Deadline::after(StdDuration::from_secs(5));

		assert!(outer.capped(StdDuration::from_millis(10)) < outer);
		assert_eq!(outer.capped(StdDuration::from_secs(60)), outer);
	}

	#[test]
	fn zero_timeout_is_immediately_elapsed() {
		let deadline = Deadline::after(StdDuration::ZERO);

		assert!(deadline.is_elapsed());
		assert!(matches!(deadline.check("resolve"), Err(Error::DeadlineExceeded { .. })));
	}
}
