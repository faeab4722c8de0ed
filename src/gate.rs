//! Per-subject transaction-rate gate.
//!
//! Every subject gets a bounded history of its most recent call instants. Once the history is
//! full, each call evicts the oldest instant and compares the elapsed time with what the
//! subject's requests-per-second ceiling allows for that many calls. Falling short blocks the
//! subject for the difference. The gate only reports the block; callers decide whether to refuse.
//!
//! Records are created lazily and evicted by a periodic sweep once they have been quiet for a
//! full sweep interval and carry no active block.

mod record;
mod sweeper;

// self
use crate::{
	_prelude::*,
	auth::SubjectId,
	obs::{self, GateOp, OpOutcome},
};
use record::RateRecord;
use sweeper::Sweeper;

/// Errors raised while configuring a [`RateGate`].
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum RateGateError {
	/// Fewer samples than needed to measure a rate.
	#[error("At least {min} samples are required to measure a rate; got {sample_size}.")]
	InvalidSampleSize {
		/// Rejected sample size.
		sample_size: usize,
		/// Minimum accepted sample size.
		min: usize,
	},
	/// Sweep cycles outside the accepted range.
	#[error("Sweep interval must lie between {min} and {max}; got {interval}.")]
	InvalidSweepInterval {
		/// Rejected interval.
		interval: Duration,
		/// Minimum accepted interval.
		min: Duration,
		/// Maximum accepted interval.
		max: Duration,
	},
	/// The background sweeper needs a Tokio runtime to run on.
	#[error("Rate gate sweeper must be started from within a Tokio runtime.")]
	NoRuntime,
}

/// Validated rate gate settings.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GateSettings {
	sample_size: usize,
	sweep_interval: Duration,
}
impl GateSettings {
	/// Smallest history that yields a meaningful rate.
	pub const MIN_SAMPLE_SIZE: usize = 3;
	/// Shortest accepted sweep cycle.
	pub const MIN_SWEEP_INTERVAL: Duration = Duration::seconds(5);
	/// Longest accepted sweep cycle.
	pub const MAX_SWEEP_INTERVAL: Duration = Duration::days(366);

	/// Validates and builds settings.
	pub fn new(sample_size: usize, sweep_interval: Duration) -> Result<Self, RateGateError> {
		if sample_size < Self::MIN_SAMPLE_SIZE {
			return Err(RateGateError::InvalidSampleSize {
				sample_size,
				min: Self::MIN_SAMPLE_SIZE,
			});
		}
		if !(Self::MIN_SWEEP_INTERVAL..=Self::MAX_SWEEP_INTERVAL).contains(&sweep_interval) {
			return Err(RateGateError::InvalidSweepInterval {
				interval: sweep_interval,
				min: Self::MIN_SWEEP_INTERVAL,
				max: Self::MAX_SWEEP_INTERVAL,
			});
		}

		Ok(Self { sample_size, sweep_interval })
	}

	/// Number of call instants kept per subject.
	pub fn sample_size(&self) -> usize {
		self.sample_size
	}

	/// Cadence of the sweep and the quiet period after which records become evictable.
	pub fn sweep_interval(&self) -> Duration {
		self.sweep_interval
	}
}

/// Shared handle to a rate gate.
///
/// A default (disabled) gate admits everything and keeps no state. Clones share the same
/// records and sweeper.
#[derive(Clone, Debug, Default)]
pub struct RateGate {
	inner: Option<Arc<GateInner>>,
}
impl RateGate {
	/// Returns a pass-through gate that never blocks.
	pub fn disabled() -> Self {
		Self::default()
	}

	/// Validates the settings and starts the background sweeper on the current Tokio runtime.
	pub fn configure(sample_size: usize, sweep_interval: Duration) -> Result<Self, RateGateError> {
		let settings = GateSettings::new(sample_size, sweep_interval)?;
		let handle =
			tokio::runtime::Handle::try_current().map_err(|_| RateGateError::NoRuntime)?;
		let inner = Arc::new_cyclic(|weak| GateInner {
			settings,
			records: Default::default(),
			sweeper: AsyncMutex::new(Some(Sweeper::spawn(
				&handle,
				weak.clone(),
				settings.sweep_interval,
			))),
		});

		Ok(Self { inner: Some(inner) })
	}

	/// Builds an enabled gate without a background sweeper; call [`RateGate::sweep_at`] manually.
	pub fn new(settings: GateSettings) -> Self {
		let inner =
			GateInner { settings, records: Default::default(), sweeper: AsyncMutex::new(None) };

		Self { inner: Some(Arc::new(inner)) }
	}

	/// Returns `true` for gates built with settings.
	pub fn is_enabled(&self) -> bool {
		self.inner.is_some()
	}

	/// Settings in effect, if the gate is enabled.
	pub fn settings(&self) -> Option<GateSettings> {
		self.inner.as_ref().map(|inner| inner.settings)
	}

	/// Records a call for `subject` at the current UTC clock.
	///
	/// See [`RateGate::admit_at`].
	pub fn admit(&self, subject: SubjectId, ceiling: Option<f32>) -> Option<OffsetDateTime> {
		self.admit_at(subject, ceiling, OffsetDateTime::now_utc())
	}

	/// Records a call for `subject` at `now` and returns the instant before which the subject
	/// must be refused, if any.
	///
	/// The returned instant may already lie in the past; callers compare it with their own clock.
	/// A missing, non-positive, or non-finite `ceiling` never blocks. Disabled gates always
	/// return `None`.
	pub fn admit_at(
		&self,
		subject: SubjectId,
		ceiling: Option<f32>,
		now: OffsetDateTime,
	) -> Option<OffsetDateTime> {
		let inner = self.inner.as_ref()?;
		let blocked_until = inner.admit_at(subject, ceiling, now);
		let outcome = if blocked_until.is_some_and(|until| until > now) {
			OpOutcome::Rejected
		} else {
			OpOutcome::Success
		};

		obs::record_op(GateOp::Admit, outcome);

		blocked_until
	}

	/// Evicts quiet, unblocked records as of `now` and returns how many were removed.
	pub fn sweep_at(&self, now: OffsetDateTime) -> usize {
		self.inner.as_ref().map_or(0, |inner| inner.sweep_at(now))
	}

	/// Current block for `subject`, if it has a record.
	pub fn blocked_until(&self, subject: SubjectId) -> Option<OffsetDateTime> {
		self.inner.as_ref()?.records.read().get(&subject)?.lock().blocked_until()
	}

	/// Number of call instants on record for `subject`, or `None` when it has no record.
	pub fn history_len(&self, subject: SubjectId) -> Option<usize> {
		Some(self.inner.as_ref()?.records.read().get(&subject)?.lock().history_len())
	}

	/// Number of tracked subjects.
	pub fn len(&self) -> usize {
		self.inner.as_ref().map_or(0, |inner| inner.records.read().len())
	}

	/// Returns `true` when no subject is tracked.
	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	/// Stops the background sweeper, if any, and waits for it to exit.
	///
	/// The gate keeps admitting calls afterwards; only automatic eviction stops.
	pub async fn shutdown(&self) {
		let Some(inner) = self.inner.as_ref() else {
			return;
		};
		let sweeper = inner.sweeper.lock().await.take();

		if let Some(sweeper) = sweeper {
			sweeper.stop().await;
		}
	}

	/// Returns `true` while a background sweeper is attached.
	pub async fn is_sweeping(&self) -> bool {
		match self.inner.as_ref() {
			Some(inner) => inner.sweeper.lock().await.is_some(),
			None => false,
		}
	}
}

#[derive(Debug)]
pub(crate) struct GateInner {
	settings: GateSettings,
	records: RwLock<HashMap<SubjectId, Mutex<RateRecord>>>,
	sweeper: AsyncMutex<Option<Sweeper>>,
}
impl GateInner {
	fn admit_at(
		&self,
		subject: SubjectId,
		ceiling: Option<f32>,
		now: OffsetDateTime,
	) -> Option<OffsetDateTime> {
		let capacity = self.settings.sample_size;

		// Known subjects only need the shared map lock, so distinct subjects do not contend.
		{
			let records = self.records.read();

			if let Some(record) = records.get(&subject) {
				return record.lock().record(now, ceiling, capacity);
			}
		}

		let mut records = self.records.write();

		records
			.entry(subject)
			.or_insert_with(|| Mutex::new(RateRecord::new(capacity, now)))
			.get_mut()
			.record(now, ceiling, capacity)
	}

	pub(crate) fn sweep_at(&self, now: OffsetDateTime) -> usize {
		let interval = self.settings.sweep_interval;
		let mut records = self.records.write();
		let before = records.len();

		records.retain(|_, record| !record.get_mut().is_evictable(now, interval));

		let evicted = before - records.len();

		obs::record_op(GateOp::Sweep, OpOutcome::Success);
		obs::record_sweep_evictions(evicted);
		obs::trace_sweep(evicted, records.len());

		evicted
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use time::macros;
	// self
	use super::*;

	fn at_millis(millis: i64) -> OffsetDateTime {
		macros::datetime!(2025-01-01 00:00 UTC) + Duration::milliseconds(millis)
	}

	fn gate() -> RateGate {
		RateGate::new(
			GateSettings::new(3, Duration::seconds(5)).expect("Gate settings should be valid."),
		)
	}

	#[test]
	fn settings_enforce_minimums() {
		assert_eq!(
			GateSettings::new(2, Duration::seconds(5)),
			Err(RateGateError::InvalidSampleSize { sample_size: 2, min: 3 })
		);
		assert_eq!(
			GateSettings::new(3, Duration::seconds(4)),
			Err(RateGateError::InvalidSweepInterval {
				interval: Duration::seconds(4),
				min: Duration::seconds(5),
				max: Duration::days(366),
			})
		);
		assert!(matches!(
			GateSettings::new(3, Duration::seconds(i64::MAX / 2)),
			Err(RateGateError::InvalidSweepInterval { .. })
		));
		assert!(GateSettings::new(3, Duration::seconds(5)).is_ok());
		assert!(GateSettings::new(3, GateSettings::MAX_SWEEP_INTERVAL).is_ok());
	}

	#[test]
	fn configure_requires_a_runtime() {
		assert_eq!(
			RateGate::configure(3, Duration::seconds(5)).map(|_| ()),
			Err(RateGateError::NoRuntime)
		);
		assert_eq!(
			RateGate::configure(1, Duration::seconds(5)).map(|_| ()),
			Err(RateGateError::InvalidSampleSize { sample_size: 1, min: 3 })
		);
	}

	#[test]
	fn disabled_gate_is_a_pass_through() {
		let gate = RateGate::disabled();

		assert!(!gate.is_enabled());
		assert_eq!(gate.settings(), None);

		for millis in 0..10 {
			assert_eq!(gate.admit_at(SubjectId::new(1), Some(0.1), at_millis(millis)), None);
		}

		assert!(gate.is_empty());
		assert_eq!(gate.sweep_at(at_millis(0)), 0);
	}

	#[test]
	fn subjects_are_tracked_independently() {
		let gate = gate();
		let busy = SubjectId::new(1);
		let idle = SubjectId::new(2);

		for millis in 0..4 {
			gate.admit_at(busy, Some(1.0), at_millis(millis));
		}

		assert!(gate.blocked_until(busy).is_some());
		assert_eq!(gate.admit_at(idle, Some(1.0), at_millis(4)), None);
		assert_eq!(gate.history_len(idle), Some(1));
		assert_eq!(gate.len(), 2);
	}

	#[test]
	fn sweep_evicts_only_quiet_unblocked_records() {
		let gate = gate();
		let quiet = SubjectId::new(1);
		let blocked = SubjectId::new(2);
		let recent = SubjectId::new(3);

		gate.admit_at(quiet, None, at_millis(0));

		for millis in 0..4 {
			gate.admit_at(blocked, Some(0.01), at_millis(millis));
		}

		gate.admit_at(recent, None, at_millis(9_000));

		assert_eq!(gate.sweep_at(at_millis(10_000)), 1);
		assert_eq!(gate.history_len(quiet), None);
		assert!(gate.history_len(blocked).is_some());
		assert!(gate.history_len(recent).is_some());
	}

	#[tokio::test]
	async fn shutdown_detaches_the_sweeper() {
		let gate = RateGate::configure(3, Duration::seconds(5))
			.expect("Configuring inside a runtime should succeed.");

		assert!(gate.is_enabled());
		assert!(gate.is_sweeping().await);

		gate.shutdown().await;

		assert!(!gate.is_sweeping().await);
		assert_eq!(gate.admit(SubjectId::new(1), Some(1.0)), None);
	}
}
