//! Per-subject call history and block computation.

// self
use crate::_prelude::*;

// Upper bound on the window a single ceiling may demand (one year).
const MAX_REQUIRED_SECS: f64 = 31_536_000.0;

/// Bounded call history for one subject.
#[derive(Clone, Debug)]
pub(crate) struct RateRecord {
	history: VecDeque<OffsetDateTime>,
	last_seen: OffsetDateTime,
	blocked_until: Option<OffsetDateTime>,
}
impl RateRecord {
	pub(crate) fn new(capacity: usize, now: OffsetDateTime) -> Self {
		Self { history: VecDeque::with_capacity(capacity), last_seen: now, blocked_until: None }
	}

	/// Records a call at `now` and returns the block in effect afterwards.
	///
	/// Once `capacity` calls are on record, the oldest one is evicted and the time elapsed since
	/// it is compared with the `capacity / ceiling` seconds that many calls need at the ceiling.
	/// A shortfall blocks the subject until `last_seen` plus that shortfall.
	pub(crate) fn record(
		&mut self,
		now: OffsetDateTime,
		ceiling: Option<f32>,
		capacity: usize,
	) -> Option<OffsetDateTime> {
		let oldest =
			if self.history.len() >= capacity { self.history.pop_front() } else { None };

		if let Some(oldest) = oldest {
			self.blocked_until = required_window(ceiling, capacity).and_then(|required| {
				let elapsed = now - oldest;

				(elapsed < required).then(|| self.last_seen.saturating_add(required - elapsed))
			});
		}

		self.history.push_back(now);
		self.last_seen = now;

		self.blocked_until
	}

	/// Returns `true` once the record went quiet for longer than `interval` with no active block.
	///
	/// A cutoff before the earliest representable instant leaves the record in place.
	pub(crate) fn is_evictable(&self, now: OffsetDateTime, interval: Duration) -> bool {
		now.checked_sub(interval).is_some_and(|cutoff| self.last_seen < cutoff)
			&& self.blocked_until.is_none_or(|until| until < now)
	}

	pub(crate) fn blocked_until(&self) -> Option<OffsetDateTime> {
		self.blocked_until
	}

	pub(crate) fn history_len(&self) -> usize {
		self.history.len()
	}
}

/// Minimum time `capacity` calls must span to stay within `ceiling` calls per second.
///
/// Absent, non-positive, and non-finite ceilings impose no limit.
fn required_window(ceiling: Option<f32>, capacity: usize) -> Option<Duration> {
	let ceiling = f64::from(ceiling.filter(|c| c.is_finite() && *c > 0.0)?);
	let secs = (capacity as f64 / ceiling).min(MAX_REQUIRED_SECS);

	Some(Duration::seconds_f64(secs))
}

#[cfg(test)]
mod tests {
	// crates.io
	use time::macros;
	// self
	use super::*;

	const CAPACITY: usize = 3;

	fn at_millis(millis: i64) -> OffsetDateTime {
		macros::datetime!(2025-01-01 00:00 UTC) + Duration::milliseconds(millis)
	}

	#[test]
	fn history_never_exceeds_capacity() {
		let mut record = RateRecord::new(CAPACITY, at_millis(0));

		for i in 0..10 {
			record.record(at_millis(i * 1_000), Some(1.0), CAPACITY);

			assert!(record.history_len() <= CAPACITY);
		}

		assert_eq!(record.history_len(), CAPACITY);
	}

	#[test]
	fn block_starts_once_history_is_full() {
		let mut record = RateRecord::new(CAPACITY, at_millis(0));

		assert_eq!(record.record(at_millis(0), Some(1.0), CAPACITY), None);
		assert_eq!(record.record(at_millis(100), Some(1.0), CAPACITY), None);
		assert_eq!(record.record(at_millis(200), Some(1.0), CAPACITY), None);
		// Oldest call at 0ms, 300ms elapsed, 3s required: blocked until 200ms + 2.7s.
		assert_eq!(record.record(at_millis(300), Some(1.0), CAPACITY), Some(at_millis(2_900)));
	}

	#[test]
	fn compliant_spacing_clears_the_block() {
		let mut record = RateRecord::new(CAPACITY, at_millis(0));

		for millis in [0, 100, 200, 300] {
			record.record(at_millis(millis), Some(1.0), CAPACITY);
		}

		assert!(record.blocked_until().is_some());
		// Oldest remaining call at 100ms, 3.1s elapsed.
		assert_eq!(record.record(at_millis(3_200), Some(1.0), CAPACITY), None);
		assert_eq!(record.blocked_until(), None);
	}

	#[test]
	fn missing_or_non_positive_ceiling_never_blocks() {
		for ceiling in [None, Some(0.0), Some(-5.0), Some(f32::NAN), Some(f32::INFINITY)] {
			let mut record = RateRecord::new(CAPACITY, at_millis(0));

			for millis in 0..20 {
				assert_eq!(record.record(at_millis(millis), ceiling, CAPACITY), None);
			}
		}
	}

	#[test]
	fn tiny_ceiling_saturates_instead_of_overflowing() {
		let mut record = RateRecord::new(CAPACITY, at_millis(0));

		for millis in 0..4 {
			record.record(at_millis(millis), Some(f32::MIN_POSITIVE), CAPACITY);
		}

		assert!(record.blocked_until().is_some_and(|until| until > at_millis(3)));
	}

	#[test]
	fn eviction_requires_quiet_period_and_no_active_block() {
		let mut record = RateRecord::new(CAPACITY, at_millis(0));

		for millis in [0, 1, 2, 3] {
			record.record(at_millis(millis), Some(0.001), CAPACITY);
		}

		let interval = Duration::seconds(5);
		let until =
			record.blocked_until().expect("Record should be blocked for roughly fifty minutes.");

		assert!(!record.is_evictable(at_millis(1_000), interval));
		assert!(!record.is_evictable(at_millis(10_000), interval), "Active block must survive.");
		assert!(record.is_evictable(until + Duration::seconds(1), interval));
	}

	#[test]
	fn unrepresentable_cutoff_keeps_the_record() {
		let record = RateRecord::new(CAPACITY, at_millis(0));

		assert!(!record.is_evictable(at_millis(10_000), Duration::MAX));
		assert!(!record.is_evictable(at_millis(10_000), Duration::seconds(i64::MAX / 2)));
	}
}
