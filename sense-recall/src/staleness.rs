// ---------------------------------------------------------------------------
// Staleness Policy
// ---------------------------------------------------------------------------
//
// Decides whether a retained index must be rebuilt before answering a
// query, from the record count and the time of the last build.
// ---------------------------------------------------------------------------

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

/// What the policy needs to know about the retained index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuildStamp {
	pub count: u64,
	pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StalenessPolicy {
	/// New records only trigger a rebuild once this many seconds have
	/// passed since the last one.
	pub debounce_secs: u64,
	/// Rebuild unconditionally once the index is older than this.
	pub force_after_secs: Option<u64>,
}

impl StalenessPolicy {
	/// Conversation index: 30 s debounce, 5 min hard ceiling.
	pub const fn context() -> Self {
		Self {
			debounce_secs: 30,
			force_after_secs: Some(300),
		}
	}

	/// Response index: 60 s debounce, no ceiling.
	pub const fn response() -> Self {
		Self {
			debounce_secs: 60,
			force_after_secs: None,
		}
	}

	/// `None` for `built` means no index exists yet.
	pub fn should_rebuild(&self, built: Option<BuildStamp>, current_count: u64, now: DateTime<Utc>) -> bool {
		let Some(built) = built else {
			return true;
		};
		// A clock that moved backwards counts as no time elapsed.
		let elapsed = (now - built.at).max(TimeDelta::zero());

		if current_count > built.count && elapsed > secs(self.debounce_secs) {
			return true;
		}
		match self.force_after_secs {
			Some(force) => elapsed > secs(force),
			None => false,
		}
	}
}

impl Default for StalenessPolicy {
	fn default() -> Self {
		Self::context()
	}
}

fn secs(s: u64) -> TimeDelta {
	i64::try_from(s)
		.ok()
		.and_then(TimeDelta::try_seconds)
		.unwrap_or(TimeDelta::MAX)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
	use super::*;

	fn stamp(count: u64, at: DateTime<Utc>) -> Option<BuildStamp> {
		Some(BuildStamp { count, at })
	}

	#[test]
	fn rebuilds_when_no_index() {
		let now = Utc::now();
		assert!(StalenessPolicy::context().should_rebuild(None, 0, now));
		assert!(StalenessPolicy::response().should_rebuild(None, 0, now));
	}

	#[test]
	fn no_new_data_never_rebuilds_without_ceiling() {
		let t0 = Utc::now();
		let policy = StalenessPolicy::response();
		for elapsed in [0, 10, 61, 3_600, 86_400 * 30] {
			assert!(!policy.should_rebuild(stamp(10, t0), 10, t0 + TimeDelta::seconds(elapsed)));
		}
	}

	#[test]
	fn no_new_data_within_ceiling_does_not_rebuild() {
		let t0 = Utc::now();
		let policy = StalenessPolicy::context();
		for elapsed in [0, 31, 299, 300] {
			assert!(!policy.should_rebuild(stamp(10, t0), 10, t0 + TimeDelta::seconds(elapsed)));
		}
	}

	#[test]
	fn new_data_inside_debounce_waits() {
		let t0 = Utc::now();
		assert!(!StalenessPolicy::context().should_rebuild(stamp(10, t0), 11, t0 + TimeDelta::seconds(29)));
		assert!(!StalenessPolicy::response().should_rebuild(stamp(10, t0), 11, t0 + TimeDelta::seconds(59)));
	}

	#[test]
	fn new_data_after_debounce_rebuilds() {
		let t0 = Utc::now();
		assert!(StalenessPolicy::context().should_rebuild(stamp(10, t0), 11, t0 + TimeDelta::seconds(31)));
		assert!(StalenessPolicy::response().should_rebuild(stamp(10, t0), 11, t0 + TimeDelta::seconds(61)));
	}

	#[test]
	fn debounce_boundary_is_exclusive() {
		let t0 = Utc::now();
		let policy = StalenessPolicy::context();
		assert!(!policy.should_rebuild(stamp(10, t0), 11, t0 + TimeDelta::seconds(30)));
	}

	#[test]
	fn ceiling_forces_rebuild_without_new_data() {
		let t0 = Utc::now();
		let policy = StalenessPolicy::context();
		assert!(policy.should_rebuild(stamp(10, t0), 10, t0 + TimeDelta::seconds(301)));
	}

	#[test]
	fn shrinking_count_is_not_new_data() {
		let t0 = Utc::now();
		let policy = StalenessPolicy::response();
		assert!(!policy.should_rebuild(stamp(10, t0), 4, t0 + TimeDelta::seconds(600)));
	}

	#[test]
	fn clock_going_backwards_counts_as_zero_elapsed() {
		let t0 = Utc::now();
		let policy = StalenessPolicy::context();
		assert!(!policy.should_rebuild(stamp(10, t0), 11, t0 - TimeDelta::seconds(500)));
	}

	#[test]
	fn deserializes_partial_config() {
		let policy: StalenessPolicy = serde_json::from_str(r#"{"debounce_secs": 5}"#).unwrap();
		assert_eq!(policy.debounce_secs, 5);
		assert_eq!(policy.force_after_secs, Some(300));
	}
}
