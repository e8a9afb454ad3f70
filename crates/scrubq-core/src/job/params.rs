//! Scheduling parameters and target-time computation.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use rand::Rng;

use crate::config::{secs, ScrubConfig};

/// "Beginning of time": the stamp used for explicitly requested scrubs, so
/// they are ripe immediately and their deadline has already passed.
pub const MUST_SCRUB_STAMP: SystemTime = UNIX_EPOCH;

/// Used for target times past what the clock can represent (about 31,700
/// years after the epoch): never ripe in practice.
fn end_of_time() -> SystemTime {
    UNIX_EPOCH + Duration::from_secs(1_000_000_000_000)
}

/// `at + by`, saturating at [`end_of_time`] instead of overflowing the clock.
pub(crate) fn saturating_add(at: SystemTime, by: Duration) -> SystemTime {
    at.checked_add(by).unwrap_or_else(end_of_time)
}

/// Whether the scrub was explicitly requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MustScrub {
    #[default]
    NotMandatory,
    Mandatory,
}

/// What the shard owner suggests when (re)registering its job.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SchedParams {
    /// Base time, typically the last scrub stamp.
    pub suggested_stamp: SystemTime,
    /// Per-shard minimum interval (seconds); `None` or <= 0 uses the configured default.
    pub min_interval: Option<f64>,
    /// Per-shard maximum interval (seconds); `None` or <= 0 uses the configured default.
    pub max_interval: Option<f64>,
    pub must: MustScrub,
}

impl SchedParams {
    /// A periodic scrub based on `stamp`, with configured intervals.
    pub fn periodic(stamp: SystemTime) -> Self {
        Self {
            suggested_stamp: stamp,
            min_interval: None,
            max_interval: None,
            must: MustScrub::NotMandatory,
        }
    }

    /// An explicitly requested scrub at `stamp`.
    pub fn mandatory(stamp: SystemTime) -> Self {
        Self {
            must: MustScrub::Mandatory,
            ..Self::periodic(stamp)
        }
    }

    /// An explicitly requested scrub that is eligible right away.
    pub fn must_scrub() -> Self {
        Self::mandatory(MUST_SCRUB_STAMP)
    }

    pub fn with_intervals(mut self, min_interval: Option<f64>, max_interval: Option<f64>) -> Self {
        self.min_interval = min_interval;
        self.max_interval = max_interval;
        self
    }

    pub fn is_mandatory(&self) -> bool {
        self.must == MustScrub::Mandatory
    }
}

/// Computed schedule for a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TargetTimes {
    pub scheduled_at: SystemTime,
    /// `None` = no hard deadline.
    pub deadline: Option<SystemTime>,
}

/// Node-wide interval defaults and jitter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IntervalPolicy {
    pub min_interval: f64,
    pub max_interval: f64,
    pub randomize_ratio: f64,
}

impl IntervalPolicy {
    pub fn from_config(cfg: &ScrubConfig) -> Self {
        Self {
            min_interval: cfg.min_interval_secs,
            max_interval: cfg.max_interval_secs,
            randomize_ratio: cfg.interval_randomize_ratio,
        }
    }

    /// Target times with a fresh uniform draw for the jitter.
    pub fn target_times(&self, params: &SchedParams) -> TargetTimes {
        let r: f64 = rand::thread_rng().gen();
        self.target_times_with(params, r)
    }

    /// Target times for a given jitter draw `r` in `[0, 1)`.
    ///
    /// Mandatory scrubs use the suggested stamp for both. Periodic scrubs are
    /// pushed out by `min + min * ratio * r` so that shards whose stats change
    /// together don't all become ripe together; the deadline is
    /// `stamp + max` when `max > 0`. A scheduled time past the end of the
    /// clock saturates; such a deadline is dropped.
    pub fn target_times_with(&self, params: &SchedParams, r: f64) -> TargetTimes {
        let stamp = params.suggested_stamp;
        if params.is_mandatory() {
            return TargetTimes {
                scheduled_at: stamp,
                deadline: Some(stamp),
            };
        }

        let min = params
            .min_interval
            .filter(|v| *v > 0.0)
            .unwrap_or(self.min_interval);
        let max = params
            .max_interval
            .filter(|v| *v > 0.0)
            .unwrap_or(self.max_interval);

        let delay = secs(min).saturating_add(secs(min * self.randomize_ratio * r));
        let scheduled_at = saturating_add(stamp, delay);
        let deadline = if max > 0.0 {
            stamp.checked_add(secs(max))
        } else {
            None
        };
        TargetTimes {
            scheduled_at,
            deadline,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn policy() -> IntervalPolicy {
        IntervalPolicy {
            min_interval: 100.0,
            max_interval: 1_000.0,
            randomize_ratio: 0.5,
        }
    }

    fn base() -> SystemTime {
        UNIX_EPOCH + Duration::from_secs(1_700_000_000)
    }

    #[test]
    fn mandatory_uses_stamp_for_both() {
        let t = policy().target_times(&SchedParams::mandatory(base()));
        assert_eq!(t.scheduled_at, base());
        assert_eq!(t.deadline, Some(base()));

        let t = policy().target_times(&SchedParams::must_scrub());
        assert_eq!(t.scheduled_at, MUST_SCRUB_STAMP);
    }

    #[test]
    fn jitter_stays_within_bounds() {
        let params = SchedParams::periodic(base()).with_intervals(Some(60.0), Some(600.0));
        let low = base() + Duration::from_secs(60);
        let high = base() + Duration::from_secs(90);
        for _ in 0..500 {
            let t = policy().target_times(&params);
            assert!(t.scheduled_at >= low && t.scheduled_at <= high);
            assert_eq!(t.deadline, Some(base() + Duration::from_secs(600)));
        }
        assert_eq!(policy().target_times_with(&params, 0.0).scheduled_at, low);
        assert_eq!(policy().target_times_with(&params, 1.0).scheduled_at, high);
    }

    #[test]
    fn unset_intervals_fall_back_to_policy() {
        let params = SchedParams::periodic(base()).with_intervals(None, Some(-5.0));
        let t = policy().target_times_with(&params, 0.0);
        assert_eq!(t.scheduled_at, base() + Duration::from_secs(100));
        assert_eq!(t.deadline, Some(base() + Duration::from_secs(1_000)));
    }

    #[test]
    fn huge_intervals_saturate_instead_of_overflowing() {
        let params = SchedParams::periodic(base()).with_intervals(Some(1e20), Some(1e19));
        let t = policy().target_times_with(&params, 0.9);
        assert_eq!(t.deadline, None);
        assert!(t.scheduled_at > base() + Duration::from_secs(1_000 * 365 * 86_400));

        let params = SchedParams::periodic(base()).with_intervals(None, Some(1e19));
        let t = policy().target_times(&params);
        assert_eq!(t.deadline, None);
        assert!(t.scheduled_at >= base() + Duration::from_secs(100));
        assert!(t.scheduled_at <= base() + Duration::from_secs(150));
    }

    #[test]
    fn no_deadline_when_max_not_positive() {
        let p = IntervalPolicy {
            max_interval: 0.0,
            ..policy()
        };
        let t = p.target_times_with(&SchedParams::periodic(base()), 0.3);
        assert_eq!(t.deadline, None);
    }
}
