//! Collection housekeeping done at the start of each selection pass.
//! All of it runs with the jobs lock held.

use std::time::{Duration, SystemTime};

use crate::job::{saturating_add, ScrubJobRef};

use super::Jobs;

impl Jobs {
    /// Return penalized jobs to `active`: all of them if `forgive_all`,
    /// otherwise those that were updated or whose penalty timed out.
    pub(super) fn scan_penalized(&mut self, forgive_all: bool, now: SystemTime) {
        if self.penalized.is_empty() {
            return;
        }

        if forgive_all {
            tracing::info!(count = self.penalized.len(), "pardoning all penalized scrub jobs");
            self.active.append(&mut self.penalized);
            return;
        }

        let (pardoned, still_penalized): (Vec<_>, Vec<_>) =
            self.penalized.drain(..).partition(|job| {
                job.is_updated() || job.penalty_timeout().map_or(true, |t| t <= now)
            });
        if !pardoned.is_empty() {
            tracing::debug!(
                pardoned = pardoned.len(),
                remaining = still_penalized.len(),
                "penalized jobs reinstated"
            );
        }
        self.penalized = still_penalized;
        self.active.extend(pardoned);
    }

    pub(super) fn clear_updated_flags(&self) {
        for job in &self.active {
            job.clear_updated();
        }
    }

    /// Park jobs whose owner reported a replica reservation failure.
    pub(super) fn move_failed(&mut self, now: SystemTime, penalty: Duration) {
        let (failed, ok): (Vec<_>, Vec<_>) = self
            .active
            .drain(..)
            .partition(|job| job.resources_failure());
        self.active = ok;
        if failed.is_empty() {
            return;
        }

        let until = saturating_add(now, penalty);
        for job in &failed {
            job.set_penalty_timeout(until);
            job.clear_resources_failure();
            // Otherwise it would be pardoned on the very next pass.
            job.clear_updated();
            tracing::info!(shard = %job.shard(), ?until, "scrub job penalized");
        }
        self.penalized.extend(failed);
    }

    /// Drop removed jobs and jobs of shards going away from both collections.
    ///
    /// # Panics
    /// If a queued job is not flagged as queued: only lock holders change
    /// membership, so the flag and the collections must agree here.
    pub(super) fn purge_dead(&mut self) {
        fn sweep(group: &mut Vec<ScrubJobRef>) -> usize {
            let before = group.len();
            group.retain(|job| {
                assert!(
                    job.in_queues(),
                    "shard {} in a scrub queue but not flagged as queued",
                    job.shard()
                );
                if job.is_dead() && job.retire() {
                    job.set_in_queues(false);
                    tracing::debug!(shard = %job.shard(), "purged from scrub queue");
                    false
                } else {
                    true
                }
            });
            before - group.len()
        }

        let purged = sweep(&mut self.active) + sweep(&mut self.penalized);
        if purged > 0 {
            tracing::debug!(purged, "dead scrub jobs purged");
        }
    }

    /// Ripe jobs of `group`, earliest first; jobs being removed sort last.
    pub(super) fn ripe(group: &[ScrubJobRef], now: SystemTime) -> Vec<ScrubJobRef> {
        let mut ripe: Vec<ScrubJobRef> = group
            .iter()
            .filter(|job| job.is_ripe(now))
            .cloned()
            .collect();
        ripe.sort_by_cached_key(|job| (job.is_pending_removal(), job.scheduled_at()));
        ripe
    }
}
