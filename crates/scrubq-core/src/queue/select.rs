//! Selecting the next shard to scrub.

use std::time::SystemTime;

use crate::attempt::{AttemptOutcome, ScrubInitiator, ScrubPreconds};
use crate::job::ScrubJobRef;

use super::{Jobs, ScrubQueue};

impl ScrubQueue {
    /// Called periodically: pick the first eligible job and try to scrub it.
    ///
    /// Fills in the time/load fields of `preconds`. Ripe jobs are copied out
    /// under the jobs lock and tried after it is released, earliest target
    /// first; penalized jobs are tried only when no regular job could start.
    /// Doing so arms a full pardon of the penalized jobs on the next call.
    pub fn select_and_start(
        &self,
        initiator: &dyn ScrubInitiator,
        preconds: &mut ScrubPreconds,
    ) -> AttemptOutcome {
        let now = self.gate.env().now();
        preconds.time_permit = self.gate.time_permit(now);
        preconds.load_is_low = self.gate.load_below_threshold();
        preconds.only_deadlined = !preconds.time_permit || !preconds.load_is_low;

        let (ripe_active, ripe_penalized) = {
            let mut jobs = self.lock_jobs();
            tracing::debug!(
                active = jobs.active.len(),
                penalized = jobs.penalized.len(),
                "selecting a job to scrub"
            );

            let forgive_all = std::mem::take(&mut jobs.restore_penalized);
            jobs.scan_penalized(forgive_all, now);
            jobs.clear_updated_flags();
            jobs.move_failed(now, self.penalty_period);
            jobs.purge_dead();

            (
                Jobs::ripe(&jobs.active, now),
                Jobs::ripe(&jobs.penalized, now),
            )
        };

        let mut outcome = self.select_from(&ripe_active, initiator, preconds, now);

        if outcome == AttemptOutcome::NoneReady && !ripe_penalized.is_empty() {
            outcome = self.select_from(&ripe_penalized, initiator, preconds, now);
            tracing::debug!(?outcome, "tried the penalized jobs");
            self.lock_jobs().restore_penalized = true;
        }

        tracing::trace!(?outcome, "selection pass done");
        outcome
    }

    fn select_from(
        &self,
        candidates: &[ScrubJobRef],
        initiator: &dyn ScrubInitiator,
        preconds: &ScrubPreconds,
        now: SystemTime,
    ) -> AttemptOutcome {
        for candidate in candidates {
            let shard = candidate.shard();

            if preconds.only_deadlined && !candidate.deadline_passed(now) {
                let reason = if preconds.time_permit {
                    "high load"
                } else {
                    "time not permitting"
                };
                tracing::debug!(%shard, reason, "not scheduling scrub");
                continue;
            }

            tracing::trace!(%shard, "trying to initiate scrub");
            match initiator.initiate_scrub(shard, preconds.allow_requested_repair_only) {
                AttemptOutcome::Started => {
                    tracing::debug!(%shard, "scrub initiated");
                    return AttemptOutcome::Started;
                }
                outcome @ (AttemptOutcome::AlreadyRunning
                | AttemptOutcome::PreconditionsNotMet
                | AttemptOutcome::BadShardState
                | AttemptOutcome::ShardNotFound) => {
                    tracing::trace!(%shard, ?outcome, "not started; trying next");
                }
                AttemptOutcome::LocalResourceShortage => {
                    // Node-wide: no other shard will fare better.
                    tracing::debug!(%shard, "no local scrub resources");
                    return AttemptOutcome::LocalResourceShortage;
                }
                AttemptOutcome::NoneReady => {
                    tracing::warn!(%shard, "initiator returned none-ready");
                    return AttemptOutcome::NoneReady;
                }
            }
        }
        AttemptOutcome::NoneReady
    }
}
