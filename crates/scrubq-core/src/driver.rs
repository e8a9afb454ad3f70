//! The node's periodic scrub tick.

use serde::Serialize;

use crate::attempt::{AttemptOutcome, ScrubInitiator, ScrubPreconds};
use crate::queue::ScrubQueue;

/// What one tick did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "tick", rename_all = "snake_case")]
pub enum TickOutcome {
    /// All scrub slots are taken; selection skipped.
    NoSlots,
    /// Another shard is still negotiating replica reservations; selection skipped.
    ReservationInProgress,
    /// A selection pass ran.
    Attempted {
        outcome: AttemptOutcome,
        preconds: ScrubPreconds,
    },
}

impl TickOutcome {
    pub fn started(&self) -> bool {
        matches!(
            self,
            TickOutcome::Attempted {
                outcome: AttemptOutcome::Started,
                ..
            }
        )
    }
}

/// One scheduling tick: skip cheaply when no scrub could start, otherwise
/// run a selection pass.
pub fn run_tick(
    queue: &ScrubQueue,
    initiator: &dyn ScrubInitiator,
    allow_requested_repair_only: bool,
) -> TickOutcome {
    if !queue.resources().can_start() {
        tracing::trace!("scrub tick: no free slots");
        return TickOutcome::NoSlots;
    }

    if queue.is_reserving_now() {
        tracing::debug!("scrub tick: a shard is reserving replicas; not starting another");
        return TickOutcome::ReservationInProgress;
    }

    let mut preconds = ScrubPreconds {
        allow_requested_repair_only,
        ..ScrubPreconds::default()
    };
    let outcome = queue.select_and_start(initiator, &mut preconds);
    TickOutcome::Attempted { outcome, preconds }
}
