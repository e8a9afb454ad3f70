//! Outcome of trying to start a scrub, and the capability that does it.

use serde::Serialize;

use crate::job::ShardId;

/// Result of asking a shard to start scrubbing.
///
/// Only `Started` and `LocalResourceShortage` end a selection pass early; the
/// rest just move on to the next candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptOutcome {
    /// A scrub session was started.
    Started,
    /// The shard is already being scrubbed.
    AlreadyRunning,
    /// Scrub flags or pool settings forbid this scrub now.
    PreconditionsNotMet,
    /// The shard is not active/clean, or not primary here.
    BadShardState,
    /// The shard could not be found or locked.
    ShardNotFound,
    /// No local scrub slot. Node-wide, so no other shard will do better.
    LocalResourceShortage,
    /// Nothing was started.
    NoneReady,
}

/// Admission conditions for one selection pass.
///
/// `allow_requested_repair_only` is supplied by the caller; the rest is filled
/// in by [`ScrubQueue::select_and_start`](crate::queue::ScrubQueue::select_and_start).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ScrubPreconds {
    pub time_permit: bool,
    pub load_is_low: bool,
    /// Only jobs whose deadline has passed may start.
    pub only_deadlined: bool,
    /// Only explicitly requested repairs are allowed (e.g. during recovery).
    pub allow_requested_repair_only: bool,
}

/// Starts a scrub on a shard. Provided by the node that owns the shards.
///
/// Always called with no scheduler lock held; implementations may lock
/// their shards and call back into the queue.
pub trait ScrubInitiator {
    fn initiate_scrub(&self, shard: ShardId, repair_only: bool) -> AttemptOutcome;
}

impl<F> ScrubInitiator for F
where
    F: Fn(ShardId, bool) -> AttemptOutcome,
{
    fn initiate_scrub(&self, shard: ShardId, repair_only: bool) -> AttemptOutcome {
        self(shard, repair_only)
    }
}
