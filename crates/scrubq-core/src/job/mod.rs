//! Per-shard scrub job.
//!
//! A `ScrubJob` is shared between the shard that owns it and the
//! [`ScrubQueue`](crate::queue::ScrubQueue) (`Arc`), and lives as long as its
//! longest holder. Everything the owner may touch concurrently with the queue
//! is either atomic or behind the job's own small lock; collection membership
//! is only ever changed by the queue, under the queue lock.

mod params;
mod shard;

use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::SystemTime;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;

pub(crate) use params::saturating_add;
pub use params::{IntervalPolicy, MustScrub, SchedParams, TargetTimes, MUST_SCRUB_STAMP};
pub use shard::{ParseShardIdError, ShardId};

pub type ScrubJobRef = Arc<ScrubJob>;

/// Registration of a job with the queue.
///
/// ```text
/// NotRegistered --register--> Registered --remove--> Unregistering
///       ^                          ^                      |  |
///       |                          +------register--------+  |
///       +------------------- purge (queue lock) -------------+
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum RegistrationState {
    NotRegistered = 0,
    Registered = 1,
    Unregistering = 2,
}

impl RegistrationState {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => RegistrationState::NotRegistered,
            1 => RegistrationState::Registered,
            2 => RegistrationState::Unregistering,
            other => panic!("corrupt registration state {other}"),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Schedule {
    scheduled_at: SystemTime,
    deadline: Option<SystemTime>,
    penalty_timeout: Option<SystemTime>,
}

#[derive(Debug)]
pub struct ScrubJob {
    shard: ShardId,
    /// Hosting node, for logs only.
    owner_node: i32,
    state: AtomicU8,
    in_queues: AtomicBool,
    resources_failure: AtomicBool,
    updated: AtomicBool,
    pending_removal: AtomicBool,
    schedule: Mutex<Schedule>,
}

impl ScrubJob {
    pub fn new(shard: ShardId, owner_node: i32) -> Self {
        Self {
            shard,
            owner_node,
            state: AtomicU8::new(RegistrationState::NotRegistered as u8),
            in_queues: AtomicBool::new(false),
            resources_failure: AtomicBool::new(false),
            updated: AtomicBool::new(false),
            pending_removal: AtomicBool::new(false),
            schedule: Mutex::new(Schedule {
                scheduled_at: SystemTime::UNIX_EPOCH,
                deadline: None,
                penalty_timeout: None,
            }),
        }
    }

    /// Convenience: a new shared job.
    pub fn new_ref(shard: ShardId, owner_node: i32) -> ScrubJobRef {
        Arc::new(Self::new(shard, owner_node))
    }

    pub fn shard(&self) -> ShardId {
        self.shard
    }

    pub fn owner_node(&self) -> i32 {
        self.owner_node
    }

    pub fn state(&self) -> RegistrationState {
        RegistrationState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Atomically move `from -> to`. On failure returns the state actually observed.
    pub(crate) fn transition(
        &self,
        from: RegistrationState,
        to: RegistrationState,
    ) -> Result<(), RegistrationState> {
        self.state
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .map(|_| ())
            .map_err(RegistrationState::from_u8)
    }

    pub fn is_registered(&self) -> bool {
        self.state() == RegistrationState::Registered
    }

    /// Whether the job currently sits in one of the queue's collections.
    pub fn in_queues(&self) -> bool {
        self.in_queues.load(Ordering::Acquire)
    }

    pub(crate) fn set_in_queues(&self, v: bool) {
        self.in_queues.store(v, Ordering::Release);
    }

    pub fn scheduled_at(&self) -> SystemTime {
        self.schedule.lock().scheduled_at
    }

    pub fn deadline(&self) -> Option<SystemTime> {
        self.schedule.lock().deadline
    }

    pub fn penalty_timeout(&self) -> Option<SystemTime> {
        self.schedule.lock().penalty_timeout
    }

    /// Install new target times. Clears any penalty timeout and flags the
    /// job as updated, so a penalized job is pardoned on the next pass.
    pub(crate) fn set_target_times(&self, times: TargetTimes) {
        {
            let mut s = self.schedule.lock();
            s.scheduled_at = times.scheduled_at;
            s.deadline = times.deadline;
            s.penalty_timeout = None;
        }
        self.updated.store(true, Ordering::Release);
    }

    pub(crate) fn set_penalty_timeout(&self, at: SystemTime) {
        self.schedule.lock().penalty_timeout = Some(at);
    }

    pub fn is_updated(&self) -> bool {
        self.updated.load(Ordering::Acquire)
    }

    pub(crate) fn clear_updated(&self) {
        self.updated.store(false, Ordering::Release);
    }

    /// Called by the owner when the scrub it started could not reserve its
    /// replicas. The queue penalizes the job on its next pass.
    pub fn mark_resources_failure(&self) {
        self.resources_failure.store(true, Ordering::Release);
    }

    pub fn resources_failure(&self) -> bool {
        self.resources_failure.load(Ordering::Acquire)
    }

    pub(crate) fn clear_resources_failure(&self) {
        self.resources_failure.store(false, Ordering::Release);
    }

    /// Called by the owner when the shard is going away; the queue drops the
    /// job at its next opportunity.
    pub fn mark_for_removal(&self) {
        self.pending_removal.store(true, Ordering::Release);
    }

    pub fn is_pending_removal(&self) -> bool {
        self.pending_removal.load(Ordering::Acquire)
    }

    pub fn is_ripe(&self, now: SystemTime) -> bool {
        self.scheduled_at() <= now
    }

    /// True only for a deadline strictly in the past.
    pub fn deadline_passed(&self, now: SystemTime) -> bool {
        matches!(self.deadline(), Some(d) if d < now)
    }

    /// A job the queue should drop: removed by its owner, or its shard is going away.
    pub(crate) fn is_dead(&self) -> bool {
        self.is_pending_removal() || self.state() != RegistrationState::Registered
    }

    /// Move a dead job to `NotRegistered`. Returns false if a concurrent
    /// `register` revived it first, in which case it must stay queued.
    ///
    /// Queue lock held.
    pub(crate) fn retire(&self) -> bool {
        loop {
            let current = self.state();
            match current {
                RegistrationState::Registered if !self.is_pending_removal() => return false,
                RegistrationState::NotRegistered => return true,
                _ => {
                    if self
                        .transition(current, RegistrationState::NotRegistered)
                        .is_ok()
                    {
                        return true;
                    }
                }
            }
        }
    }

    pub fn snapshot(&self, penalized: bool) -> JobSnapshot {
        let s = *self.schedule.lock();
        JobSnapshot {
            shard: self.shard,
            scheduled_at: s.scheduled_at.into(),
            deadline: s.deadline.map(Into::into),
            forced: s.scheduled_at == MUST_SCRUB_STAMP,
            penalized,
            penalty_timeout: s.penalty_timeout.map(Into::into),
            state: self.state(),
        }
    }
}

/// Point-in-time view of a job, for listing and dumps.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobSnapshot {
    pub shard: ShardId,
    pub scheduled_at: DateTime<Utc>,
    pub deadline: Option<DateTime<Utc>>,
    /// Explicitly requested ("beginning of time" target).
    pub forced: bool,
    pub penalized: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub penalty_timeout: Option<DateTime<Utc>>,
    pub state: RegistrationState,
}
