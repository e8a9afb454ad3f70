//! The node's scrub queue.
//!
//! Holds the registered scrub jobs in two collections: `active`, the jobs
//! considered for scheduling, and `penalized`, jobs whose last scrub could not
//! reserve replica resources. Penalized jobs return to `active` when their
//! penalty times out, when their schedule is updated, or when a selection pass
//! ran out of `active` candidates and had to fall back to them.
//!
//! Locking:
//! - the jobs lock guards collection membership only and is acquired with a
//!   bounded wait; a timeout means a stuck holder and is fatal;
//! - per-job schedule fields and the registration state are changed without
//!   it (atomics and compare-and-swap on the job);
//! - the scrub initiator is never called with the jobs lock held;
//! - slot counters ([`ResourceGate`]) have their own lock.

mod penalty;
mod select;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, MutexGuard};
use serde::Serialize;

use crate::config::ScrubConfig;
use crate::env::NodeEnv;
use crate::gate::ClockLoadGate;
use crate::job::{
    IntervalPolicy, JobSnapshot, RegistrationState, SchedParams, ScrubJob, ScrubJobRef,
};
use crate::resources::{ReservationSnapshot, ResourceGate};

/// Longest wait for the jobs lock before declaring it stuck.
pub const JOBS_LOCK_TIMEOUT: Duration = Duration::from_millis(100);

#[derive(Debug, Default)]
struct Jobs {
    active: Vec<ScrubJobRef>,
    penalized: Vec<ScrubJobRef>,
    /// The last pass fell through to the penalized jobs: pardon them all on the next one.
    restore_penalized: bool,
}

/// Structured dump of the queue: every queued job, penalized ones last.
#[derive(Debug, Clone, Serialize)]
pub struct QueueDump {
    pub scrubs: Vec<JobSnapshot>,
}

#[derive(Debug)]
pub struct ScrubQueue {
    node_id: i32,
    intervals: IntervalPolicy,
    penalty_period: Duration,
    gate: ClockLoadGate,
    resources: ResourceGate,
    jobs: Mutex<Jobs>,
    reserving_now: AtomicBool,
}

impl ScrubQueue {
    pub fn new(node_id: i32, cfg: &ScrubConfig, env: Arc<dyn NodeEnv>) -> Self {
        Self {
            node_id,
            intervals: IntervalPolicy::from_config(cfg),
            penalty_period: cfg.penalty_period(),
            gate: ClockLoadGate::new(cfg, env),
            resources: ResourceGate::new(cfg.max_scrubs),
            jobs: Mutex::new(Jobs::default()),
            reserving_now: AtomicBool::new(false),
        }
    }

    pub fn node_id(&self) -> i32 {
        self.node_id
    }

    pub fn gate(&self) -> &ClockLoadGate {
        &self.gate
    }

    /// Slot counters, for the scrub initiator and for replicas granting reservations.
    pub fn resources(&self) -> &ResourceGate {
        &self.resources
    }

    fn lock_jobs(&self) -> MutexGuard<'_, Jobs> {
        match self.jobs.try_lock_for(JOBS_LOCK_TIMEOUT) {
            Some(guard) => guard,
            None => panic!(
                "node {}: scrub queue lock not acquired within {:?}",
                self.node_id, JOBS_LOCK_TIMEOUT
            ),
        }
    }

    /// Add the job to the queue, or update its schedule if already queued.
    ///
    /// Only a job that is not registered at all takes the jobs lock; the
    /// frequent update path (shard stats changed) only touches the job.
    pub fn register(&self, job: &ScrubJobRef, params: &SchedParams) {
        if job.is_pending_removal() {
            tracing::debug!(shard = %job.shard(), "not registering: shard being removed");
            return;
        }

        self.update(job, params);

        loop {
            match job.state() {
                RegistrationState::Registered => {
                    tracing::trace!(shard = %job.shard(), "already registered");
                    return;
                }
                RegistrationState::Unregistering => {
                    if job
                        .transition(RegistrationState::Unregistering, RegistrationState::Registered)
                        .is_ok()
                    {
                        tracing::debug!(shard = %job.shard(), "registration restored before purge");
                        return;
                    }
                }
                RegistrationState::NotRegistered => {
                    let mut jobs = self.lock_jobs();
                    // Re-check under the lock: only lock holders leave NotRegistered.
                    if job.state() == RegistrationState::NotRegistered {
                        job.set_in_queues(true);
                        jobs.active.push(Arc::clone(job));
                        let swapped = job
                            .transition(
                                RegistrationState::NotRegistered,
                                RegistrationState::Registered,
                            )
                            .is_ok();
                        assert!(swapped, "shard {} left NotRegistered without the queue lock", job.shard());
                        drop(jobs);
                        tracing::debug!(
                            shard = %job.shard(),
                            scheduled_at = ?job.scheduled_at(),
                            "inserted into scrub queue"
                        );
                        return;
                    }
                }
            }
        }
    }

    /// Recompute the job's target times from `params` without touching
    /// queue membership.
    pub fn update(&self, job: &ScrubJob, params: &SchedParams) {
        let times = self.intervals.target_times(params);
        job.set_target_times(times);
        tracing::debug!(
            shard = %job.shard(),
            scheduled_at = ?times.scheduled_at,
            deadline = ?times.deadline,
            mandatory = params.is_mandatory(),
            state = ?job.state(),
            "scrub schedule adjusted"
        );
    }

    /// Take the job out of scheduling. It is physically dropped from the
    /// collections on the next selection pass, unless re-registered first.
    ///
    /// Lock-free: a concurrent pass may purge the job right after the swap,
    /// so membership is only checked under the jobs lock (see `purge_dead`).
    pub fn remove(&self, job: &ScrubJob) {
        match job.transition(RegistrationState::Registered, RegistrationState::Unregistering) {
            Ok(()) => {
                tracing::debug!(shard = %job.shard(), "unregistering from scrub queue");
            }
            Err(state) => {
                tracing::debug!(shard = %job.shard(), ?state, "remove: job not registered");
            }
        }
    }

    /// Snapshots of all registered jobs, excluding ones being removed.
    pub fn list_all_registered(&self) -> Vec<JobSnapshot> {
        let jobs = self.lock_jobs();
        let valid = |j: &&ScrubJobRef| j.is_registered() && !j.is_pending_removal();
        jobs.active
            .iter()
            .filter(valid)
            .map(|j| j.snapshot(false))
            .chain(jobs.penalized.iter().filter(valid).map(|j| j.snapshot(true)))
            .collect()
    }

    pub fn dump_state(&self) -> QueueDump {
        let jobs = self.lock_jobs();
        let scrubs = jobs
            .active
            .iter()
            .map(|j| j.snapshot(false))
            .chain(jobs.penalized.iter().map(|j| j.snapshot(true)))
            .collect();
        QueueDump { scrubs }
    }

    pub fn reservations(&self) -> ReservationSnapshot {
        self.resources.snapshot()
    }

    /// Collection sizes `(active, penalized)`.
    pub fn sizes(&self) -> (usize, usize) {
        let jobs = self.lock_jobs();
        (jobs.active.len(), jobs.penalized.len())
    }

    /// A shard is negotiating replica reservations; no new session may start meanwhile.
    pub fn set_reserving_now(&self) {
        self.reserving_now.store(true, Ordering::Release);
    }

    pub fn clear_reserving_now(&self) {
        self.reserving_now.store(false, Ordering::Release);
    }

    pub fn is_reserving_now(&self) -> bool {
        self.reserving_now.load(Ordering::Acquire)
    }

    /// Heartbeat hook; see [`ClockLoadGate::update_daily_average`].
    pub fn update_daily_average(&self) -> Option<f64> {
        self.gate.update_daily_average()
    }

    pub fn sleep_interval(&self, is_mandatory: bool) -> Duration {
        self.gate.sleep_interval(is_mandatory)
    }
}
