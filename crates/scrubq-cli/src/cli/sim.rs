//! In-process stand-in for the shard owners of one node.
//!
//! Plays the part the storage daemon would: owns a scrub job per shard,
//! starts "scrubs" when the queue asks, negotiates replica reservations (which
//! may fail) and re-registers each shard once its scrub completes. Nothing is
//! actually read or verified.

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, UNIX_EPOCH};

use rand::Rng;
use scrubq_core::{
    AttemptOutcome, SchedParams, ScrubInitiator, ScrubJob, ScrubJobRef, ScrubQueue, ShardId,
};

/// Ticks spent waiting for replica grants before the outcome is known.
pub const RESERVE_TICKS: u32 = 1;
/// Ticks a scrub runs once its replicas are reserved.
pub const SCRUB_TICKS: u32 = 3;

const SIM_POOL: u64 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Reserving { ticks_left: u32 },
    Scrubbing { ticks_left: u32 },
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SimStats {
    pub started: u32,
    pub completed: u32,
    pub reservation_failures: u32,
}

pub struct SimNode {
    queue: Arc<ScrubQueue>,
    jobs: Vec<ScrubJobRef>,
    failure_pct: u8,
    running: RefCell<BTreeMap<ShardId, Phase>>,
    stats: Cell<SimStats>,
}

impl SimNode {
    pub fn new(queue: Arc<ScrubQueue>, shards: u32, failure_pct: u8) -> Self {
        let node_id = queue.node_id();
        let jobs = (0..shards)
            .map(|seed| ScrubJob::new_ref(ShardId::new(SIM_POOL, seed), node_id))
            .collect();
        Self {
            queue,
            jobs,
            failure_pct: failure_pct.min(100),
            running: RefCell::new(BTreeMap::new()),
            stats: Cell::new(SimStats::default()),
        }
    }

    pub fn stats(&self) -> SimStats {
        self.stats.get()
    }

    pub fn running(&self) -> usize {
        self.running.borrow().len()
    }

    fn job(&self, shard: ShardId) -> Option<&ScrubJobRef> {
        self.jobs.iter().find(|j| j.shard() == shard)
    }

    fn bump(&self, f: impl FnOnce(&mut SimStats)) {
        let mut s = self.stats.get();
        f(&mut s);
        self.stats.set(s);
    }

    /// Register every shard. The first one gets an operator-requested scrub;
    /// the rest were last scrubbed at a random point within `spread` ago.
    pub fn register_all(&self, spread: Duration) {
        let now = self.queue.gate().env().now();
        let mut rng = rand::thread_rng();
        for (i, job) in self.jobs.iter().enumerate() {
            let params = if i == 0 {
                SchedParams::must_scrub()
            } else {
                let ago = spread.mul_f64(rng.gen::<f64>());
                SchedParams::periodic(now.checked_sub(ago).unwrap_or(UNIX_EPOCH))
            };
            self.queue.register(job, &params);
        }
    }

    /// Move every running scrub one tick forward.
    pub fn advance(&self) {
        let mut running = self.running.borrow_mut();
        let mut finished = Vec::new();

        for (shard, phase) in running.iter_mut() {
            match *phase {
                Phase::Reserving { ticks_left } if ticks_left > 0 => {
                    *phase = Phase::Reserving {
                        ticks_left: ticks_left - 1,
                    };
                }
                Phase::Reserving { .. } => {
                    self.queue.clear_reserving_now();
                    if rand::thread_rng().gen_range(0..100u8) < self.failure_pct {
                        tracing::info!(%shard, "replica reservation failed");
                        self.queue.resources().release_local();
                        if let Some(job) = self.job(*shard) {
                            job.mark_resources_failure();
                        }
                        self.bump(|s| s.reservation_failures += 1);
                        finished.push(*shard);
                    } else {
                        tracing::debug!(%shard, "replicas reserved");
                        *phase = Phase::Scrubbing {
                            ticks_left: SCRUB_TICKS,
                        };
                    }
                }
                Phase::Scrubbing { ticks_left } if ticks_left > 1 => {
                    *phase = Phase::Scrubbing {
                        ticks_left: ticks_left - 1,
                    };
                }
                Phase::Scrubbing { .. } => {
                    self.queue.resources().release_local();
                    if let Some(job) = self.job(*shard) {
                        let now = self.queue.gate().env().now();
                        self.queue.register(job, &SchedParams::periodic(now));
                    }
                    tracing::info!(%shard, "scrub completed");
                    self.bump(|s| s.completed += 1);
                    finished.push(*shard);
                }
            }
        }

        for shard in finished {
            running.remove(&shard);
        }
    }
}

impl ScrubInitiator for SimNode {
    fn initiate_scrub(&self, shard: ShardId, _repair_only: bool) -> AttemptOutcome {
        if self.job(shard).is_none() {
            return AttemptOutcome::ShardNotFound;
        }
        let mut running = self.running.borrow_mut();
        if running.contains_key(&shard) {
            return AttemptOutcome::AlreadyRunning;
        }
        if !self.queue.resources().try_acquire_local() {
            return AttemptOutcome::LocalResourceShortage;
        }

        self.queue.set_reserving_now();
        running.insert(
            shard,
            Phase::Reserving {
                ticks_left: RESERVE_TICKS,
            },
        );
        self.bump(|s| s.started += 1);
        tracing::info!(%shard, "scrub started");
        AttemptOutcome::Started
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scrubq_core::config::ScrubConfig;
    use scrubq_core::driver::{run_tick, TickOutcome};
    use scrubq_core::env::{ManualEnv, NodeEnv};
    use std::time::SystemTime;

    fn node(max_scrubs: u32, failure_pct: u8) -> (Arc<ManualEnv>, SimNode) {
        let cfg = ScrubConfig {
            max_scrubs,
            ..ScrubConfig::default()
        };
        let start: SystemTime = UNIX_EPOCH + Duration::from_secs(1_750_000_000);
        let env = Arc::new(ManualEnv::new(start, 4));
        let queue = Arc::new(ScrubQueue::new(0, &cfg, env.clone()));
        (env, SimNode::new(queue, 1, failure_pct))
    }

    fn tick(n: &SimNode) -> TickOutcome {
        n.advance();
        run_tick(&n.queue, n, false)
    }

    #[test]
    fn scrub_runs_to_completion_and_reschedules() {
        let (env, n) = node(2, 0);
        n.register_all(Duration::ZERO);
        let job = Arc::clone(&n.jobs[0]);

        assert!(tick(&n).started());
        assert_eq!(tick(&n), TickOutcome::ReservationInProgress);
        // Reserved: the queue offers the shard again, but it is busy.
        assert!(matches!(
            tick(&n),
            TickOutcome::Attempted {
                outcome: AttemptOutcome::NoneReady,
                ..
            }
        ));
        assert!(!n.queue.is_reserving_now());
        for _ in 0..SCRUB_TICKS {
            tick(&n);
        }
        assert_eq!(n.running(), 0);
        assert_eq!(
            n.stats(),
            SimStats {
                started: 1,
                completed: 1,
                reservation_failures: 0
            }
        );
        assert_eq!(n.queue.reservations().scrubs_local, 0);
        assert!(job.scheduled_at() > env.now());
    }

    #[test]
    fn failed_reservation_penalizes_the_shard() {
        let (_env, n) = node(1, 100);
        n.register_all(Duration::ZERO);
        let job = Arc::clone(&n.jobs[0]);

        assert!(tick(&n).started());
        assert_eq!(tick(&n), TickOutcome::NoSlots);
        // Reservation resolves as failed and frees the slot. With nothing else
        // ripe the penalized shard is still tried, and starts again.
        assert!(tick(&n).started());
        assert_eq!(n.stats().reservation_failures, 1);
        assert_eq!(n.stats().started, 2);
        assert!(job.penalty_timeout().is_some());
        assert_eq!(n.queue.sizes(), (0, 1));
        assert_eq!(n.queue.reservations().scrubs_local, 1);
    }

    #[test]
    fn unknown_shard_is_not_found() {
        let (_env, n) = node(1, 0);
        assert_eq!(
            n.initiate_scrub(ShardId::new(99, 0), false),
            AttemptOutcome::ShardNotFound
        );
    }
}
