//! Shared fixtures for the scheduling integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use parking_lot::Mutex;
use scrubq_core::config::ScrubConfig;
use scrubq_core::env::ManualEnv;
use scrubq_core::{AttemptOutcome, ScrubInitiator, ScrubJobRef, ScrubQueue, ShardId};

pub fn t0() -> SystemTime {
    UNIX_EPOCH + Duration::from_secs(1_800_000_000)
}

/// Config with no jitter and no default deadline, so target times are exact.
pub fn exact_config() -> ScrubConfig {
    ScrubConfig {
        min_interval_secs: 60.0,
        max_interval_secs: 0.0,
        interval_randomize_ratio: 0.0,
        sleep_secs: 2.0,
        penalty_grace_secs: 300.0,
        max_scrubs: 2,
        ..ScrubConfig::default()
    }
}

pub fn queue_at(start: SystemTime, cfg: &ScrubConfig) -> (Arc<ManualEnv>, ScrubQueue) {
    let env = Arc::new(ManualEnv::new(start, 8));
    let queue = ScrubQueue::new(3, cfg, env.clone());
    (env, queue)
}

/// Initiator that answers from a per-shard script and records every call.
/// Shards without a script entry answer `default`.
pub struct ScriptedInitiator {
    default: AttemptOutcome,
    script: Mutex<HashMap<ShardId, AttemptOutcome>>,
    calls: Mutex<Vec<(ShardId, bool)>>,
}

impl ScriptedInitiator {
    pub fn new(default: AttemptOutcome) -> Self {
        Self {
            default,
            script: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn answer(&self, job: &ScrubJobRef, outcome: AttemptOutcome) {
        self.script.lock().insert(job.shard(), outcome);
    }

    pub fn calls(&self) -> Vec<(ShardId, bool)> {
        self.calls.lock().clone()
    }

    pub fn shards_called(&self) -> Vec<ShardId> {
        self.calls.lock().iter().map(|(s, _)| *s).collect()
    }

    pub fn take_calls(&self) -> Vec<ShardId> {
        std::mem::take(&mut *self.calls.lock())
            .into_iter()
            .map(|(s, _)| s)
            .collect()
    }
}

impl ScrubInitiator for ScriptedInitiator {
    fn initiate_scrub(&self, shard: ShardId, repair_only: bool) -> AttemptOutcome {
        self.calls.lock().push((shard, repair_only));
        self.script.lock().get(&shard).copied().unwrap_or(self.default)
    }
}
