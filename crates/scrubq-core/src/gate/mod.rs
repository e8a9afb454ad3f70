//! Clock and load admission gate.
//!
//! Decides whether *periodic* (non-mandatory) scrubs may start right now,
//! based on the configured day/hour window and the system load, and computes
//! the sleep between scrub chunks. The rolling daily load average lives here
//! too; it is refreshed by the node heartbeat, never by selection.

mod load;
mod window;

use std::sync::Arc;
use std::time::{Duration, SystemTime};

use parking_lot::Mutex;

use crate::config::ScrubConfig;
use crate::env::NodeEnv;

pub use load::{daily_samples, fold_sample, load_permits};
pub use window::{is_between_modulo, ScrubWindow};

pub struct ClockLoadGate {
    env: Arc<dyn NodeEnv>,
    window: ScrubWindow,
    load_threshold: f64,
    sleep: Duration,
    extended_sleep: Duration,
    daily_samples: u32,
    daily_load: Mutex<f64>,
}

impl ClockLoadGate {
    /// Seeds the daily average with the current 15-minute load (1.0 if unreadable).
    pub fn new(cfg: &ScrubConfig, env: Arc<dyn NodeEnv>) -> Self {
        let initial = match env.load_averages() {
            Some([_, _, load15]) => load15,
            None => {
                tracing::warn!("couldn't read load averages; daily load starts at 1.0");
                1.0
            }
        };
        Self {
            window: ScrubWindow::from_config(cfg),
            load_threshold: cfg.load_threshold,
            sleep: cfg.sleep(),
            extended_sleep: cfg.extended_sleep(),
            daily_samples: daily_samples(cfg.heartbeat_interval_secs),
            daily_load: Mutex::new(initial),
            env,
        }
    }

    pub fn env(&self) -> &Arc<dyn NodeEnv> {
        &self.env
    }

    pub fn window(&self) -> ScrubWindow {
        self.window
    }

    pub fn time_permit(&self, now: SystemTime) -> bool {
        self.window.permits_at(now)
    }

    pub fn load_below_threshold(&self) -> bool {
        load_permits(
            self.env.load_averages(),
            self.env.cpu_count(),
            self.load_threshold,
            self.daily_load_average(),
        )
    }

    pub fn daily_load_average(&self) -> f64 {
        *self.daily_load.lock()
    }

    /// Heartbeat hook. Returns the current 1-minute load as a percentage, for telemetry.
    pub fn update_daily_average(&self) -> Option<f64> {
        let [load1, _, _] = self.env.load_averages()?;
        let mut daily = self.daily_load.lock();
        *daily = fold_sample(*daily, load1, self.daily_samples);
        tracing::trace!(daily_load = *daily, "heartbeat: daily load average");
        Some(100.0 * load1)
    }

    /// Sleep between scrub chunks. Periodic scrubs that spill outside the
    /// window slow down to the extended sleep instead of aborting.
    pub fn sleep_interval(&self, is_mandatory: bool) -> Duration {
        if is_mandatory || self.time_permit(self.env.now()) {
            return self.sleep;
        }
        self.extended_sleep.max(self.sleep)
    }
}

impl std::fmt::Debug for ClockLoadGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClockLoadGate")
            .field("window", &self.window)
            .field("load_threshold", &self.load_threshold)
            .field("daily_load", &self.daily_load_average())
            .finish_non_exhaustive()
    }
}
