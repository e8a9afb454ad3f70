//! Host facilities the scheduler consults: wall clock, load averages, CPU count.
//!
//! The queue and the admission gates only see these through [`NodeEnv`], so
//! tests can drive time and load explicitly.

use std::time::{Duration, SystemTime};

use parking_lot::Mutex;

/// 1, 5 and 15 minute load averages.
pub type LoadAverages = [f64; 3];

pub trait NodeEnv: Send + Sync {
    /// Current wall-clock time.
    fn now(&self) -> SystemTime;

    /// System load averages, or `None` if they can't be read.
    fn load_averages(&self) -> Option<LoadAverages>;

    /// Number of online CPUs. Non-positive values disable per-CPU scaling.
    fn cpu_count(&self) -> i64;
}

/// The real host.
#[derive(Debug, Default, Clone, Copy)]
pub struct OsEnv;

impl NodeEnv for OsEnv {
    fn now(&self) -> SystemTime {
        SystemTime::now()
    }

    #[cfg(unix)]
    fn load_averages(&self) -> Option<LoadAverages> {
        let mut loads = [0f64; 3];
        // SAFETY: the buffer holds exactly the 3 samples requested.
        let n = unsafe { libc::getloadavg(loads.as_mut_ptr(), 3) };
        (n == 3).then_some(loads)
    }

    #[cfg(not(unix))]
    fn load_averages(&self) -> Option<LoadAverages> {
        None
    }

    fn cpu_count(&self) -> i64 {
        std::thread::available_parallelism()
            .map(|n| n.get() as i64)
            .unwrap_or(0)
    }
}

/// A host whose clock and load are set by hand. For tests and simulations.
#[derive(Debug)]
pub struct ManualEnv {
    now: Mutex<SystemTime>,
    loads: Mutex<Option<LoadAverages>>,
    cpus: i64,
}

impl ManualEnv {
    /// Starts at `now` with an idle load on `cpus` CPUs.
    pub fn new(now: SystemTime, cpus: i64) -> Self {
        Self {
            now: Mutex::new(now),
            loads: Mutex::new(Some([0.0; 3])),
            cpus,
        }
    }

    pub fn set_now(&self, now: SystemTime) {
        *self.now.lock() = now;
    }

    pub fn advance(&self, by: Duration) {
        *self.now.lock() += by;
    }

    /// `None` simulates unreadable load averages.
    pub fn set_loads(&self, loads: Option<LoadAverages>) {
        *self.loads.lock() = loads;
    }
}

impl NodeEnv for ManualEnv {
    fn now(&self) -> SystemTime {
        *self.now.lock()
    }

    fn load_averages(&self) -> Option<LoadAverages> {
        *self.loads.lock()
    }

    fn cpu_count(&self) -> i64 {
        self.cpus
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn os_env_reports_cpus() {
        assert!(OsEnv.cpu_count() >= 1);
    }

    #[test]
    fn manual_env_moves_only_when_told() {
        let start = SystemTime::UNIX_EPOCH + Duration::from_secs(1_000);
        let env = ManualEnv::new(start, 4);
        assert_eq!(env.now(), start);
        env.advance(Duration::from_secs(5));
        assert_eq!(env.now(), start + Duration::from_secs(5));
        env.set_loads(None);
        assert_eq!(env.load_averages(), None);
        assert_eq!(env.cpu_count(), 4);
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn os_env_reads_load_on_linux() {
        let loads = OsEnv.load_averages().expect("linux exposes loadavg");
        assert!(loads.iter().all(|l| *l >= 0.0));
    }
}
