//! Load-average admission and the rolling "daily" load average.

use crate::env::LoadAverages;

const SECS_PER_DAY: u32 = 86_400;

/// Number of heartbeat samples in one day (at least 1).
pub fn daily_samples(heartbeat_interval_secs: u32) -> u32 {
    if heartbeat_interval_secs > 1 {
        (SECS_PER_DAY / heartbeat_interval_secs).max(1)
    } else {
        SECS_PER_DAY
    }
}

/// Fold one sample into a moving average over `n_samples`.
pub fn fold_sample(average: f64, sample: f64, n_samples: u32) -> f64 {
    let n = f64::from(n_samples.max(1));
    (average * (n - 1.0) + sample) / n
}

/// Whether periodic scrubs may start under the given load.
///
/// Permitted if the per-CPU 1-minute load is under `threshold`, or if the
/// 1-minute load is below both the daily average and the 15-minute average
/// (load is falling). Missing samples deny.
pub fn load_permits(
    loads: Option<LoadAverages>,
    cpus: i64,
    threshold: f64,
    daily_average: f64,
) -> bool {
    let Some([load1, _, load15]) = loads else {
        tracing::debug!("couldn't read load averages");
        return false;
    };

    let per_cpu = if cpus > 0 { load1 / cpus as f64 } else { load1 };
    if per_cpu < threshold {
        tracing::trace!(per_cpu, threshold, "load per cpu below threshold");
        return true;
    }

    if load1 < daily_average && load1 < load15 {
        tracing::trace!(load1, daily_average, load15, "load below daily average and falling");
        return true;
    }

    tracing::trace!(
        load1,
        threshold,
        daily_average,
        load15,
        "load too high for periodic scrubs"
    );
    false
}
