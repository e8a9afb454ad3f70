use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Rejected configuration values.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("{field} must be within 0..={max}, got {value}")]
    OutOfRange {
        field: &'static str,
        value: u32,
        max: u32,
    },
    #[error("{field} must be a finite, non-negative number, got {value}")]
    NotNonNegative { field: &'static str, value: f64 },
    #[error("{field} must be at most {max} seconds, got {value}")]
    TooLong {
        field: &'static str,
        value: f64,
        max: f64,
    },
    #[error("max_scrubs must be at least 1")]
    NoScrubSlots,
}

/// Longest accepted interval, sleep or grace period: 100 years.
pub const MAX_PERIOD_SECS: f64 = 100.0 * 365.25 * 86_400.0;

/// Scrub scheduling configuration loaded from `~/.config/scrubq/config.toml`.
///
/// Intervals and sleeps are in seconds. Week days count from Sunday (0).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScrubConfig {
    /// Default minimum interval between scrubs of a shard.
    pub min_interval_secs: f64,
    /// Default maximum interval; the scrub deadline. Zero or negative = no deadline.
    pub max_interval_secs: f64,
    /// Random extra delay, as a fraction of the minimum interval.
    pub interval_randomize_ratio: f64,
    /// First week day (inclusive) of the scrub window.
    pub begin_week_day: u32,
    /// Last week day (exclusive) of the scrub window. Equal to begin = every day.
    pub end_week_day: u32,
    /// First hour (inclusive) of the scrub window.
    pub begin_hour: u32,
    /// Last hour (exclusive) of the scrub window. Equal to begin = all day.
    pub end_hour: u32,
    /// Per-CPU 1-minute load below which periodic scrubs may start.
    pub load_threshold: f64,
    /// Maximum concurrent scrubs on this node (local + replica).
    pub max_scrubs: u32,
    /// Normal sleep between scrub chunks.
    pub sleep_secs: f64,
    /// Sleep used outside the scrub window.
    pub extended_sleep_secs: f64,
    /// Heartbeat period; sizes the daily load average window.
    pub heartbeat_interval_secs: u32,
    /// Fixed grace added to a penalized job's timeout.
    pub penalty_grace_secs: f64,
    /// Period of the scheduling tick.
    pub tick_interval_secs: f64,
}

impl Default for ScrubConfig {
    fn default() -> Self {
        Self {
            min_interval_secs: 86_400.0,
            max_interval_secs: 604_800.0,
            interval_randomize_ratio: 0.5,
            begin_week_day: 0,
            end_week_day: 0,
            begin_hour: 0,
            end_hour: 0,
            load_threshold: 0.5,
            max_scrubs: 1,
            sleep_secs: 0.0,
            extended_sleep_secs: 0.0,
            heartbeat_interval_secs: 6,
            penalty_grace_secs: 300.0,
            tick_interval_secs: 1.0,
        }
    }
}

impl ScrubConfig {
    /// Check value ranges. Called on every load; defaults always pass.
    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        let ranged = [
            ("begin_week_day", self.begin_week_day, 7),
            ("end_week_day", self.end_week_day, 7),
            ("begin_hour", self.begin_hour, 24),
            ("end_hour", self.end_hour, 24),
        ];
        for (field, value, max) in ranged {
            if value > max {
                return Err(ConfigError::OutOfRange { field, value, max });
            }
        }

        let non_negative = [
            ("min_interval_secs", self.min_interval_secs),
            ("interval_randomize_ratio", self.interval_randomize_ratio),
            ("load_threshold", self.load_threshold),
            ("sleep_secs", self.sleep_secs),
            ("extended_sleep_secs", self.extended_sleep_secs),
            ("penalty_grace_secs", self.penalty_grace_secs),
            ("tick_interval_secs", self.tick_interval_secs),
        ];
        for (field, value) in non_negative {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::NotNonNegative { field, value });
            }
        }
        // max_interval may be <= 0 (no deadline) but must still be a number.
        if !self.max_interval_secs.is_finite() {
            return Err(ConfigError::NotNonNegative {
                field: "max_interval_secs",
                value: self.max_interval_secs,
            });
        }

        let periods = [
            ("min_interval_secs", self.min_interval_secs),
            ("max_interval_secs", self.max_interval_secs),
            ("sleep_secs", self.sleep_secs),
            ("extended_sleep_secs", self.extended_sleep_secs),
            ("penalty_grace_secs", self.penalty_grace_secs),
            ("tick_interval_secs", self.tick_interval_secs),
        ];
        for (field, value) in periods {
            if value > MAX_PERIOD_SECS {
                return Err(ConfigError::TooLong {
                    field,
                    value,
                    max: MAX_PERIOD_SECS,
                });
            }
        }

        if self.max_scrubs == 0 {
            return Err(ConfigError::NoScrubSlots);
        }
        Ok(())
    }

    pub fn sleep(&self) -> Duration {
        secs(self.sleep_secs)
    }

    pub fn extended_sleep(&self) -> Duration {
        secs(self.extended_sleep_secs)
    }

    pub fn tick_interval(&self) -> Duration {
        secs(self.tick_interval_secs)
    }

    /// How long a job that failed replica reservation stays penalized.
    pub fn penalty_period(&self) -> Duration {
        self.sleep()
            .saturating_mul(2)
            .saturating_add(secs(self.penalty_grace_secs))
    }
}

/// Seconds as a `Duration`. Negative and NaN inputs clamp to zero; values too
/// large for a `Duration` (including infinity) saturate to `Duration::MAX`.
pub fn secs(value: f64) -> Duration {
    if value.is_nan() || value <= 0.0 {
        return Duration::ZERO;
    }
    Duration::try_from_secs_f64(value).unwrap_or(Duration::MAX)
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("scrubq")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<ScrubConfig> {
    let path = config_path()?;
    if !path.exists() {
        let default_cfg = ScrubConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }
    load_from_path(&path)
}

/// Load and validate configuration from an explicit file.
pub fn load_from_path(path: &Path) -> Result<ScrubConfig> {
    let data = fs::read_to_string(path)
        .with_context(|| format!("read config: {}", path.display()))?;
    let cfg: ScrubConfig =
        toml::from_str(&data).with_context(|| format!("parse config: {}", path.display()))?;
    cfg.validate()
        .with_context(|| format!("invalid config: {}", path.display()))?;
    Ok(cfg)
}
