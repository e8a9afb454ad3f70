//! Week-day and hour-of-day scrub windows.

use std::time::SystemTime;

use chrono::{DateTime, Datelike, Local, Timelike};

use crate::config::ScrubConfig;

/// True if `p` lies in the half-open modulo range `[from, till)`.
///
/// `from == till` is defined as "always". A range with `till < from` wraps,
/// so `(22, 6)` covers 22, 23, 0, .., 5.
pub fn is_between_modulo(from: u32, till: u32, p: u32) -> bool {
    (till == from) || ((till >= from) ^ (p >= from) ^ (p < till))
}

/// Allowed scrub days and hours.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScrubWindow {
    pub begin_week_day: u32,
    pub end_week_day: u32,
    pub begin_hour: u32,
    pub end_hour: u32,
}

impl ScrubWindow {
    /// A window open at all times.
    pub const ALWAYS: ScrubWindow = ScrubWindow {
        begin_week_day: 0,
        end_week_day: 0,
        begin_hour: 0,
        end_hour: 0,
    };

    pub fn from_config(cfg: &ScrubConfig) -> Self {
        Self {
            begin_week_day: cfg.begin_week_day,
            end_week_day: cfg.end_week_day,
            begin_hour: cfg.begin_hour,
            end_hour: cfg.end_hour,
        }
    }

    /// `week_day` counts from Sunday = 0.
    pub fn permits(&self, week_day: u32, hour: u32) -> bool {
        if !is_between_modulo(self.begin_week_day, self.end_week_day, week_day) {
            tracing::trace!(
                week_day,
                begin = self.begin_week_day,
                end = self.end_week_day,
                "outside scrub days"
            );
            return false;
        }
        let ok = is_between_modulo(self.begin_hour, self.end_hour, hour);
        tracing::trace!(
            hour,
            begin = self.begin_hour,
            end = self.end_hour,
            permitted = ok,
            "scrub hours check"
        );
        ok
    }

    /// Check against the local calendar at `now`.
    pub fn permits_at(&self, now: SystemTime) -> bool {
        let local: DateTime<Local> = now.into();
        self.permits(local.weekday().num_days_from_sunday(), local.hour())
    }
}
