//! Time-of-day TTL multiplier.

use std::time::Duration;

use serde::Serialize;

pub const DEFAULT_PEAK_START_HOUR: u8 = 9;
pub const DEFAULT_PEAK_END_HOUR: u8 = 23;
pub const DEFAULT_OFF_PEAK_MULTIPLIER: u32 = 3;

/// Local-time window during which entries keep their base TTL.
///
/// Outside the window the TTL is stretched by `off_peak_multiplier`. The
/// window is half-open (`start_hour <= h < end_hour`) and may wrap past
/// midnight when `start_hour > end_hour`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PeakWindow {
    start_hour: u8,
    end_hour: u8,
    off_peak_multiplier: u32,
}

impl PeakWindow {
    pub const fn new(start_hour: u8, end_hour: u8, off_peak_multiplier: u32) -> Self {
        Self {
            start_hour,
            end_hour,
            off_peak_multiplier,
        }
    }

    pub fn is_peak(&self, hour: u8) -> bool {
        if self.start_hour <= self.end_hour {
            hour >= self.start_hour && hour < self.end_hour
        } else {
            hour >= self.start_hour || hour < self.end_hour
        }
    }

    pub fn multiplier(&self, hour: u8) -> u32 {
        if self.is_peak(hour) {
            1
        } else {
            self.off_peak_multiplier
        }
    }

    /// TTL an entry written at `hour` keeps for its whole life.
    pub fn effective_ttl(&self, base_ttl: Duration, hour: u8) -> Duration {
        base_ttl.saturating_mul(self.multiplier(hour))
    }
}

impl Default for PeakWindow {
    fn default() -> Self {
        Self::new(
            DEFAULT_PEAK_START_HOUR,
            DEFAULT_PEAK_END_HOUR,
            DEFAULT_OFF_PEAK_MULTIPLIER,
        )
    }
}
