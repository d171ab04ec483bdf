//! Time sources for the caches.
//!
//! Freshness is judged on a monotonic clock, while the TTL multiplier needs
//! the local wall-clock hour. Both come from one [`Clock`] so tests can drive
//! them together.

use std::sync::atomic::{AtomicU8, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use chrono::{Timelike, Utc};
use chrono_tz::Tz;

pub trait Clock: Send + Sync + 'static {
    /// Monotonic instant used for entry ages.
    fn now(&self) -> Instant;

    /// Current hour of day (0-23) in the site's local timezone.
    fn local_hour(&self) -> u8;
}

#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    timezone: Tz,
}

impl SystemClock {
    pub fn new(timezone: Tz) -> Self {
        Self { timezone }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new(Tz::UTC)
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn local_hour(&self) -> u8 {
        // `hour()` is always in 0..24.
        Utc::now().with_timezone(&self.timezone).hour() as u8
    }
}

/// Virtual clock: time only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    origin: Instant,
    elapsed_nanos: AtomicU64,
    hour: AtomicU8,
}

impl ManualClock {
    pub fn new(hour: u8) -> Self {
        Self {
            origin: Instant::now(),
            elapsed_nanos: AtomicU64::new(0),
            hour: AtomicU8::new(hour % 24),
        }
    }

    pub fn advance(&self, by: Duration) {
        let nanos = u64::try_from(by.as_nanos()).unwrap_or(u64::MAX);
        self.elapsed_nanos.fetch_add(nanos, Ordering::SeqCst);
    }

    pub fn set_hour(&self, hour: u8) {
        self.hour.store(hour % 24, Ordering::SeqCst);
    }

    pub fn elapsed(&self) -> Duration {
        Duration::from_nanos(self.elapsed_nanos.load(Ordering::SeqCst))
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.origin + self.elapsed()
    }

    fn local_hour(&self) -> u8 {
        self.hour.load(Ordering::SeqCst)
    }
}
