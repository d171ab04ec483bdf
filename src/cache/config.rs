//! Cache configuration.
//!
//! Capacities and base TTLs for the three caches, plus the peak window used
//! to stretch TTLs off-peak. Populated from the `[cache]` settings section.

use std::num::NonZeroUsize;
use std::time::Duration;

use serde::Deserialize;

use super::window::{
    DEFAULT_OFF_PEAK_MULTIPLIER, DEFAULT_PEAK_END_HOUR, DEFAULT_PEAK_START_HOUR, PeakWindow,
};

const DEFAULT_ARTICLE_LIST_LIMIT: usize = 8;
const DEFAULT_ARTICLE_LIST_TTL_SECS: u64 = 300;
const DEFAULT_CATEGORY_LIMIT: usize = 4;
const DEFAULT_CATEGORY_TTL_SECS: u64 = 3600;
const DEFAULT_ARTICLE_LIMIT: usize = 200;
const DEFAULT_ARTICLE_TTL_SECS: u64 = 600;
const DEFAULT_PAGE_SIZE: usize = 100;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Maximum cached article lists.
    pub article_list_limit: usize,
    /// Base TTL of the article list, in seconds.
    pub article_list_ttl_seconds: u64,
    /// Maximum cached category tables.
    pub category_limit: usize,
    /// Base TTL of the category table, in seconds.
    pub category_ttl_seconds: u64,
    /// Maximum individual articles kept in memory.
    pub article_limit: usize,
    /// Base TTL of an individual article, in seconds.
    pub article_ttl_seconds: u64,
    /// How many of the newest published articles the list holds.
    pub page_size: usize,
    pub peak_start_hour: u8,
    pub peak_end_hour: u8,
    pub off_peak_multiplier: u32,
    /// Only one background refresh per stale article at a time.
    pub coalesce_refreshes: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            article_list_limit: DEFAULT_ARTICLE_LIST_LIMIT,
            article_list_ttl_seconds: DEFAULT_ARTICLE_LIST_TTL_SECS,
            category_limit: DEFAULT_CATEGORY_LIMIT,
            category_ttl_seconds: DEFAULT_CATEGORY_TTL_SECS,
            article_limit: DEFAULT_ARTICLE_LIMIT,
            article_ttl_seconds: DEFAULT_ARTICLE_TTL_SECS,
            page_size: DEFAULT_PAGE_SIZE,
            peak_start_hour: DEFAULT_PEAK_START_HOUR,
            peak_end_hour: DEFAULT_PEAK_END_HOUR,
            off_peak_multiplier: DEFAULT_OFF_PEAK_MULTIPLIER,
            coalesce_refreshes: true,
        }
    }
}

impl From<&crate::config::CacheSettings> for CacheConfig {
    fn from(settings: &crate::config::CacheSettings) -> Self {
        Self {
            article_list_limit: settings.article_list_limit.get(),
            article_list_ttl_seconds: settings.article_list_ttl.as_secs(),
            category_limit: settings.category_limit.get(),
            category_ttl_seconds: settings.category_ttl.as_secs(),
            article_limit: settings.article_limit.get(),
            article_ttl_seconds: settings.article_ttl.as_secs(),
            page_size: settings.page_size.get(),
            peak_start_hour: settings.peak_start_hour,
            peak_end_hour: settings.peak_end_hour,
            off_peak_multiplier: settings.off_peak_multiplier.get(),
            coalesce_refreshes: settings.coalesce_refreshes,
        }
    }
}

impl CacheConfig {
    pub fn peak_window(&self) -> PeakWindow {
        PeakWindow::new(
            self.peak_start_hour,
            self.peak_end_hour,
            self.off_peak_multiplier.max(1),
        )
    }

    pub fn article_list_ttl(&self) -> Duration {
        Duration::from_secs(self.article_list_ttl_seconds)
    }

    pub fn category_ttl(&self) -> Duration {
        Duration::from_secs(self.category_ttl_seconds)
    }

    pub fn article_ttl(&self) -> Duration {
        Duration::from_secs(self.article_ttl_seconds)
    }

    /// Page size, never below one.
    pub fn page_size(&self) -> usize {
        self.page_size.max(1)
    }

    /// Returns the article list limit as NonZeroUsize, clamping to 1 if zero.
    pub fn article_list_limit_non_zero(&self) -> NonZeroUsize {
        NonZeroUsize::new(self.article_list_limit).unwrap_or(NonZeroUsize::MIN)
    }

    /// Returns the category limit as NonZeroUsize, clamping to 1 if zero.
    pub fn category_limit_non_zero(&self) -> NonZeroUsize {
        NonZeroUsize::new(self.category_limit).unwrap_or(NonZeroUsize::MIN)
    }

    /// Returns the article limit as NonZeroUsize, clamping to 1 if zero.
    pub fn article_limit_non_zero(&self) -> NonZeroUsize {
        NonZeroUsize::new(self.article_limit).unwrap_or(NonZeroUsize::MIN)
    }
}
