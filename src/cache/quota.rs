//! Daily operation budget of the backing store.
//!
//! The store enforces its ceiling on its own; the ledger only mirrors usage
//! so operators can see how close the site is running to it.

use std::sync::Mutex;

use metrics::gauge;
use serde::Serialize;
use time::{Date, OffsetDateTime, format_description::well_known::Rfc3339};

use super::lock::lock_recovering;

const DEFAULT_DAILY_READS: u64 = 50_000;
const DEFAULT_DAILY_WRITES: u64 = 20_000;
const DEFAULT_DAILY_DELETES: u64 = 20_000;

const METRIC_QUOTA_READS_USED: &str = "pressroom_quota_reads_used";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct QuotaLimits {
    pub daily_reads: u64,
    pub daily_writes: u64,
    pub daily_deletes: u64,
}

impl Default for QuotaLimits {
    fn default() -> Self {
        Self {
            daily_reads: DEFAULT_DAILY_READS,
            daily_writes: DEFAULT_DAILY_WRITES,
            daily_deletes: DEFAULT_DAILY_DELETES,
        }
    }
}

impl From<&crate::config::QuotaSettings> for QuotaLimits {
    fn from(settings: &crate::config::QuotaSettings) -> Self {
        Self {
            daily_reads: settings.daily_reads.get(),
            daily_writes: settings.daily_writes.get(),
            daily_deletes: settings.daily_deletes.get(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteKind {
    Write,
    Delete,
}

#[derive(Debug)]
struct DayUsage {
    day: Date,
    reads: u64,
    writes: u64,
    deletes: u64,
    exhausted_at: Option<OffsetDateTime>,
}

impl DayUsage {
    fn starting(day: Date) -> Self {
        Self {
            day,
            reads: 0,
            writes: 0,
            deletes: 0,
            exhausted_at: None,
        }
    }

    fn roll_to(&mut self, day: Date) {
        if day != self.day {
            *self = Self::starting(day);
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuotaSnapshot {
    pub day: String,
    pub reads_used: u64,
    pub reads_remaining: u64,
    pub writes_used: u64,
    pub writes_remaining: u64,
    pub deletes_used: u64,
    pub deletes_remaining: u64,
    pub exhausted_at: Option<String>,
}

#[derive(Debug)]
pub struct QuotaLedger {
    limits: QuotaLimits,
    usage: Mutex<DayUsage>,
}

impl QuotaLedger {
    pub fn new(limits: QuotaLimits) -> Self {
        Self::starting_at(limits, OffsetDateTime::now_utc())
    }

    fn starting_at(limits: QuotaLimits, now: OffsetDateTime) -> Self {
        Self {
            limits,
            usage: Mutex::new(DayUsage::starting(now.date())),
        }
    }

    pub fn record_reads(&self, count: u64) {
        self.record_reads_at(OffsetDateTime::now_utc(), count);
    }

    pub fn record_write(&self, kind: WriteKind) {
        self.record_write_at(OffsetDateTime::now_utc(), kind);
    }

    /// Note that the store refused a call for quota reasons.
    pub fn record_exhausted(&self) {
        self.record_exhausted_at(OffsetDateTime::now_utc());
    }

    pub fn snapshot(&self) -> QuotaSnapshot {
        self.snapshot_at(OffsetDateTime::now_utc())
    }

    fn record_reads_at(&self, now: OffsetDateTime, count: u64) {
        let mut usage = lock_recovering(&self.usage, "quota", "record_reads");
        usage.roll_to(now.date());
        usage.reads = usage.reads.saturating_add(count);
        gauge!(METRIC_QUOTA_READS_USED).set(usage.reads as f64);
    }

    fn record_write_at(&self, now: OffsetDateTime, kind: WriteKind) {
        let mut usage = lock_recovering(&self.usage, "quota", "record_write");
        usage.roll_to(now.date());
        match kind {
            WriteKind::Write => usage.writes = usage.writes.saturating_add(1),
            WriteKind::Delete => usage.deletes = usage.deletes.saturating_add(1),
        }
    }

    fn record_exhausted_at(&self, now: OffsetDateTime) {
        let mut usage = lock_recovering(&self.usage, "quota", "record_exhausted");
        usage.roll_to(now.date());
        usage.exhausted_at.get_or_insert(now);
    }

    fn snapshot_at(&self, now: OffsetDateTime) -> QuotaSnapshot {
        let mut usage = lock_recovering(&self.usage, "quota", "snapshot");
        usage.roll_to(now.date());

        // Once the store has said no, nothing is left today whatever we counted.
        let reads_remaining = if usage.exhausted_at.is_some() {
            0
        } else {
            self.limits.daily_reads.saturating_sub(usage.reads)
        };

        QuotaSnapshot {
            day: usage.day.to_string(),
            reads_used: usage.reads,
            reads_remaining,
            writes_used: usage.writes,
            writes_remaining: self.limits.daily_writes.saturating_sub(usage.writes),
            deletes_used: usage.deletes,
            deletes_remaining: self.limits.daily_deletes.saturating_sub(usage.deletes),
            exhausted_at: usage
                .exhausted_at
                .and_then(|instant| instant.format(&Rfc3339).ok()),
        }
    }
}

impl Default for QuotaLedger {
    fn default() -> Self {
        Self::new(QuotaLimits::default())
    }
}
