//! Quota guard around backing-store calls.
//!
//! Running out of the store's daily budget is a normal operating condition
//! for this site, so it gets its own outcome instead of an error path.

use std::future::Future;
use std::sync::Arc;

use metrics::counter;
use tracing::warn;

use crate::application::repos::{ErrorKind, StoreError};
use crate::domain::entities::Document;

use super::quota::QuotaLedger;

const METRIC_STORE_EXHAUSTED: &str = "pressroom_store_exhausted_total";
const METRIC_STORE_ERROR: &str = "pressroom_store_error_total";

/// Outcome of one guarded store call. Produced and consumed immediately,
/// never cached.
#[derive(Debug)]
pub enum QuotaOutcome<T> {
    Ok(T),
    ResourceExhausted,
    OtherError(StoreError),
}

impl<T> QuotaOutcome<T> {
    pub fn ok(self) -> Option<T> {
        match self {
            QuotaOutcome::Ok(value) => Some(value),
            QuotaOutcome::ResourceExhausted | QuotaOutcome::OtherError(_) => None,
        }
    }

    pub fn is_exhausted(&self) -> bool {
        matches!(self, QuotaOutcome::ResourceExhausted)
    }
}

/// Number of billable document reads a store response represents.
pub trait ReadCost {
    fn read_cost(&self) -> u64;
}

impl ReadCost for Vec<Document> {
    // An empty result is still billed as one read.
    fn read_cost(&self) -> u64 {
        (self.len() as u64).max(1)
    }
}

impl ReadCost for Option<Document> {
    fn read_cost(&self) -> u64 {
        1
    }
}

#[derive(Debug, Clone)]
pub struct QuotaGuard {
    ledger: Arc<QuotaLedger>,
}

impl QuotaGuard {
    pub fn new(ledger: Arc<QuotaLedger>) -> Self {
        Self { ledger }
    }

    pub fn ledger(&self) -> &Arc<QuotaLedger> {
        &self.ledger
    }

    /// Await `operation` and classify its result. Never fails.
    pub async fn guard<T, F>(&self, op: &'static str, operation: F) -> QuotaOutcome<T>
    where
        F: Future<Output = Result<T, StoreError>>,
        T: ReadCost,
    {
        match operation.await {
            Ok(value) => {
                self.ledger.record_reads(value.read_cost());
                QuotaOutcome::Ok(value)
            }
            Err(err) if err.kind() == ErrorKind::ResourceExhausted => {
                self.ledger.record_exhausted();
                counter!(METRIC_STORE_EXHAUSTED, "op" => op).increment(1);
                warn!(
                    op,
                    error = %err,
                    "Backing store quota exhausted; serving degraded"
                );
                QuotaOutcome::ResourceExhausted
            }
            Err(err) => {
                counter!(METRIC_STORE_ERROR, "op" => op, "kind" => err.kind().as_str())
                    .increment(1);
                warn!(
                    op,
                    kind = %err.kind(),
                    error = %err,
                    "Backing store call failed"
                );
                QuotaOutcome::OtherError(err)
            }
        }
    }
}
