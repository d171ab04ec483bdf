//! Periodic revalidation of the collection caches.
//!
//! Runs on a fixed wall-clock interval on top of per-request TTL checks, so
//! lists converge even when nobody reads them past their TTL.

use std::sync::Arc;
use std::time::{Duration, Instant};

use metrics::histogram;
use tokio::task::JoinHandle;
use tracing::info;

use super::ReadCaches;

const METRIC_REVALIDATION_MS: &str = "pressroom_revalidation_ms";

/// Refetch both collections once. Returns how many were refreshed.
pub async fn revalidate_collections(caches: &ReadCaches) -> usize {
    let started_at = Instant::now();
    let (articles, categories) = tokio::join!(caches.articles.refresh(), caches.categories.refresh());
    let refreshed = usize::from(articles) + usize::from(categories);
    let elapsed = started_at.elapsed();
    histogram!(METRIC_REVALIDATION_MS).record(elapsed.as_secs_f64() * 1000.0);

    info!(
        refreshed,
        articles,
        categories,
        elapsed_ms = elapsed.as_millis() as u64,
        "Periodic revalidation finished"
    );
    refreshed
}

/// Spawn the revalidation loop. The first tick is skipped; the loop runs
/// until the returned handle is aborted.
pub fn spawn_revalidation(caches: Arc<ReadCaches>, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        interval.tick().await;
        loop {
            interval.tick().await;
            revalidate_collections(&caches).await;
        }
    })
}
