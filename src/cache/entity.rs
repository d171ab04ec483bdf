//! Read-through loader for single records with stale-while-revalidate.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use metrics::counter;
use tracing::{debug, error, instrument};

use crate::application::repos::{DocumentStore, ErrorKind};
use crate::domain::entities::FromDocument;

use super::guard::{QuotaGuard, QuotaOutcome};
use super::keys::CacheName;
use super::store::{CacheStore, Lookup};

const METRIC_REFRESH: &str = "pressroom_refresh_total";

/// Ids that currently have a background refresh running.
#[derive(Debug, Default, Clone)]
pub struct InFlightRefreshes {
    ids: Arc<DashMap<String, ()>>,
}

impl InFlightRefreshes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the refresh slot for `id`, or `None` if one is already running.
    pub fn try_acquire(&self, id: &str) -> Option<RefreshTicket> {
        use dashmap::mapref::entry::Entry;

        match self.ids.entry(id.to_string()) {
            Entry::Vacant(vacant) => {
                vacant.insert(());
                Some(RefreshTicket {
                    id: id.to_string(),
                    ids: Arc::clone(&self.ids),
                })
            }
            Entry::Occupied(_) => None,
        }
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

/// Releases the refresh slot when dropped.
#[derive(Debug)]
pub struct RefreshTicket {
    id: String,
    ids: Arc<DashMap<String, ()>>,
}

impl Drop for RefreshTicket {
    fn drop(&mut self) {
        self.ids.remove(&self.id);
    }
}

struct EntityInner<T: FromDocument + Clone + Send + Sync + 'static> {
    cache: Arc<CacheStore<String, T>>,
    collection: &'static str,
    base_ttl: Duration,
    guard: QuotaGuard,
    source: Arc<dyn DocumentStore>,
    in_flight: InFlightRefreshes,
    coalesce: bool,
}

impl<T: FromDocument + Clone + Send + Sync + 'static> EntityInner<T> {
    async fn fetch(&self, id: &str) -> FetchResult<T> {
        let outcome = self
            .guard
            .guard("get_by_id", self.source.get_by_id(self.collection, id))
            .await;

        let document = match outcome {
            QuotaOutcome::Ok(Some(document)) => document,
            QuotaOutcome::Ok(None) => return FetchResult::NotFound,
            QuotaOutcome::OtherError(err) if err.kind() == ErrorKind::NotFound => {
                return FetchResult::NotFound;
            }
            QuotaOutcome::ResourceExhausted | QuotaOutcome::OtherError(_) => {
                return FetchResult::Failed;
            }
        };

        match T::from_document(&document) {
            Ok(record) => {
                self.cache
                    .set(id.to_string(), record.clone(), self.base_ttl);
                FetchResult::Found(record)
            }
            Err(err) => {
                error!(
                    cache = %self.cache.name(),
                    id,
                    error = %err,
                    "Stored record is malformed"
                );
                FetchResult::Failed
            }
        }
    }
}

enum FetchResult<T> {
    Found(T),
    NotFound,
    Failed,
}

/// Loader for individually addressed records.
///
/// A stale hit is answered immediately and refreshed in a detached task.
/// With coalescing on, at most one such task runs per id; without it every
/// stale read schedules its own refresh.
pub struct EntityLoader<T: FromDocument + Clone + Send + Sync + 'static> {
    inner: Arc<EntityInner<T>>,
}

impl<T: FromDocument + Clone + Send + Sync + 'static> Clone for EntityLoader<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: FromDocument + Clone + Send + Sync + 'static> EntityLoader<T> {
    pub fn new(
        cache: Arc<CacheStore<String, T>>,
        collection: &'static str,
        base_ttl: Duration,
        guard: QuotaGuard,
        source: Arc<dyn DocumentStore>,
        coalesce: bool,
    ) -> Self {
        Self {
            inner: Arc::new(EntityInner {
                cache,
                collection,
                base_ttl,
                guard,
                source,
                in_flight: InFlightRefreshes::new(),
                coalesce,
            }),
        }
    }

    pub fn name(&self) -> CacheName {
        self.inner.cache.name()
    }

    pub fn cache(&self) -> &Arc<CacheStore<String, T>> {
        &self.inner.cache
    }

    /// Number of background refreshes currently running (coalesced mode only).
    pub fn refreshes_in_flight(&self) -> usize {
        self.inner.in_flight.len()
    }

    /// Record `id`, or `None` when it does not exist or cannot be fetched
    /// and nothing is cached for it.
    #[instrument(skip(self), fields(cache = %self.inner.cache.name()))]
    pub async fn load(&self, id: &str) -> Option<T> {
        let key = id.to_string();
        match self.inner.cache.get(&key) {
            Lookup::Fresh(record) => Some(record),
            Lookup::Stale(record) => {
                self.schedule_refresh(key);
                Some(record)
            }
            Lookup::Miss => match self.inner.fetch(id).await {
                FetchResult::Found(record) => Some(record),
                FetchResult::NotFound | FetchResult::Failed => None,
            },
        }
    }

    fn schedule_refresh(&self, id: String) {
        let ticket = if self.inner.coalesce {
            match self.inner.in_flight.try_acquire(&id) {
                Some(ticket) => Some(ticket),
                None => {
                    counter!(METRIC_REFRESH, "outcome" => "coalesced").increment(1);
                    debug!(id, "Refresh already in flight");
                    return;
                }
            }
        } else {
            None
        };

        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            let _ticket = ticket;
            let outcome = match inner.fetch(&id).await {
                FetchResult::Found(_) => "refreshed",
                // Only invalidation or eviction removes an entry; the stale
                // copy stays and the next stale read tries again.
                FetchResult::NotFound => "not_found",
                FetchResult::Failed => "failed",
            };
            counter!(METRIC_REFRESH, "outcome" => outcome).increment(1);
            debug!(id, outcome, "Background refresh finished");
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ticket_releases_slot_on_drop() {
        let in_flight = InFlightRefreshes::new();

        let ticket = in_flight.try_acquire("a1").expect("slot is free");
        assert!(in_flight.try_acquire("a1").is_none());
        assert!(in_flight.try_acquire("a2").is_some());
        assert_eq!(in_flight.len(), 1);

        drop(ticket);
        assert!(in_flight.is_empty());
        assert!(in_flight.try_acquire("a1").is_some());
    }
}
