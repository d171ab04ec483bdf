//! Read-through loaders for whole collections (article feed, categories).

use std::cmp::Reverse;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, instrument, warn};

use crate::application::repos::DocumentStore;
use crate::domain::entities::{ArticleSummary, CategoryRecord, Document, FromDocument};

use super::guard::{QuotaGuard, QuotaOutcome};
use super::keys::CacheName;
use super::store::{CacheStore, Lookup};

pub type CollectionStore<T> = CacheStore<String, Arc<Vec<T>>>;

/// How a collection is read from the backing store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectionFetch {
    /// Newest published articles, at most `limit`.
    Published { limit: usize },
    /// A whole small collection.
    All { collection: &'static str },
}

/// Item types a [`CollectionLoader`] can hold.
pub trait CollectionItem: FromDocument + Clone + Send + Sync + 'static {
    /// Put freshly decoded items into the order the site renders them in.
    fn arrange(items: &mut Vec<Self>);
}

impl CollectionItem for ArticleSummary {
    fn arrange(items: &mut Vec<Self>) {
        items.retain(|article| article.status.is_public());
        items.sort_by_key(|article| Reverse(article.published_at));
    }
}

impl CollectionItem for CategoryRecord {
    fn arrange(items: &mut Vec<Self>) {
        items.sort_by(|a, b| a.position.cmp(&b.position).then_with(|| a.name.cmp(&b.name)));
    }
}

pub struct CollectionLoader<T: CollectionItem> {
    cache: Arc<CollectionStore<T>>,
    key: String,
    base_ttl: Duration,
    fetch: CollectionFetch,
    guard: QuotaGuard,
    source: Arc<dyn DocumentStore>,
}

impl<T: CollectionItem> CollectionLoader<T> {
    pub fn new(
        cache: Arc<CollectionStore<T>>,
        key: impl Into<String>,
        base_ttl: Duration,
        fetch: CollectionFetch,
        guard: QuotaGuard,
        source: Arc<dyn DocumentStore>,
    ) -> Self {
        Self {
            cache,
            key: key.into(),
            base_ttl,
            fetch,
            guard,
            source,
        }
    }

    pub fn name(&self) -> CacheName {
        self.cache.name()
    }

    pub fn cache(&self) -> &Arc<CollectionStore<T>> {
        &self.cache
    }

    /// Current collection. Serves the cached copy while fresh; otherwise
    /// refetches, falling back to the stale copy or an empty list when the
    /// store cannot answer.
    #[instrument(skip(self), fields(cache = %self.cache.name()))]
    pub async fn load(&self) -> Arc<Vec<T>> {
        let stale = match self.cache.get(&self.key) {
            Lookup::Fresh(items) => return items,
            Lookup::Stale(items) => Some(items),
            Lookup::Miss => None,
        };

        if let Some(items) = self.fetch().await {
            return items;
        }

        match stale {
            Some(items) => {
                warn!(
                    cache = %self.cache.name(),
                    degraded = "stale",
                    items = items.len(),
                    "Serving stale collection"
                );
                items
            }
            None => {
                warn!(
                    cache = %self.cache.name(),
                    degraded = "empty",
                    "Serving empty collection"
                );
                Arc::default()
            }
        }
    }

    /// Refetch regardless of freshness. On failure the cached copy stays.
    ///
    /// Returns whether the cache was refreshed.
    #[instrument(skip(self), fields(cache = %self.cache.name()))]
    pub async fn refresh(&self) -> bool {
        self.fetch().await.is_some()
    }

    async fn fetch(&self) -> Option<Arc<Vec<T>>> {
        let outcome = match self.fetch {
            CollectionFetch::Published { limit } => {
                self.guard
                    .guard("scan_published", self.source.scan_published(limit))
                    .await
            }
            CollectionFetch::All { collection } => {
                self.guard
                    .guard("scan_all", self.source.scan_all(collection))
                    .await
            }
        };

        let documents = match outcome {
            QuotaOutcome::Ok(documents) => documents,
            QuotaOutcome::ResourceExhausted | QuotaOutcome::OtherError(_) => return None,
        };

        let items = Arc::new(self.decode(documents));
        self.cache
            .set(self.key.clone(), Arc::clone(&items), self.base_ttl);
        debug!(
            cache = %self.cache.name(),
            items = items.len(),
            "Collection refreshed from store"
        );
        Some(items)
    }

    fn decode(&self, documents: Vec<Document>) -> Vec<T> {
        let mut items: Vec<T> = documents
            .iter()
            .filter_map(|document| match T::from_document(document) {
                Ok(item) => Some(item),
                Err(err) => {
                    error!(
                        cache = %self.cache.name(),
                        document_id = %document.id,
                        error = %err,
                        "Skipping malformed document"
                    );
                    None
                }
            })
            .collect();

        T::arrange(&mut items);
        if let CollectionFetch::Published { limit } = self.fetch {
            items.truncate(limit);
        }
        items
    }
}
