//! In-process document store used for offline mode and tests.

use std::{
    collections::BTreeMap,
    path::Path,
    sync::{
        Mutex, MutexGuard, PoisonError,
        atomic::{AtomicUsize, Ordering},
    },
};

use async_trait::async_trait;
use time::{OffsetDateTime, format_description::well_known::Rfc3339};
use tokio::sync::watch;
use tracing::{debug, info};

use crate::application::repos::{ARTICLES_COLLECTION, DocumentStore, ErrorKind, StoreError};
use crate::domain::{entities::Document, types::ArticleStatus};
use crate::infra::error::InfraError;

/// Calls made against a [`MemoryStore`], per operation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreCalls {
    pub scan_published: usize,
    pub scan_all: usize,
    pub get_by_id: usize,
}

#[derive(Debug, Clone, Copy)]
struct Failure {
    remaining: usize,
    kind: ErrorKind,
}

/// Document collections held in memory.
///
/// Counts every call, can be armed to fail the next calls with a given
/// [`ErrorKind`], and can be paused so that calls block until resumed.
pub struct MemoryStore {
    collections: Mutex<BTreeMap<String, BTreeMap<String, Document>>>,
    scan_published_calls: AtomicUsize,
    scan_all_calls: AtomicUsize,
    get_by_id_calls: AtomicUsize,
    failure: Mutex<Option<Failure>>,
    paused: watch::Sender<bool>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        let (paused, _) = watch::channel(false);
        Self {
            collections: Mutex::new(BTreeMap::new()),
            scan_published_calls: AtomicUsize::new(0),
            scan_all_calls: AtomicUsize::new(0),
            get_by_id_calls: AtomicUsize::new(0),
            failure: Mutex::new(None),
            paused,
        }
    }

    /// Load collections from a JSON object mapping collection names to
    /// arrays of `{ "id": ..., "fields": {...} }` documents.
    pub async fn from_seed_file(path: &Path) -> Result<Self, InfraError> {
        let raw = tokio::fs::read(path).await?;
        let seed: BTreeMap<String, Vec<Document>> = serde_json::from_slice(&raw).map_err(|err| {
            InfraError::configuration(format!("invalid seed file {}: {err}", path.display()))
        })?;

        let store = Self::new();
        let mut total = 0usize;
        for (collection, documents) in seed {
            total += documents.len();
            for document in documents {
                store.insert(&collection, document);
            }
        }
        info!(path = %path.display(), documents = total, "Memory store seeded");
        Ok(store)
    }

    pub fn insert(&self, collection: &str, document: Document) {
        self.collections()
            .entry(collection.to_string())
            .or_default()
            .insert(document.id.clone(), document);
    }

    pub fn remove(&self, collection: &str, id: &str) -> bool {
        self.collections()
            .get_mut(collection)
            .is_some_and(|documents| documents.remove(id).is_some())
    }

    pub fn calls(&self) -> StoreCalls {
        StoreCalls {
            scan_published: self.scan_published_calls.load(Ordering::SeqCst),
            scan_all: self.scan_all_calls.load(Ordering::SeqCst),
            get_by_id: self.get_by_id_calls.load(Ordering::SeqCst),
        }
    }

    /// Fail the next `count` calls with `kind`.
    pub fn fail_next(&self, count: usize, kind: ErrorKind) {
        let armed = (count > 0).then_some(Failure {
            remaining: count,
            kind,
        });
        *self.failure.lock().unwrap_or_else(PoisonError::into_inner) = armed;
    }

    /// Hold every subsequent call open until [`MemoryStore::resume`].
    pub fn pause(&self) {
        self.paused.send_replace(true);
    }

    pub fn resume(&self) {
        self.paused.send_replace(false);
    }

    fn collections(&self) -> MutexGuard<'_, BTreeMap<String, BTreeMap<String, Document>>> {
        self.collections
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    async fn enter(&self, counter: &AtomicUsize, op: &'static str) -> Result<(), StoreError> {
        counter.fetch_add(1, Ordering::SeqCst);

        let mut gate = self.paused.subscribe();
        // The sender lives as long as the store, so this only returns once resumed.
        let _ = gate.wait_for(|paused| !*paused).await;

        let mut failure = self.failure.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(armed) = failure.as_mut() {
            let kind = armed.kind;
            armed.remaining -= 1;
            if armed.remaining == 0 {
                *failure = None;
            }
            debug!(op, %kind, "Injected store failure");
            return Err(StoreError::new(kind, format!("injected {kind} on {op}")));
        }
        Ok(())
    }
}

fn published_at(document: &Document) -> Option<OffsetDateTime> {
    document
        .fields
        .get("publishedAt")
        .and_then(|value| value.as_str())
        .and_then(|raw| OffsetDateTime::parse(raw, &Rfc3339).ok())
}

fn is_published(document: &Document) -> bool {
    document
        .fields
        .get("status")
        .and_then(|value| value.as_str())
        .is_some_and(|status| status == ArticleStatus::Published.as_str())
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn scan_published(&self, limit: usize) -> Result<Vec<Document>, StoreError> {
        self.enter(&self.scan_published_calls, "scan_published")
            .await?;

        let mut documents: Vec<Document> = self
            .collections()
            .get(ARTICLES_COLLECTION)
            .map(|articles| {
                articles
                    .values()
                    .filter(|document| is_published(document))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        documents.sort_by(|a, b| published_at(b).cmp(&published_at(a)));
        documents.truncate(limit);
        Ok(documents)
    }

    async fn scan_all(&self, collection: &str) -> Result<Vec<Document>, StoreError> {
        self.enter(&self.scan_all_calls, "scan_all").await?;

        Ok(self
            .collections()
            .get(collection)
            .map(|documents| documents.values().cloned().collect())
            .unwrap_or_default())
    }

    async fn get_by_id(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError> {
        self.enter(&self.get_by_id_calls, "get_by_id").await?;

        Ok(self
            .collections()
            .get(collection)
            .and_then(|documents| documents.get(id))
            .cloned())
    }
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, time::Duration};

    use serde_json::json;

    use super::*;
    use crate::application::repos::CATEGORIES_COLLECTION;

    fn article(id: &str, status: &str, published_at: &str) -> Document {
        Document::new(
            id,
            json!({ "slug": id, "title": id, "status": status, "publishedAt": published_at }),
        )
    }

    #[tokio::test]
    async fn scan_published_filters_orders_and_limits() {
        let store = MemoryStore::new();
        store.insert(ARTICLES_COLLECTION, article("old", "published", "2026-01-01T00:00:00Z"));
        store.insert(ARTICLES_COLLECTION, article("new", "published", "2026-03-01T00:00:00Z"));
        store.insert(ARTICLES_COLLECTION, article("mid", "published", "2026-02-01T00:00:00+02:00"));
        store.insert(ARTICLES_COLLECTION, article("draft", "draft", "2026-04-01T00:00:00Z"));

        let ids: Vec<String> = store
            .scan_published(2)
            .await
            .expect("scan succeeds")
            .into_iter()
            .map(|document| document.id)
            .collect();

        assert_eq!(ids, vec!["new".to_string(), "mid".to_string()]);
        assert_eq!(store.calls().scan_published, 1);
    }

    #[tokio::test]
    async fn get_by_id_and_remove() {
        let store = MemoryStore::new();
        store.insert(CATEGORIES_COLLECTION, Document::new("c1", json!({ "name": "Sport" })));

        let found = store
            .get_by_id(CATEGORIES_COLLECTION, "c1")
            .await
            .expect("read succeeds");
        assert_eq!(found.map(|document| document.id), Some("c1".to_string()));

        assert!(store.remove(CATEGORIES_COLLECTION, "c1"));
        assert!(!store.remove(CATEGORIES_COLLECTION, "c1"));
        assert_eq!(
            store.get_by_id(CATEGORIES_COLLECTION, "c1").await.expect("read succeeds"),
            None
        );
        assert_eq!(
            store.get_by_id("missing", "c1").await.expect("read succeeds"),
            None
        );
        assert_eq!(store.calls().get_by_id, 3);
    }

    #[tokio::test]
    async fn armed_failures_are_consumed_in_order() {
        let store = MemoryStore::new();
        store.fail_next(2, ErrorKind::ResourceExhausted);

        for _ in 0..2 {
            let err = store.scan_all(CATEGORIES_COLLECTION).await.expect_err("armed");
            assert_eq!(err.kind(), ErrorKind::ResourceExhausted);
        }
        assert!(store.scan_all(CATEGORIES_COLLECTION).await.is_ok());
        assert_eq!(store.calls().scan_all, 3);
    }

    #[tokio::test]
    async fn paused_calls_wait_for_resume() {
        let store = Arc::new(MemoryStore::new());
        store.insert(ARTICLES_COLLECTION, article("a1", "published", "2026-01-01T00:00:00Z"));
        store.pause();

        let pending = tokio::spawn({
            let store = Arc::clone(&store);
            async move { store.get_by_id(ARTICLES_COLLECTION, "a1").await }
        });

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!pending.is_finished());
        assert_eq!(store.calls().get_by_id, 1);

        store.resume();
        let document = pending
            .await
            .expect("task joins")
            .expect("read succeeds")
            .expect("document exists");
        assert_eq!(document.id, "a1");
    }

    #[tokio::test]
    async fn seed_file_populates_collections() {
        let file = tempfile::NamedTempFile::new().expect("temp file");
        let seed = json!({
            "articles": [
                { "id": "a1", "fields": { "slug": "a1", "title": "One", "status": "published", "publishedAt": "2026-01-01T00:00:00Z" } }
            ],
            "categories": [
                { "id": "c1", "fields": { "name": "Sport", "slug": "sport" } },
                { "id": "c2", "fields": { "name": "World", "slug": "world" } }
            ]
        });
        std::fs::write(file.path(), seed.to_string()).expect("write seed");

        let store = MemoryStore::from_seed_file(file.path())
            .await
            .expect("seed loads");

        assert_eq!(store.scan_published(10).await.expect("scan").len(), 1);
        assert_eq!(
            store.scan_all(CATEGORIES_COLLECTION).await.expect("scan").len(),
            2
        );
    }

    #[tokio::test]
    async fn invalid_seed_file_is_a_configuration_error() {
        let file = tempfile::NamedTempFile::new().expect("temp file");
        std::fs::write(file.path(), "[1, 2, 3]").expect("write seed");

        let err = MemoryStore::from_seed_file(file.path())
            .await
            .err()
            .expect("seed rejected");
        assert!(matches!(err, InfraError::Configuration { .. }));
    }
}
