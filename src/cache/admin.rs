//! Invalidation and introspection surface over the named caches.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use time::{OffsetDateTime, format_description::well_known::Rfc3339};
use tracing::info;

use crate::domain::entities::ArticleRecord;

use super::keys::{CacheName, CacheTarget};
use super::quota::{QuotaLedger, QuotaSnapshot, WriteKind};
use super::store::{CacheStore, NamedCache, StoreStats};

/// A completed editorial write on a cached record type.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EditorialEvent {
    ArticleCreated { id: String },
    ArticleUpdated { id: String },
    ArticleDeleted { id: String },
    CategoryChanged,
    CategoryDeleted,
}

#[derive(Debug, Clone, Serialize)]
pub struct CacheStats {
    pub caches: Vec<StoreStats>,
    pub quota: QuotaSnapshot,
}

/// Exportable snapshot for offline analysis.
#[derive(Debug, Clone, Serialize)]
pub struct CacheReport {
    pub generated_at: String,
    pub total_entries: usize,
    pub total_capacity: usize,
    pub caches: Vec<StoreStats>,
    pub quota: QuotaSnapshot,
}

pub struct CacheAdmin {
    caches: Vec<Arc<dyn NamedCache>>,
    articles_by_id: Arc<CacheStore<String, ArticleRecord>>,
    ledger: Arc<QuotaLedger>,
}

impl CacheAdmin {
    pub fn new(
        caches: Vec<Arc<dyn NamedCache>>,
        articles_by_id: Arc<CacheStore<String, ArticleRecord>>,
        ledger: Arc<QuotaLedger>,
    ) -> Self {
        Self {
            caches,
            articles_by_id,
            ledger,
        }
    }

    /// Clear the addressed cache(s). The next read of anything they held is
    /// a guaranteed miss. Returns the number of entries dropped.
    pub fn invalidate(&self, target: CacheTarget) -> usize {
        let mut removed = 0;
        for cache in self.addressed(target) {
            let dropped = cache.invalidate_all();
            info!(cache = %cache.name(), dropped, "Cache invalidated");
            removed += dropped;
        }
        removed
    }

    /// Invalidate whatever a completed editorial write may have made wrong.
    pub fn record_write(&self, event: &EditorialEvent) {
        match event {
            EditorialEvent::ArticleCreated { id } | EditorialEvent::ArticleUpdated { id } => {
                self.ledger.record_write(WriteKind::Write);
                self.drop_article(id);
                self.invalidate(CacheName::Articles.into());
            }
            EditorialEvent::ArticleDeleted { id } => {
                self.ledger.record_write(WriteKind::Delete);
                self.drop_article(id);
                self.invalidate(CacheName::Articles.into());
            }
            EditorialEvent::CategoryChanged => {
                self.ledger.record_write(WriteKind::Write);
                self.invalidate(CacheName::Categories.into());
                self.invalidate(CacheName::Articles.into());
            }
            EditorialEvent::CategoryDeleted => {
                self.ledger.record_write(WriteKind::Delete);
                self.invalidate(CacheName::Categories.into());
                self.invalidate(CacheName::Articles.into());
            }
        }
    }

    pub fn stats(&self, target: CacheTarget) -> CacheStats {
        CacheStats {
            caches: self.addressed(target).map(|cache| cache.stats()).collect(),
            quota: self.ledger.snapshot(),
        }
    }

    pub fn report(&self) -> CacheReport {
        self.report_at(OffsetDateTime::now_utc())
    }

    fn report_at(&self, now: OffsetDateTime) -> CacheReport {
        let caches: Vec<StoreStats> = self.caches.iter().map(|cache| cache.stats()).collect();
        CacheReport {
            generated_at: now
                .format(&Rfc3339)
                .unwrap_or_else(|_| now.unix_timestamp().to_string()),
            total_entries: caches.iter().map(|stats| stats.size).sum(),
            total_capacity: caches.iter().map(|stats| stats.capacity).sum(),
            caches,
            quota: self.ledger.snapshot(),
        }
    }

    fn addressed(&self, target: CacheTarget) -> impl Iterator<Item = &Arc<dyn NamedCache>> {
        self.caches
            .iter()
            .filter(move |cache| target.includes(cache.name()))
    }

    fn drop_article(&self, id: &str) {
        if self.articles_by_id.invalidate(&id.to_string()) {
            info!(cache = %CacheName::Article, id, "Cached article dropped after write");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::num::NonZeroUsize;
    use std::time::Duration;

    use time::macros::datetime;

    use super::*;
    use crate::cache::clock::{Clock, ManualClock};
    use crate::cache::window::PeakWindow;
    use crate::domain::types::ArticleStatus;

    const TTL: Duration = Duration::from_secs(60);

    struct Fixture {
        admin: CacheAdmin,
        lists: Arc<CacheStore<String, u32>>,
        categories: Arc<CacheStore<String, u32>>,
        articles: Arc<CacheStore<String, ArticleRecord>>,
    }

    fn article(id: &str) -> ArticleRecord {
        ArticleRecord {
            id: id.to_string(),
            slug: id.to_string(),
            title: "Title".to_string(),
            excerpt: String::new(),
            body_html: String::new(),
            author: String::new(),
            category_id: None,
            tags: Vec::new(),
            cover_image: None,
            status: ArticleStatus::Published,
            published_at: None,
            updated_at: None,
            view_count: 0,
        }
    }

    fn fixture() -> Fixture {
        let clock: Arc<dyn Clock> = Arc::new(ManualClock::new(14));
        let four = NonZeroUsize::new(4).expect("non-zero");
        let lists = Arc::new(CacheStore::new(
            CacheName::Articles,
            four,
            PeakWindow::default(),
            Arc::clone(&clock),
        ));
        let categories = Arc::new(CacheStore::new(
            CacheName::Categories,
            four,
            PeakWindow::default(),
            Arc::clone(&clock),
        ));
        let articles = Arc::new(CacheStore::new(
            CacheName::Article,
            four,
            PeakWindow::default(),
            clock,
        ));
        let admin = CacheAdmin::new(
            vec![
                Arc::clone(&lists) as Arc<dyn NamedCache>,
                Arc::clone(&categories) as Arc<dyn NamedCache>,
                Arc::clone(&articles) as Arc<dyn NamedCache>,
            ],
            Arc::clone(&articles),
            Arc::new(QuotaLedger::default()),
        );
        lists.set("published:100".to_string(), 1, TTL);
        categories.set("categories:all".to_string(), 2, TTL);
        articles.set("a1".to_string(), article("a1"), TTL);
        articles.set("a2".to_string(), article("a2"), TTL);
        Fixture {
            admin,
            lists,
            categories,
            articles,
        }
    }

    #[test]
    fn invalidate_one_leaves_others() {
        let f = fixture();

        assert_eq!(f.admin.invalidate(CacheTarget::One(CacheName::Article)), 2);
        assert!(f.articles.is_empty());
        assert_eq!(f.lists.len(), 1);
        assert_eq!(f.categories.len(), 1);
    }

    #[test]
    fn invalidate_all_clears_everything() {
        let f = fixture();

        assert_eq!(f.admin.invalidate(CacheTarget::All), 4);
        assert!(f.lists.is_empty() && f.categories.is_empty() && f.articles.is_empty());
    }

    #[test]
    fn article_write_drops_list_and_that_article() {
        let f = fixture();

        f.admin.record_write(&EditorialEvent::ArticleUpdated {
            id: "a1".to_string(),
        });

        assert!(f.lists.is_empty());
        assert!(!f.articles.contains(&"a1".to_string()));
        assert!(f.articles.contains(&"a2".to_string()));
        assert_eq!(f.categories.len(), 1);
        assert_eq!(f.admin.stats(CacheTarget::All).quota.writes_used, 1);
    }

    #[test]
    fn category_delete_drops_categories_and_list() {
        let f = fixture();

        f.admin.record_write(&EditorialEvent::CategoryDeleted);

        assert!(f.categories.is_empty());
        assert!(f.lists.is_empty());
        assert_eq!(f.articles.len(), 2);
        assert_eq!(f.admin.stats(CacheTarget::All).quota.deletes_used, 1);
    }

    #[test]
    fn stats_filter_by_target() {
        let f = fixture();

        let stats = f.admin.stats(CacheTarget::One(CacheName::Categories));
        assert_eq!(stats.caches.len(), 1);
        assert_eq!(stats.caches[0].name, CacheName::Categories);

        assert_eq!(f.admin.stats(CacheTarget::All).caches.len(), 3);
    }

    #[test]
    fn report_is_timestamped_and_totalled() {
        let f = fixture();

        let report = f.admin.report_at(datetime!(2026-10-19 09:30 UTC));
        assert_eq!(report.generated_at, "2026-10-19T09:30:00Z");
        assert_eq!(report.total_entries, 4);
        assert_eq!(report.total_capacity, 12);

        let json = serde_json::to_value(&report).expect("report serializes");
        assert_eq!(json["caches"][2]["name"], "article");
    }

    #[test]
    fn editorial_events_decode_from_tagged_json() {
        let event: EditorialEvent =
            serde_json::from_str(r#"{"kind":"article_deleted","id":"a9"}"#).expect("decodes");
        assert_eq!(
            event,
            EditorialEvent::ArticleDeleted {
                id: "a9".to_string()
            }
        );

        let event: EditorialEvent =
            serde_json::from_str(r#"{"kind":"category_changed"}"#).expect("decodes");
        assert_eq!(event, EditorialEvent::CategoryChanged);
    }
}
