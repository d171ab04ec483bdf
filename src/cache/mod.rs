//! Pressroom read caches.
//!
//! Three independent bounded stores sit in front of the document store:
//!
//! - **articles**: the newest published articles, as one list
//! - **categories**: the category reference table
//! - **article**: individual article records, with stale-while-revalidate
//!
//! Every store call goes through a [`QuotaGuard`], so running out of the
//! store's daily budget degrades to stale or empty answers instead of
//! errors. Editorial writes clear caches through [`CacheAdmin`].
//!
//! ```toml
//! [cache]
//! article_ttl_seconds = 600
//! peak_start_hour = 9
//! peak_end_hour = 23
//! off_peak_multiplier = 3
//! # ... see config.rs for all options
//! ```

mod admin;
mod clock;
mod collection;
mod config;
mod entity;
mod guard;
mod keys;
mod lock;
mod quota;
mod revalidate;
mod store;
mod window;

use std::sync::Arc;

pub use admin::{CacheAdmin, CacheReport, CacheStats, EditorialEvent};
pub use clock::{Clock, ManualClock, SystemClock};
pub use collection::{CollectionFetch, CollectionItem, CollectionLoader, CollectionStore};
pub use config::CacheConfig;
pub use entity::{EntityLoader, InFlightRefreshes, RefreshTicket};
pub use guard::{QuotaGuard, QuotaOutcome, ReadCost};
pub use keys::{CATEGORY_LIST_KEY, CacheName, CacheTarget, UnknownCacheName, article_list_key};
pub use quota::{QuotaLedger, QuotaLimits, QuotaSnapshot, WriteKind};
pub use revalidate::{revalidate_collections, spawn_revalidation};
pub use store::{CacheStore, EntryStats, Lookup, NamedCache, StoreStats};
pub use window::PeakWindow;

use crate::application::repos::{ARTICLES_COLLECTION, CATEGORIES_COLLECTION, DocumentStore};
use crate::domain::entities::{ArticleRecord, ArticleSummary, CategoryRecord};

/// The process-wide set of read caches, built once by the composition root.
pub struct ReadCaches {
    pub articles: CollectionLoader<ArticleSummary>,
    pub categories: CollectionLoader<CategoryRecord>,
    pub article: EntityLoader<ArticleRecord>,
    pub admin: CacheAdmin,
}

impl ReadCaches {
    pub fn build(
        config: &CacheConfig,
        limits: QuotaLimits,
        source: Arc<dyn DocumentStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let window = config.peak_window();
        let ledger = Arc::new(QuotaLedger::new(limits));
        let guard = QuotaGuard::new(Arc::clone(&ledger));

        let article_lists: Arc<CollectionStore<ArticleSummary>> = Arc::new(CacheStore::new(
            CacheName::Articles,
            config.article_list_limit_non_zero(),
            window,
            Arc::clone(&clock),
        ));
        let category_lists: Arc<CollectionStore<CategoryRecord>> = Arc::new(CacheStore::new(
            CacheName::Categories,
            config.category_limit_non_zero(),
            window,
            Arc::clone(&clock),
        ));
        let articles_by_id: Arc<CacheStore<String, ArticleRecord>> = Arc::new(CacheStore::new(
            CacheName::Article,
            config.article_limit_non_zero(),
            window,
            clock,
        ));

        let page_size = config.page_size();
        let articles = CollectionLoader::new(
            Arc::clone(&article_lists),
            article_list_key(page_size),
            config.article_list_ttl(),
            CollectionFetch::Published { limit: page_size },
            guard.clone(),
            Arc::clone(&source),
        );
        let categories = CollectionLoader::new(
            Arc::clone(&category_lists),
            CATEGORY_LIST_KEY,
            config.category_ttl(),
            CollectionFetch::All {
                collection: CATEGORIES_COLLECTION,
            },
            guard.clone(),
            Arc::clone(&source),
        );
        let article = EntityLoader::new(
            Arc::clone(&articles_by_id),
            ARTICLES_COLLECTION,
            config.article_ttl(),
            guard,
            source,
            config.coalesce_refreshes,
        );

        let admin = CacheAdmin::new(
            vec![
                article_lists as Arc<dyn NamedCache>,
                category_lists as Arc<dyn NamedCache>,
                Arc::clone(&articles_by_id) as Arc<dyn NamedCache>,
            ],
            articles_by_id,
            ledger,
        );

        Self {
            articles,
            categories,
            article,
            admin,
        }
    }
}
