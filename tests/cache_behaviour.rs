use std::sync::Arc;
use std::time::Duration;

use pressroom::application::repos::{
    ARTICLES_COLLECTION, CATEGORIES_COLLECTION, DocumentStore, ErrorKind,
};
use pressroom::cache::{
    CacheConfig, CacheName, CacheTarget, Clock, EditorialEvent, ManualClock, QuotaLimits,
    ReadCaches, revalidate_collections,
};
use pressroom::domain::entities::Document;
use pressroom::infra::store::MemoryStore;
use serde_json::json;

struct Harness {
    caches: ReadCaches,
    store: Arc<MemoryStore>,
    clock: Arc<ManualClock>,
}

fn harness_with(config: CacheConfig, hour: u8) -> Harness {
    let store = Arc::new(MemoryStore::new());
    let clock = Arc::new(ManualClock::new(hour));
    let caches = ReadCaches::build(
        &config,
        QuotaLimits::default(),
        Arc::clone(&store) as Arc<dyn DocumentStore>,
        Arc::clone(&clock) as Arc<dyn Clock>,
    );
    Harness {
        caches,
        store,
        clock,
    }
}

fn harness(hour: u8) -> Harness {
    harness_with(CacheConfig::default(), hour)
}

fn article(id: &str, title: &str, published_at: &str) -> Document {
    Document::new(
        id,
        json!({
            "slug": id,
            "title": title,
            "status": "published",
            "publishedAt": published_at,
        }),
    )
}

fn category(id: &str, name: &str, position: i32) -> Document {
    Document::new(
        id,
        json!({ "name": name, "slug": name.to_lowercase(), "position": position }),
    )
}

async fn eventually(what: &str, mut check: impl FnMut() -> bool) {
    for _ in 0..400 {
        if check() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("timed out waiting for {what}");
}

#[tokio::test]
async fn stale_article_is_served_at_once_and_refreshed_once() {
    let h = harness(14);
    h.store.insert(
        ARTICLES_COLLECTION,
        article("a1", "Budget vote delayed", "2026-03-01T08:30:00Z"),
    );

    let first = h.caches.article.load("a1").await.expect("a1 exists");
    assert_eq!(first.title, "Budget vote delayed");
    assert_eq!(h.store.calls().get_by_id, 1);

    h.clock.advance(Duration::from_secs(700));
    h.store.pause();

    let stale = tokio::time::timeout(Duration::from_millis(200), h.caches.article.load("a1"))
        .await
        .expect("stale value is returned without waiting on the store")
        .expect("stale copy is served");
    assert_eq!(stale.title, "Budget vote delayed");

    eventually("background refresh to reach the store", || {
        h.store.calls().get_by_id == 2
    })
    .await;

    // A second stale read while the refresh is held open does not start another.
    let again = h.caches.article.load("a1").await.expect("stale copy");
    assert_eq!(again.title, "Budget vote delayed");
    assert_eq!(h.caches.article.refreshes_in_flight(), 1);

    h.store.insert(
        ARTICLES_COLLECTION,
        article("a1", "Budget vote passes", "2026-03-01T08:30:00Z"),
    );
    h.store.resume();
    eventually("refresh to finish", || {
        h.caches.article.refreshes_in_flight() == 0
    })
    .await;

    let refreshed = h.caches.article.load("a1").await.expect("a1 exists");
    assert_eq!(refreshed.title, "Budget vote passes");
    assert_eq!(h.store.calls().get_by_id, 2);
}

#[tokio::test]
async fn uncoalesced_stale_reads_each_schedule_a_refresh() {
    let h = harness_with(
        CacheConfig {
            coalesce_refreshes: false,
            ..CacheConfig::default()
        },
        14,
    );
    h.store.insert(
        ARTICLES_COLLECTION,
        article("a1", "Title", "2026-03-01T08:30:00Z"),
    );

    h.caches.article.load("a1").await;
    h.clock.advance(Duration::from_secs(700));
    h.store.pause();

    assert!(h.caches.article.load("a1").await.is_some());
    assert!(h.caches.article.load("a1").await.is_some());

    eventually("both refreshes to reach the store", || {
        h.store.calls().get_by_id == 3
    })
    .await;
    h.store.resume();
}

#[tokio::test]
async fn off_peak_entries_live_three_times_longer() {
    let h = harness(3);
    h.store.insert(
        ARTICLES_COLLECTION,
        article("a1", "Night edition", "2026-03-01T02:00:00Z"),
    );

    h.caches.article.load("a1").await;
    h.clock.advance(Duration::from_secs(1_700));
    h.caches.article.load("a1").await;
    assert_eq!(h.store.calls().get_by_id, 1);

    let stats = h
        .caches
        .article
        .cache()
        .entry_stats(&"a1".to_string())
        .expect("entry cached");
    assert_eq!(stats.ttl_ms, 1_800_000);
    assert!(!stats.is_stale);
}

#[tokio::test]
async fn missing_article_is_absent_and_not_cached() {
    let h = harness(14);

    assert!(h.caches.article.load("nope").await.is_none());
    assert!(h.caches.article.load("nope").await.is_none());
    assert_eq!(h.store.calls().get_by_id, 2);
    assert!(h.caches.article.cache().is_empty());
}

#[tokio::test]
async fn article_deleted_upstream_keeps_stale_copy() {
    let h = harness(14);
    h.store.insert(
        ARTICLES_COLLECTION,
        article("a1", "Retracted", "2026-03-01T08:30:00Z"),
    );

    h.caches.article.load("a1").await;
    h.store.remove(ARTICLES_COLLECTION, "a1");
    h.clock.advance(Duration::from_secs(700));

    assert!(h.caches.article.load("a1").await.is_some());
    eventually("refresh to find the record gone", || {
        h.store.calls().get_by_id == 2 && h.caches.article.refreshes_in_flight() == 0
    })
    .await;

    assert!(h.caches.article.cache().contains(&"a1".to_string()));
    let stale = h.caches.article.load("a1").await.expect("stale copy kept");
    assert_eq!(stale.title, "Retracted");
    eventually("next stale read to retry", || h.store.calls().get_by_id == 3).await;
}

#[tokio::test]
async fn failed_refresh_keeps_stale_entry_and_retries() {
    let h = harness(14);
    h.store.insert(
        ARTICLES_COLLECTION,
        article("a1", "Budget vote delayed", "2026-03-01T08:30:00Z"),
    );

    h.caches.article.load("a1").await;
    h.clock.advance(Duration::from_secs(700));
    h.store.fail_next(1, ErrorKind::ResourceExhausted);

    assert!(h.caches.article.load("a1").await.is_some());
    eventually("failed refresh to finish", || {
        h.store.calls().get_by_id == 2 && h.caches.article.refreshes_in_flight() == 0
    })
    .await;

    let stats = h
        .caches
        .article
        .cache()
        .entry_stats(&"a1".to_string())
        .expect("stale entry survives the failure");
    assert!(stats.is_stale);
    assert!(h.caches.admin.stats(CacheTarget::All).quota.exhausted_at.is_some());

    h.store.insert(
        ARTICLES_COLLECTION,
        article("a1", "Budget vote passes", "2026-03-01T08:30:00Z"),
    );
    let stale = h.caches.article.load("a1").await.expect("stale copy");
    assert_eq!(stale.title, "Budget vote delayed");
    eventually("retry to refresh the entry", || {
        h.store.calls().get_by_id == 3 && h.caches.article.refreshes_in_flight() == 0
    })
    .await;

    let refreshed = h.caches.article.load("a1").await.expect("a1 exists");
    assert_eq!(refreshed.title, "Budget vote passes");
}

#[tokio::test]
async fn exhausted_quota_on_article_miss_is_absent() {
    let h = harness(14);
    h.store.insert(
        ARTICLES_COLLECTION,
        article("a1", "First", "2026-03-01T08:30:00Z"),
    );
    h.store.fail_next(1, ErrorKind::ResourceExhausted);

    assert!(h.caches.article.load("a1").await.is_none());
    assert!(h.caches.article.cache().is_empty());
    assert_eq!(h.store.calls().get_by_id, 1);
}

#[tokio::test]
async fn transient_failure_after_expiry_serves_stale_list() {
    let h = harness(14);
    h.store.insert(
        ARTICLES_COLLECTION,
        article("a1", "First", "2026-03-01T08:30:00Z"),
    );

    assert_eq!(h.caches.articles.load().await.len(), 1);
    h.clock.advance(Duration::from_secs(400));
    h.store.fail_next(1, ErrorKind::TransientIo);

    let degraded = h.caches.articles.load().await;
    assert_eq!(degraded.len(), 1);
    assert_eq!(degraded[0].id, "a1");
    assert_eq!(h.caches.articles.cache().len(), 1);
}

#[tokio::test]
async fn exhausted_quota_serves_stale_list() {
    let h = harness(14);
    h.store.insert(
        ARTICLES_COLLECTION,
        article("a1", "First", "2026-03-01T08:30:00Z"),
    );
    h.store.insert(
        ARTICLES_COLLECTION,
        article("a2", "Second", "2026-03-02T08:30:00Z"),
    );

    let fresh = h.caches.articles.load().await;
    let ids: Vec<&str> = fresh.iter().map(|a| a.id.as_str()).collect();
    assert_eq!(ids, vec!["a2", "a1"]);

    h.clock.advance(Duration::from_secs(400));
    h.store.fail_next(1, ErrorKind::ResourceExhausted);

    let degraded = h.caches.articles.load().await;
    assert_eq!(degraded.len(), 2);
    assert_eq!(h.store.calls().scan_published, 2);

    let quota = h.caches.admin.stats(CacheTarget::All).quota;
    assert!(quota.exhausted_at.is_some());
    assert_eq!(quota.reads_remaining, 0);
}

#[tokio::test]
async fn exhausted_quota_without_cache_serves_empty_list() {
    let h = harness(14);
    h.store
        .insert(CATEGORIES_COLLECTION, category("c1", "Sport", 1));
    h.store.fail_next(1, ErrorKind::ResourceExhausted);

    assert!(h.caches.categories.load().await.is_empty());

    // Nothing was cached, so the next read goes back to the store.
    let categories = h.caches.categories.load().await;
    assert_eq!(categories.len(), 1);
    assert_eq!(h.store.calls().scan_all, 2);
}

#[tokio::test]
async fn transient_failure_on_miss_serves_empty_list() {
    let h = harness(14);
    h.store.insert(
        ARTICLES_COLLECTION,
        article("a1", "First", "2026-03-01T08:30:00Z"),
    );
    h.store.fail_next(1, ErrorKind::TransientIo);

    assert!(h.caches.articles.load().await.is_empty());
    assert!(h.caches.article.load("a1").await.is_some());
}

#[tokio::test]
async fn invalidation_forces_a_refetch() {
    let h = harness(14);
    h.store
        .insert(CATEGORIES_COLLECTION, category("c1", "Sport", 1));

    h.caches.categories.load().await;
    h.caches.categories.load().await;
    assert_eq!(h.store.calls().scan_all, 1);

    h.caches
        .admin
        .invalidate(CacheTarget::One(CacheName::Categories));
    h.caches.categories.load().await;
    assert_eq!(h.store.calls().scan_all, 2);
}

#[tokio::test]
async fn article_invalidation_forces_a_refetch() {
    let h = harness(14);
    h.store.insert(
        ARTICLES_COLLECTION,
        article("a1", "First", "2026-03-01T08:30:00Z"),
    );

    h.caches.article.load("a1").await;
    h.caches.article.load("a1").await;
    assert_eq!(h.store.calls().get_by_id, 1);

    let dropped = h
        .caches
        .admin
        .invalidate(CacheTarget::One(CacheName::Article));
    assert_eq!(dropped, 1);
    assert!(h.caches.article.cache().is_empty());

    assert!(h.caches.article.load("a1").await.is_some());
    assert_eq!(h.store.calls().get_by_id, 2);
}

#[tokio::test]
async fn editorial_write_refreshes_the_article_and_feed() {
    let h = harness(14);
    h.store.insert(
        ARTICLES_COLLECTION,
        article("a1", "Draft headline", "2026-03-01T08:30:00Z"),
    );

    h.caches.articles.load().await;
    h.caches.article.load("a1").await;

    h.store.insert(
        ARTICLES_COLLECTION,
        article("a1", "Final headline", "2026-03-01T08:30:00Z"),
    );
    h.caches.admin.record_write(&EditorialEvent::ArticleUpdated {
        id: "a1".to_string(),
    });

    let record = h.caches.article.load("a1").await.expect("a1 exists");
    assert_eq!(record.title, "Final headline");
    let feed = h.caches.articles.load().await;
    assert_eq!(feed[0].title, "Final headline");
}

#[tokio::test]
async fn revalidation_refreshes_both_collections() {
    let h = harness(14);
    h.store
        .insert(CATEGORIES_COLLECTION, category("c1", "Sport", 1));

    assert!(h.caches.articles.load().await.is_empty());
    assert_eq!(h.caches.categories.load().await.len(), 1);

    h.store.insert(
        ARTICLES_COLLECTION,
        article("a1", "Late news", "2026-03-01T23:30:00Z"),
    );
    h.store
        .insert(CATEGORIES_COLLECTION, category("c2", "World", 2));

    assert_eq!(revalidate_collections(&h.caches).await, 2);

    let calls = h.store.calls();
    assert_eq!(h.caches.articles.load().await.len(), 1);
    assert_eq!(h.caches.categories.load().await.len(), 2);
    assert_eq!(h.store.calls(), calls);
}

#[tokio::test]
async fn report_totals_every_cache() {
    let h = harness(14);
    h.store
        .insert(CATEGORIES_COLLECTION, category("c1", "Sport", 1));
    h.store.insert(
        ARTICLES_COLLECTION,
        article("a1", "First", "2026-03-01T08:30:00Z"),
    );

    h.caches.categories.load().await;
    h.caches.articles.load().await;
    h.caches.article.load("a1").await;

    let report = h.caches.admin.report();
    assert_eq!(report.total_entries, 3);
    assert_eq!(report.total_capacity, 8 + 4 + 200);
    assert_eq!(report.caches.len(), 3);
    assert_eq!(report.quota.reads_used, 3);
}
