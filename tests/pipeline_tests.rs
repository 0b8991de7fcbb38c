use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

use gleaner::cache::{EphemeralCache, MemoryCache};
use gleaner::config::PipelineConfig;
use gleaner::db::{MemoryStore, RecordStore};
use gleaner::dedup::marker_key;

mod common;
use common::*;

const URL_A: &str = "https://a.example/post";
const URL_B: &str = "https://b.example/post";

fn page(tag: &str) -> String {
    article_html(&[&format!("Heading {tag}"), &filler(tag, 60)])
}

#[tokio::test(start_paused = true)]
async fn test_url_persisted_once_across_runs() {
    let store = Arc::new(MemoryStore::new());
    let cache = Arc::new(MemoryCache::new());
    let strategy = FakeStrategy::new("plain").page(URL_A, page("a"));
    let fetches = strategy.counter();
    let orchestrator = orchestrator(
        Arc::new(FakeSearch::returning(&[URL_A])),
        chain_of(vec![strategy]),
        cache.clone(),
        store.clone(),
    );

    let first = orchestrator.collect("rust").await;
    let second = orchestrator.collect("rust").await;

    assert_eq!(first.persisted, 1);
    assert_eq!(second.persisted, 0);
    assert_eq!(second.skipped, 1);
    assert_eq!(store.len(), 1);
    assert_eq!(fetches.load(Ordering::SeqCst), 1);
    assert!(cache.exists(&marker_key(URL_A)).await);
}

#[tokio::test(start_paused = true)]
async fn test_url_never_rescraped_for_another_query() {
    let store = Arc::new(MemoryStore::new());
    let strategy = FakeStrategy::new("plain").page(URL_A, page("a"));
    let fetches = strategy.counter();
    let orchestrator = orchestrator(
        Arc::new(FakeSearch::returning(&[URL_A])),
        chain_of(vec![strategy]),
        Arc::new(MemoryCache::new()),
        store.clone(),
    );

    orchestrator.collect("query a").await;
    let stats = orchestrator.collect("query b").await;

    assert_eq!(stats.skipped, 1);
    assert_eq!(fetches.load(Ordering::SeqCst), 1);
    assert_eq!(store.get(URL_A).unwrap().query, "query a");
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_queries_store_one_record() {
    let store = Arc::new(MemoryStore::new());
    // Separate caches so neither run sees the other's marker.
    let build = |store: Arc<MemoryStore>| {
        let strategy = FakeStrategy::new("plain")
            .page(URL_A, page("a"))
            .latency(Duration::from_millis(200));
        orchestrator(
            Arc::new(FakeSearch::returning(&[URL_A])),
            chain_of(vec![strategy]),
            Arc::new(MemoryCache::new()),
            store,
        )
    };
    let first = build(store.clone());
    let second = build(store.clone());

    let (a, b) = tokio::join!(first.collect("rust"), second.collect("rust tokio"));

    assert_eq!(store.len(), 1);
    assert_eq!(a.persisted + b.persisted, 1);
    assert_eq!(a.already_persisted + b.already_persisted, 1);
}

#[tokio::test(start_paused = true)]
async fn test_failed_url_is_left_for_retry() {
    let store = Arc::new(MemoryStore::new());
    let cache = Arc::new(MemoryCache::new());
    let strategy = FakeStrategy::new("plain").page(URL_A, "<html><body>tiny</body></html>");
    let fetches = strategy.counter();
    let orchestrator = orchestrator(
        Arc::new(FakeSearch::returning(&[URL_A])),
        chain_of(vec![strategy]),
        cache.clone(),
        store.clone(),
    );

    let first = orchestrator.collect("rust").await;
    assert_eq!(first.failed, 1);
    assert!(store.is_empty());
    assert!(!cache.exists(&marker_key(URL_A)).await);

    orchestrator.collect("rust").await;
    assert_eq!(fetches.load(Ordering::SeqCst), 2);
}

#[tokio::test(start_paused = true)]
async fn test_persist_error_does_not_stop_loop() {
    let store = Arc::new(FlakyStore::failing_on(&[URL_A]));
    let cache = Arc::new(MemoryCache::new());
    let strategy = FakeStrategy::new("plain")
        .page(URL_A, page("a"))
        .page(URL_B, page("b"));
    let orchestrator = orchestrator(
        Arc::new(FakeSearch::returning(&[URL_A, URL_B])),
        chain_of(vec![strategy]),
        cache.clone(),
        store.clone(),
    );

    let stats = orchestrator.collect("rust").await;

    assert_eq!(stats.failed, 1);
    assert_eq!(stats.persisted, 1);
    assert_eq!(store.len(), 1);
    assert!(!cache.exists(&marker_key(URL_A)).await);
    assert!(cache.exists(&marker_key(URL_B)).await);
}

#[tokio::test(start_paused = true)]
async fn test_candidates_without_url_are_dropped() {
    let store = Arc::new(MemoryStore::new());
    let mut results = vec![search_result("")];
    results.push(search_result(URL_A));
    let strategy = FakeStrategy::new("plain").page(URL_A, page("a"));
    let fetches = strategy.counter();
    let orchestrator = orchestrator(
        Arc::new(FakeSearch::with_results(results)),
        chain_of(vec![strategy]),
        Arc::new(MemoryCache::new()),
        store.clone(),
    );

    let stats = orchestrator.collect("rust").await;

    assert_eq!(stats.persisted, 1);
    assert_eq!(fetches.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn test_politeness_delay_follows_every_url() {
    let strategy = FakeStrategy::new("plain")
        .page(URL_A, page("a"))
        .page(URL_B, page("b"));
    let orchestrator = orchestrator(
        Arc::new(FakeSearch::returning(&[URL_A, URL_B])),
        chain_of(vec![strategy]),
        Arc::new(MemoryCache::new()),
        Arc::new(MemoryStore::new()),
    );

    let start = tokio::time::Instant::now();
    orchestrator.collect("rust").await;

    assert!(start.elapsed() >= Duration::from_secs(2));
}

#[tokio::test(start_paused = true)]
async fn test_answer_compresses_shared_lines() {
    let store = Arc::new(MemoryStore::new());
    let filler_a = filler("alpha", 60);
    let filler_b = filler("beta", 60);
    let strategy = FakeStrategy::new("plain")
        .page(URL_A, article_html(&["Hello", "World", &filler_a]))
        .page(URL_B, article_html(&["World", "Foo", &filler_b]));
    let orchestrator = orchestrator(
        Arc::new(FakeSearch::returning(&[URL_A, URL_B])),
        chain_of(vec![strategy]),
        Arc::new(MemoryCache::new()),
        store.clone(),
    );

    let answer = orchestrator.answer("rust").await;
    let lines: Vec<&str> = answer.lines().collect();

    for expected in ["Hello", "World", "Foo"] {
        assert_eq!(lines.iter().filter(|l| **l == expected).count(), 1, "{expected}");
    }
    assert_eq!(lines.len(), 5);
}

#[tokio::test(start_paused = true)]
async fn test_answer_served_from_cache_within_window() {
    let search = Arc::new(FakeSearch::returning(&[URL_A]));
    let strategy = FakeStrategy::new("plain").page(URL_A, page("a"));
    let orchestrator = orchestrator(
        search.clone(),
        chain_of(vec![strategy]),
        Arc::new(MemoryCache::new()),
        Arc::new(MemoryStore::new()),
    );

    let first = orchestrator.answer("rust").await;
    assert!(!first.is_empty());
    assert_eq!(search.calls(), 1);

    tokio::time::advance(Duration::from_secs(4 * 60)).await;
    assert_eq!(orchestrator.answer("rust").await, first);
    assert_eq!(search.calls(), 1);

    tokio::time::advance(Duration::from_secs(2 * 60)).await;
    assert_eq!(orchestrator.answer("rust").await, first);
    assert_eq!(search.calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_aggregator_failure_answers_from_stored_results() {
    let store = Arc::new(MemoryStore::new());
    store
        .insert(&stored_record("Rust Async", URL_A, "previously stored line"))
        .await
        .unwrap();
    let orchestrator = orchestrator(
        Arc::new(FakeSearch::failing()),
        chain_of(Vec::new()),
        Arc::new(MemoryCache::new()),
        store,
    );

    assert_eq!(orchestrator.answer("async").await, "previously stored line");
}

#[tokio::test(start_paused = true)]
async fn test_empty_answer_is_not_cached() {
    let search = Arc::new(FakeSearch::failing());
    let cache = Arc::new(MemoryCache::new());
    let orchestrator = orchestrator(
        search.clone(),
        chain_of(Vec::new()),
        cache.clone(),
        Arc::new(MemoryStore::new()),
    );

    assert_eq!(orchestrator.answer("nothing").await, "");
    assert!(cache.is_empty());
    orchestrator.answer("nothing").await;
    assert_eq!(search.calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_query_timeout_answers_from_stored_results() {
    let store = Arc::new(MemoryStore::new());
    store
        .insert(&stored_record("rust", URL_A, "line stored earlier"))
        .await
        .unwrap();
    let slow = FakeStrategy::new("plain")
        .page(URL_B, page("b"))
        .latency(Duration::from_secs(10 * 60));
    let calls = slow.counter();
    let settings = PipelineConfig {
        query_timeout: Duration::from_secs(5),
        ..PipelineConfig::default()
    };
    let orchestrator = orchestrator_with(
        Arc::new(FakeSearch::returning(&[URL_B])),
        chain_of(vec![slow]),
        Arc::new(MemoryCache::new()),
        store.clone(),
        settings,
    );

    let start = tokio::time::Instant::now();
    let answer = orchestrator.answer("rust").await;

    assert_eq!(answer, "line stored earlier");
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(start.elapsed() < Duration::from_secs(10 * 60));
    assert!(!store.url_exists(URL_B).await.unwrap());
}
