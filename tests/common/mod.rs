#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;

use gleaner::cache::MemoryCache;
use gleaner::config::PipelineConfig;
use gleaner::data_models::{ScrapedRecord, SearchResult};
use gleaner::db::{InsertOutcome, MemoryStore, RecordStore};
use gleaner::dedup::DedupGateway;
use gleaner::embedding::PlaceholderEmbedder;
use gleaner::error::{AggregatorError, FetchError, PersistError};
use gleaner::fetcher::{FetchChain, FetchStrategy};
use gleaner::orchestrator::Orchestrator;
use gleaner::search::SearchProvider;

/// `n` distinct filler words, never containing boilerplate phrases.
pub fn filler(prefix: &str, n: usize) -> String {
    (0..n)
        .map(|i| format!("{prefix}{i}"))
        .collect::<Vec<_>>()
        .join(" ")
}

/// An article page whose extracted text is exactly `lines`.
pub fn article_html(lines: &[&str]) -> String {
    let paragraphs: String = lines.iter().map(|l| format!("<p>{l}</p>")).collect();
    format!(
        "<html><head><title>t</title></head><body><article>{paragraphs}</article></body></html>"
    )
}

pub fn search_result(url: &str) -> SearchResult {
    SearchResult::from_value(json!({
        "url": url,
        "title": format!("Title of {url}"),
        "content": "a description",
        "engine": "duckduckgo",
    }))
}

pub fn stored_record(query: &str, url: &str, content: &str) -> ScrapedRecord {
    ScrapedRecord::new(query, &search_result(url), content, vec![0.0; 5])
}

// =============================================================================
// Search
// =============================================================================

pub struct FakeSearch {
    results: Vec<SearchResult>,
    fail: bool,
    pub calls: AtomicUsize,
}

impl FakeSearch {
    pub fn returning(urls: &[&str]) -> Self {
        Self {
            results: urls.iter().map(|u| search_result(u)).collect(),
            fail: false,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn with_results(results: Vec<SearchResult>) -> Self {
        Self {
            results,
            fail: false,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing() -> Self {
        Self {
            results: Vec::new(),
            fail: true,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SearchProvider for FakeSearch {
    async fn search(&self, _query: &str) -> Result<Vec<SearchResult>, AggregatorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(AggregatorError::Status(502));
        }
        Ok(self.results.clone())
    }
}

// =============================================================================
// Fetch strategies
// =============================================================================

/// Serves canned pages; unknown URLs answer 404.
pub struct FakeStrategy {
    name: &'static str,
    pages: HashMap<String, String>,
    latency: Duration,
    calls: Arc<AtomicUsize>,
}

impl FakeStrategy {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            pages: HashMap::new(),
            latency: Duration::ZERO,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn page(mut self, url: &str, html: impl Into<String>) -> Self {
        self.pages.insert(url.to_string(), html.into());
        self
    }

    pub fn latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn counter(&self) -> Arc<AtomicUsize> {
        self.calls.clone()
    }
}

#[async_trait]
impl FetchStrategy for FakeStrategy {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn fetch_html(&self, url: &str) -> Result<String, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        self.pages.get(url).cloned().ok_or(FetchError::Status {
            status: 404,
            url: url.to_string(),
        })
    }
}

// =============================================================================
// Stores
// =============================================================================

/// Fails inserts for the listed URLs, delegates everything else.
pub struct FlakyStore {
    inner: MemoryStore,
    failing: Mutex<HashSet<String>>,
}

impl FlakyStore {
    pub fn failing_on(urls: &[&str]) -> Self {
        Self {
            inner: MemoryStore::new(),
            failing: Mutex::new(urls.iter().map(|u| u.to_string()).collect()),
        }
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }
}

#[async_trait]
impl RecordStore for FlakyStore {
    async fn insert(&self, record: &ScrapedRecord) -> Result<InsertOutcome, PersistError> {
        if self.failing.lock().unwrap().contains(&record.url) {
            let io = std::io::Error::new(std::io::ErrorKind::Other, "disk full");
            return Err(PersistError::Mongo(mongodb::error::Error::from(io)));
        }
        self.inner.insert(record).await
    }

    async fn url_exists(&self, url: &str) -> Result<bool, PersistError> {
        self.inner.url_exists(url).await
    }

    async fn existing_urls(&self, urls: &[String]) -> Result<HashSet<String>, PersistError> {
        self.inner.existing_urls(urls).await
    }

    async fn find_by_query(
        &self,
        query: &str,
        limit: Option<i64>,
    ) -> Result<Vec<ScrapedRecord>, PersistError> {
        self.inner.find_by_query(query, limit).await
    }
}

// =============================================================================
// Wiring
// =============================================================================

pub fn chain_of(strategies: Vec<FakeStrategy>) -> FetchChain {
    strategies
        .into_iter()
        .fold(FetchChain::new(Duration::from_secs(1), 50), |chain, s| {
            chain.with_strategy(s)
        })
}

pub fn orchestrator(
    search: Arc<FakeSearch>,
    chain: FetchChain,
    cache: Arc<MemoryCache>,
    store: Arc<dyn RecordStore>,
) -> Orchestrator {
    orchestrator_with(search, chain, cache, store, PipelineConfig::default())
}

pub fn orchestrator_with(
    search: Arc<FakeSearch>,
    chain: FetchChain,
    cache: Arc<MemoryCache>,
    store: Arc<dyn RecordStore>,
    settings: PipelineConfig,
) -> Orchestrator {
    let gateway = DedupGateway::new(cache, store.clone());
    Orchestrator::new(
        search,
        chain,
        gateway,
        store,
        Arc::new(PlaceholderEmbedder::default()),
        settings,
    )
}
