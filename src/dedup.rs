use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use crate::cache::EphemeralCache;
use crate::db::RecordStore;

pub const MARKER_TTL: Duration = Duration::from_secs(24 * 60 * 60);
pub const ANSWER_TTL: Duration = Duration::from_secs(5 * 60);

const MARKER_VALUE: &str = "1";

pub fn marker_key(url: &str) -> String {
    format!("scraped:{url}")
}

pub fn answer_key(query: &str) -> String {
    format!("results:{query}")
}

/// Answers "has this URL been captured already" and holds cached answers.
///
/// The durable store is authoritative. Markers in the ephemeral cache only
/// save a round trip and may have expired while the record still exists.
#[derive(Clone)]
pub struct DedupGateway {
    cache: Arc<dyn EphemeralCache>,
    store: Arc<dyn RecordStore>,
}

impl DedupGateway {
    pub fn new(cache: Arc<dyn EphemeralCache>, store: Arc<dyn RecordStore>) -> Self {
        Self { cache, store }
    }

    pub async fn is_processed(&self, url: &str) -> bool {
        if self.cache.exists(&marker_key(url)).await {
            return true;
        }
        match self.store.url_exists(url).await {
            Ok(exists) => exists,
            Err(e) => {
                log::warn!("durable lookup failed for {url}: {:#}", e);
                false
            }
        }
    }

    /// Candidates not yet processed, in input order and without repeats.
    ///
    /// The durable store is asked once for the whole batch. Every skipped URL
    /// gets its marker refreshed so the next sighting is answered from cache.
    pub async fn filter_unprocessed(&self, urls: &[String]) -> Vec<String> {
        let existing = match self.store.existing_urls(urls).await {
            Ok(existing) => existing,
            Err(e) => {
                log::warn!("batch durable lookup failed, relying on markers: {:#}", e);
                HashSet::new()
            }
        };

        let mut seen = HashSet::new();
        let mut fresh = Vec::new();
        for url in urls {
            if !seen.insert(url.as_str()) {
                continue;
            }
            if existing.contains(url) || self.cache.exists(&marker_key(url)).await {
                log::info!("Skipping processed URL: {url}");
                self.mark_processed(url).await;
                continue;
            }
            fresh.push(url.clone());
        }
        fresh
    }

    pub async fn mark_processed(&self, url: &str) {
        self.cache
            .set_with_ttl(&marker_key(url), MARKER_VALUE, MARKER_TTL)
            .await;
    }

    pub async fn cached_answer(&self, query: &str) -> Option<String> {
        self.cache.get(&answer_key(query)).await
    }

    pub async fn cache_answer(&self, query: &str, answer: &str) {
        self.cache
            .set_with_ttl(&answer_key(query), answer, ANSWER_TTL)
            .await;
    }
}
