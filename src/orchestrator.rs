use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use crate::config::PipelineConfig;
use crate::data_models::{ScrapedRecord, SearchResult};
use crate::db::{InsertOutcome, RecordStore};
use crate::dedup::DedupGateway;
use crate::embedding::Embedder;
use crate::error::PersistError;
use crate::fetcher::FetchChain;
use crate::search::SearchProvider;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    FetchingCandidates,
    Filtering,
    PerUrlLoop,
    Aggregating,
    Done,
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::FetchingCandidates => "fetching-candidates",
            Self::Filtering => "filtering",
            Self::PerUrlLoop => "per-url-loop",
            Self::Aggregating => "aggregating",
            Self::Done => "done",
        };
        f.write_str(name)
    }
}

/// What happened to the candidates of one pipeline run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RunStats {
    pub candidates: usize,
    pub skipped: usize,
    pub persisted: usize,
    pub already_persisted: usize,
    pub failed: usize,
}

/// Drives one query from search candidates to a compressed answer.
pub struct Orchestrator {
    search: Arc<dyn SearchProvider>,
    chain: FetchChain,
    gateway: DedupGateway,
    store: Arc<dyn RecordStore>,
    embedder: Arc<dyn Embedder>,
    settings: PipelineConfig,
}

impl Orchestrator {
    pub fn new(
        search: Arc<dyn SearchProvider>,
        chain: FetchChain,
        gateway: DedupGateway,
        store: Arc<dyn RecordStore>,
        embedder: Arc<dyn Embedder>,
        settings: PipelineConfig,
    ) -> Self {
        Self {
            search,
            chain,
            gateway,
            store,
            embedder,
            settings,
        }
    }

    fn enter(query: &str, state: PipelineState) {
        log::debug!("[{query}] -> {state}");
    }

    /// Answers `query`, from cache when a fresh answer exists, otherwise by
    /// running the pipeline and compressing everything stored for the query.
    pub async fn answer(&self, query: &str) -> String {
        if let Some(cached) = self.gateway.cached_answer(query).await {
            log::info!("cache hit for query {query:?}");
            return cached;
        }

        match tokio::time::timeout(self.settings.query_timeout, self.collect(query)).await {
            Ok(stats) => log::info!("[{query}] run finished: {stats:?}"),
            Err(_) => log::warn!(
                "[{query}] run exceeded {:?}, answering from stored results",
                self.settings.query_timeout
            ),
        }

        Self::enter(query, PipelineState::Aggregating);
        let compressed = self.aggregate(query).await;
        if !compressed.is_empty() {
            self.gateway.cache_answer(query, &compressed).await;
        }
        Self::enter(query, PipelineState::Done);
        compressed
    }

    /// Fetches candidates and persists content for the ones not seen before.
    pub async fn collect(&self, query: &str) -> RunStats {
        let mut stats = RunStats::default();

        Self::enter(query, PipelineState::FetchingCandidates);
        let candidates = match self.search.search(query).await {
            Ok(results) => results,
            Err(e) => {
                log::error!("SearxNG error for {query:?}: {:#}", e);
                Vec::new()
            }
        };
        stats.candidates = candidates.len();

        Self::enter(query, PipelineState::Filtering);
        let candidates: Vec<SearchResult> =
            candidates.into_iter().filter(|c| !c.url.is_empty()).collect();
        let urls: Vec<String> = candidates.iter().map(|c| c.url.clone()).collect();
        let fresh: HashSet<String> = self
            .gateway
            .filter_unprocessed(&urls)
            .await
            .into_iter()
            .collect();

        Self::enter(query, PipelineState::PerUrlLoop);
        let mut visited = HashSet::new();
        for candidate in &candidates {
            if !visited.insert(candidate.url.as_str()) {
                continue;
            }
            if !fresh.contains(&candidate.url) {
                stats.skipped += 1;
                continue;
            }

            log::info!("Processing new URL: {}", candidate.url);
            let outcome = self.chain.fetch_and_extract(&candidate.url).await;
            match outcome.text {
                Some(content) => match self.persist(query, candidate, &content).await {
                    Ok(InsertOutcome::Inserted(id)) => {
                        log::info!("stored {} as {id}", candidate.url);
                        self.gateway.mark_processed(&candidate.url).await;
                        stats.persisted += 1;
                    }
                    Ok(InsertOutcome::Duplicate) => {
                        log::info!("{} was stored concurrently, treating as processed", candidate.url);
                        self.gateway.mark_processed(&candidate.url).await;
                        stats.already_persisted += 1;
                    }
                    Err(e) => {
                        log::error!("DB error storing {}: {:#}", candidate.url, e);
                        stats.failed += 1;
                    }
                },
                // Left unmarked so a later query can retry it.
                None => stats.failed += 1,
            }

            tokio::time::sleep(self.settings.politeness_delay).await;
        }

        stats
    }

    async fn persist(
        &self,
        query: &str,
        result: &SearchResult,
        content: &str,
    ) -> Result<InsertOutcome, PersistError> {
        let embedding = self.embedder.embed(content);
        let record = ScrapedRecord::new(query, result, content, embedding);
        self.store.insert(&record).await
    }

    /// Distinct lines of every stored record matching `query`.
    pub async fn aggregate(&self, query: &str) -> String {
        match self.store.find_by_query(query, None).await {
            Ok(records) => compress_records(&records),
            Err(e) => {
                log::error!("failed to load stored results for {query:?}: {:#}", e);
                String::new()
            }
        }
    }

    /// Stored records for `query`, oldest first, at most `limit`.
    pub async fn stored_results(
        &self,
        query: &str,
        limit: i64,
    ) -> Result<Vec<ScrapedRecord>, PersistError> {
        self.store.find_by_query(query, Some(limit)).await
    }
}

/// Union of the records' content lines, each distinct line once, in the
/// order first seen.
pub fn compress_records(records: &[ScrapedRecord]) -> String {
    let mut seen = HashSet::new();
    let mut lines = Vec::new();
    for record in records {
        for line in record.extracted_content.lines() {
            if seen.insert(line) {
                lines.push(line);
            }
        }
    }
    lines.join("\n")
}
