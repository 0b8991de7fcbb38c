use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;

use crate::data_models::SearchResult;
use crate::error::AggregatorError;
use crate::fetcher::random_headers;

pub const SEARCH_TIMEOUT: Duration = Duration::from_secs(15);

/// Source of candidate URLs for a query.
#[async_trait]
pub trait SearchProvider: Send + Sync {
    async fn search(&self, query: &str) -> Result<Vec<SearchResult>, AggregatorError>;
}

#[derive(Debug, Deserialize)]
struct SearxngResponse {
    #[serde(default)]
    results: Vec<Value>,
}

/// Client for a SearXNG instance's JSON API.
pub struct SearxngClient {
    client: Client,
    endpoint: String,
    count: u32,
    engines: Vec<String>,
}

impl SearxngClient {
    pub fn new(endpoint: &str, count: u32, engines: Vec<String>) -> reqwest::Result<Self> {
        let client = Client::builder().timeout(SEARCH_TIMEOUT).build()?;
        Ok(Self {
            client,
            endpoint: endpoint.to_string(),
            count,
            engines,
        })
    }

    pub fn parse_results(body: &str) -> Result<Vec<SearchResult>, AggregatorError> {
        let response: SearxngResponse = serde_json::from_str(body)?;
        Ok(response
            .results
            .into_iter()
            .map(SearchResult::from_value)
            .collect())
    }
}

#[async_trait]
impl SearchProvider for SearxngClient {
    async fn search(&self, query: &str) -> Result<Vec<SearchResult>, AggregatorError> {
        let count = self.count.to_string();
        let engines = self.engines.join(",");
        let response = self
            .client
            .get(&self.endpoint)
            .headers(random_headers())
            .query(&[
                ("q", query),
                ("format", "json"),
                ("count", count.as_str()),
                ("engines", engines.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(AggregatorError::Status(status.as_u16()));
        }

        let body = response.text().await?;
        let results = Self::parse_results(&body)?;
        log::info!("search aggregator returned {} results for {query:?}", results.len());
        Ok(results)
    }
}
