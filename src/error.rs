use thiserror::Error;

/// Why a single fetch strategy did not produce usable content.
///
/// These never leave the fetch chain: a failed strategy only advances the
/// chain to the next one.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("timeout fetching {0}")]
    Timeout(String),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP {status} for {url}")]
    Status { status: u16, url: String },

    #[error("anti-bot challenge not cleared for {0}")]
    Challenge(String),

    #[error("challenge solver failed: {0}")]
    Solver(String),

    #[error("render service failed: {0}")]
    Render(String),

    #[error("extraction task failed: {0}")]
    Extract(String),

    #[error("content below quality bar ({words} words)")]
    LowQuality { words: usize },
}

impl FetchError {
    pub fn from_reqwest(err: reqwest::Error, url: &str) -> Self {
        if err.is_timeout() {
            FetchError::Timeout(url.to_string())
        } else {
            FetchError::Http(err)
        }
    }
}

/// Failure talking to the search aggregator. Always degrades to zero candidates.
#[derive(Debug, Error)]
pub enum AggregatorError {
    #[error("search request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("search aggregator returned HTTP {0}")]
    Status(u16),

    #[error("malformed search payload: {0}")]
    Decode(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("mongo error: {0}")]
    Mongo(#[from] mongodb::error::Error),
}
