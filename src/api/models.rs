use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct QueryParams {
    pub q: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ScrapeResponse {
    pub query: String,
    pub data: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StoredResult {
    pub title: String,
    pub url: String,
    pub content: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
}
