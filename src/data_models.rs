use mongodb::bson::{DateTime, oid::ObjectId};
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const TITLE_MAX_CHARS: usize = 500;
pub const DESCRIPTION_MAX_CHARS: usize = 1000;
pub const CONTENT_MAX_CHARS: usize = 10_000;

/// One hit returned by the search aggregator. Read-only input to the pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchResult {
    /// Empty when the aggregator returned a result without a URL.
    pub url: String,
    pub title: String,
    pub description: String,
    pub engine_name: String,
    /// The aggregator's JSON object for this hit, untouched.
    pub raw: Value,
}

impl SearchResult {
    pub fn from_value(raw: Value) -> SearchResult {
        let field = |key: &str| raw.get(key).and_then(Value::as_str).map(str::to_string);
        SearchResult {
            url: field("url").unwrap_or_default(),
            title: field("title").unwrap_or_else(|| "No Title".to_string()),
            description: field("content").unwrap_or_else(|| "No Description".to_string()),
            engine_name: field("engine").unwrap_or_else(|| "Unknown".to_string()),
            raw,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ScrapedRecord {
    #[serde(rename = "_id")]
    pub id: ObjectId,

    pub query: String,
    pub title: String,
    pub url: String,
    pub description: String,
    pub engine_name: String,
    pub source_payload: Value,
    pub extracted_content: String,
    pub embedding: Vec<f32>,
    pub created_at: DateTime,
}

impl ScrapedRecord {
    pub fn new(
        query: &str,
        result: &SearchResult,
        extracted_content: &str,
        embedding: Vec<f32>,
    ) -> ScrapedRecord {
        ScrapedRecord {
            id: ObjectId::new(),
            query: query.to_string(),
            title: truncate_chars(&result.title, TITLE_MAX_CHARS),
            url: result.url.clone(),
            description: truncate_chars(&result.description, DESCRIPTION_MAX_CHARS),
            engine_name: result.engine_name.clone(),
            source_payload: result.raw.clone(),
            extracted_content: truncate_chars(extracted_content, CONTENT_MAX_CHARS),
            embedding,
            created_at: DateTime::now(),
        }
    }
}

/// First `max` characters of `s`, never splitting a code point.
pub fn truncate_chars(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => s[..idx].to_string(),
        None => s.to_string(),
    }
}
