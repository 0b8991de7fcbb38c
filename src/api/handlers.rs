use axum::{
    Json,
    extract::{Query, State},
    http::StatusCode,
};
use std::sync::Arc;
use std::time::Instant;

use crate::data_models::truncate_chars;
use crate::orchestrator::Orchestrator;

use super::models::{ErrorResponse, HealthResponse, QueryParams, ScrapeResponse, StoredResult};

pub const RESULTS_LIMIT: i64 = 50;
pub const SNIPPET_CHARS: usize = 500;

type ApiError = (StatusCode, Json<ErrorResponse>);

fn api_error(status: StatusCode, message: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
}

/// First `SNIPPET_CHARS` characters, with an ellipsis when anything was cut.
pub fn snippet(content: &str) -> String {
    if content.chars().count() > SNIPPET_CHARS {
        format!("{}...", truncate_chars(content, SNIPPET_CHARS))
    } else {
        content.to_string()
    }
}

pub async fn scrape_handler(
    State(orchestrator): State<Arc<Orchestrator>>,
    Query(params): Query<QueryParams>,
) -> Result<Json<ScrapeResponse>, ApiError> {
    let query = params.q.unwrap_or_default().trim().to_string();
    if query.is_empty() {
        return Err(api_error(StatusCode::BAD_REQUEST, "Missing query parameter"));
    }

    let start = Instant::now();
    let data = orchestrator.answer(&query).await;
    log::info!(
        "answered {query:?} with {} chars in {}ms",
        data.len(),
        start.elapsed().as_millis()
    );

    Ok(Json(ScrapeResponse { query, data }))
}

pub async fn results_handler(
    State(orchestrator): State<Arc<Orchestrator>>,
    Query(params): Query<QueryParams>,
) -> Result<Json<Vec<StoredResult>>, ApiError> {
    let query = params.q.unwrap_or_default();

    let records = orchestrator
        .stored_results(&query, RESULTS_LIMIT)
        .await
        .map_err(|e| {
            api_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Database error: {}", e),
            )
        })?;

    let results = records
        .into_iter()
        .map(|record| StoredResult {
            content: snippet(&record.extracted_content),
            title: record.title,
            url: record.url,
        })
        .collect();

    Ok(Json(results))
}

pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}
