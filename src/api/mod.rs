use axum::{Router, routing::get};
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::orchestrator::Orchestrator;

pub mod handlers;
pub mod models;

pub fn create_router(orchestrator: Arc<Orchestrator>) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/scrape", get(handlers::scrape_handler))
        .route("/results", get(handlers::results_handler))
        .route("/health", get(handlers::health_handler))
        .with_state(orchestrator)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}
