pub mod api;
pub mod cache;
pub mod cleaner;
pub mod config;
pub mod data_models;
pub mod db;
pub mod dedup;
pub mod embedding;
pub mod error;
pub mod extractor;
pub mod fetcher;
pub mod orchestrator;
pub mod search;
