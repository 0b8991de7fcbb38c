use dotenvy::dotenv;
use once_cell::sync::Lazy;
use std::env;
use std::time::Duration;

pub static CONFIG: Lazy<Config> = Lazy::new(|| {
    dotenv().ok(); // Load .env file if present
    Config {
        mongo_uri: get_env("MONGO_URI"),
        mongo_db_name: get_env_or_default("MONGO_DB_NAME", "gleaner"),
        searxng_url: get_env_or_default("SEARXNG_URL", "http://localhost:8081/search"),
        bind_addr: get_env_or_default("BIND_ADDR", "0.0.0.0:5000"),
        solver_url: get_optional_env("SOLVER_URL"),
        render_service_url: get_optional_env("RENDER_SERVICE_URL"),
        query_timeout_secs: get_env_or_default("QUERY_TIMEOUT_SECS", "600")
            .parse()
            .unwrap_or(600),
        cache_max_entries: get_env_or_default("CACHE_MAX_ENTRIES", "500000")
            .parse()
            .unwrap_or(crate::cache::DEFAULT_MAX_ENTRIES),
        debug: get_env_or_default("DEBUG", "false").eq_ignore_ascii_case("true"),
    }
});

pub struct Config {
    pub mongo_uri: String,
    pub mongo_db_name: String,
    pub searxng_url: String,
    pub bind_addr: String,
    /// FlareSolverr-compatible challenge solver, used by the anti-bot strategy.
    pub solver_url: Option<String>,
    /// Presence of a render service is what enables the rendered-page strategy.
    pub render_service_url: Option<String>,
    pub query_timeout_secs: u64,
    pub cache_max_entries: usize,
    pub debug: bool,
}

fn get_env(key: &str) -> String {
    env::var(key).unwrap_or_else(|_| panic!("Missing required environment variable: {key}"))
}

fn get_env_or_default(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn get_optional_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Tunables for a single query's pipeline run.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Pause after every candidate URL, whatever its outcome.
    pub politeness_delay: Duration,
    /// Pause between fetch strategies after a failed attempt.
    pub strategy_delay: Duration,
    pub min_words: usize,
    pub query_timeout: Duration,
    pub result_count: u32,
    pub engines: Vec<String>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            politeness_delay: Duration::from_secs(1),
            strategy_delay: Duration::from_secs(1),
            min_words: crate::cleaner::MIN_WORDS,
            query_timeout: Duration::from_secs(600),
            result_count: 20,
            engines: vec!["google".into(), "bing".into(), "duckduckgo".into()],
        }
    }
}

impl PipelineConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            query_timeout: Duration::from_secs(config.query_timeout_secs),
            ..Self::default()
        }
    }
}
