use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use gleaner::api::create_router;
use gleaner::cache::MemoryCache;
use gleaner::config::{CONFIG, PipelineConfig};
use gleaner::db::{Database, ScrapedRecordRepo};
use gleaner::dedup::DedupGateway;
use gleaner::embedding::PlaceholderEmbedder;
use gleaner::fetcher::FetchChain;
use gleaner::orchestrator::Orchestrator;
use gleaner::search::SearxngClient;

#[derive(Debug, Parser)]
#[command(about = "Search, scrape and cache article text for queries")]
struct Cli {
    /// Address to listen on, overrides BIND_ADDR
    #[arg(long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing subscriber (handles both tracing and log crate)
    let level = if CONFIG.debug {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(true)
        .init();

    let db = Database::from_config().await?;
    let repo = ScrapedRecordRepo::new(&db);
    repo.ensure_indexes().await?;
    let store = Arc::new(repo);

    let settings = PipelineConfig::from_config(&CONFIG);
    let chain = FetchChain::standard(
        settings.strategy_delay,
        settings.min_words,
        CONFIG.solver_url.clone(),
        CONFIG.render_service_url.as_deref(),
    )
    .context("Failed to build HTTP clients")?;
    log::info!("fetch strategies: {:?}", chain.strategy_names());

    let search = SearxngClient::new(
        &CONFIG.searxng_url,
        settings.result_count,
        settings.engines.clone(),
    )
    .context("Failed to build search client")?;

    let gateway = DedupGateway::new(
        Arc::new(MemoryCache::with_capacity(CONFIG.cache_max_entries)),
        store.clone(),
    );
    let orchestrator = Orchestrator::new(
        Arc::new(search),
        chain,
        gateway,
        store,
        Arc::new(PlaceholderEmbedder::default()),
        settings,
    );

    let addr = cli.bind.unwrap_or_else(|| CONFIG.bind_addr.clone());
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    log::info!("listening on {addr}");

    axum::serve(listener, create_router(Arc::new(orchestrator))).await?;
    Ok(())
}
