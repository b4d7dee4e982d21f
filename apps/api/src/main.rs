mod analysis;
mod config;
mod db;
mod errors;
mod llm_client;
mod models;
mod routes;
mod state;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::analysis::cache::{AnalysisCache, InMemoryAnalysisCache, RedisAnalysisCache};
use crate::analysis::orchestrator::TurboAnalyzer;
use crate::config::Config;
use crate::db::create_pool;
use crate::routes::build_router;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting riskscan API v{}", env!("CARGO_PKG_VERSION"));

    // Initialize PostgreSQL
    let db = create_pool(&config.database_url).await?;

    // Initialize analysis cache (Redis when configured, bounded in-memory otherwise)
    let cache = build_cache(&config)?;
    info!("Analysis cache initialized (backend: {})", cache.backend());

    // Initialize the analysis pipeline. A missing key is not fatal at startup;
    // analysis requests report it instead.
    let analyzer = TurboAnalyzer::from_credentials(
        config.anthropic_api_key.as_deref(),
        Duration::from_secs(config.llm_timeout_secs),
    )
    .map(|a| Arc::new(a.with_cache(cache)));
    match &analyzer {
        Ok(_) => info!("LLM client initialized (model: {})", llm_client::MODEL),
        Err(e) => warn!("Analysis pipeline unavailable: {e}"),
    }

    // Build app state
    let state = AppState {
        db,
        analyzer,
        config: config.clone(),
    };

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive()); // TODO: restrict origins once the front-end domain is fixed

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

fn build_cache(config: &Config) -> Result<Arc<dyn AnalysisCache>> {
    let ttl = Duration::from_secs(config.cache_ttl_secs);
    match &config.redis_url {
        Some(url) => {
            let client = redis::Client::open(url.as_str())?;
            Ok(Arc::new(RedisAnalysisCache::new(client, ttl)))
        }
        None => Ok(Arc::new(InMemoryAnalysisCache::new(
            ttl,
            config.cache_capacity,
        ))),
    }
}
