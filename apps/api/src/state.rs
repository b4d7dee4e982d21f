use std::sync::Arc;

use sqlx::PgPool;

use crate::analysis::orchestrator::{SetupError, TurboAnalyzer};
use crate::config::Config;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    /// Built once at startup. A setup failure (e.g. missing API key) is kept
    /// rather than aborting the server, and reported on every analysis request.
    pub analyzer: Result<Arc<TurboAnalyzer>, SetupError>,
    pub config: Config,
}
