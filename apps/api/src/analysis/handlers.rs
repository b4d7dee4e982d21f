//! Axum route handlers for the Analysis API.

use axum::{
    extract::{Multipart, Path, State},
    Json,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::analysis::ingest::read_upload_form;
use crate::analysis::models::AnalysisRequest;
use crate::analysis::orchestrator::TurboReport;
use crate::analysis::store::{get_analysis, save_analysis};
use crate::errors::AppError;
use crate::state::AppState;

// ────────────────────────────────────────────────────────────────────────────
// Response types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct AnalyzeResponse {
    pub success: bool,
    /// None when the report could not be persisted; the report is still valid.
    pub analysis_id: Option<Uuid>,
    #[serde(flatten)]
    pub report: TurboReport,
}

#[derive(Debug, Serialize)]
pub struct AnalysisDetailResponse {
    pub success: bool,
    pub analysis_id: Uuid,
    pub created_at: DateTime<Utc>,
    #[serde(flatten)]
    pub report: TurboReport,
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// POST /api/v1/analyze
///
/// Runs the turbo analysis over already-extracted document text.
pub async fn handle_analyze(
    State(state): State<AppState>,
    Json(request): Json<AnalysisRequest>,
) -> Result<Json<AnalyzeResponse>, AppError> {
    run_analysis(&state, request).await
}

/// POST /api/v1/analyze/upload
///
/// Multipart variant: `disclosure` and `inspection` PDFs plus form fields.
pub async fn handle_analyze_upload(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<AnalyzeResponse>, AppError> {
    let request = read_upload_form(multipart).await?;
    run_analysis(&state, request).await
}

/// GET /api/v1/analyses/:id
pub async fn handle_get_analysis(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<AnalysisDetailResponse>, AppError> {
    let row = get_analysis(&state.db, id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Analysis {id} not found")))?;

    let report: TurboReport = serde_json::from_value(row.report).map_err(|e| {
        AppError::Internal(anyhow::anyhow!("Stored analysis {id} is unreadable: {e}"))
    })?;

    Ok(Json(AnalysisDetailResponse {
        success: true,
        analysis_id: row.id,
        created_at: row.created_at,
        report,
    }))
}

async fn run_analysis(
    state: &AppState,
    request: AnalysisRequest,
) -> Result<Json<AnalyzeResponse>, AppError> {
    validate_request(&request)?;
    let analyzer = state.analyzer.clone()?;

    let report = analyzer.analyze(&request).await;

    let analysis_id = match save_analysis(&state.db, &report).await {
        Ok(id) => {
            info!(analysis_id = %id, "Saved property analysis");
            Some(id)
        }
        Err(e) => {
            warn!(error = %e, "Failed to persist property analysis");
            None
        }
    };

    Ok(Json(AnalyzeResponse {
        success: true,
        analysis_id,
        report,
    }))
}

/// Rejects inputs the pipeline cannot say anything useful about. A price of
/// exactly zero is allowed; the scorers guard it.
fn validate_request(request: &AnalysisRequest) -> Result<(), AppError> {
    if request.disclosure_text.trim().is_empty() {
        return Err(AppError::Validation(
            "disclosure_text cannot be empty".to_string(),
        ));
    }
    if request.inspection_text.trim().is_empty() {
        return Err(AppError::Validation(
            "inspection_text cannot be empty".to_string(),
        ));
    }
    if !request.property_price.is_finite() || request.property_price < 0.0 {
        return Err(AppError::Validation(
            "property_price must be a non-negative number".to_string(),
        ));
    }
    Ok(())
}
