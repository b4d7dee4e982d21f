//! Persistence of finished reports. The pipeline itself never touches the
//! database; handlers save what it returns.

use anyhow::Context;
use sqlx::PgPool;
use uuid::Uuid;

use crate::analysis::orchestrator::TurboReport;
use crate::models::analysis::PropertyAnalysisRow;

/// Inserts one report and returns its new id.
pub async fn save_analysis(pool: &PgPool, report: &TurboReport) -> anyhow::Result<Uuid> {
    let id = Uuid::new_v4();
    let report_json = serde_json::to_value(report).context("Failed to serialize TurboReport")?;

    sqlx::query(
        r#"
        INSERT INTO property_analyses
            (id, address, property_price, offer_score, risk_score, degraded, report)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        "#,
    )
    .bind(id)
    .bind(report.address.as_deref())
    .bind(report.property_price)
    .bind(report.offer_score.score as i32)
    .bind(report.risk_dna.composite_score as i32)
    .bind(!report.is_fully_clean())
    .bind(&report_json)
    .execute(pool)
    .await
    .context("Failed to insert property analysis")?;

    Ok(id)
}

pub async fn get_analysis(
    pool: &PgPool,
    id: Uuid,
) -> Result<Option<PropertyAnalysisRow>, sqlx::Error> {
    sqlx::query_as::<_, PropertyAnalysisRow>("SELECT * FROM property_analyses WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
}
