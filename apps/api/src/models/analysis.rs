use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PropertyAnalysisRow {
    pub id: Uuid,
    pub address: Option<String>,
    pub property_price: f64,
    pub offer_score: i32,
    pub risk_score: i32,
    /// True when at least one sub-call fell back to its default payload.
    pub degraded: bool,
    pub report: Value,
    pub created_at: DateTime<Utc>,
}
