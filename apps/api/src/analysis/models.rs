//! Input and LLM-payload types for the property analysis pipeline.
//!
//! Everything the model returns is parsed leniently: missing fields take the
//! payload's neutral default and numbers may arrive as strings ("$4,500").
//! A reply that is not an object at all fails parsing and the sub-call
//! degrades to `Default::default()`.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

// ────────────────────────────────────────────────────────────────────────────
// Request
// ────────────────────────────────────────────────────────────────────────────

/// What the buyer told us about themselves. Every field is optional; unknown
/// keys from the front end are preserved in `extra` and passed to the prompts.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BuyerProfile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_budget: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repair_tolerance: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ownership_duration: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub biggest_regret: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replaceability: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub deal_breakers: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

/// One analysis request. Built once per API call and never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisRequest {
    pub disclosure_text: String,
    pub inspection_text: String,
    pub property_price: f64,
    #[serde(default)]
    pub buyer_profile: BuyerProfile,
    #[serde(default)]
    pub address: Option<String>,
}

// ────────────────────────────────────────────────────────────────────────────
// Findings
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Critical,
    High,
    #[default]
    Medium,
    Low,
}

impl Severity {
    /// Critical and high findings count against the offer score.
    pub fn is_severe(self) -> bool {
        matches!(self, Severity::Critical | Severity::High)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Critical => "critical",
            Severity::High => "high",
            Severity::Medium => "medium",
            Severity::Low => "low",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = std::convert::Infallible;

    /// Case-insensitive. Labels the model invents ("moderate", "major") map to
    /// their nearest bucket; anything else is medium.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim().to_ascii_lowercase().as_str() {
            "critical" | "severe" | "safety" => Severity::Critical,
            "high" | "major" => Severity::High,
            "low" | "minor" | "cosmetic" => Severity::Low,
            _ => Severity::Medium,
        })
    }
}

impl<'de> Deserialize<'de> for Severity {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Option::<String>::deserialize(deserializer)?;
        Ok(raw
            .as_deref()
            .map(|s| s.parse::<Severity>().unwrap_or_default())
            .unwrap_or_default())
    }
}

fn default_confidence() -> f64 {
    0.5
}

/// A single identified property issue, as extracted by the comprehensive call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub severity: Severity,
    #[serde(default)]
    pub location: String,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub estimated_cost_low: f64,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub estimated_cost_high: f64,
    /// 0.0 – 1.0; clamped again wherever it is aggregated.
    #[serde(default = "default_confidence", deserialize_with = "lenient_f64")]
    pub confidence: f64,
}

/// A place where the disclosure and the inspection disagree.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisclosureGap {
    pub description: String,
    pub severity: Severity,
    /// What the seller wrote, if anything.
    pub disclosure_statement: String,
    /// What the inspector observed.
    pub inspection_evidence: String,
}

// ────────────────────────────────────────────────────────────────────────────
// Sub-call payloads
// ────────────────────────────────────────────────────────────────────────────

/// Payload of the comprehensive analysis call.
///
/// Default: `{findings: [], buyer_insights: {}, transparency_issues: [], narrative: ""}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ComprehensiveAnalysis {
    pub findings: Vec<Finding>,
    pub buyer_insights: Map<String, Value>,
    pub transparency_issues: Vec<DisclosureGap>,
    pub narrative: String,
}

/// Payload of the quick risk call. Defaults are neutral: a mid-range score
/// and no costs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskAssessment {
    #[serde(deserialize_with = "lenient_f64")]
    pub overall_risk_score: f64,
    pub risk_category: String,
    #[serde(deserialize_with = "lenient_f64")]
    pub total_repair_cost_low: f64,
    #[serde(deserialize_with = "lenient_f64")]
    pub total_repair_cost_high: f64,
    pub major_concerns: Vec<String>,
}

impl Default for RiskAssessment {
    fn default() -> Self {
        Self {
            overall_risk_score: 50.0,
            risk_category: "MODERATE".to_string(),
            total_repair_cost_low: 0.0,
            total_repair_cost_high: 0.0,
            major_concerns: Vec::new(),
        }
    }
}

/// Payload of the transparency call. The default score of 70 is what the
/// offer score starts from when this call fails.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransparencyReport {
    #[serde(deserialize_with = "lenient_f64")]
    pub transparency_score: f64,
    pub undisclosed_issues: Vec<DisclosureGap>,
    pub disclosure_quality: String,
}

pub const DEFAULT_TRANSPARENCY_SCORE: f64 = 70.0;

impl Default for TransparencyReport {
    fn default() -> Self {
        Self {
            transparency_score: DEFAULT_TRANSPARENCY_SCORE,
            undisclosed_issues: Vec::new(),
            disclosure_quality: "unknown".to_string(),
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Lenient number parsing
// ────────────────────────────────────────────────────────────────────────────

#[derive(Deserialize)]
#[serde(untagged)]
enum RawNumber {
    Number(f64),
    Text(String),
}

/// Accepts `4500`, `4500.0`, `"4500"`, `"$4,500"` and `null`. Anything that
/// is not a number after stripping currency noise becomes 0.0.
fn lenient_f64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    let raw = Option::<RawNumber>::deserialize(deserializer)?;
    let value = match raw {
        Some(RawNumber::Number(n)) => n,
        Some(RawNumber::Text(s)) => {
            let cleaned: String = s
                .chars()
                .filter(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
                .collect();
            cleaned.parse().unwrap_or(0.0)
        }
        None => 0.0,
    };
    Ok(if value.is_finite() { value } else { 0.0 })
}
