//! Local scoring: pure, deterministic calculators over the three LLM payloads.
//!
//! No I/O and no hash-map iteration: given the same payloads, every output is
//! bit-identical across runs.
//!
//! Note: `RiskDna::composite_score` comes straight from the risk sub-call and
//! is not recomputed from the findings, so the two can disagree. That
//! separation is kept on purpose.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::analysis::models::{Finding, RiskAssessment, TransparencyReport};

/// Penalty per critical/high finding, in offer-score points.
const SEVERE_FINDING_PENALTY: i64 = 3;

const STRUCTURAL_KEYWORDS: &[&str] = &[
    "foundation",
    "structural",
    "crack",
    "settlement",
    "beam",
    "joist",
    "framing",
    "load-bearing",
    "slab",
];

const SYSTEM_KEYWORDS: &[&str] = &["hvac", "electrical", "plumbing", "roof"];

// ────────────────────────────────────────────────────────────────────────────
// Output data models
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskDna {
    /// 0 – 100, taken from the risk sub-call.
    pub composite_score: u32,
    pub risk_category: String,
    /// Findings mentioning structural keywords.
    pub structural_risk: u32,
    /// Findings mentioning hvac / electrical / plumbing / roof.
    pub system_risk: u32,
    /// Critical + high findings.
    pub safety_risk: u32,
    /// High-end repairs as a percentage of price. 0.0 when price is not positive.
    pub repair_ratio: f64,
    pub dna_string: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Grade {
    A,
    B,
    C,
    D,
}

/// Raised alongside an offer that would be nonsensical to present as-is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OfferWarning {
    /// Estimated repairs meet or exceed the asking price.
    RepairsExceedPrice,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OfferScore {
    pub score: u32, // 0 – 100
    pub grade: Grade,
    /// price − Σ estimated_cost_high. Not clamped; see `warning`.
    pub recommended_offer: f64,
    pub confidence: f64, // 0.0 – 1.0
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<OfferWarning>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategicOption {
    pub name: String,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggested_offer: Option<f64>,
}

// ────────────────────────────────────────────────────────────────────────────
// Risk DNA
// ────────────────────────────────────────────────────────────────────────────

pub fn compute_risk_dna(
    findings: &[Finding],
    risk: &RiskAssessment,
    property_price: f64,
) -> RiskDna {
    let structural_risk = count_matching(findings, STRUCTURAL_KEYWORDS);
    let system_risk = count_matching(findings, SYSTEM_KEYWORDS);
    let safety_risk = findings.iter().filter(|f| f.severity.is_severe()).count() as u32;

    let repair_ratio = repair_ratio(risk.total_repair_cost_high, property_price);
    let composite_score = clamp_score(risk.overall_risk_score);

    RiskDna {
        composite_score,
        risk_category: risk.risk_category.clone(),
        structural_risk,
        system_risk,
        safety_risk,
        repair_ratio,
        dna_string: format!(
            "S{structural_risk}-Y{system_risk}-X{safety_risk}-R{composite_score:03}"
        ),
    }
}

fn count_matching(findings: &[Finding], keywords: &[&str]) -> u32 {
    findings
        .iter()
        .filter(|f| {
            let haystack = format!("{} {}", f.description, f.location).to_lowercase();
            keywords.iter().any(|kw| haystack.contains(kw))
        })
        .count() as u32
}

/// A zero, negative or non-finite price would make the ratio meaningless
/// (or infinite), so it is reported as 0.0.
fn repair_ratio(total_repair_cost_high: f64, property_price: f64) -> f64 {
    if !property_price.is_finite() || property_price <= 0.0 {
        warn!(property_price, "Non-positive property price; repair_ratio set to 0");
        return 0.0;
    }
    let ratio = total_repair_cost_high.max(0.0) / property_price * 100.0;
    if ratio.is_finite() {
        ratio
    } else {
        0.0
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Offer score
// ────────────────────────────────────────────────────────────────────────────

pub fn compute_offer_score(
    findings: &[Finding],
    transparency: &TransparencyReport,
    property_price: f64,
) -> OfferScore {
    let severe = findings.iter().filter(|f| f.severity.is_severe()).count() as i64;
    // Clamped once, after the penalty.
    let base = round_score(transparency.transparency_score);
    let score = (base - SEVERE_FINDING_PENALTY * severe).clamp(0, 100) as u32;

    let repairs: f64 = findings.iter().map(|f| f.estimated_cost_high).sum();
    let recommended_offer = property_price - repairs;
    let warning = (recommended_offer <= 0.0 && !findings.is_empty())
        .then_some(OfferWarning::RepairsExceedPrice);

    OfferScore {
        score,
        grade: grade_for(score),
        recommended_offer,
        confidence: mean_confidence(findings),
        warning,
    }
}

pub fn grade_for(score: u32) -> Grade {
    match score {
        85.. => Grade::A,
        70..=84 => Grade::B,
        55..=69 => Grade::C,
        _ => Grade::D,
    }
}

fn mean_confidence(findings: &[Finding]) -> f64 {
    if findings.is_empty() {
        return 0.5;
    }
    let total: f64 = findings
        .iter()
        .map(|f| {
            if f.confidence.is_finite() {
                f.confidence.clamp(0.0, 1.0)
            } else {
                0.0
            }
        })
        .sum();
    total / findings.len() as f64
}

/// NaN becomes 0; the `as` cast saturates infinities.
fn round_score(raw: f64) -> i64 {
    if raw.is_nan() {
        return 0;
    }
    raw.round() as i64
}

/// Rounds and clamps an upstream score into 0 – 100. NaN becomes 0.
fn clamp_score(raw: f64) -> u32 {
    if raw.is_nan() {
        return 0;
    }
    raw.round().clamp(0.0, 100.0) as u32
}

// ────────────────────────────────────────────────────────────────────────────
// Strategic options
// ────────────────────────────────────────────────────────────────────────────

/// Decision table evaluated in fixed order. Rules are independent, so several
/// may fire; if none do, a single "Standard Offer" is returned.
pub fn strategic_options(
    offer: &OfferScore,
    finding_count: usize,
    property_price: f64,
) -> Vec<StrategicOption> {
    let mut options = Vec::new();

    if offer.score >= 70 {
        options.push(StrategicOption {
            name: "Strong Offer".to_string(),
            description: "Disclosure is largely consistent with the inspection. \
                Offer close to the adjusted value to stay competitive."
                .to_string(),
            suggested_offer: Some(offer.recommended_offer),
        });
    }

    if finding_count > 3 {
        options.push(StrategicOption {
            name: "Negotiate Repairs".to_string(),
            description: format!(
                "The inspection surfaced {finding_count} issues. Ask the seller for repairs \
                or a credit covering the estimated cost before removing contingencies."
            ),
            suggested_offer: Some(offer.recommended_offer),
        });
    }

    if offer.score < 50 {
        options.push(StrategicOption {
            name: "Walk Away".to_string(),
            description: "Severe findings and disclosure gaps make this property a poor risk. \
                Consider walking away unless the seller addresses them."
                .to_string(),
            suggested_offer: None,
        });
    }

    if options.is_empty() {
        options.push(StrategicOption {
            name: "Standard Offer".to_string(),
            description: "No strong signal in either direction. Offer near asking price \
                with a standard inspection contingency."
                .to_string(),
            suggested_offer: Some(property_price),
        });
    }

    options
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
