// All LLM prompt constants for the analysis pipeline.
// Reuses cross-cutting fragments from llm_client::prompts.

use crate::analysis::models::{AnalysisRequest, BuyerProfile};
use crate::llm_client::prompts::{truncate_chars, EVIDENCE_INSTRUCTION, JSON_ONLY_SYSTEM};

/// Per-document cap. The comprehensive call sees both documents in full;
/// the two quick calls get shorter excerpts.
const FULL_DOCUMENT_CHARS: usize = 30_000;
const EXCERPT_DOCUMENT_CHARS: usize = 12_000;

pub const COMPREHENSIVE_MAX_TOKENS: u32 = 4096;
pub const RISK_MAX_TOKENS: u32 = 1024;
pub const TRANSPARENCY_MAX_TOKENS: u32 = 1536;

/// System prompt for all three analysis calls.
pub fn analysis_system() -> String {
    format!(
        "You are a licensed home inspector and buyer's-agent analyst reviewing \
        real-estate documents on behalf of a home buyer. {JSON_ONLY_SYSTEM}"
    )
}

/// Comprehensive analysis prompt template.
const COMPREHENSIVE_PROMPT_TEMPLATE: &str = r#"Analyze the seller disclosure and inspection report below for a property listed at {price}{address}.

Return a JSON object with this EXACT schema:
{
  "findings": [
    {
      "description": "Horizontal crack in north foundation wall, 6 ft long",
      "severity": "critical",
      "location": "basement / foundation",
      "estimated_cost_low": 8000,
      "estimated_cost_high": 15000,
      "confidence": 0.85
    }
  ],
  "buyer_insights": {
    "fit_summary": "How these findings interact with this buyer's stated priorities",
    "deal_breaker_hits": ["Any of the buyer's deal breakers that are triggered"]
  },
  "transparency_issues": [
    {
      "description": "Roof leak not disclosed",
      "severity": "high",
      "disclosure_statement": "Seller answered 'No' to known roof leaks",
      "inspection_evidence": "Active staining and moisture at attic sheathing"
    }
  ],
  "narrative": "Two to four paragraphs summarizing the property's condition for the buyer."
}

Rules:
- severity is exactly one of "critical", "high", "medium", "low".
  critical = safety hazard or structural failure; high = major system failure or >$5,000;
  medium = needs repair within 1-2 years; low = cosmetic or routine maintenance.
- Costs are whole US dollars for the repair, low and high estimates.
- confidence is 0.0 - 1.0: how clearly the documents support the finding.
- One finding per distinct issue. Do not merge unrelated defects.

{evidence_instruction}

BUYER PROFILE:
{buyer_profile}

SELLER DISCLOSURE:
{disclosure_text}

INSPECTION REPORT:
{inspection_text}"#;

/// Quick risk assessment prompt template.
const RISK_PROMPT_TEMPLATE: &str = r#"Give a quick overall risk assessment for a property listed at {price}{address}, based on its inspection report.

Return a JSON object with this EXACT schema:
{
  "overall_risk_score": 65,
  "risk_category": "MODERATE",
  "total_repair_cost_low": 12000,
  "total_repair_cost_high": 28000,
  "major_concerns": ["Foundation movement", "Aging electrical panel"]
}

Rules:
- overall_risk_score is 0 - 100, where 100 is the riskiest possible purchase.
- risk_category is exactly one of "LOW", "MODERATE", "ELEVATED", "HIGH", "CRITICAL".
- Repair totals are whole US dollars across all issues found.
- At most five major_concerns, most serious first.

{evidence_instruction}

INSPECTION REPORT:
{inspection_text}"#;

/// Transparency check prompt template.
const TRANSPARENCY_PROMPT_TEMPLATE: &str = r#"Compare what the seller disclosed against what the inspector found. Identify issues the seller knew or should have known about but did not disclose, or understated.

Return a JSON object with this EXACT schema:
{
  "transparency_score": 70,
  "undisclosed_issues": [
    {
      "description": "Prior water intrusion in basement",
      "severity": "high",
      "disclosure_statement": "Seller marked 'No' for past flooding",
      "inspection_evidence": "Efflorescence and water lines on basement walls"
    }
  ],
  "disclosure_quality": "fair"
}

Rules:
- transparency_score is 0 - 100, where 100 means the disclosure fully matches the inspection.
- disclosure_quality is exactly one of "excellent", "good", "fair", "poor".
- Only list an issue if the inspection evidence contradicts or exceeds the disclosure.

{evidence_instruction}

SELLER DISCLOSURE:
{disclosure_text}

INSPECTION REPORT:
{inspection_text}"#;

pub fn build_comprehensive_prompt(request: &AnalysisRequest) -> String {
    render(
        COMPREHENSIVE_PROMPT_TEMPLATE,
        &[
            ("price", format_price(request.property_price).as_str()),
            ("address", format_address(request.address.as_deref()).as_str()),
            ("evidence_instruction", EVIDENCE_INSTRUCTION),
            (
                "buyer_profile",
                render_buyer_profile(&request.buyer_profile).as_str(),
            ),
            (
                "disclosure_text",
                truncate_chars(&request.disclosure_text, FULL_DOCUMENT_CHARS),
            ),
            (
                "inspection_text",
                truncate_chars(&request.inspection_text, FULL_DOCUMENT_CHARS),
            ),
        ],
    )
}

pub fn build_risk_prompt(request: &AnalysisRequest) -> String {
    render(
        RISK_PROMPT_TEMPLATE,
        &[
            ("price", format_price(request.property_price).as_str()),
            ("address", format_address(request.address.as_deref()).as_str()),
            ("evidence_instruction", EVIDENCE_INSTRUCTION),
            (
                "inspection_text",
                truncate_chars(&request.inspection_text, EXCERPT_DOCUMENT_CHARS),
            ),
        ],
    )
}

pub fn build_transparency_prompt(request: &AnalysisRequest) -> String {
    render(
        TRANSPARENCY_PROMPT_TEMPLATE,
        &[
            ("evidence_instruction", EVIDENCE_INSTRUCTION),
            (
                "disclosure_text",
                truncate_chars(&request.disclosure_text, EXCERPT_DOCUMENT_CHARS),
            ),
            (
                "inspection_text",
                truncate_chars(&request.inspection_text, EXCERPT_DOCUMENT_CHARS),
            ),
        ],
    )
}

/// Fills `{name}` placeholders in a single pass over the template. Inserted
/// values are never scanned again, so document text that happens to contain
/// `{inspection_text}` stays literal. Braces that do not name a variable
/// (the JSON schemas) are copied through.
fn render(template: &str, vars: &[(&str, &str)]) -> String {
    let extra: usize = vars.iter().map(|(_, value)| value.len()).sum();
    let mut out = String::with_capacity(template.len() + extra);
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let filled = after.find('}').and_then(|close| {
            let name = &after[..close];
            vars.iter()
                .find(|(key, _)| *key == name)
                .map(|(_, value)| (*value, close))
        });
        match filled {
            Some((value, close)) => {
                out.push_str(value);
                rest = &after[close + 1..];
            }
            None => {
                out.push('{');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

/// Prompt-version fingerprint folded into cache keys, so editing any
/// template invalidates previously cached reports.
pub fn prompt_fingerprint() -> String {
    format!(
        "{}\n{}\n{}\n{}",
        analysis_system(),
        COMPREHENSIVE_PROMPT_TEMPLATE,
        RISK_PROMPT_TEMPLATE,
        TRANSPARENCY_PROMPT_TEMPLATE
    )
}

fn format_price(price: f64) -> String {
    let whole = price.max(0.0).round() as u64;
    let digits = whole.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    format!("${out}")
}

fn format_address(address: Option<&str>) -> String {
    match address.map(str::trim).filter(|a| !a.is_empty()) {
        Some(a) => format!(" at {a}"),
        None => String::new(),
    }
}

/// Renders the profile as "key: value" lines in a stable order.
fn render_buyer_profile(profile: &BuyerProfile) -> String {
    let mut lines = Vec::new();
    if let Some(budget) = profile.max_budget {
        lines.push(format!("- max_budget: {}", format_price(budget)));
    }
    let text_fields = [
        ("repair_tolerance", &profile.repair_tolerance),
        ("ownership_duration", &profile.ownership_duration),
        ("biggest_regret", &profile.biggest_regret),
        ("replaceability", &profile.replaceability),
        ("notes", &profile.notes),
    ];
    for (name, value) in text_fields {
        if let Some(v) = value.as_deref().map(str::trim).filter(|v| !v.is_empty()) {
            lines.push(format!("- {name}: {v}"));
        }
    }
    if !profile.deal_breakers.is_empty() {
        lines.push(format!("- deal_breakers: {}", profile.deal_breakers.join("; ")));
    }
    for (key, value) in &profile.extra {
        lines.push(format!("- {key}: {value}"));
    }

    if lines.is_empty() {
        "(no buyer profile provided)".to_string()
    } else {
        lines.join("\n")
    }
}
