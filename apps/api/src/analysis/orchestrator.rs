//! Turbo analysis: fans out three independent LLM calls and scores locally.
//!
//! Flow: build prompts → join(comprehensive, quick risk, transparency) →
//!       risk DNA / offer score / strategic options → assemble report.
//!
//! A sub-call that fails (transport, API status, unparseable reply) is
//! replaced by its payload's default and marked `Degraded`; the other two are
//! still used. Nothing is retried within one invocation. The only fatal
//! failure is setup, which happens before anything is dispatched.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{error, info, warn};

use crate::analysis::cache::{analysis_cache_key, AnalysisCache};
use crate::analysis::models::{
    AnalysisRequest, ComprehensiveAnalysis, DisclosureGap, Finding, RiskAssessment,
    TransparencyReport,
};
use crate::analysis::prompts::{
    analysis_system, build_comprehensive_prompt, build_risk_prompt, build_transparency_prompt,
    COMPREHENSIVE_MAX_TOKENS, RISK_MAX_TOKENS, TRANSPARENCY_MAX_TOKENS,
};
use crate::analysis::scoring::{
    compute_offer_score, compute_risk_dna, strategic_options, OfferScore, RiskDna,
    StrategicOption,
};
use crate::llm_client::{call_json, LlmClient, ModelClient};

const DEFAULT_LLM_TIMEOUT: Duration = Duration::from_secs(120);

// ────────────────────────────────────────────────────────────────────────────
// Errors
// ────────────────────────────────────────────────────────────────────────────

/// Failures that stop an analysis before any sub-call is dispatched.
#[derive(Debug, Clone, Error)]
pub enum SetupError {
    #[error("ANTHROPIC_API_KEY is not configured")]
    MissingCredential,

    #[error("Failed to build LLM HTTP client: {0}")]
    HttpClient(String),
}

impl SetupError {
    /// Message safe to show an end user.
    pub fn user_message(&self) -> &'static str {
        match self {
            SetupError::MissingCredential => {
                "Property analysis is not configured on this server. Please contact support."
            }
            SetupError::HttpClient(_) => {
                "Property analysis is temporarily unavailable. Please try again later."
            }
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Sub-call outcomes
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubCall {
    Comprehensive,
    Risk,
    Transparency,
}

impl fmt::Display for SubCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SubCall::Comprehensive => "comprehensive",
            SubCall::Risk => "risk",
            SubCall::Transparency => "transparency",
        })
    }
}

/// Result of one sub-call. `Degraded` carries the default payload that was
/// substituted and why, so callers can tell recovery from success.
#[derive(Debug, Clone, PartialEq)]
pub enum SubCallOutcome<T> {
    Ok(T),
    Degraded { payload: T, reason: String },
}

impl<T> SubCallOutcome<T> {
    pub fn payload(&self) -> &T {
        match self {
            SubCallOutcome::Ok(payload) | SubCallOutcome::Degraded { payload, .. } => payload,
        }
    }

    pub fn into_payload(self) -> T {
        match self {
            SubCallOutcome::Ok(payload) | SubCallOutcome::Degraded { payload, .. } => payload,
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, SubCallOutcome::Degraded { .. })
    }

    fn status(&self, call: SubCall) -> SubCallStatus {
        match self {
            SubCallOutcome::Ok(_) => SubCallStatus {
                call,
                status: CallState::Ok,
                reason: None,
            },
            SubCallOutcome::Degraded { reason, .. } => SubCallStatus {
                call,
                status: CallState::Degraded,
                reason: Some(reason.clone()),
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallState {
    Ok,
    Degraded,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubCallStatus {
    pub call: SubCall,
    pub status: CallState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

// ────────────────────────────────────────────────────────────────────────────
// Report
// ────────────────────────────────────────────────────────────────────────────

/// Wall-clock seconds per phase.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Timing {
    pub phase1_parallel: f64,
    pub phase2_local: f64,
    pub total: f64,
}

/// The merged output of one analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurboReport {
    pub offer_score: OfferScore,
    pub risk_dna: RiskDna,
    pub transparency_report: TransparencyReport,
    pub findings: Vec<Finding>,
    pub strategic_options: Vec<StrategicOption>,
    pub buyer_insights: Map<String, Value>,
    /// Narrative from the comprehensive call.
    pub comprehensive_analysis: String,
    pub timing: Timing,
    pub risk_assessment: RiskAssessment,
    pub transparency_issues: Vec<DisclosureGap>,
    pub sub_calls: Vec<SubCallStatus>,
    pub property_price: f64,
    pub address: Option<String>,
    pub model: String,
    #[serde(default)]
    pub cache_hit: bool,
}

impl TurboReport {
    pub fn is_fully_clean(&self) -> bool {
        self.sub_calls.iter().all(|s| s.status == CallState::Ok)
    }
}

/// Phase-2 output: everything computed locally from the three payloads.
#[derive(Debug, Clone, PartialEq)]
pub struct LocalScores {
    pub risk_dna: RiskDna,
    pub offer_score: OfferScore,
    pub strategic_options: Vec<StrategicOption>,
}

pub fn score_locally(
    request: &AnalysisRequest,
    comprehensive: &ComprehensiveAnalysis,
    risk: &RiskAssessment,
    transparency: &TransparencyReport,
) -> LocalScores {
    let findings = &comprehensive.findings;
    let risk_dna = compute_risk_dna(findings, risk, request.property_price);
    let offer_score = compute_offer_score(findings, transparency, request.property_price);
    let strategic_options = strategic_options(&offer_score, findings.len(), request.property_price);

    LocalScores {
        risk_dna,
        offer_score,
        strategic_options,
    }
}

pub fn assemble_report(
    request: &AnalysisRequest,
    comprehensive: SubCallOutcome<ComprehensiveAnalysis>,
    risk: SubCallOutcome<RiskAssessment>,
    transparency: SubCallOutcome<TransparencyReport>,
    scores: LocalScores,
    timing: Timing,
    model: &str,
) -> TurboReport {
    // Merge order is fixed for readability only.
    let sub_calls = vec![
        comprehensive.status(SubCall::Comprehensive),
        risk.status(SubCall::Risk),
        transparency.status(SubCall::Transparency),
    ];
    let comprehensive = comprehensive.into_payload();

    TurboReport {
        offer_score: scores.offer_score,
        risk_dna: scores.risk_dna,
        transparency_report: transparency.into_payload(),
        findings: comprehensive.findings,
        strategic_options: scores.strategic_options,
        buyer_insights: comprehensive.buyer_insights,
        comprehensive_analysis: comprehensive.narrative,
        timing,
        risk_assessment: risk.into_payload(),
        transparency_issues: comprehensive.transparency_issues,
        sub_calls,
        property_price: request.property_price,
        address: request.address.clone(),
        model: model.to_string(),
        cache_hit: false,
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Analyzer
// ────────────────────────────────────────────────────────────────────────────

/// Owns the shared model client and the optional report cache.
/// Invocations share nothing else, so one analyzer serves all requests.
pub struct TurboAnalyzer {
    client: Arc<dyn ModelClient>,
    cache: Option<Arc<dyn AnalysisCache>>,
}

impl TurboAnalyzer {
    pub fn new(client: Arc<dyn ModelClient>) -> Self {
        Self {
            client,
            cache: None,
        }
    }

    /// Validates the credential and builds the production client.
    pub fn from_credentials(api_key: Option<&str>, timeout: Duration) -> Result<Self, SetupError> {
        let api_key = api_key
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .ok_or(SetupError::MissingCredential)?;
        let client = LlmClient::new(api_key.to_string(), timeout)
            .map_err(|e| SetupError::HttpClient(e.to_string()))?;
        Ok(Self::new(Arc::new(client)))
    }

    pub fn with_cache(mut self, cache: Arc<dyn AnalysisCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Runs one full analysis. Never fails: degraded sub-calls are reported
    /// in `TurboReport::sub_calls`.
    pub async fn analyze(&self, request: &AnalysisRequest) -> TurboReport {
        let started = Instant::now();
        let model = self.client.model().to_string();

        let cache_key = self
            .cache
            .as_ref()
            .map(|_| analysis_cache_key(request, &model));
        if let Some(report) = self.cached(cache_key.as_deref(), request, started).await {
            return report;
        }

        // Phase 1: three independent calls, joined.
        let system = analysis_system();
        let comprehensive_prompt = build_comprehensive_prompt(request);
        let risk_prompt = build_risk_prompt(request);
        let transparency_prompt = build_transparency_prompt(request);
        let client = self.client.as_ref();

        let (comprehensive, risk, transparency) = tokio::join!(
            run_sub_call::<ComprehensiveAnalysis>(
                client,
                SubCall::Comprehensive,
                &comprehensive_prompt,
                &system,
                COMPREHENSIVE_MAX_TOKENS,
            ),
            run_sub_call::<RiskAssessment>(
                client,
                SubCall::Risk,
                &risk_prompt,
                &system,
                RISK_MAX_TOKENS,
            ),
            run_sub_call::<TransparencyReport>(
                client,
                SubCall::Transparency,
                &transparency_prompt,
                &system,
                TRANSPARENCY_MAX_TOKENS,
            ),
        );
        let phase1 = started.elapsed();

        // Phase 2: local scoring.
        let phase2_started = Instant::now();
        let scores = score_locally(
            request,
            comprehensive.payload(),
            risk.payload(),
            transparency.payload(),
        );
        let phase2 = phase2_started.elapsed();

        let degraded = [
            comprehensive.is_degraded(),
            risk.is_degraded(),
            transparency.is_degraded(),
        ]
        .iter()
        .filter(|d| **d)
        .count();

        let timing = Timing {
            phase1_parallel: phase1.as_secs_f64(),
            phase2_local: phase2.as_secs_f64(),
            total: started.elapsed().as_secs_f64(),
        };
        let report = assemble_report(
            request,
            comprehensive,
            risk,
            transparency,
            scores,
            timing,
            &model,
        );

        info!(
            phase1_ms = phase1.as_millis() as u64,
            phase2_ms = phase2.as_millis() as u64,
            total_ms = started.elapsed().as_millis() as u64,
            degraded_calls = degraded,
            findings = report.findings.len(),
            offer_score = report.offer_score.score,
            "Turbo analysis complete"
        );

        if let (Some(cache), Some(key)) = (&self.cache, cache_key.as_deref()) {
            if report.is_fully_clean() {
                if let Err(e) = cache.put(key, &report).await {
                    warn!(backend = cache.backend(), error = %e, "Failed to cache analysis");
                }
            }
        }

        report
    }

    /// A hit keeps the cached analysis but describes the current request:
    /// its own address spelling and the time spent on the lookup.
    async fn cached(
        &self,
        key: Option<&str>,
        request: &AnalysisRequest,
        started: Instant,
    ) -> Option<TurboReport> {
        let (cache, key) = (self.cache.as_ref()?, key?);
        match cache.get(key).await {
            Ok(Some(mut report)) => {
                info!(backend = cache.backend(), "Serving analysis from cache");
                report.cache_hit = true;
                report.address = request.address.clone();
                report.timing = Timing {
                    phase1_parallel: 0.0,
                    phase2_local: 0.0,
                    total: started.elapsed().as_secs_f64(),
                };
                Some(report)
            }
            Ok(None) => None,
            Err(e) => {
                warn!(backend = cache.backend(), error = %e, "Analysis cache lookup failed");
                None
            }
        }
    }
}

/// One-shot entry point for callers that do not keep a `TurboAnalyzer`
/// around. Fails only on setup; sub-call failures degrade inside the report.
#[allow(dead_code)]
pub async fn run_turbo_analysis(
    request: &AnalysisRequest,
    credential: Option<&str>,
    cache: Option<Arc<dyn AnalysisCache>>,
) -> Result<TurboReport, SetupError> {
    let mut analyzer = TurboAnalyzer::from_credentials(credential, DEFAULT_LLM_TIMEOUT)?;
    if let Some(cache) = cache {
        analyzer = analyzer.with_cache(cache);
    }
    Ok(analyzer.analyze(request).await)
}

/// One attempt; any failure degrades to `T::default()`.
async fn run_sub_call<T>(
    client: &dyn ModelClient,
    call: SubCall,
    prompt: &str,
    system: &str,
    max_tokens: u32,
) -> SubCallOutcome<T>
where
    T: DeserializeOwned + Default,
{
    let started = Instant::now();
    match call_json::<T>(client, prompt, system, max_tokens).await {
        Ok(payload) => SubCallOutcome::Ok(payload),
        Err(e) => {
            error!(
                call = %call,
                elapsed_ms = started.elapsed().as_millis() as u64,
                prompt_length = prompt.len(),
                error = %e,
                "Analysis sub-call failed; using default payload"
            );
            SubCallOutcome::Degraded {
                payload: T::default(),
                reason: e.to_string(),
            }
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use serde_json::json;
    use tokio::sync::Barrier;

    use crate::analysis::cache::InMemoryAnalysisCache;
    use crate::analysis::models::{BuyerProfile, Severity};
    use crate::analysis::scoring::Grade;
    use crate::llm_client::{LlmError, LlmResponse};

    /// Answers each prompt according to which schema it asks for.
    /// `None` simulates a transport failure.
    struct ScriptedClient {
        comprehensive: Option<String>,
        risk: Option<String>,
        transparency: Option<String>,
        calls: AtomicUsize,
        barrier: Option<Arc<Barrier>>,
    }

    impl ScriptedClient {
        fn new(
            comprehensive: Option<String>,
            risk: Option<String>,
            transparency: Option<String>,
        ) -> Self {
            Self {
                comprehensive,
                risk,
                transparency,
                calls: AtomicUsize::new(0),
                barrier: None,
            }
        }

        fn failing() -> Self {
            Self::new(None, None, None)
        }
    }

    #[async_trait]
    impl ModelClient for ScriptedClient {
        async fn complete(
            &self,
            prompt: &str,
            _system: &str,
            _max_tokens: u32,
        ) -> Result<LlmResponse, LlmError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(barrier) = &self.barrier {
                barrier.wait().await;
            }
            let reply = if prompt.contains("\"overall_risk_score\"") {
                &self.risk
            } else if prompt.contains("\"transparency_score\"") {
                &self.transparency
            } else {
                &self.comprehensive
            };
            match reply {
                Some(text) => Ok(LlmResponse::from_text(text.clone())),
                None => Err(LlmError::Api {
                    status: 503,
                    message: "upstream overloaded".to_string(),
                }),
            }
        }
    }

    fn request(price: f64) -> AnalysisRequest {
        AnalysisRequest {
            disclosure_text: "Seller reports no known structural or roof issues.".to_string(),
            inspection_text: "Foundation crack, roof leak, worn carpet, scuffed paint.".to_string(),
            property_price: price,
            buyer_profile: BuyerProfile::default(),
            address: Some("12 Elm St".to_string()),
        }
    }

    fn four_findings_json() -> String {
        json!({
            "findings": [
                {"description": "Foundation crack", "severity": "critical", "location": "basement",
                 "estimated_cost_low": 10000, "estimated_cost_high": 30000, "confidence": 0.9},
                {"description": "Roof leak", "severity": "high", "location": "attic",
                 "estimated_cost_low": 3000, "estimated_cost_high": 12000, "confidence": 0.8},
                {"description": "Worn carpet", "severity": "medium", "location": "living room",
                 "estimated_cost_low": 1000, "estimated_cost_high": 5000, "confidence": 0.7},
                {"description": "Scuffed paint", "severity": "low", "location": "hallway",
                 "estimated_cost_low": 500, "estimated_cost_high": 3000, "confidence": 0.6}
            ],
            "buyer_insights": {"fit_summary": "Repairs exceed the buyer's stated tolerance."},
            "transparency_issues": [],
            "narrative": "The home has two significant defects."
        })
        .to_string()
    }

    fn healthy_client() -> ScriptedClient {
        ScriptedClient::new(
            Some(format!("```json\n{}\n```", four_findings_json())),
            Some(
                json!({"overall_risk_score": 64, "risk_category": "ELEVATED",
                       "total_repair_cost_low": 14500, "total_repair_cost_high": 50000,
                       "major_concerns": ["Foundation crack"]})
                .to_string(),
            ),
            Some(
                json!({"transparency_score": 90, "undisclosed_issues": [],
                       "disclosure_quality": "good"})
                .to_string(),
            ),
        )
    }

    /// A fully-default report, shared with the cache tests.
    pub(crate) fn sample_report() -> TurboReport {
        let request = request(400_000.0);
        let comprehensive = ComprehensiveAnalysis::default();
        let risk = RiskAssessment::default();
        let transparency = TransparencyReport::default();
        let scores = score_locally(&request, &comprehensive, &risk, &transparency);
        assemble_report(
            &request,
            SubCallOutcome::Ok(comprehensive),
            SubCallOutcome::Ok(risk),
            SubCallOutcome::Ok(transparency),
            scores,
            Timing {
                phase1_parallel: 1.0,
                phase2_local: 0.0,
                total: 1.0,
            },
            "test-model",
        )
    }

    #[tokio::test]
    async fn test_healthy_pipeline_merges_all_three_calls() {
        let analyzer = TurboAnalyzer::new(Arc::new(healthy_client()));
        let report = analyzer.analyze(&request(500_000.0)).await;

        assert!(report.is_fully_clean());
        assert_eq!(report.findings.len(), 4);
        assert_eq!(report.offer_score.score, 84);
        assert_eq!(report.offer_score.grade, Grade::B);
        assert_eq!(report.offer_score.recommended_offer, 450_000.0);
        assert_eq!(report.risk_dna.composite_score, 64);
        assert_eq!(report.risk_dna.safety_risk, 2);
        assert!((report.risk_dna.repair_ratio - 10.0).abs() < 1e-9);
        assert_eq!(report.transparency_report.disclosure_quality, "good");
        assert_eq!(report.comprehensive_analysis, "The home has two significant defects.");
        assert!(report.buyer_insights.contains_key("fit_summary"));
        assert_eq!(report.findings[0].severity, Severity::Critical);
        assert!(report.timing.total >= report.timing.phase1_parallel);
    }

    #[tokio::test]
    async fn test_all_calls_failing_yields_default_report() {
        let analyzer = TurboAnalyzer::new(Arc::new(ScriptedClient::failing()));
        let report = analyzer.analyze(&request(500_000.0)).await;

        assert_eq!(report.offer_score.score, 70);
        assert_eq!(report.offer_score.grade, Grade::B);
        assert!(report.findings.is_empty());
        assert_eq!(report.risk_dna.composite_score, 50);
        assert_eq!(report.transparency_report.transparency_score, 70.0);
        assert!(!report.strategic_options.is_empty());
        assert_eq!(report.sub_calls.len(), 3);
        assert!(report
            .sub_calls
            .iter()
            .all(|s| s.status == CallState::Degraded && s.reason.is_some()));
    }

    #[tokio::test]
    async fn test_single_failure_keeps_other_results() {
        let mut client = healthy_client();
        client.transparency = Some("Sorry, I can't help with that.".to_string());
        let analyzer = TurboAnalyzer::new(Arc::new(client));
        let report = analyzer.analyze(&request(500_000.0)).await;

        assert_eq!(report.findings.len(), 4);
        assert_eq!(report.risk_dna.composite_score, 64);
        // Transparency default 70, minus two severe findings.
        assert_eq!(report.offer_score.score, 64);
        let statuses: Vec<CallState> = report.sub_calls.iter().map(|s| s.status).collect();
        assert_eq!(
            statuses,
            vec![CallState::Ok, CallState::Ok, CallState::Degraded]
        );
    }

    #[tokio::test]
    async fn test_three_calls_are_in_flight_together() {
        let mut client = healthy_client();
        client.barrier = Some(Arc::new(Barrier::new(3)));
        let analyzer = TurboAnalyzer::new(Arc::new(client));

        let report = tokio::time::timeout(
            Duration::from_secs(5),
            analyzer.analyze(&request(500_000.0)),
        )
        .await
        .expect("sub-calls must run concurrently, not one after another");
        assert!(report.is_fully_clean());
    }

    #[tokio::test]
    async fn test_derived_scores_are_identical_across_runs() {
        let analyzer = TurboAnalyzer::new(Arc::new(healthy_client()));
        let first = analyzer.analyze(&request(500_000.0)).await;
        let second = analyzer.analyze(&request(500_000.0)).await;

        assert_eq!(first.risk_dna, second.risk_dna);
        assert_eq!(first.offer_score, second.offer_score);
        assert_eq!(first.strategic_options, second.strategic_options);
    }

    #[tokio::test]
    async fn test_zero_price_does_not_panic() {
        let analyzer = TurboAnalyzer::new(Arc::new(healthy_client()));
        let report = analyzer.analyze(&request(0.0)).await;
        assert_eq!(report.risk_dna.repair_ratio, 0.0);
        assert!(report.offer_score.score <= 100);
    }

    #[tokio::test]
    async fn test_clean_report_is_served_from_cache() {
        let client = Arc::new(healthy_client());
        let cache = Arc::new(InMemoryAnalysisCache::new(Duration::from_secs(60), 8));
        let analyzer = TurboAnalyzer::new(client.clone()).with_cache(cache);

        let first = analyzer.analyze(&request(500_000.0)).await;
        let second = analyzer.analyze(&request(500_000.0)).await;

        assert!(!first.cache_hit);
        assert!(second.cache_hit);
        assert_eq!(first.offer_score, second.offer_score);
        assert_eq!(client.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_degraded_report_is_not_cached() {
        let client = Arc::new(ScriptedClient::failing());
        let cache = Arc::new(InMemoryAnalysisCache::new(Duration::from_secs(60), 8));
        let analyzer = TurboAnalyzer::new(client.clone()).with_cache(cache);

        analyzer.analyze(&request(500_000.0)).await;
        let second = analyzer.analyze(&request(500_000.0)).await;

        assert!(!second.cache_hit);
        assert_eq!(client.calls.load(Ordering::SeqCst), 6);
    }

    #[tokio::test]
    async fn test_cache_hit_reflects_current_request() {
        let client = Arc::new(healthy_client());
        let cache = Arc::new(InMemoryAnalysisCache::new(Duration::from_secs(60), 8));
        let analyzer = TurboAnalyzer::new(client.clone()).with_cache(cache);

        let first = analyzer.analyze(&request(500_000.0)).await;
        let mut shouted = request(500_000.0);
        shouted.address = Some("12 ELM ST".to_string());
        let second = analyzer.analyze(&shouted).await;

        assert!(second.cache_hit);
        assert_eq!(client.calls.load(Ordering::SeqCst), 3);
        assert_eq!(first.address.as_deref(), Some("12 Elm St"));
        assert_eq!(second.address.as_deref(), Some("12 ELM ST"));
        assert_eq!(second.timing.phase1_parallel, 0.0);
        assert_eq!(second.findings, first.findings);
    }

    #[tokio::test]
    async fn test_run_turbo_analysis_rejects_blank_credential() {
        let cache: Arc<dyn AnalysisCache> =
            Arc::new(InMemoryAnalysisCache::new(Duration::from_secs(60), 8));
        let result = run_turbo_analysis(&request(500_000.0), Some("  "), Some(cache)).await;
        assert!(matches!(result, Err(SetupError::MissingCredential)));
        let result = run_turbo_analysis(&request(500_000.0), None, None).await;
        assert!(matches!(result, Err(SetupError::MissingCredential)));
    }

    #[tokio::test]
    async fn test_run_turbo_analysis_serves_cached_report_without_network() {
        let cache: Arc<dyn AnalysisCache> =
            Arc::new(InMemoryAnalysisCache::new(Duration::from_secs(60), 8));
        let stored = sample_report();
        let key = analysis_cache_key(&request(400_000.0), crate::llm_client::MODEL);
        cache.put(&key, &stored).await.unwrap();

        let report = run_turbo_analysis(&request(400_000.0), Some("sk-ant-test"), Some(cache))
            .await
            .unwrap();
        assert!(report.cache_hit);
        assert_eq!(report.offer_score, stored.offer_score);
    }

    #[test]
    fn test_missing_credential_is_a_setup_error() {
        let timeout = Duration::from_secs(1);
        assert!(matches!(
            TurboAnalyzer::from_credentials(None, timeout),
            Err(SetupError::MissingCredential)
        ));
        assert!(matches!(
            TurboAnalyzer::from_credentials(Some("   "), timeout),
            Err(SetupError::MissingCredential)
        ));
        assert!(TurboAnalyzer::from_credentials(Some("sk-ant-test"), timeout).is_ok());
    }

    #[test]
    fn test_report_serializes_expected_top_level_keys() {
        let value = serde_json::to_value(sample_report()).unwrap();
        for key in [
            "offer_score",
            "risk_dna",
            "transparency_report",
            "findings",
            "strategic_options",
            "buyer_insights",
            "comprehensive_analysis",
            "timing",
        ] {
            assert!(value.get(key).is_some(), "missing top-level key {key}");
        }
        assert!(value["timing"].get("phase1_parallel").is_some());
        assert_eq!(value["sub_calls"][0]["call"], "comprehensive");
        assert_eq!(value["sub_calls"][0]["status"], "ok");
    }
}
