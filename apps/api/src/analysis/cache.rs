//! Analysis cache: an injected collaborator holding finished reports.
//!
//! Two backends: a bounded in-process map (TTL + oldest-first eviction) and
//! Redis with per-key expiry. Entries are immutable once written, so two
//! requests racing to fill the same key are harmless.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use redis::AsyncCommands;
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::analysis::models::AnalysisRequest;
use crate::analysis::orchestrator::TurboReport;
use crate::analysis::prompts::prompt_fingerprint;

const REDIS_KEY_PREFIX: &str = "riskscan:analysis:";

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[async_trait]
pub trait AnalysisCache: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<TurboReport>, CacheError>;
    async fn put(&self, key: &str, report: &TurboReport) -> Result<(), CacheError>;
    /// "memory" or "redis", for logs.
    fn backend(&self) -> &'static str;
}

/// Cache key over everything that changes the model's answer: the normalised
/// request, the model id, and the prompt templates.
pub fn analysis_cache_key(request: &AnalysisRequest, model: &str) -> String {
    let normalised = AnalysisRequest {
        disclosure_text: request.disclosure_text.trim().to_string(),
        inspection_text: request.inspection_text.trim().to_string(),
        property_price: request.property_price,
        buyer_profile: request.buyer_profile.clone(),
        address: request
            .address
            .as_deref()
            .map(|a| a.trim().to_lowercase())
            .filter(|a| !a.is_empty()),
    };
    let request_json = serde_json::to_string(&normalised).unwrap_or_default();
    let prompt_version = hash_string(&prompt_fingerprint());

    hash_string(&format!("{request_json}|{model}|{prompt_version}"))
}

/// Hash a string to a hex string using SHA256
fn hash_string(s: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(s.as_bytes());
    format!("{:x}", hasher.finalize())
}

// ────────────────────────────────────────────────────────────────────────────
// In-memory backend
// ────────────────────────────────────────────────────────────────────────────

struct CachedReport {
    report: TurboReport,
    created_at: Instant,
}

pub struct InMemoryAnalysisCache {
    ttl: Duration,
    max_entries: usize,
    entries: Mutex<HashMap<String, CachedReport>>,
}

impl InMemoryAnalysisCache {
    pub fn new(ttl: Duration, max_entries: usize) -> Self {
        Self {
            ttl,
            max_entries: max_entries.max(1),
            entries: Mutex::new(HashMap::new()),
        }
    }

    fn get_at(&self, key: &str, now: Instant) -> Option<TurboReport> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.retain(|_, v| now.saturating_duration_since(v.created_at) <= self.ttl);
        entries.get(key).map(|v| v.report.clone())
    }

    fn insert_at(&self, key: &str, report: TurboReport, now: Instant) {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.retain(|_, v| now.saturating_duration_since(v.created_at) <= self.ttl);
        if !entries.contains_key(key) && entries.len() >= self.max_entries {
            if let Some(victim) = entries
                .iter()
                .min_by_key(|(_, v)| v.created_at)
                .map(|(k, _)| k.clone())
            {
                entries.remove(&victim);
            }
        }
        entries.insert(
            key.to_string(),
            CachedReport {
                report,
                created_at: now,
            },
        );
    }

    fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

#[async_trait]
impl AnalysisCache for InMemoryAnalysisCache {
    async fn get(&self, key: &str) -> Result<Option<TurboReport>, CacheError> {
        Ok(self.get_at(key, Instant::now()))
    }

    async fn put(&self, key: &str, report: &TurboReport) -> Result<(), CacheError> {
        self.insert_at(key, report.clone(), Instant::now());
        tracing::debug!(key = %key, entries = self.len(), "Cached analysis in memory");
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Redis backend
// ────────────────────────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct RedisAnalysisCache {
    client: redis::Client,
    ttl_seconds: u64,
}

impl RedisAnalysisCache {
    pub fn new(client: redis::Client, ttl: Duration) -> Self {
        Self {
            client,
            ttl_seconds: ttl.as_secs().max(1),
        }
    }
}

#[async_trait]
impl AnalysisCache for RedisAnalysisCache {
    async fn get(&self, key: &str) -> Result<Option<TurboReport>, CacheError> {
        let full_key = format!("{REDIS_KEY_PREFIX}{key}");
        let mut conn = self.client.get_multiplexed_async_connection().await?;

        let data: Option<String> = conn.get(&full_key).await?;

        match data {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    async fn put(&self, key: &str, report: &TurboReport) -> Result<(), CacheError> {
        let full_key = format!("{REDIS_KEY_PREFIX}{key}");
        let json = serde_json::to_string(report)?;

        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let _: () = conn.set_ex(&full_key, json, self.ttl_seconds).await?;

        tracing::debug!(key = %full_key, ttl = self.ttl_seconds, "Cached analysis in Redis");
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "redis"
    }
}
