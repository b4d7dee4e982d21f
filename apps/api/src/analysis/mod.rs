// Property analysis: document ingestion, the turbo LLM pipeline, local
// scoring, and report persistence.
// All LLM calls go through llm_client; no direct Anthropic calls here.

pub mod cache;
pub mod handlers;
pub mod ingest;
pub mod models;
pub mod orchestrator;
pub mod prompts;
pub mod scoring;
pub mod store;
