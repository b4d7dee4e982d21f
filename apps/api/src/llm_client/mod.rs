//! LLM Client: the single point of entry for all Claude API calls in riskscan.
//!
//! ARCHITECTURAL RULE: No other module may call the Anthropic API directly.
//! All LLM interactions MUST go through `ModelClient`, which is also the seam
//! the analysis pipeline is tested against.
//!
//! Model: claude-sonnet-4-5 (hardcoded, not configurable)
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{
    de::{DeserializeOwned, IgnoredAny},
    Deserialize, Serialize,
};
use thiserror::Error;
use tracing::debug;

pub mod prompts;

const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";
/// The model used for all LLM calls in riskscan.
/// This is intentionally hardcoded to prevent accidental drift.
pub const MODEL: &str = "claude-sonnet-4-5";

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("LLM returned empty content")]
    EmptyContent,
}

#[derive(Debug, Serialize)]
struct AnthropicRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    system: &'a str,
    messages: Vec<AnthropicMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct AnthropicMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
pub struct LlmResponse {
    pub content: Vec<ContentBlock>,
    pub usage: Usage,
}

#[derive(Debug, Deserialize)]
pub struct ContentBlock {
    #[serde(rename = "type")]
    pub block_type: String,
    pub text: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct Usage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

impl LlmResponse {
    /// Extracts the text content from the first text block.
    pub fn text(&self) -> Option<&str> {
        self.content
            .iter()
            .find(|b| b.block_type == "text")
            .and_then(|b| b.text.as_deref())
    }

    /// Builds a single-text-block response. Used by scripted clients in tests.
    #[cfg(test)]
    pub fn from_text(text: impl Into<String>) -> Self {
        Self {
            content: vec![ContentBlock {
                block_type: "text".to_string(),
                text: Some(text.into()),
            }],
            usage: Usage::default(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct AnthropicError {
    error: AnthropicErrorBody,
}

#[derive(Debug, Deserialize)]
struct AnthropicErrorBody {
    message: String,
}

/// A model endpoint that answers one prompt with one response.
///
/// `LlmClient` is the production implementation. The analysis pipeline only
/// ever sees `&dyn ModelClient`.
#[async_trait]
pub trait ModelClient: Send + Sync {
    async fn complete(
        &self,
        prompt: &str,
        system: &str,
        max_tokens: u32,
    ) -> Result<LlmResponse, LlmError>;

    /// Model identifier, folded into analysis cache keys.
    fn model(&self) -> &str {
        MODEL
    }
}

/// The single LLM client used by all services in riskscan.
/// Wraps the Anthropic Messages API. One attempt per call: failures are
/// returned to the caller, which decides how to degrade.
#[derive(Clone)]
pub struct LlmClient {
    client: Client,
    api_key: String,
}

impl LlmClient {
    pub fn new(api_key: String, timeout: Duration) -> Result<Self, LlmError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client, api_key })
    }
}

#[async_trait]
impl ModelClient for LlmClient {
    /// Makes a raw call to the Claude API, returning the full response object.
    async fn complete(
        &self,
        prompt: &str,
        system: &str,
        max_tokens: u32,
    ) -> Result<LlmResponse, LlmError> {
        let request_body = AnthropicRequest {
            model: MODEL,
            max_tokens,
            system,
            messages: vec![AnthropicMessage {
                role: "user",
                content: prompt,
            }],
        };

        let response = self
            .client
            .post(ANTHROPIC_API_URL)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .json(&request_body)
            .send()
            .await?;

        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            // Try to parse error message
            let message = serde_json::from_str::<AnthropicError>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);
            return Err(LlmError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let llm_response: LlmResponse = response.json().await?;

        debug!(
            "LLM call succeeded: input_tokens={}, output_tokens={}",
            llm_response.usage.input_tokens, llm_response.usage.output_tokens
        );

        Ok(llm_response)
    }
}

/// Calls the model and deserializes the JSON object embedded in its reply.
/// The prompt must instruct the model to return valid JSON.
pub async fn call_json<T: DeserializeOwned>(
    client: &dyn ModelClient,
    prompt: &str,
    system: &str,
    max_tokens: u32,
) -> Result<T, LlmError> {
    let response = client.complete(prompt, system, max_tokens).await?;

    let text = response.text().ok_or(LlmError::EmptyContent)?;
    let text = extract_json(text);
    if text.is_empty() {
        return Err(LlmError::EmptyContent);
    }

    serde_json::from_str(text).map_err(LlmError::Parse)
}

/// Pulls the JSON payload out of model output.
///
/// A reply that is already a JSON object is returned untouched. Otherwise a
/// fenced block (```json ... ``` or ``` ... ```) wins, and anything before
/// or after the fences is dropped. Fences only count at the start of a line,
/// so backticks inside string values are left alone. Without fences, the
/// outermost `{ ... }` span is taken, which discards chatty preambles.
fn extract_json(text: &str) -> &str {
    let text = text.trim();

    if text.starts_with('{') && serde_json::from_str::<IgnoredAny>(text).is_ok() {
        return text;
    }

    if let Some(open) = find_fence(text) {
        let rest = &text[open + 3..];
        let rest = rest
            .strip_prefix("json")
            .or_else(|| rest.strip_prefix("JSON"))
            .unwrap_or(rest);
        let body = match find_fence(rest) {
            Some(close) => &rest[..close],
            None => rest.trim_end().strip_suffix("```").unwrap_or(rest),
        };
        return body.trim();
    }

    match (text.find('{'), text.rfind('}')) {
        (Some(start), Some(end)) if start < end => &text[start..=end],
        _ => text,
    }
}

/// Byte offset of the first ``` that opens a line (leading whitespace allowed).
fn find_fence(text: &str) -> Option<usize> {
    let mut offset = 0;
    for line in text.split_inclusive('\n') {
        let indent = line.len() - line.trim_start().len();
        if line[indent..].starts_with("```") {
            return Some(offset + indent);
        }
        offset += line.len();
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_json_with_json_tag() {
        let input = "```json\n{\"key\": \"value\"}\n```";
        assert_eq!(extract_json(input), "{\"key\": \"value\"}");
    }

    #[test]
    fn test_extract_json_without_tag() {
        let input = "```\n{\"key\": \"value\"}\n```";
        assert_eq!(extract_json(input), "{\"key\": \"value\"}");
    }

    #[test]
    fn test_extract_json_no_fences() {
        let input = "{\"key\": \"value\"}";
        assert_eq!(extract_json(input), "{\"key\": \"value\"}");
    }

    #[test]
    fn test_extract_json_drops_prose_around_fence() {
        let input = "Here is the analysis you asked for:\n```json\n{\"a\": 1}\n```\nLet me know!";
        assert_eq!(extract_json(input), "{\"a\": 1}");
    }

    #[test]
    fn test_extract_json_unfenced_prose_uses_brace_span() {
        let input = "Sure. {\"a\": {\"b\": 2}} Hope that helps.";
        assert_eq!(extract_json(input), "{\"a\": {\"b\": 2}}");
    }

    #[test]
    fn test_extract_json_unterminated_fence_takes_rest() {
        let input = "```json\n{\"a\": 1}";
        assert_eq!(extract_json(input), "{\"a\": 1}");
    }

    #[test]
    fn test_extract_json_raw_object_with_backticks_in_strings() {
        let input = r#"{"narrative": "Inspector noted ```see page 4``` for details", "findings": []}"#;
        assert_eq!(extract_json(input), input);
    }

    #[test]
    fn test_extract_json_inline_backticks_inside_fenced_block() {
        let input = "Result:\n```json\n{\"n\": \"see ```x``` here\"}\n```\nDone.";
        assert_eq!(extract_json(input), "{\"n\": \"see ```x``` here\"}");
    }

    #[test]
    fn test_extract_json_closing_fence_on_same_line() {
        let input = "```json\n{\"a\": 1}```";
        assert_eq!(extract_json(input), "{\"a\": 1}");
    }

    struct FixedClient(&'static str);

    #[async_trait]
    impl ModelClient for FixedClient {
        async fn complete(&self, _: &str, _: &str, _: u32) -> Result<LlmResponse, LlmError> {
            Ok(LlmResponse::from_text(self.0))
        }
    }

    #[derive(Debug, Deserialize)]
    struct ScoreReply {
        score: u32,
    }

    #[tokio::test]
    async fn test_call_json_parses_fenced_reply() {
        let client = FixedClient("```json\n{\"score\": 7}\n```");
        let reply: ScoreReply = call_json(&client, "p", "s", 16).await.unwrap();
        assert_eq!(reply.score, 7);
    }

    #[tokio::test]
    async fn test_call_json_reports_parse_error() {
        let client = FixedClient("I could not analyze this document.");
        let result: Result<ScoreReply, _> = call_json(&client, "p", "s", 16).await;
        assert!(matches!(result, Err(LlmError::Parse(_))));
    }

    #[test]
    fn test_response_text_skips_non_text_blocks() {
        let response = LlmResponse {
            content: vec![
                ContentBlock {
                    block_type: "tool_use".to_string(),
                    text: None,
                },
                ContentBlock {
                    block_type: "text".to_string(),
                    text: Some("{}".to_string()),
                },
            ],
            usage: Usage::default(),
        };
        assert_eq!(response.text(), Some("{}"));
    }
}
