//! Anthropic Messages API client
//!
//! Provides the `ChatModel` seam the orchestrator and the local synthesis
//! tools call through. Uses a long-lived reqwest::Client for connection
//! pooling.

use crate::error::AgentError;
use crate::models::{ContentBlock, ConversationTurn, StopReason, ToolCatalogEntry};
use crate::Result;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, error, info};

pub const DEFAULT_MODEL: &str = "claude-sonnet-4-20250514";
pub const DEFAULT_MAX_TOKENS: u32 = 4000;
pub const DEFAULT_THINKING_BUDGET_TOKENS: u32 = 2000;

const ANTHROPIC_BASE_URL: &str = "https://api.anthropic.com";
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// One decoded model response: why it stopped, and what it produced.
#[derive(Debug, Clone)]
pub struct ModelResponse {
    pub stop_reason: StopReason,
    pub content: Vec<ContentBlock>,
}

impl ModelResponse {
    /// Concatenation of all text blocks, used by the local synthesis tools.
    pub fn text(&self) -> String {
        let mut out = String::new();
        for block in &self.content {
            if let ContentBlock::Text { text } = block {
                out.push_str(text);
            }
        }
        out
    }
}

/// Seam for "create a model response". Injected into the orchestrator and
/// the dispatcher so tests can substitute a scripted fake.
#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn create(
        &self,
        messages: &[ConversationTurn],
        tools: &[ToolCatalogEntry],
        system: Option<&str>,
    ) -> Result<ModelResponse>;
}

/// Reusable Anthropic client (connection-pooled)
pub struct AnthropicClient {
    client: Client,
    base_url: String,
    model: String,
    max_tokens: u32,
    thinking_budget_tokens: u32,
}

impl AnthropicClient {
    pub fn new(api_key: String, model: String) -> Result<Self> {
        if api_key.is_empty() {
            return Err(AgentError::ConfigError(
                "ANTHROPIC_API_KEY is not configured".to_string(),
            ));
        }

        let mut headers = HeaderMap::new();
        headers.insert(
            "x-api-key",
            HeaderValue::from_str(&api_key)
                .map_err(|e| AgentError::ConfigError(e.to_string()))?,
        );
        headers.insert(
            "anthropic-version",
            HeaderValue::from_static(ANTHROPIC_VERSION),
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = Client::builder()
            .default_headers(headers)
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(8)
            .timeout(Duration::from_secs(120))
            .build()?;

        Ok(Self {
            client,
            base_url: ANTHROPIC_BASE_URL.to_string(),
            model,
            max_tokens: DEFAULT_MAX_TOKENS,
            thinking_budget_tokens: DEFAULT_THINKING_BUDGET_TOKENS,
        })
    }

    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("ANTHROPIC_API_KEY").unwrap_or_default();
        let model =
            std::env::var("ANTHROPIC_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string());
        Self::new(api_key, model)
    }

    fn endpoint(&self) -> String {
        format!("{}/v1/messages", self.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl ChatModel for AnthropicClient {
    async fn create(
        &self,
        messages: &[ConversationTurn],
        tools: &[ToolCatalogEntry],
        system: Option<&str>,
    ) -> Result<ModelResponse> {
        let mut body = json!({
            "model": self.model,
            "max_tokens": self.max_tokens,
            "thinking": {
                "type": "enabled",
                "budget_tokens": self.thinking_budget_tokens,
            },
            "messages": messages,
        });
        if !tools.is_empty() {
            body["tools"] = serde_json::to_value(tools)?;
        }
        if let Some(system) = system {
            body["system"] = Value::String(system.to_string());
        }

        info!(model = %self.model, messages = messages.len(), "Calling Anthropic API");

        let response = self
            .client
            .post(self.endpoint())
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                error!("Anthropic API request failed: {}", e);
                AgentError::LlmError(format!("Anthropic API error: {}", e))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            error!("Anthropic API error response: {} {}", status, error_text);
            return Err(AgentError::LlmError(format!(
                "Anthropic API returned {}: {}",
                status, error_text
            )));
        }

        let parsed: MessagesResponse = response.json().await.map_err(|e| {
            error!("Failed to parse Anthropic response: {}", e);
            AgentError::LlmError(format!("Anthropic parse error: {}", e))
        })?;

        let stop_reason = StopReason::from_provider(parsed.stop_reason.as_deref());
        let content = parsed
            .content
            .into_iter()
            .filter_map(decode_block)
            .collect::<Vec<_>>();

        debug!(
            stop_reason = %stop_reason,
            blocks = content.len(),
            "Anthropic response received"
        );

        Ok(ModelResponse {
            stop_reason,
            content,
        })
    }
}

/// Decode one wire block into our tagged variant. Blocks of a kind we do
/// not handle are dropped rather than failing the whole response.
fn decode_block(block: WireBlock) -> Option<ContentBlock> {
    match block.kind.as_str() {
        "thinking" => Some(ContentBlock::Thinking {
            thinking: block.thinking.unwrap_or_default(),
            signature: block.signature,
        }),
        "redacted_thinking" => Some(ContentBlock::RedactedThinking {
            data: block.data.unwrap_or_default(),
        }),
        "text" => Some(ContentBlock::Text {
            text: block.text.unwrap_or_default(),
        }),
        "tool_use" => Some(ContentBlock::ToolUse {
            id: block.id?,
            name: block.name?,
            input: block.input.unwrap_or(Value::Null),
        }),
        _ => None,
    }
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<WireBlock>,
    stop_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireBlock {
    #[serde(rename = "type")]
    kind: String,
    text: Option<String>,
    thinking: Option<String>,
    signature: Option<String>,
    data: Option<String>,
    id: Option<String>,
    name: Option<String>,
    input: Option<Value>,
}
