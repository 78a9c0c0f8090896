//! Core data models for the finance chat agent

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

//
// ================= Conversation =================
//

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One turn of the conversation, owned by a single in-flight run.
/// Serializes directly to the provider's message wire shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub role: Role,
    pub content: Vec<ContentBlock>,
}

impl ConversationTurn {
    pub fn user(content: Vec<ContentBlock>) -> Self {
        Self {
            role: Role::User,
            content,
        }
    }

    pub fn user_text(text: impl Into<String>) -> Self {
        Self::user(vec![ContentBlock::Text { text: text.into() }])
    }

    pub fn assistant(content: Vec<ContentBlock>) -> Self {
        Self {
            role: Role::Assistant,
            content,
        }
    }
}

/// Provider content block, decoded once at the LLM client boundary.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Thinking {
        thinking: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        signature: Option<String>,
    },
    /// Opaque payload withheld by the provider. The `data` field must be
    /// carried in history unchanged, but is masked before leaving the run.
    RedactedThinking {
        data: String,
    },
    Text {
        text: String,
    },
    ToolUse {
        id: String,
        name: String,
        input: Value,
    },
    ToolResult {
        tool_use_id: String,
        content: String,
    },
}

impl ContentBlock {
    /// Copy of this block safe to emit in a trace: redacted thinking
    /// payloads are replaced with a placeholder, everything else is as-is.
    pub fn for_display(&self) -> ContentBlock {
        match self {
            ContentBlock::RedactedThinking { .. } => ContentBlock::RedactedThinking {
                data: "[Thinking content redacted]".to_string(),
            },
            other => other.clone(),
        }
    }

    pub fn is_tool_use(&self) -> bool {
        matches!(self, ContentBlock::ToolUse { .. })
    }
}

//
// ================= Stop Reason =================
//

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    ToolUse,
    EndTurn,
    MaxTokens,
    StopSequence,
    /// Produced locally when the orchestrator hits its iteration cap.
    IterationLimit,
}

impl StopReason {
    /// Map the provider's stop reason string; unknown values are treated
    /// as a natural completion.
    pub fn from_provider(raw: Option<&str>) -> Self {
        match raw {
            Some("tool_use") => StopReason::ToolUse,
            Some("max_tokens") => StopReason::MaxTokens,
            Some("stop_sequence") => StopReason::StopSequence,
            _ => StopReason::EndTurn,
        }
    }

    pub fn is_terminal(&self) -> bool {
        *self != StopReason::ToolUse
    }
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StopReason::ToolUse => "tool_use",
            StopReason::EndTurn => "end_turn",
            StopReason::MaxTokens => "max_tokens",
            StopReason::StopSequence => "stop_sequence",
            StopReason::IterationLimit => "iteration_limit",
        };
        write!(f, "{}", s)
    }
}

//
// ================= Run Trace =================
//

/// A content block tagged with the iteration it was produced in.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TracedBlock {
    pub iteration: u32,
    #[serde(flatten)]
    pub block: ContentBlock,
}

/// Ordered record of everything a run produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunTrace {
    pub blocks: Vec<TracedBlock>,
    pub stop_reason: StopReason,
    pub total_iterations: u32,
}

//
// ================= Tool Catalog =================
//

/// One entry of the static tool catalog supplied to the LLM.
/// Serializes to the provider's tool definition shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCatalogEntry {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
}

//
// ================= Tool I/O =================
//

/// Dispatcher result envelope, serialized into `tool_result` content.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolOutput {
    pub success: bool,
    pub data: Value,
    pub error: Option<String>,
}

impl ToolOutput {
    pub fn ok(data: Value) -> Self {
        Self {
            success: true,
            data,
            error: None,
        }
    }

    pub fn err(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: Value::Null,
            error: Some(message.into()),
        }
    }
}

//
// ================= Unified Search Results =================
//

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum PriceDirection {
    Up,
    Down,
    Neutral,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PriceMovement {
    pub movement: Option<PriceDirection>,
    pub percentage: Option<f64>,
    pub value: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MarketQuote {
    pub name: Option<String>,
    pub link: Option<String>,
    pub stock: Option<String>,
    pub price: Option<f64>,
    pub price_movement: Option<PriceMovement>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrganicResult {
    pub title: Option<String>,
    pub link: Option<String>,
    pub displayed_link: Option<String>,
    pub snippet: Option<String>,
    pub source: Option<String>,
    pub date: Option<String>,
    pub favicon: Option<String>,
    pub position: Option<i64>,
    pub redirect_link: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ForumAnswer {
    pub link: Option<String>,
    pub snippet: Option<String>,
    pub extensions: Option<Vec<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ForumThread {
    pub title: Option<String>,
    pub link: Option<String>,
    pub source: Option<String>,
    pub date: Option<String>,
    pub extensions: Vec<String>,
    pub answers: Vec<ForumAnswer>,
}

/// Normalized envelope over the provider-specific search payloads.
/// Every field is always present; `None` means "not returned by this
/// provider", never an error.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UnifiedSearchResult {
    pub ai_overview: Option<bool>,
    pub organic_results: Option<Vec<OrganicResult>>,
    pub discussions_and_forums: Option<Vec<ForumThread>>,
    pub markets: Option<BTreeMap<String, Vec<MarketQuote>>>,
}

impl UnifiedSearchResult {
    pub fn empty() -> Self {
        Self {
            ai_overview: None,
            organic_results: None,
            discussions_and_forums: None,
            markets: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_content_block_wire_shape() {
        let block = ContentBlock::ToolUse {
            id: "toolu_01".to_string(),
            name: "COMPOSIO_SEARCH_SEARCH".to_string(),
            input: json!({"query": "savings rates"}),
        };

        let value = serde_json::to_value(&block).unwrap();
        assert_eq!(value["type"], "tool_use");
        assert_eq!(value["id"], "toolu_01");
        assert_eq!(value["name"], "COMPOSIO_SEARCH_SEARCH");
        assert_eq!(value["input"]["query"], "savings rates");

        let decoded: ContentBlock = serde_json::from_value(value).unwrap();
        assert_eq!(decoded, block);
    }

    #[test]
    fn test_thinking_signature_omitted_when_absent() {
        let block = ContentBlock::Thinking {
            thinking: "considering options".to_string(),
            signature: None,
        };
        let value = serde_json::to_value(&block).unwrap();
        assert!(value.get("signature").is_none());
    }

    #[test]
    fn test_redacted_thinking_masked_for_display() {
        let block = ContentBlock::RedactedThinking {
            data: "EqQBCgIYAhIM...".to_string(),
        };
        match block.for_display() {
            ContentBlock::RedactedThinking { data } => {
                assert_eq!(data, "[Thinking content redacted]");
            }
            other => panic!("unexpected block: {:?}", other),
        }
        // The original payload is untouched.
        match block {
            ContentBlock::RedactedThinking { data } => assert!(data.starts_with("EqQB")),
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_stop_reason_from_provider() {
        assert_eq!(
            StopReason::from_provider(Some("tool_use")),
            StopReason::ToolUse
        );
        assert_eq!(
            StopReason::from_provider(Some("end_turn")),
            StopReason::EndTurn
        );
        assert_eq!(
            StopReason::from_provider(Some("max_tokens")),
            StopReason::MaxTokens
        );
        // Unknown and missing both fall back to a natural completion.
        assert_eq!(
            StopReason::from_provider(Some("pause_turn")),
            StopReason::EndTurn
        );
        assert_eq!(StopReason::from_provider(None), StopReason::EndTurn);
    }

    #[test]
    fn test_unified_result_serializes_all_fields() {
        let value = serde_json::to_value(UnifiedSearchResult::empty()).unwrap();
        let obj = value.as_object().unwrap();
        for key in [
            "ai_overview",
            "organic_results",
            "discussions_and_forums",
            "markets",
        ] {
            assert!(obj.contains_key(key), "missing field {}", key);
            assert!(obj[key].is_null());
        }
    }

    #[test]
    fn test_traced_block_flattens() {
        let traced = TracedBlock {
            iteration: 2,
            block: ContentBlock::Text {
                text: "done".to_string(),
            },
        };
        let value = serde_json::to_value(&traced).unwrap();
        assert_eq!(value["iteration"], 2);
        assert_eq!(value["type"], "text");
        assert_eq!(value["text"], "done");
    }
}
