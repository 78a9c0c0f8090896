//! Tool catalog and dispatcher
//!
//! The catalog is the static list of tools offered to the LLM on every
//! request. The dispatcher routes a model-issued tool invocation either to
//! a local handler or to the remote gateway, and never lets an error
//! escape past its own boundary: failures become error-flagged results the
//! model can see and react to.

use crate::accounts;
use crate::error::AgentError;
use crate::gateway::ToolGateway;
use crate::llm::ChatModel;
use crate::models::{ConversationTurn, ToolCatalogEntry, ToolOutput};
use crate::normalize::{normalize, SearchKind};
use crate::Result;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

pub const ANALYZE_USER_ACCOUNT: &str = "analyze_user_account";
pub const ANALYZE_RESULTS: &str = "analyze_results";

const DEFAULT_TOOL_TIMEOUT: Duration = Duration::from_secs(30);

/// Build the static tool catalog. Called once per process.
pub fn tool_catalog() -> Vec<ToolCatalogEntry> {
    fn entry(name: &str, description: &str, input_schema: Value) -> ToolCatalogEntry {
        ToolCatalogEntry {
            name: name.to_string(),
            description: description.to_string(),
            input_schema,
        }
    }

    fn query_schema(description: &str) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": {"type": "string", "description": description}
            },
            "required": ["query"]
        })
    }

    vec![
        entry(
            "COMPOSIO_SEARCH_SEARCH",
            "Perform a general Google search for any topic.",
            query_schema("The search query."),
        ),
        entry(
            "COMPOSIO_SEARCH_FINANCE_SEARCH",
            "Search Google Finance for financial data, market overviews, and stock information.",
            query_schema("The financial topic or stock symbol to search for."),
        ),
        entry(
            "COMPOSIO_SEARCH_NEWS_SEARCH",
            "Search Google News for the most recent and relevant news articles on a topic.",
            query_schema("The topic to retrieve news for."),
        ),
        entry(
            "COMPOSIO_SEARCH_EVENT_SEARCH",
            "Search Google Events for concerts, festivals, and other activities.",
            query_schema("The event topic to search for."),
        ),
        entry(
            ANALYZE_USER_ACCOUNT,
            "Analyze the user's finances by going through their accounts, expenses, and deposits.",
            json!({
                "type": "object",
                "properties": {
                    "user_id": {"type": "integer", "description": "The user's numeric ID."}
                },
                "required": ["user_id"]
            }),
        ),
        entry(
            ANALYZE_RESULTS,
            "Analyze the results of a prior tool call to extract relevant decisions.",
            json!({
                "type": "object",
                "properties": {
                    "results": {
                        "type": "object",
                        "properties": {
                            "name": {"type": "string", "description": "The name of the tool."},
                            "result": {"type": "string", "description": "The result of the tool."},
                            "error": {"type": "boolean", "description": "Whether an error occurred."}
                        },
                        "required": ["name", "result", "error"]
                    }
                },
                "required": ["results"]
            }),
        ),
    ]
}

/// Routes tool invocations and normalizes the results.
pub struct ToolDispatcher {
    model: Arc<dyn ChatModel>,
    gateway: Arc<dyn ToolGateway>,
    caller_id: String,
    tool_timeout: Duration,
}

impl ToolDispatcher {
    pub fn new(model: Arc<dyn ChatModel>, gateway: Arc<dyn ToolGateway>, caller_id: String) -> Self {
        Self {
            model,
            gateway,
            caller_id,
            tool_timeout: DEFAULT_TOOL_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.tool_timeout = timeout;
        self
    }

    /// Execute one tool invocation. Infallible: every failure mode —
    /// bad input, gateway error, timeout — becomes an error-flagged
    /// `ToolOutput` the orchestrator feeds back into the conversation.
    pub async fn dispatch(&self, name: &str, input: &Value) -> ToolOutput {
        debug!(tool = %name, "Dispatching tool");

        match tokio::time::timeout(self.tool_timeout, self.dispatch_inner(name, input)).await {
            Ok(Ok(data)) => ToolOutput::ok(data),
            Ok(Err(e)) => {
                warn!(tool = %name, error = %e, "Tool execution failed");
                ToolOutput::err(format!("Tool execution failed: {}", e))
            }
            Err(_) => {
                warn!(tool = %name, timeout = ?self.tool_timeout, "Tool execution timed out");
                ToolOutput::err(format!(
                    "Tool execution failed: {} timed out after {}s",
                    name,
                    self.tool_timeout.as_secs()
                ))
            }
        }
    }

    async fn dispatch_inner(&self, name: &str, input: &Value) -> Result<Value> {
        match name {
            ANALYZE_USER_ACCOUNT => self.analyze_user_account(input).await,
            ANALYZE_RESULTS => self.analyze_results(input).await,
            _ => self.dispatch_remote(name, input).await,
        }
    }

    /// Any tool name outside the local set goes to the gateway; the raw
    /// payload is normalized by the parser matching the tool name.
    async fn dispatch_remote(&self, name: &str, input: &Value) -> Result<Value> {
        let raw = self.gateway.execute(name, &self.caller_id, input).await?;
        let kind = SearchKind::from_tool_name(name);
        let unified = normalize(kind, &raw);
        Ok(json!({ "search_results": unified }))
    }

    /// Local tool: render the fixture user's accounts to markdown and pass
    /// them through the LLM for a financial summary.
    async fn analyze_user_account(&self, input: &Value) -> Result<Value> {
        let user_id = input
            .get("user_id")
            .and_then(Value::as_i64)
            .ok_or_else(|| {
                AgentError::InvalidToolInput("Expected integer 'user_id'".to_string())
            })?;

        let user = accounts::find_user(user_id).ok_or_else(|| {
            AgentError::ToolError(format!("No account data for user {}", user_id))
        })?;

        let formatted = accounts::format_user_to_markdown(&user);
        let prompt = format!(
            "Analyze my finances to provide useful advice on how to improve them:\n\n{}",
            formatted
        );

        let response = self
            .model
            .create(&[ConversationTurn::user_text(prompt)], &[], None)
            .await?;

        Ok(json!({
            "search_results": {
                "user_id": user_id,
                "analysis": response.text(),
            }
        }))
    }

    /// Local tool: pass a prior tool's outcome back through the LLM for
    /// synthesis.
    async fn analyze_results(&self, input: &Value) -> Result<Value> {
        let results = input
            .get("results")
            .filter(|v| v.is_object())
            .ok_or_else(|| {
                AgentError::InvalidToolInput("Expected object 'results'".to_string())
            })?;

        let name = results.get("name").and_then(Value::as_str).unwrap_or("unknown");
        let result = results.get("result").and_then(Value::as_str).unwrap_or("");
        let error = results.get("error").and_then(Value::as_bool).unwrap_or(false);

        let formatted = format!(
            "## Tool Results\n\n## Tool: {}\n- **Result:** {}\n- **Error:** {}\n",
            name, result, error
        );
        let prompt = format!(
            "Analyze these tool results to see what relevant decisions can be made:\n\n{}",
            formatted
        );

        let response = self
            .model
            .create(&[ConversationTurn::user_text(prompt)], &[], None)
            .await?;

        Ok(json!({
            "search_results": {
                "tool": name,
                "analysis": response.text(),
            }
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::ModelResponse;
    use crate::models::{ContentBlock, StopReason, ToolCatalogEntry};
    use async_trait::async_trait;
    use std::collections::HashSet;

    struct CannedModel {
        reply: String,
    }

    #[async_trait]
    impl ChatModel for CannedModel {
        async fn create(
            &self,
            _messages: &[ConversationTurn],
            _tools: &[ToolCatalogEntry],
            _system: Option<&str>,
        ) -> Result<ModelResponse> {
            Ok(ModelResponse {
                stop_reason: StopReason::EndTurn,
                content: vec![ContentBlock::Text {
                    text: self.reply.clone(),
                }],
            })
        }
    }

    struct CannedGateway {
        payload: Result<Value>,
    }

    #[async_trait]
    impl ToolGateway for CannedGateway {
        async fn execute(
            &self,
            _slug: &str,
            _caller_id: &str,
            _arguments: &Value,
        ) -> Result<Value> {
            match &self.payload {
                Ok(v) => Ok(v.clone()),
                Err(e) => Err(AgentError::GatewayError(e.to_string())),
            }
        }
    }

    struct SlowGateway;

    #[async_trait]
    impl ToolGateway for SlowGateway {
        async fn execute(
            &self,
            _slug: &str,
            _caller_id: &str,
            _arguments: &Value,
        ) -> Result<Value> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(json!({}))
        }
    }

    fn dispatcher(gateway: Arc<dyn ToolGateway>) -> ToolDispatcher {
        ToolDispatcher::new(
            Arc::new(CannedModel {
                reply: "Spend less on rent.".to_string(),
            }),
            gateway,
            "0000-1111-2222".to_string(),
        )
    }

    #[test]
    fn test_catalog_names_are_unique() {
        let catalog = tool_catalog();
        let names: HashSet<_> = catalog.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names.len(), catalog.len());
        assert!(names.contains(ANALYZE_USER_ACCOUNT));
        assert!(names.contains("COMPOSIO_SEARCH_FINANCE_SEARCH"));
    }

    #[tokio::test]
    async fn test_local_account_analysis() {
        let dispatcher = dispatcher(Arc::new(CannedGateway {
            payload: Ok(json!({})),
        }));
        let output = dispatcher
            .dispatch(ANALYZE_USER_ACCOUNT, &json!({"user_id": 1}))
            .await;
        assert!(output.success);
        assert_eq!(
            output.data["search_results"]["analysis"],
            "Spend less on rent."
        );
    }

    #[tokio::test]
    async fn test_unknown_user_flags_error() {
        let dispatcher = dispatcher(Arc::new(CannedGateway {
            payload: Ok(json!({})),
        }));
        let output = dispatcher
            .dispatch(ANALYZE_USER_ACCOUNT, &json!({"user_id": 404}))
            .await;
        assert!(!output.success);
        assert!(output.error.unwrap().contains("404"));
    }

    #[tokio::test]
    async fn test_remote_result_is_normalized() {
        let dispatcher = dispatcher(Arc::new(CannedGateway {
            payload: Ok(json!({
                "news_results": [{"title": "Rates cut", "position": 1}]
            })),
        }));
        let output = dispatcher
            .dispatch("COMPOSIO_SEARCH_NEWS_SEARCH", &json!({"query": "rates"}))
            .await;
        assert!(output.success);
        let organic = &output.data["search_results"]["organic_results"];
        assert_eq!(organic[0]["title"], "Rates cut");
        // Stable shape: every unified field is present.
        assert!(output.data["search_results"]
            .as_object()
            .unwrap()
            .contains_key("markets"));
    }

    #[tokio::test]
    async fn test_gateway_failure_becomes_error_flag() {
        let dispatcher = dispatcher(Arc::new(CannedGateway {
            payload: Err(AgentError::GatewayError("connection refused".to_string())),
        }));
        let output = dispatcher
            .dispatch("COMPOSIO_SEARCH_SEARCH", &json!({"query": "x"}))
            .await;
        assert!(!output.success);
        assert!(output.error.unwrap().contains("connection refused"));
    }

    #[tokio::test]
    async fn test_slow_gateway_times_out_into_error_flag() {
        let dispatcher =
            dispatcher(Arc::new(SlowGateway)).with_timeout(Duration::from_millis(50));
        let output = dispatcher
            .dispatch("COMPOSIO_SEARCH_SEARCH", &json!({"query": "x"}))
            .await;
        assert!(!output.success);
        assert!(output.error.unwrap().contains("timed out"));
    }

    #[tokio::test]
    async fn test_analyze_results_synthesis() {
        let dispatcher = dispatcher(Arc::new(CannedGateway {
            payload: Ok(json!({})),
        }));
        let output = dispatcher
            .dispatch(
                ANALYZE_RESULTS,
                &json!({"results": {"name": "news", "result": "rates up", "error": false}}),
            )
            .await;
        assert!(output.success);
        assert_eq!(output.data["search_results"]["tool"], "news");
    }
}
