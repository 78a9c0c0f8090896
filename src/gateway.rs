//! Remote tool-execution gateway
//!
//! Any tool the dispatcher does not handle locally is delegated here,
//! keyed by the tool's catalog name, with a fixed caller identity.

use crate::error::AgentError;
use crate::Result;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use std::env;
use std::time::Duration;
use tracing::{debug, warn};

const DEFAULT_BASE_URL: &str = "https://backend.composio.dev";
pub const DEFAULT_CALLER_ID: &str = "0000-1111-2222";

/// Seam for "execute tool by name". Faked in orchestrator/dispatcher tests.
#[async_trait]
pub trait ToolGateway: Send + Sync {
    /// Execute a remote tool and return its raw provider payload.
    async fn execute(&self, slug: &str, caller_id: &str, arguments: &Value) -> Result<Value>;
}

/// HTTP gateway against the Composio tool-execution API.
pub struct HttpToolGateway {
    client: Client,
    base_url: String,
    api_key: String,
}

impl HttpToolGateway {
    pub fn new(api_key: String, base_url: Option<String>) -> Result<Self> {
        let client = Client::builder()
            .pool_idle_timeout(Duration::from_secs(60))
            .pool_max_idle_per_host(8)
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            api_key,
        })
    }

    pub fn from_env() -> Result<Self> {
        let api_key = env::var("COMPOSIO_API_KEY").unwrap_or_default();
        let base_url = env::var("COMPOSIO_BASE_URL").ok();
        Self::new(api_key, base_url)
    }
}

#[async_trait]
impl ToolGateway for HttpToolGateway {
    async fn execute(&self, slug: &str, caller_id: &str, arguments: &Value) -> Result<Value> {
        let url = format!("{}/api/v3/tools/execute/{}", self.base_url, slug);

        debug!(slug = %slug, "Executing remote tool");

        let response = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .json(&json!({
                "user_id": caller_id,
                "arguments": arguments,
            }))
            .send()
            .await
            .map_err(|e| {
                AgentError::GatewayError(format!("Gateway request failed for {}: {}", slug, e))
            })?;

        let status = response.status();
        let body = response.json::<Value>().await.map_err(|e| {
            AgentError::GatewayError(format!("Invalid JSON from gateway for {}: {}", slug, e))
        })?;

        if !status.is_success() {
            return Err(AgentError::GatewayError(format!(
                "Gateway returned {} for {}: {}",
                status, slug, body
            )));
        }

        if body.get("successful").and_then(Value::as_bool) == Some(false) {
            let message = body
                .get("error")
                .and_then(Value::as_str)
                .unwrap_or("tool execution reported failure");
            warn!(slug = %slug, error = %message, "Remote tool reported failure");
            return Err(AgentError::GatewayError(format!("{}: {}", slug, message)));
        }

        // The provider wraps the tool payload in a `data` envelope. A
        // missing envelope is a total structural mismatch and escalates.
        match body.get("data") {
            Some(data) if data.is_object() => Ok(data.clone()),
            _ => Err(AgentError::GatewayError(format!(
                "Gateway response for {} is missing the data envelope",
                slug
            ))),
        }
    }
}
