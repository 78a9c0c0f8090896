//! Conversation orchestrator - drives the tool-call loop
//!
//! CALL LLM → tool_use? → DISPATCH TOOLS → APPEND RESULTS → CALL LLM …
//! until a terminal stop reason (or the iteration cap).

use crate::error::AgentError;
use crate::llm::{ChatModel, ModelResponse};
use crate::models::{
    ContentBlock, ConversationTurn, RunTrace, StopReason, ToolCatalogEntry, TracedBlock,
};
use crate::tools::ToolDispatcher;
use crate::Result;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

const MAX_TOOL_ITERATIONS: u32 = 10;
const DEFAULT_LLM_TIMEOUT: Duration = Duration::from_secs(120);

const SYSTEM_PROMPT: &str = "You are a personal-finance assistant.\n\n\
Guidelines:\n\
- Provide accurate and educational financial information\n\
- Use the available tools to look up live market data, news, and the user's accounts\n\
- Be structured and concise\n\
- Emphasize research and risk awareness\n\n\
Format: Provide structured answers suitable for financial decision-making.";

/// Event emitted while a run is in flight. Serializes to the wire shape
/// the streaming endpoint sends.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentEvent {
    Block {
        block: TracedBlock,
    },
    Complete {
        stop_reason: StopReason,
        total_iterations: u32,
        total_blocks: usize,
    },
    Error {
        error: String,
    },
}

/// Drives the multi-turn protocol between caller and LLM. Owns the
/// authoritative conversation history for the lifetime of one run.
pub struct Orchestrator {
    model: Arc<dyn ChatModel>,
    dispatcher: ToolDispatcher,
    catalog: Vec<ToolCatalogEntry>,
    max_iterations: u32,
    llm_timeout: Duration,
}

impl Orchestrator {
    pub fn new(
        model: Arc<dyn ChatModel>,
        dispatcher: ToolDispatcher,
        catalog: Vec<ToolCatalogEntry>,
    ) -> Self {
        Self {
            model,
            dispatcher,
            catalog,
            max_iterations: MAX_TOOL_ITERATIONS,
            llm_timeout: DEFAULT_LLM_TIMEOUT,
        }
    }

    pub fn with_max_iterations(mut self, max_iterations: u32) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn with_llm_timeout(mut self, timeout: Duration) -> Self {
        self.llm_timeout = timeout;
        self
    }

    /// Run the tool-call loop to completion.
    ///
    /// With `events = Some(tx)` every traced block is also sent the instant
    /// it is produced, before the next LLM call; a consumer appending
    /// events in arrival order reconstructs exactly the returned trace.
    pub async fn run(
        &self,
        user_message: &str,
        events: Option<mpsc::Sender<AgentEvent>>,
    ) -> Result<RunTrace> {
        let run_id = Uuid::new_v4();
        info!(
            %run_id,
            message_len = user_message.len(),
            "Orchestrator: starting run"
        );

        let mut history = vec![ConversationTurn::user_text(user_message)];
        let mut trace: Vec<TracedBlock> = Vec::new();
        let mut iteration: u32 = 0;

        let mut response = self.call_model(&history).await?;

        while response.stop_reason == StopReason::ToolUse {
            iteration += 1;
            debug!(
                iteration,
                blocks = response.content.len(),
                "Tool-use iteration"
            );

            for block in &response.content {
                emit(&events, &mut trace, iteration, block).await;
            }

            // The assistant turn carries thinking, redacted thinking and
            // tool_use blocks, order preserved. Plain text is trace-only.
            let assistant_blocks: Vec<ContentBlock> = response
                .content
                .iter()
                .filter(|b| {
                    matches!(
                        b,
                        ContentBlock::Thinking { .. }
                            | ContentBlock::RedactedThinking { .. }
                            | ContentBlock::ToolUse { .. }
                    )
                })
                .cloned()
                .collect();
            history.push(ConversationTurn::assistant(assistant_blocks));

            let tool_uses: Vec<(String, String, serde_json::Value)> = response
                .content
                .iter()
                .filter_map(|b| match b {
                    ContentBlock::ToolUse { id, name, input } => {
                        Some((id.clone(), name.clone(), input.clone()))
                    }
                    _ => None,
                })
                .collect();

            if tool_uses.is_empty() {
                warn!("Stop reason was tool_use but no tool_use blocks decoded");
                return Ok(RunTrace {
                    blocks: trace,
                    stop_reason: StopReason::ToolUse,
                    total_iterations: iteration,
                });
            }

            // Execute sequentially, in block order. Every tool_use gets
            // exactly one result before the next LLM call.
            let mut tool_results: Vec<ContentBlock> = Vec::with_capacity(tool_uses.len());
            for (id, name, input) in &tool_uses {
                info!(tool = %name, tool_use_id = %id, "Executing tool");
                let output = self.dispatcher.dispatch(name, input).await;
                let block = ContentBlock::ToolResult {
                    tool_use_id: id.clone(),
                    content: serde_json::to_string(&output)?,
                };
                emit(&events, &mut trace, iteration, &block).await;
                tool_results.push(block);
            }

            // All results of the iteration are batched into one user turn.
            history.push(ConversationTurn::user(tool_results));

            if iteration >= self.max_iterations {
                warn!(
                    iteration,
                    max = self.max_iterations,
                    "Iteration limit reached, terminating run"
                );
                return Ok(RunTrace {
                    blocks: trace,
                    stop_reason: StopReason::IterationLimit,
                    total_iterations: iteration,
                });
            }

            if let Some(tx) = &events {
                if tx.is_closed() {
                    debug!("Event receiver dropped, stopping run");
                    return Err(AgentError::RunCancelled(
                        "client disconnected mid-stream".to_string(),
                    ));
                }
            }

            response = self.call_model(&history).await?;
        }

        // Terminal response: trailing thinking/text blocks count as one
        // more iteration for reporting.
        let final_iteration = iteration + 1;
        for block in &response.content {
            if matches!(
                block,
                ContentBlock::Thinking { .. }
                    | ContentBlock::RedactedThinking { .. }
                    | ContentBlock::Text { .. }
            ) {
                emit(&events, &mut trace, final_iteration, block).await;
            }
        }

        info!(
            %run_id,
            total_iterations = final_iteration,
            total_blocks = trace.len(),
            stop_reason = %response.stop_reason,
            "Orchestrator: run complete"
        );

        Ok(RunTrace {
            blocks: trace,
            stop_reason: response.stop_reason,
            total_iterations: final_iteration,
        })
    }

    /// One LLM call with the full history, catalog and system prompt.
    /// A timeout here is fatal to the run.
    async fn call_model(&self, history: &[ConversationTurn]) -> Result<ModelResponse> {
        match tokio::time::timeout(
            self.llm_timeout,
            self.model.create(history, &self.catalog, Some(SYSTEM_PROMPT)),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(AgentError::LlmTimeout(self.llm_timeout.as_secs())),
        }
    }
}

/// Append a block to the trace and forward it to a streaming consumer.
/// A closed receiver is not an error here; the loop notices it before the
/// next upstream call.
async fn emit(
    events: &Option<mpsc::Sender<AgentEvent>>,
    trace: &mut Vec<TracedBlock>,
    iteration: u32,
    block: &ContentBlock,
) {
    let traced = TracedBlock {
        iteration,
        block: block.for_display(),
    };
    if let Some(tx) = events {
        let _ = tx
            .send(AgentEvent::Block {
                block: traced.clone(),
            })
            .await;
    }
    trace.push(traced);
}
