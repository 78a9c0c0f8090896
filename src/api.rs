//! REST API server for the finance chat agent
//!
//! Exposes the orchestrator over HTTP: one aggregated JSON endpoint and
//! one SSE streaming variant of the same run.

use axum::{
    extract::State,
    http::StatusCode,
    response::sse::{Event, KeepAlive, Sse},
    routing::{get, post},
    Json, Router,
};
use futures::stream::Stream;
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_stream::{wrappers::ReceiverStream, StreamExt};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::agent::{AgentEvent, Orchestrator};
use crate::error::AgentError;
use crate::models::RunTrace;

/// =============================
/// Request / Response Models
/// =============================

#[derive(Debug, Clone, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub success: bool,
    pub response: RunTrace,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// =============================
/// API State
/// =============================

#[derive(Clone)]
pub struct ApiState {
    pub orchestrator: Arc<Orchestrator>,
}

/// =============================
/// Health Endpoint
/// =============================

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "chat",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

/// =============================
/// Batch Chat Endpoint
/// =============================

async fn send_message(
    State(state): State<ApiState>,
    Json(req): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, (StatusCode, Json<ErrorResponse>)> {
    if req.message.trim().is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                error: "Message is required".to_string(),
            }),
        ));
    }

    info!(message_len = req.message.len(), "Received chat message");

    match state.orchestrator.run(&req.message, None).await {
        Ok(trace) => Ok(Json(ChatResponse {
            success: true,
            response: trace,
        })),
        Err(e) => {
            error!("Chat run failed: {}", e);
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    error: format!("Failed to process message: {}", e),
                }),
            ))
        }
    }
}

/// =============================
/// Streaming Chat Endpoint (SSE)
/// =============================

async fn stream_message(
    State(state): State<ApiState>,
    Json(req): Json<ChatRequest>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let orchestrator = state.orchestrator.clone();
    let message = req.message.clone();

    let (tx, rx) = mpsc::channel::<AgentEvent>(100);

    // The run owns a sender clone for per-block events; the terminal
    // event is always sent here, exactly once.
    tokio::spawn(async move {
        if message.trim().is_empty() {
            let _ = tx
                .send(AgentEvent::Error {
                    error: "Message is required".to_string(),
                })
                .await;
            return;
        }

        match orchestrator.run(&message, Some(tx.clone())).await {
            Ok(trace) => {
                let _ = tx
                    .send(AgentEvent::Complete {
                        stop_reason: trace.stop_reason,
                        total_iterations: trace.total_iterations,
                        total_blocks: trace.blocks.len(),
                    })
                    .await;
            }
            // The client is gone; nobody is listening for a terminal event.
            Err(AgentError::RunCancelled(_)) => {}
            Err(e) => {
                error!("Streaming chat run failed: {}", e);
                let _ = tx.send(AgentEvent::Error { error: e.to_string() }).await;
            }
        }
    });

    let stream = ReceiverStream::new(rx).map(|event| {
        Ok(Event::default().data(serde_json::to_string(&event).unwrap_or_default()))
    });

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("ping"),
    )
}

/// =============================
/// Router
/// =============================

pub fn create_router(orchestrator: Arc<Orchestrator>) -> Router {
    let state = ApiState { orchestrator };

    Router::new()
        .route("/health", get(health))
        .route("/api/chat/message", post(send_message))
        .route("/api/chat/stream", post(stream_message))
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// =============================
/// Server Startup
/// =============================

pub async fn start_server(
    orchestrator: Arc<Orchestrator>,
    port: u16,
) -> std::result::Result<(), Box<dyn std::error::Error>> {
    let router = create_router(orchestrator);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;

    info!("API server listening on http://0.0.0.0:{}", port);

    axum::serve(listener, router).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ContentBlock, StopReason, TracedBlock};

    #[test]
    fn test_chat_response_wire_shape() {
        let response = ChatResponse {
            success: true,
            response: RunTrace {
                blocks: vec![TracedBlock {
                    iteration: 1,
                    block: ContentBlock::Text {
                        text: "hi".to_string(),
                    },
                }],
                stop_reason: StopReason::EndTurn,
                total_iterations: 1,
            },
        };

        let value = serde_json::to_value(&response).unwrap();
        assert_eq!(value["success"], true);
        assert_eq!(value["response"]["stop_reason"], "end_turn");
        assert_eq!(value["response"]["total_iterations"], 1);
        assert_eq!(value["response"]["blocks"][0]["type"], "text");
    }

    #[test]
    fn test_stream_event_wire_shapes() {
        let block_event = AgentEvent::Block {
            block: TracedBlock {
                iteration: 1,
                block: ContentBlock::Text {
                    text: "hi".to_string(),
                },
            },
        };
        let value = serde_json::to_value(&block_event).unwrap();
        assert_eq!(value["type"], "block");
        assert_eq!(value["block"]["iteration"], 1);
        assert_eq!(value["block"]["text"], "hi");

        let complete = AgentEvent::Complete {
            stop_reason: StopReason::IterationLimit,
            total_iterations: 10,
            total_blocks: 42,
        };
        let value = serde_json::to_value(&complete).unwrap();
        assert_eq!(value["type"], "complete");
        assert_eq!(value["stop_reason"], "iteration_limit");
        assert_eq!(value["total_blocks"], 42);

        let error = AgentEvent::Error {
            error: "boom".to_string(),
        };
        let value = serde_json::to_value(&error).unwrap();
        assert_eq!(value["type"], "error");
        assert_eq!(value["error"], "boom");
    }
}
