use finance_chat_agent::{
    agent::Orchestrator,
    api::start_server,
    gateway::{HttpToolGateway, ToolGateway, DEFAULT_CALLER_ID},
    llm::{AnthropicClient, ChatModel},
    tools::{tool_catalog, ToolDispatcher},
};
use std::sync::Arc;
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    // Load environment variables
    dotenv::dotenv().ok();

    let api_port: u16 = std::env::var("PORT")
        .or_else(|_| std::env::var("API_PORT"))
        .unwrap_or_else(|_| "8080".to_string())
        .parse()?;

    let caller_id =
        std::env::var("COMPOSIO_USER_ID").unwrap_or_else(|_| DEFAULT_CALLER_ID.to_string());

    info!("Finance Chat Agent - API Server");
    info!("Port: {}", api_port);

    // Create components
    let model: Arc<dyn ChatModel> = Arc::new(AnthropicClient::from_env()?);
    let gateway: Arc<dyn ToolGateway> = Arc::new(HttpToolGateway::from_env()?);
    let dispatcher = ToolDispatcher::new(model.clone(), gateway, caller_id);

    let orchestrator = Arc::new(Orchestrator::new(model, dispatcher, tool_catalog()));

    info!("Orchestrator initialized");
    info!("Starting API server...");

    start_server(orchestrator, api_port).await?;

    Ok(())
}
