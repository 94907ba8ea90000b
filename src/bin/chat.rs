use std::sync::Arc;
use stock_analyst_agent::{
    agents::{
        coordinator, finance_agent, web_search_agent, CapabilityAgent, FinanceToolSet,
        TeamCoordinator, ToolAgent,
    },
    api::{chat_router, start_server, ChatState},
    config::AppConfig,
    conversation::ConversationOrchestrator,
    gemini::GeminiClient,
    llm::ChatModel,
    tools::Providers,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Load environment variables
    dotenv::dotenv().ok();
    let config = AppConfig::from_env()?;

    info!("AI Stock Analyst Assistant - chat UI");
    info!(model = %config.model_id, port = config.chat_port, "Configuration loaded");

    let model: Arc<dyn ChatModel> = Arc::new(GeminiClient::new(
        config.google_api_key.clone(),
        config.model_id.clone(),
        config.gemini_base_url.clone(),
    )?);
    let providers = Providers::live()?;

    let members: Vec<Arc<dyn CapabilityAgent>> = vec![
        Arc::new(ToolAgent::new(
            web_search_agent(),
            model.clone(),
            &providers,
            config.max_tool_rounds,
        )),
        Arc::new(ToolAgent::new(
            finance_agent(FinanceToolSet::comprehensive()),
            model.clone(),
            &providers,
            config.max_tool_rounds,
        )),
    ];
    let team = TeamCoordinator::new(coordinator(), model, members, config.max_tool_rounds);

    let state = ChatState {
        orchestrator: Arc::new(ConversationOrchestrator::new(Arc::new(team))),
        submit_timeout: config.submit_timeout,
    };

    info!("Team initialized, starting chat server...");
    start_server(chat_router(state), &config.host, config.chat_port).await?;

    Ok(())
}
