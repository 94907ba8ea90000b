use std::sync::Arc;
use stock_analyst_agent::{
    agents::{finance_agent, web_search_agent, CapabilityAgent, FinanceToolSet, ToolAgent},
    api::{playground_router, start_server, PlaygroundState},
    config::AppConfig,
    gemini::GeminiClient,
    llm::ChatModel,
    tools::Providers,
};
use tracing::{info, warn};
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

    info!("AI Stock Analyst Assistant - agent playground");
    info!(model = %config.model_id, port = config.playground_port, "Configuration loaded");
    if config.platform_api_key.is_none() {
        warn!("PLATFORM_API_KEY not set, playground endpoints are unauthenticated");
    }

    let model: Arc<dyn ChatModel> = Arc::new(GeminiClient::new(
        config.google_api_key.clone(),
        config.model_id.clone(),
        config.gemini_base_url.clone(),
    )?);
    let providers = Providers::live()?;

    // Finance agent first, then web search
    let agents: Vec<Arc<dyn CapabilityAgent>> = vec![
        Arc::new(ToolAgent::new(
            finance_agent(FinanceToolSet::standard()),
            model.clone(),
            &providers,
            config.max_tool_rounds,
        )),
        Arc::new(ToolAgent::new(
            web_search_agent(),
            model,
            &providers,
            config.max_tool_rounds,
        )),
    ];

    let state = PlaygroundState {
        agents,
        platform_api_key: config.platform_api_key.clone(),
    };

    info!("Agents initialized, starting playground server...");
    start_server(playground_router(state), &config.host, config.playground_port).await?;

    Ok(())
}
