//! Agent turns server
//!
//! Serves configured agents over HTTP: one POST runs one turn.

use agent_turns::agents::AgentCatalog;
use agent_turns::api::{create_router, AppState};
use agent_turns::config::AppConfig;
use agent_turns::llm::{ModelRegistry, TextGenerator};
use agent_turns::runtime::RunnerFactory;
use agent_turns::session::SessionRegistry;
use agent_turns::TurnService;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "agent_turns=info,tower_http=debug".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(false)
                .with_span_list(false),
        )
        .init();

    let config = AppConfig::from_env();

    // Initialize LLM registry
    let models = Arc::new(ModelRegistry::new(&config.llm));
    if models.has_models() {
        tracing::info!(
            models = ?models.available_models(),
            default = %models.default_model_id(),
            "LLM registry initialized"
        );
    } else {
        tracing::warn!("No LLM configured. Set GEMINI_API_KEY or LLM_GATEWAY.");
    }

    let catalog = match &config.agents_config {
        Some(path) => AgentCatalog::load(path)?,
        None => {
            tracing::warn!("AGENTS_CONFIG not set; no agents will be served");
            AgentCatalog::default()
        }
    };

    let factory = Arc::new(RunnerFactory::new(
        models.clone(),
        catalog.tools().clone(),
        config.runner,
    ));
    let sessions = Arc::new(SessionRegistry::new(config.sessions));
    let shutdown = CancellationToken::new();
    let sweeper = sessions
        .clone()
        .spawn_sweeper(SWEEP_INTERVAL, shutdown.clone());

    let mut service = TurnService::new(catalog, factory, sessions)
        .with_identity(&config.app_name, &config.user_id)
        .with_debug_snippets(config.debug_ai_json);
    if let Some(llm) = models.default() {
        let generator: Arc<dyn TextGenerator> = Arc::new(llm);
        service = service.with_text_generator(generator);
    }

    let state = AppState::new(Arc::new(service), &config.app_name);

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = create_router(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("Agent turns server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Shutting down");
        })
        .await?;

    shutdown.cancel();
    let _ = sweeper.await;
    Ok(())
}
