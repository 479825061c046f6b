//! manus HTTP Server
//!
//! Axum server exposing the manus agent as a blocking JSON endpoint and as a
//! server-sent event stream.

mod handlers;
mod routes;
mod state;

use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use manus_core::{AgentConfig, GenerationOptions, LlmProvider, ToolRegistry};
use manus_runtime::{OllamaProvider, TerminateTool};

use crate::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let provider = Arc::new(OllamaProvider::from_env());

    match provider.health_check().await {
        Ok(true) => {
            tracing::info!("Connected to Ollama");
            if let Ok(models) = provider.list_models().await {
                for model in models {
                    tracing::info!(model = %model.id, "Model available");
                }
            }
        }
        Ok(false) | Err(_) => {
            tracing::warn!("Ollama not available, agent runs will fail");
            tracing::warn!("Make sure Ollama is running: ollama serve");
        }
    }

    let mut tools = ToolRegistry::new();
    tools.register(TerminateTool);
    tracing::info!(tools = ?tools.names(), "Registered tools");

    let config = AgentConfig::from_env()?.name("manus");
    let mut generation = GenerationOptions::default();
    if let Ok(model) = std::env::var("OLLAMA_MODEL") {
        generation.model = model;
    }
    tracing::info!(
        max_steps = config.max_steps,
        duplicate_threshold = config.duplicate_threshold,
        check_range = config.check_range,
        stream_timeout = ?config.stream_timeout,
        model = %generation.model,
        "Agent configuration"
    );

    let state = AppState {
        provider,
        tools: Arc::new(tools),
        config,
        generation,
    };
    let app = routes::router(state);

    let addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".into());
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("manus server running on http://{}", addr);
    tracing::info!("  GET  /health            - Health check");
    tracing::info!("  POST /api/agent/run     - Run agent to completion");
    tracing::info!("  GET  /api/agent/stream  - Run agent, stream events (SSE)");

    axum::serve(listener, app).await?;

    Ok(())
}
