//! HTTP and SSE Handlers

use std::convert::Infallible;
use std::sync::Arc;

use axum::{
    Json,
    extract::{Query, State},
    http::StatusCode,
    response::sse::{Event, KeepAlive, Sse},
};
use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};

use manus_core::{Agent, AgentError, RunEvent, ToolCallingStep};
use manus_runtime::manus_agent_with;

use crate::state::AppState;

// ============================================================================
// Request / Response Types
// ============================================================================

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub provider_connected: bool,
    pub tools: usize,
}

#[derive(Debug, Deserialize)]
pub struct RunRequest {
    pub message: String,
    #[serde(default)]
    pub model: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RunResponse {
    pub result: String,
}

#[derive(Debug, Deserialize)]
pub struct StreamQuery {
    pub message: String,
    #[serde(default)]
    pub model: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn api_error(err: &AgentError) -> ApiError {
    let (status, code) = match err {
        AgentError::InvalidArgument(_) => (StatusCode::BAD_REQUEST, "INVALID_REQUEST"),
        AgentError::InvalidState(_) => (StatusCode::CONFLICT, "AGENT_BUSY"),
        AgentError::ProviderUnavailable(_) => (StatusCode::SERVICE_UNAVAILABLE, "PROVIDER_UNAVAILABLE"),
        _ => (StatusCode::INTERNAL_SERVER_ERROR, "AGENT_ERROR"),
    };

    (
        status,
        Json(ErrorResponse {
            error: err.user_message(),
            code: code.into(),
        }),
    )
}

/// Fresh agent for one request
fn build_agent(state: &AppState, model: Option<String>) -> Result<Arc<Agent<ToolCallingStep>>, ApiError> {
    let mut generation = state.generation.clone();
    if let Some(model) = model {
        generation.model = model;
    }

    manus_agent_with(
        state.provider.clone(),
        (*state.tools).clone(),
        state.config.clone(),
        generation,
    )
    .map_err(|e| {
        tracing::error!(error = %e, "Failed to build agent");
        api_error(&e)
    })
}

fn sse_event(event: &RunEvent) -> Event {
    Event::default()
        .event(event.event_type())
        .json_data(event)
        .unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Failed to encode run event");
            Event::default()
                .event(event.event_type())
                .data(event.line().unwrap_or_default())
        })
}

// ============================================================================
// Handlers
// ============================================================================

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let provider_connected = state.provider.health_check().await.unwrap_or(false);

    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        provider_connected,
        tools: state.tools.len(),
    })
}

/// Run an agent to completion and return its step log
pub async fn run_handler(
    State(state): State<AppState>,
    Json(payload): Json<RunRequest>,
) -> Result<Json<RunResponse>, ApiError> {
    let agent = build_agent(&state, payload.model)?;

    let result = agent.run(&payload.message).await.map_err(|e| {
        tracing::warn!(error = %e, "Agent run rejected");
        api_error(&e)
    })?;

    Ok(Json(RunResponse { result }))
}

/// Run an agent and stream its events as server-sent events
pub async fn stream_handler(
    State(state): State<AppState>,
    Query(query): Query<StreamQuery>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    let agent = build_agent(&state, query.model)?;

    let events = agent
        .run_stream(&query.message)
        .map(|event| Ok(sse_event(&event)));

    Ok(Sse::new(events).keep_alive(KeepAlive::default()))
}
