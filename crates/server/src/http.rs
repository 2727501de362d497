//! HTTP command surface
//!
//! Thin glue from commands onto registry and coordinator operations:
//!
//! - `POST /channels/{channel}/join` / `leave`
//! - `POST /channels/{channel}/ask`  - gate-exempt text question
//! - `POST /channels/{channel}/say`  - speak text verbatim
//! - `GET  /channels/{channel}/status`
//! - `POST /channels/{channel}/reset`
//! - `GET  /health`, `GET /metrics`

use std::sync::Arc;
use std::time::Instant;

use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};
use tower_http::trace::TraceLayer;

use voice_relay_pipeline::VoiceSession;

use crate::metrics::{record_command_latency, record_session_count, record_turn};
use crate::state::AppState;
use crate::ServerError;

/// Build the command router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/metrics", get(render_metrics))
        .route("/channels/:channel/join", post(join))
        .route("/channels/:channel/leave", post(leave))
        .route("/channels/:channel/ask", post(ask))
        .route("/channels/:channel/say", post(say))
        .route("/channels/:channel/status", get(status))
        .route("/channels/:channel/reset", post(reset))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

async fn render_metrics(State(state): State<AppState>) -> String {
    state.metrics.render()
}

fn session_for(state: &AppState, channel: &str) -> Result<Arc<VoiceSession>, ServerError> {
    state
        .registry
        .get(channel)
        .ok_or_else(|| ServerError::Session(format!("not joined to channel {channel}")))
}

async fn join(
    State(state): State<AppState>,
    Path(channel): Path<String>,
) -> Result<Json<Value>, ServerError> {
    let started = Instant::now();
    state
        .registry
        .join(&channel)
        .await
        .map_err(|e| ServerError::Internal(e.to_string()))?;

    record_session_count(state.registry.list().len());
    record_command_latency("join", started.elapsed().as_secs_f64() * 1000.0);
    Ok(Json(json!({ "channel": channel, "joined": true })))
}

async fn leave(
    State(state): State<AppState>,
    Path(channel): Path<String>,
) -> Result<Json<Value>, ServerError> {
    state
        .registry
        .leave(&channel)
        .await
        .map_err(|e| ServerError::Session(e.to_string()))?;

    record_session_count(state.registry.list().len());
    Ok(Json(json!({ "channel": channel, "joined": false })))
}

#[derive(Debug, Deserialize)]
struct AskRequest {
    /// Name recorded in the conversation history.
    #[serde(default = "default_ask_name")]
    name: String,
    text: String,
}

fn default_ask_name() -> String {
    "operator".to_string()
}

async fn ask(
    State(state): State<AppState>,
    Path(channel): Path<String>,
    Json(request): Json<AskRequest>,
) -> Result<Json<Value>, ServerError> {
    if request.text.trim().is_empty() {
        return Err(ServerError::InvalidRequest("text must not be blank".into()));
    }

    let started = Instant::now();
    let session = session_for(&state, &channel)?;
    let outcome = session.coordinator().ask(&request.name, &request.text).await;

    record_turn(outcome.label());
    record_command_latency("ask", started.elapsed().as_secs_f64() * 1000.0);
    Ok(Json(json!({ "channel": channel, "outcome": outcome.label() })))
}

#[derive(Debug, Deserialize)]
struct SayRequest {
    text: String,
}

async fn say(
    State(state): State<AppState>,
    Path(channel): Path<String>,
    Json(request): Json<SayRequest>,
) -> Result<Json<Value>, ServerError> {
    if request.text.trim().is_empty() {
        return Err(ServerError::InvalidRequest("text must not be blank".into()));
    }

    let session = session_for(&state, &channel)?;
    let outcome = session.coordinator().say(&request.text).await;

    record_turn(outcome.label());
    Ok(Json(json!({ "channel": channel, "outcome": outcome.label() })))
}

async fn status(
    State(state): State<AppState>,
    Path(channel): Path<String>,
) -> Result<Json<Value>, ServerError> {
    let session = session_for(&state, &channel)?;
    let status = session.coordinator().status();
    Ok(Json(json!({ "channel": channel, "status": status })))
}

async fn reset(
    State(state): State<AppState>,
    Path(channel): Path<String>,
) -> Result<Json<Value>, ServerError> {
    let session = session_for(&state, &channel)?;
    session.coordinator().reset_memory();
    Ok(Json(json!({ "channel": channel, "reset": true })))
}
