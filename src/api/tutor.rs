use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use serde_json::Value;
use tracing::debug;

use super::{AppState, auth::CurrentUser};
use crate::{
    auth::Identity,
    error::Result,
    tutor::{AgentManifest, SessionState, session_for},
};

#[utoipa::path(
    get,
    path = "/api/tutor/agent",
    responses(
        (status = 200, description = "Agent descriptor with tool definitions", body = AgentManifest)
    )
)]
pub async fn agent(State(state): State<AppState>) -> Json<AgentManifest> {
    Json(state.agent.manifest())
}

#[utoipa::path(
    post,
    path = "/api/tutor/tools/{name}",
    params(("name" = String, Path, description = "Tool name")),
    request_body(content = Object, description = "Tool arguments"),
    responses(
        (status = 200, description = "Tool result", body = Object),
        (status = 400, description = "Arguments do not match the tool's schema"),
        (status = 404, description = "No such tool")
    )
)]
pub async fn call_tool(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(name): Path<String>,
    Json(args): Json<Value>,
) -> Result<Json<Value>> {
    let session = session_for(&state.tutor_sessions, &state.database, current.user_id()).await?;
    let mut session = session.lock().await;
    debug!("user {} calls {} with {}", current.user_id(), name, args);
    let output = state.agent.call_tool(&name, args, &mut session)?;
    Ok(Json(output))
}

#[utoipa::path(
    get,
    path = "/api/tutor/state",
    responses((status = 200, description = "Tutor session state", body = SessionState))
)]
pub async fn get_state(
    State(state): State<AppState>,
    current: CurrentUser,
) -> Result<Json<SessionState>> {
    let session = session_for(&state.tutor_sessions, &state.database, current.user_id()).await?;
    let snapshot = session.lock().await.clone();
    Ok(Json(snapshot))
}

#[utoipa::path(
    delete,
    path = "/api/tutor/state",
    responses((status = 204, description = "Tutor session state cleared"))
)]
pub async fn reset_state(State(state): State<AppState>, current: CurrentUser) -> StatusCode {
    state.tutor_sessions.invalidate(&current.user_id()).await;
    StatusCode::NO_CONTENT
}
