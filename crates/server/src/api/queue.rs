//! Link queue API handlers.

use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

use ripline_core::Job;

use super::handlers::ErrorResponse;
use crate::state::AppState;

type ApiError = (StatusCode, Json<ErrorResponse>);

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct LinkRequest {
    pub url: String,
}

#[derive(Debug, Serialize)]
pub struct QueueResponse {
    pub jobs: Vec<Job>,
    pub running: bool,
}

#[derive(Debug, Serialize)]
pub struct RemoveResponse {
    pub removed: usize,
}

#[derive(Debug, Serialize)]
pub struct ClearResponse {
    pub cleared: usize,
    pub manifests_purged: usize,
}

fn bad_request(message: &str) -> ApiError {
    (StatusCode::BAD_REQUEST, Json(ErrorResponse::new(message)))
}

fn ensure_idle(state: &AppState, action: &str) -> Result<(), ApiError> {
    if state.orchestrator().is_running() {
        return Err((
            StatusCode::CONFLICT,
            Json(ErrorResponse::new(format!(
                "cannot {} while a batch is running",
                action
            ))),
        ));
    }
    Ok(())
}

fn trimmed_url(request: &LinkRequest) -> Result<&str, ApiError> {
    match request.url.trim() {
        "" => Err(bad_request("url must not be empty")),
        url => Ok(url),
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// List queued links in admission order.
pub async fn list_queue(State(state): State<Arc<AppState>>) -> Json<QueueResponse> {
    Json(QueueResponse {
        jobs: state.queue().snapshot(),
        running: state.orchestrator().is_running(),
    })
}

/// Append a link to the queue.
pub async fn add_link(
    State(state): State<Arc<AppState>>,
    Json(request): Json<LinkRequest>,
) -> Result<(StatusCode, Json<Job>), ApiError> {
    let url = trimmed_url(&request)?;
    let job = state.queue().push(url);
    info!("[{}] Queued {} at position {}", job.id, job.url, job.queue_position);
    Ok((StatusCode::CREATED, Json(job)))
}

/// Remove every queued entry for a link.
///
/// Rejected while a batch runs, since its jobs are already counted.
pub async fn remove_link(
    State(state): State<Arc<AppState>>,
    Json(request): Json<LinkRequest>,
) -> Result<Json<RemoveResponse>, ApiError> {
    let url = trimmed_url(&request)?;
    ensure_idle(&state, "remove links")?;
    let removed = state.queue().remove_url(url);
    info!("Removed {} queued entr(ies) for {}", removed, url);
    Ok(Json(RemoveResponse { removed }))
}

/// Clear the queue and delete leftover manifests.
///
/// Rejected while a batch runs, since running jobs own their manifests.
pub async fn clear_queue(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ClearResponse>, ApiError> {
    ensure_idle(&state, "clear the queue")?;

    let cleared = state.queue().clear();
    let manifests_purged = state.store().purge().await.map_err(|e| {
        warn!("Failed to purge manifests: {}", e);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse::new(format!("failed to purge manifests: {}", e))),
        )
    })?;
    info!(
        "Cleared {} queued link(s) and {} manifest(s)",
        cleared, manifests_purged
    );
    Ok(Json(ClearResponse {
        cleared,
        manifests_purged,
    }))
}
