//! Batch control and orchestrator status handlers.

use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info};

use ripline_core::orchestrator::ConcurrencyInfo;
use ripline_core::{OrchestratorError, OrchestratorStatus};

use super::handlers::ErrorResponse;
use crate::state::AppState;

/// Response to a batch start request.
#[derive(Debug, Serialize)]
pub struct BatchStartResponse {
    pub message: String,
    pub queued: usize,
    pub concurrency: usize,
}

/// Start running the queued links in the background.
pub async fn start_batch(
    State(state): State<Arc<AppState>>,
) -> Result<(StatusCode, Json<BatchStartResponse>), (StatusCode, Json<ErrorResponse>)> {
    let orchestrator = state.orchestrator();
    let queued = state.queue().len();

    match orchestrator.spawn_queued() {
        Ok(handle) => {
            info!("Batch of {} link(s) started", queued);
            tokio::spawn(async move {
                if let Err(e) = handle.await {
                    error!("Batch task ended abnormally: {}", e);
                }
            });
            Ok((
                StatusCode::ACCEPTED,
                Json(BatchStartResponse {
                    message: "Batch started".to_string(),
                    queued,
                    concurrency: orchestrator.concurrency(),
                }),
            ))
        }
        Err(e @ OrchestratorError::AlreadyRunning) => Err((
            StatusCode::CONFLICT,
            Json(ErrorResponse::new(e.to_string())),
        )),
    }
}

pub async fn get_status(State(state): State<Arc<AppState>>) -> Json<OrchestratorStatus> {
    Json(state.orchestrator().status())
}

pub async fn get_concurrency(State(state): State<Arc<AppState>>) -> Json<ConcurrencyInfo> {
    Json(state.orchestrator().concurrency_info())
}
