//! Manual credential refresh.

use axum::{extract::State, http::StatusCode, Json};
use std::sync::Arc;
use tracing::{info, warn};

use ripline_core::RefreshOutcome;

use super::handlers::ErrorResponse;
use crate::state::AppState;

/// Run the credential exporter now and report how it ended.
pub async fn refresh(
    State(state): State<Arc<AppState>>,
) -> Result<Json<RefreshOutcome>, (StatusCode, Json<ErrorResponse>)> {
    match state.refresher().refresh().await {
        Ok(outcome) => {
            info!("Manual credential refresh: {}", outcome.as_str());
            Ok(Json(outcome))
        }
        Err(e) => {
            warn!("Manual credential refresh failed: {}", e);
            Err((
                StatusCode::BAD_GATEWAY,
                Json(ErrorResponse::new(e.to_string())),
            ))
        }
    }
}
