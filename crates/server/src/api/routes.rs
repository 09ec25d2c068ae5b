use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use super::{batch, credentials, handlers, queue, ws};
use crate::state::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    let api_routes = Router::new()
        // Health and config
        .route("/health", get(handlers::health))
        .route("/config", get(handlers::get_config))
        // Queue
        .route(
            "/queue",
            get(queue::list_queue)
                .post(queue::add_link)
                .delete(queue::clear_queue),
        )
        .route("/queue/remove", post(queue::remove_link))
        // Batch and orchestrator
        .route("/batch/start", post(batch::start_batch))
        .route("/orchestrator/status", get(batch::get_status))
        .route("/concurrency", get(batch::get_concurrency))
        // Credentials
        .route("/credentials/refresh", post(credentials::refresh))
        // Live events
        .route("/ws", get(ws::ws_handler));

    Router::new()
        .nest("/api/v1", api_routes)
        .route("/metrics", get(handlers::metrics))
        .with_state(state)
        .layer(middleware::from_fn(super::middleware::metrics_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
