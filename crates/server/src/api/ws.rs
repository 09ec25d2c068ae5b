//! WebSocket stream of pipeline events.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
};
use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

use ripline_core::PipelineEvent;

use crate::metrics::{WS_CONNECTIONS_ACTIVE, WS_CONNECTIONS_TOTAL, WS_LAG_EVENTS, WS_MESSAGES_SENT};
use crate::state::AppState;

/// Metric label for an event.
pub fn event_type(event: &PipelineEvent) -> &'static str {
    match event {
        PipelineEvent::Log { .. } => "log",
        PipelineEvent::BatchProgress { .. } => "batch_progress",
        PipelineEvent::JobStatus { .. } => "job_status",
        PipelineEvent::FileProgress { .. } => "file_progress",
        PipelineEvent::BatchComplete { .. } => "batch_complete",
    }
}

/// WebSocket upgrade handler.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let (mut sender, mut receiver) = socket.split();
    let mut rx = state.events().subscribe();

    WS_CONNECTIONS_TOTAL.inc();
    WS_CONNECTIONS_ACTIVE.inc();
    info!("WebSocket client connected");

    let send_task = tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(event) => {
                    WS_MESSAGES_SENT
                        .with_label_values(&[event_type(&event)])
                        .inc();
                    match serde_json::to_string(&event) {
                        Ok(json) => {
                            if sender.send(Message::Text(json.into())).await.is_err() {
                                debug!("WebSocket send failed, client disconnected");
                                break;
                            }
                        }
                        Err(e) => error!("Failed to serialize PipelineEvent: {}", e),
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!("WebSocket client lagged, skipped {} events", n);
                    WS_LAG_EVENTS.inc();
                }
                Err(broadcast::error::RecvError::Closed) => {
                    debug!("Event channel closed");
                    break;
                }
            }
        }
    });

    // Clients only listen; drain their frames until they go away.
    while let Some(result) = receiver.next().await {
        match result {
            Ok(Message::Close(_)) => {
                debug!("WebSocket client requested close");
                break;
            }
            Ok(Message::Text(text)) => debug!("Ignoring client message: {}", text),
            Ok(_) => {}
            Err(e) => {
                warn!("WebSocket receive error: {}", e);
                break;
            }
        }
    }

    send_task.abort();
    WS_CONNECTIONS_ACTIVE.dec();
    info!("WebSocket client disconnected");
}

#[cfg(test)]
mod tests {
    use super::*;
    use ripline_core::{BatchSummary, JobStatus};

    #[test]
    fn test_event_type_labels_match_wire_tags() {
        let events = [
            PipelineEvent::Log {
                job_id: None,
                line: "x".into(),
            },
            PipelineEvent::BatchProgress {
                current: 1,
                total: 2,
            },
            PipelineEvent::JobStatus {
                id: "https://a".into(),
                status: JobStatus::Completed,
            },
            PipelineEvent::FileProgress {
                job_id: "j".into(),
                value: 1.0,
            },
            PipelineEvent::BatchComplete {
                summary: BatchSummary::default(),
            },
        ];
        for event in events {
            let json = serde_json::to_value(&event).unwrap();
            assert_eq!(json["type"], event_type(&event));
        }
    }
}
