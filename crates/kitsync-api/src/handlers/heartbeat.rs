//! Heartbeat endpoints.

use std::convert::Infallible;
use std::time::Duration;

use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
    Json,
};
use futures::stream::{Stream, StreamExt};
use tracing::debug;

use crate::services::{heartbeat_payload, heartbeat_stream, HeartbeatPayload};
use crate::{ApiError, AppState};

/// Server-Sent Events stream of heartbeat payloads.
pub async fn heartbeat_events(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    debug!(
        subsystem = "api",
        component = "heartbeat",
        subscribers = state.kits.events().subscriber_count(),
        "Heartbeat client connected"
    );

    let stream = heartbeat_stream(state.kits.clone(), state.config.heartbeat_interval).filter_map(
        |payload| async move {
            match Event::default().event("heartbeat").json_data(&payload) {
                Ok(event) => Some(Ok(event)),
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to serialize heartbeat");
                    None
                }
            }
        },
    );

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keepalive"),
    )
}

/// One heartbeat payload.
pub async fn heartbeat_snapshot(
    State(state): State<AppState>,
) -> Result<Json<HeartbeatPayload>, ApiError> {
    Ok(Json(heartbeat_payload(&state.kits).await?))
}
