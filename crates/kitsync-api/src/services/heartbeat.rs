//! Heartbeat side channel for the stale queue.
//!
//! Editors poll the heartbeat to learn whether their document must pick up a
//! newer global kit. A payload is produced on every interval tick and as soon
//! as an event changes the queue, so clients see propagation without waiting
//! for the next tick.

use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::stream::{self, Stream, StreamExt};
use serde::Serialize;
use tokio_stream::wrappers::{BroadcastStream, IntervalStream};
use tracing::warn;

use kitsync_core::{QueueSnapshot, Result};

use super::KitService;

/// One heartbeat: the documents stale for the global kit.
#[derive(Debug, Clone, Serialize)]
pub struct HeartbeatPayload {
    #[serde(flatten)]
    pub queue: QueueSnapshot,
    pub tick_at: DateTime<Utc>,
}

enum Trigger {
    Tick,
    QueueChanged,
}

/// Build a payload from the current queue state.
pub async fn heartbeat_payload(service: &KitService) -> Result<HeartbeatPayload> {
    Ok(HeartbeatPayload {
        queue: service.queue_snapshot().await?,
        tick_at: Utc::now(),
    })
}

/// Endless stream of payloads: one immediately, then one per `interval` and
/// one after every queue-changing event. Snapshots that fail to load are
/// skipped.
pub fn heartbeat_stream(
    service: KitService,
    interval: Duration,
) -> impl Stream<Item = HeartbeatPayload> + Send + 'static {
    let ticks = IntervalStream::new(tokio::time::interval(interval)).map(|_| Trigger::Tick);
    let events = BroadcastStream::new(service.events().subscribe()).filter_map(|result| async move {
        match result {
            Ok(envelope) if envelope.payload.touches_queue() => Some(Trigger::QueueChanged),
            Ok(_) => None,
            // Lagged: a refresh covers whatever was missed.
            Err(_) => Some(Trigger::QueueChanged),
        }
    });

    stream::select(ticks, events).filter_map(move |trigger| {
        let service = service.clone();
        async move {
            match heartbeat_payload(&service).await {
                Ok(payload) => Some(payload),
                Err(e) => {
                    warn!(
                        subsystem = "api",
                        component = "heartbeat",
                        trigger = match trigger {
                            Trigger::Tick => "tick",
                            Trigger::QueueChanged => "queue_changed",
                        },
                        error = %e,
                        "Heartbeat snapshot failed"
                    );
                    None
                }
            }
        }
    })
}
