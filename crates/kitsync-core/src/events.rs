//! Kit events and the broadcast bus that carries them.
//!
//! Kit operations emit [`ServerEvent`]s wrapped in an [`EventEnvelope`].
//! The heartbeat stream subscribes to push a fresh queue snapshot as soon as
//! an update enqueues documents instead of waiting for the next tick.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::models::DocumentId;

/// Versioned wrapper around a domain event.
#[derive(Debug, Clone, Serialize)]
pub struct EventEnvelope {
    /// UUIDv7 event identifier.
    pub event_id: Uuid,
    /// Namespaced event type (e.g. `"kit.updated"`).
    pub event_type: String,
    pub occurred_at: DateTime<Utc>,
    pub payload_version: u32,
    pub payload: ServerEvent,
}

impl EventEnvelope {
    pub fn new(event: ServerEvent) -> Self {
        Self {
            event_id: Uuid::now_v7(),
            event_type: event.namespaced_event_type().to_string(),
            occurred_at: Utc::now(),
            payload_version: 1,
            payload: event,
        }
    }
}

/// Domain events, serialized with a `type` tag.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum ServerEvent {
    /// A kit was created (save or import).
    KitCreated { kit_id: Uuid, title: String },
    /// A kit's content was overwritten.
    KitUpdated {
        kit_id: Uuid,
        /// Documents newly marked stale.
        enqueued: Vec<DocumentId>,
    },
    /// A kit was deleted.
    KitDeleted {
        kit_id: Uuid,
        was_global: bool,
        unbound_count: usize,
    },
    /// The global kit pointer changed.
    GlobalKitChanged {
        #[serde(skip_serializing_if = "Option::is_none")]
        previous: Option<Uuid>,
        #[serde(skip_serializing_if = "Option::is_none")]
        current: Option<Uuid>,
    },
    /// A stale document was resolved.
    StaleResolved {
        document_id: DocumentId,
        /// `"apply"`, `"discard"` or `"dequeue"`.
        resolution: String,
    },
}

impl ServerEvent {
    pub fn namespaced_event_type(&self) -> &'static str {
        match self {
            ServerEvent::KitCreated { .. } => "kit.created",
            ServerEvent::KitUpdated { .. } => "kit.updated",
            ServerEvent::KitDeleted { .. } => "kit.deleted",
            ServerEvent::GlobalKitChanged { .. } => "kit.global_changed",
            ServerEvent::StaleResolved { .. } => "queue.resolved",
        }
    }

    /// Whether this event changes the global kit's stale queue.
    pub fn touches_queue(&self) -> bool {
        match self {
            ServerEvent::KitUpdated { enqueued, .. } => !enqueued.is_empty(),
            ServerEvent::KitDeleted { was_global, .. } => *was_global,
            ServerEvent::GlobalKitChanged { .. } | ServerEvent::StaleResolved { .. } => true,
            ServerEvent::KitCreated { .. } => false,
        }
    }
}

/// Broadcast bus for [`ServerEvent`]s.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<EventEnvelope>,
}

impl EventBus {
    /// Create a new event bus with the given buffer capacity.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Emit an event to all subscribers. Dropped silently when nobody listens.
    pub fn emit(&self, event: ServerEvent) {
        let envelope = EventEnvelope::new(event);
        tracing::debug!(
            event_type = %envelope.event_type,
            event_id = %envelope.event_id,
            subscriber_count = self.tx.receiver_count(),
            "EventBus emit"
        );
        let _ = self.tx.send(envelope);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EventEnvelope> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(crate::defaults::EVENT_BUS_CAPACITY)
    }
}
