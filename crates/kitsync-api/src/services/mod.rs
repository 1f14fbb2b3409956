//! Service layer for kitsync-api.

pub mod heartbeat;
pub mod kit_service;

pub use heartbeat::{heartbeat_payload, heartbeat_stream, HeartbeatPayload};
pub use kit_service::{ApplyResolution, KitService};
