//! # kitsync-api
//!
//! HTTP surface for kitsync: editor kit operations, the stale queue and its
//! heartbeat, kit export/import and the cached remote template catalog.
//!
//! The binary in `main.rs` wires configuration, logging and storage; this
//! library exposes the router so integration tests can drive it in-process.

pub mod config;
pub mod error;
pub mod handlers;
pub mod router;
pub mod services;
pub mod state;

pub use config::ServerConfig;
pub use error::ApiError;
pub use router::build_router;
pub use services::KitService;
pub use state::AppState;
