//! # kitsync-core
//!
//! Core types, traits, and pure logic for kitsync: kit content models, the
//! style-key eligibility rules, the schema migration table and the kit
//! export/import codec.
//!
//! Storage backends live in `kitsync-db`; the remote template catalog in
//! `kitsync-catalog`.

pub mod clock;
pub mod codec;
pub mod defaults;
pub mod eligibility;
pub mod error;
pub mod events;
pub mod logging;
pub mod migration;
pub mod models;
pub mod traits;

// Re-export commonly used types at crate root
pub use clock::{Clock, ManualClock, SystemClock};
pub use codec::{ImportedKit, KitExport};
pub use error::{Error, FetchError, Result};
pub use events::{EventBus, EventEnvelope, ServerEvent};
pub use migration::{Migrated, MigrationWarning, CURRENT_SCHEMA_VERSION};
pub use models::*;
pub use traits::*;
