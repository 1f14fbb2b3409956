//! Storage traits for kits, bindings and the stale queue.
//!
//! These traits define the interfaces that concrete stores must satisfy.
//! Implementations must make each method atomic: in particular
//! [`KitRepository::update_content`] writes the content and enqueues the
//! other bound documents as one step, so a concurrent
//! [`StaleQueueRepository::is_stale`] sees both or neither.

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::Result;
use crate::models::*;

// =============================================================================
// KIT REPOSITORY
// =============================================================================

/// Repository for kit documents.
#[async_trait]
pub trait KitRepository: Send + Sync {
    /// Insert a new kit.
    async fn create(&self, req: CreateKitRequest) -> Result<KitDocument>;

    /// Fetch a kit by ID. Fails with `KitNotFound`.
    async fn fetch(&self, id: Uuid) -> Result<KitDocument>;

    /// List kit summaries, newest first.
    async fn list(&self) -> Result<Vec<KitSummary>>;

    /// Overwrite a kit's content.
    ///
    /// When the kit is the global kit, every document bound to it except
    /// `source_document` is added to its stale set and `source_document` is
    /// removed from it.
    async fn update_content(
        &self,
        id: Uuid,
        content: KitContent,
        source_document: Option<&DocumentId>,
    ) -> Result<KitUpdateOutcome>;

    /// Replace content after a schema migration, but only while the stored
    /// kit still matches `base` (content, schema version and last update).
    /// No propagation.
    ///
    /// Returns `false` when another write landed since `base` was fetched;
    /// the caller re-reads and migrates again.
    async fn replace_migrated(
        &self,
        base: &KitDocument,
        content: KitContent,
        schema_version: i32,
    ) -> Result<bool>;

    /// IDs of kits stored below `schema_version`.
    async fn list_outdated(&self, schema_version: i32) -> Result<Vec<Uuid>>;

    /// Delete a kit, clearing the global pointer, bindings and stale set.
    async fn delete(&self, id: Uuid) -> Result<KitDeletion>;
}

// =============================================================================
// GLOBAL KIT
// =============================================================================

/// The single global kit pointer.
#[async_trait]
pub trait GlobalKitRepository: Send + Sync {
    async fn get_global(&self) -> Result<Option<Uuid>>;

    /// Set the pointer, returning the previous value. Fails with `Validation`
    /// when `kit_id` does not exist.
    async fn set_global(&self, kit_id: Option<Uuid>) -> Result<Option<Uuid>>;

    /// Set the pointer only if it currently equals `expected`.
    async fn swap_global(&self, expected: Option<Uuid>, new: Option<Uuid>) -> Result<bool>;
}

// =============================================================================
// BINDINGS
// =============================================================================

/// Per-document kit bindings.
#[async_trait]
pub trait BindingRepository: Send + Sync {
    async fn get_binding(&self, document_id: &DocumentId) -> Result<Option<DocumentBinding>>;

    /// Bind a document to a kit, clear `recently_imported` and remove the
    /// document from every stale set. Fails with `KitNotFound`.
    async fn bind(&self, document_id: &DocumentId, kit_id: Uuid) -> Result<DocumentBinding>;

    /// Unbind a document and remove it from every stale set. Returns whether
    /// a binding existed.
    async fn clear_binding(&self, document_id: &DocumentId) -> Result<bool>;

    /// Flag a document as holding freshly imported template styles.
    async fn mark_recently_imported(&self, document_id: &DocumentId) -> Result<()>;

    /// Documents bound to `kit_id`.
    async fn list_bound(&self, kit_id: Uuid) -> Result<Vec<DocumentId>>;
}

// =============================================================================
// STALE QUEUE
// =============================================================================

/// Documents whose kit changed since they last synced.
#[async_trait]
pub trait StaleQueueRepository: Send + Sync {
    /// Whether the document is in the current global kit's stale set.
    async fn is_stale(&self, document_id: &DocumentId) -> Result<bool>;

    /// Members of a kit's stale set, ordered by document id.
    async fn stale_documents(&self, kit_id: Uuid) -> Result<Vec<DocumentId>>;

    /// Remove a document from every stale set. Returns whether it was present.
    async fn remove_stale(&self, document_id: &DocumentId) -> Result<bool>;
}

// =============================================================================
// CATALOG CACHE
// =============================================================================

/// Persistence for the remote catalog snapshot.
#[async_trait]
pub trait CatalogCacheRepository: Send + Sync {
    async fn load_catalog(&self) -> Result<Option<CatalogCacheEntry>>;

    /// Replace the stored snapshot in one step.
    async fn store_catalog(&self, entry: &CatalogCacheEntry) -> Result<()>;
}

// =============================================================================
// IMPORT LOG
// =============================================================================

/// History of template imports.
#[async_trait]
pub trait ImportLogRepository: Send + Sync {
    async fn record_import(&self, req: NewImportRecord) -> Result<ImportRecord>;

    /// Most recent first.
    async fn list_imports(&self, limit: i64) -> Result<Vec<ImportRecord>>;
}

/// Everything the kit service needs from a store.
pub trait KitStore:
    KitRepository
    + GlobalKitRepository
    + BindingRepository
    + StaleQueueRepository
    + CatalogCacheRepository
    + ImportLogRepository
    + Send
    + Sync
{
}

impl<T> KitStore for T where
    T: KitRepository
        + GlobalKitRepository
        + BindingRepository
        + StaleQueueRepository
        + CatalogCacheRepository
        + ImportLogRepository
        + Send
        + Sync
{
}
