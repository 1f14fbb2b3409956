//! Kit operations: saving, binding, global propagation and stale resolution.
//!
//! Every handler goes through [`KitService`] so the eligibility filter, the
//! read-time schema upgrade and event emission happen in one place. Storage
//! atomicity (content write + enqueue) is the store's job; the service only
//! sequences calls and reports what happened.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use chrono::NaiveDate;
use tracing::{debug, info, warn};
use uuid::Uuid;

use kitsync_core::codec::{self, KitExport};
use kitsync_core::eligibility::{reset_properties, select_style_properties};
use kitsync_core::migration::{self, Migrated, CURRENT_SCHEMA_VERSION};
use kitsync_core::{
    CreateKitRequest, DocumentBinding, DocumentId, Error, EventBus, ImportRecord, KitContent,
    KitDeletion, KitDocument, KitStore, KitSummary, KitUpdateOutcome, NewImportRecord,
    QueueSnapshot, Result, ServerEvent,
};

/// Upgrade attempts per read before a legacy kit is served without
/// persisting the upgrade.
const MAX_UPGRADE_ATTEMPTS: u32 = 3;

/// Result of accepting a kit change for one document.
#[derive(Debug, Clone, PartialEq)]
pub struct ApplyResolution {
    /// Whether the document was in a stale set.
    pub removed: bool,
    /// Content of the bound kit, re-applied.
    pub content: Option<KitContent>,
}

/// Kit store operations with eligibility filtering and event emission.
#[derive(Clone)]
pub struct KitService {
    store: Arc<dyn KitStore>,
    events: EventBus,
}

impl KitService {
    pub fn new(store: Arc<dyn KitStore>, events: EventBus) -> Self {
        Self { store, events }
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    // =========================================================================
    // KITS
    // =========================================================================

    /// Create a kit from the style properties of `properties`. Bindings are
    /// left alone.
    pub async fn save_kit(&self, title: &str, properties: &KitContent) -> Result<KitDocument> {
        let title = title.trim();
        if title.is_empty() {
            return Err(Error::Validation("kit title must not be empty".to_string()));
        }

        let kit = self
            .store
            .create(CreateKitRequest {
                title: title.to_string(),
                content: select_style_properties(properties),
                schema_version: CURRENT_SCHEMA_VERSION,
            })
            .await?;

        info!(
            subsystem = "api",
            component = "kit_service",
            op = "save_kit",
            kit_id = %kit.id,
            result_count = kit.content.len(),
            "Kit saved"
        );
        self.events.emit(ServerEvent::KitCreated {
            kit_id: kit.id,
            title: kit.title.clone(),
        });
        Ok(kit)
    }

    /// Overwrite a kit with the style properties of `properties`.
    ///
    /// Saving the global kit marks every other bound document stale in the
    /// same step; `source_document` already holds the new content and is
    /// dequeued instead.
    pub async fn update_kit(
        &self,
        kit_id: Uuid,
        properties: &KitContent,
        source_document: Option<&DocumentId>,
    ) -> Result<KitUpdateOutcome> {
        let start = Instant::now();
        let outcome = self
            .store
            .update_content(kit_id, select_style_properties(properties), source_document)
            .await?;

        info!(
            subsystem = "api",
            component = "kit_service",
            op = "update_kit",
            kit_id = %kit_id,
            document_id = source_document.map(|d| d.as_str()).unwrap_or(""),
            was_global = outcome.was_global,
            enqueued_count = outcome.enqueued.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Kit updated"
        );
        self.events.emit(ServerEvent::KitUpdated {
            kit_id,
            enqueued: outcome.enqueued.clone(),
        });
        Ok(outcome)
    }

    /// Fetch a kit, upgrading and persisting content stored under an older
    /// schema version.
    ///
    /// The upgrade is written only if the kit is unchanged since the read;
    /// otherwise the fresh content is read and upgraded again.
    pub async fn get_kit(&self, kit_id: Uuid) -> Result<KitDocument> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            let kit = self.store.fetch(kit_id).await?;
            if !migration::needs_migration(kit.schema_version) {
                return Ok(kit);
            }

            let migrated = migration::migrate(&kit.content, kit.schema_version);
            for warning in &migrated.warnings {
                warn!(
                    subsystem = "api",
                    component = "kit_service",
                    op = "migrate",
                    kit_id = %kit_id,
                    warning = ?warning,
                    "Migration rule skipped"
                );
            }

            let written = self
                .store
                .replace_migrated(&kit, migrated.content.clone(), migrated.schema_version)
                .await?;
            if written {
                info!(
                    subsystem = "api",
                    component = "kit_service",
                    op = "migrate",
                    kit_id = %kit_id,
                    from_version = kit.schema_version,
                    to_version = migrated.schema_version,
                    rules_applied = migrated.applied.len(),
                    "Kit content upgraded"
                );
            } else if attempt < MAX_UPGRADE_ATTEMPTS {
                debug!(
                    subsystem = "api",
                    component = "kit_service",
                    op = "migrate",
                    kit_id = %kit_id,
                    attempt,
                    "Kit changed during upgrade, re-reading"
                );
                continue;
            } else {
                warn!(
                    subsystem = "api",
                    component = "kit_service",
                    op = "migrate",
                    kit_id = %kit_id,
                    attempt,
                    "Kit kept changing during upgrade, serving unpersisted upgrade"
                );
            }

            return Ok(KitDocument {
                content: migrated.content,
                schema_version: migrated.schema_version,
                ..kit
            });
        }
    }

    pub async fn list_kits(&self) -> Result<Vec<KitSummary>> {
        self.store.list().await
    }

    /// Delete a kit along with its bindings, stale set and, when it was the
    /// global kit, the global pointer.
    pub async fn delete_kit(&self, kit_id: Uuid) -> Result<KitDeletion> {
        let deletion = self.store.delete(kit_id).await?;
        info!(
            subsystem = "api",
            component = "kit_service",
            op = "delete_kit",
            kit_id = %kit_id,
            was_global = deletion.was_global,
            result_count = deletion.unbound_documents.len(),
            "Kit deleted"
        );
        self.events.emit(ServerEvent::KitDeleted {
            kit_id,
            was_global: deletion.was_global,
            unbound_count: deletion.unbound_documents.len(),
        });
        Ok(deletion)
    }

    /// Upgrade every kit stored below the current schema version. Returns how
    /// many were upgraded.
    pub async fn migrate_stored_kits(&self) -> Result<usize> {
        let outdated = self.store.list_outdated(CURRENT_SCHEMA_VERSION).await?;
        let mut upgraded = 0;
        for kit_id in outdated {
            match self.get_kit(kit_id).await {
                Ok(_) => upgraded += 1,
                // Deleted between listing and upgrade.
                Err(e) if e.is_not_found() => continue,
                Err(e) => return Err(e),
            }
        }
        info!(
            subsystem = "api",
            component = "kit_service",
            op = "migrate_stored_kits",
            result_count = upgraded,
            "Stored kits upgraded"
        );
        Ok(upgraded)
    }

    // =========================================================================
    // GLOBAL KIT
    // =========================================================================

    pub async fn global_kit(&self) -> Result<Option<Uuid>> {
        self.store.get_global().await
    }

    /// Point the global kit at `kit_id` (or nowhere). Returns the previous
    /// value.
    pub async fn set_global(&self, kit_id: Option<Uuid>) -> Result<Option<Uuid>> {
        let previous = self.store.set_global(kit_id).await?;
        if previous != kit_id {
            info!(
                subsystem = "api",
                component = "kit_service",
                op = "set_global",
                kit_id = ?kit_id,
                "Global kit changed"
            );
            self.events.emit(ServerEvent::GlobalKitChanged {
                previous,
                current: kit_id,
            });
        }
        Ok(previous)
    }

    /// Compare-and-swap on the global pointer.
    pub async fn swap_global(&self, expected: Option<Uuid>, kit_id: Option<Uuid>) -> Result<bool> {
        let swapped = self.store.swap_global(expected, kit_id).await?;
        if swapped && expected != kit_id {
            self.events.emit(ServerEvent::GlobalKitChanged {
                previous: expected,
                current: kit_id,
            });
        }
        debug!(
            subsystem = "api",
            component = "kit_service",
            op = "swap_global",
            success = swapped,
            "Global kit compare-and-swap"
        );
        Ok(swapped)
    }

    // =========================================================================
    // BINDINGS
    // =========================================================================

    /// Bind a document to a kit and return the kit's content.
    pub async fn apply_kit(&self, document_id: &DocumentId, kit_id: Uuid) -> Result<KitContent> {
        let kit = self.get_kit(kit_id).await?;
        self.store.bind(document_id, kit_id).await?;
        debug!(
            subsystem = "api",
            component = "kit_service",
            op = "apply_kit",
            kit_id = %kit_id,
            document_id = %document_id,
            "Kit applied"
        );
        Ok(kit.content)
    }

    /// Unbind a document. Returns whether it was bound.
    pub async fn clear_binding(&self, document_id: &DocumentId) -> Result<bool> {
        self.store.clear_binding(document_id).await
    }

    pub async fn get_binding(&self, document_id: &DocumentId) -> Result<Option<DocumentBinding>> {
        self.store.get_binding(document_id).await
    }

    /// Blanked values for every style property of `properties`. The
    /// document's binding is cleared.
    pub async fn reset_document(
        &self,
        document_id: &DocumentId,
        properties: &KitContent,
    ) -> Result<KitContent> {
        let blank = reset_properties(properties);
        let was_bound = self.store.clear_binding(document_id).await?;
        debug!(
            subsystem = "api",
            component = "kit_service",
            op = "reset_document",
            document_id = %document_id,
            result_count = blank.len(),
            was_bound,
            "Document styles reset"
        );
        Ok(blank)
    }

    // =========================================================================
    // STALE QUEUE
    // =========================================================================

    /// Whether the document must pick up a newer version of the global kit.
    pub async fn is_stale(&self, document_id: &DocumentId) -> Result<bool> {
        self.store.is_stale(document_id).await
    }

    /// Documents waiting on the current global kit.
    pub async fn queue_snapshot(&self) -> Result<QueueSnapshot> {
        let global_kit_id = self.store.get_global().await?;
        let stylekit_queue = match global_kit_id {
            Some(kit_id) => self.store.stale_documents(kit_id).await?,
            None => Vec::new(),
        };
        Ok(QueueSnapshot {
            global_kit_id,
            stylekit_queue,
        })
    }

    /// Accept the latest kit content: dequeue and re-apply the bound kit.
    ///
    /// `content` is `None` when the document is unbound or its kit
    /// disappeared in the meantime.
    pub async fn resolve_apply(&self, document_id: &DocumentId) -> Result<ApplyResolution> {
        let removed = self.store.remove_stale(document_id).await?;
        self.emit_resolved(document_id, "apply");

        let Some(kit_id) = self
            .store
            .get_binding(document_id)
            .await?
            .and_then(|b| b.kit_id)
        else {
            return Ok(ApplyResolution {
                removed,
                content: None,
            });
        };

        let content = match self.apply_kit(document_id, kit_id).await {
            Ok(content) => Some(content),
            Err(e) if e.is_not_found() => {
                debug!(
                    subsystem = "api",
                    component = "kit_service",
                    op = "resolve_apply",
                    document_id = %document_id,
                    kit_id = %kit_id,
                    "Bound kit vanished before apply"
                );
                None
            }
            Err(e) => return Err(e),
        };
        Ok(ApplyResolution { removed, content })
    }

    /// Reject the kit change: dequeue and unbind. Returns whether the
    /// document was queued.
    pub async fn resolve_discard(&self, document_id: &DocumentId) -> Result<bool> {
        let removed = self.store.remove_stale(document_id).await?;
        self.store.clear_binding(document_id).await?;
        self.emit_resolved(document_id, "discard");
        Ok(removed)
    }

    /// Drop a document from the queue without touching its binding.
    pub async fn dequeue(&self, document_id: &DocumentId) -> Result<bool> {
        let removed = self.store.remove_stale(document_id).await?;
        if removed {
            self.emit_resolved(document_id, "dequeue");
        }
        Ok(removed)
    }

    fn emit_resolved(&self, document_id: &DocumentId, resolution: &str) {
        self.events.emit(ServerEvent::StaleResolved {
            document_id: document_id.clone(),
            resolution: resolution.to_string(),
        });
    }

    // =========================================================================
    // EXPORT / IMPORT
    // =========================================================================

    pub async fn export_kit(&self, kit_id: Uuid, date: NaiveDate) -> Result<KitExport> {
        let kit = self.get_kit(kit_id).await?;
        codec::export_kit(&kit, date)
    }

    /// Bundle several kits into one zip archive. Repeated ids are exported
    /// once, in first-seen order.
    pub async fn export_kits(&self, kit_ids: &[Uuid], date: NaiveDate) -> Result<KitExport> {
        let mut seen = HashSet::new();
        let mut kits = Vec::with_capacity(kit_ids.len());
        for &kit_id in kit_ids {
            if seen.insert(kit_id) {
                kits.push(self.get_kit(kit_id).await?);
            }
        }

        let export = codec::export_archive(&kits, date)?;
        info!(
            subsystem = "api",
            component = "kit_service",
            op = "export_kits",
            result_count = kits.len(),
            "Kits exported"
        );
        Ok(export)
    }

    /// Store every kit found in an uploaded `.json` or `.zip` file. Older
    /// schema versions are upgraded before storing.
    pub async fn import_kits(
        &self,
        filename: &str,
        bytes: &[u8],
        max_bytes: usize,
    ) -> Result<Vec<Uuid>> {
        let imported = codec::decode_import(filename, bytes, max_bytes)?;

        let mut ids = Vec::with_capacity(imported.len());
        for kit in imported {
            let content = if migration::needs_migration(kit.schema_version) {
                migration::migrate(&kit.content, kit.schema_version).content
            } else {
                kit.content
            };
            let stored = self
                .store
                .create(CreateKitRequest {
                    title: kit.title,
                    content: select_style_properties(&content),
                    schema_version: CURRENT_SCHEMA_VERSION,
                })
                .await?;
            self.events.emit(ServerEvent::KitCreated {
                kit_id: stored.id,
                title: stored.title.clone(),
            });
            ids.push(stored.id);
        }

        info!(
            subsystem = "api",
            component = "kit_service",
            op = "import_kits",
            result_count = ids.len(),
            "Kits imported"
        );
        Ok(ids)
    }

    /// Upgrade a document's inline properties without storing anything.
    pub fn migrate_document(&self, properties: &KitContent, schema_version: i32) -> Migrated {
        migration::migrate(properties, schema_version)
    }

    // =========================================================================
    // TEMPLATE IMPORTS
    // =========================================================================

    /// Log a template import and flag the document as freshly imported.
    pub async fn record_import(&self, req: NewImportRecord) -> Result<ImportRecord> {
        if req.method.trim().is_empty() {
            return Err(Error::Validation("import method must not be empty".to_string()));
        }
        self.store.mark_recently_imported(&req.document_id).await?;
        let record = self.store.record_import(req).await?;
        debug!(
            subsystem = "api",
            component = "kit_service",
            op = "record_import",
            template_id = record.template_id,
            document_id = %record.document_id,
            "Template import recorded"
        );
        Ok(record)
    }

    pub async fn list_imports(&self, limit: i64) -> Result<Vec<ImportRecord>> {
        self.store.list_imports(limit).await
    }
}
