//! In-memory store.
//!
//! Implements every store trait over a single `RwLock`ed state, so each
//! method is one critical section. Used by tests and by servers started
//! without `DATABASE_URL`; nothing survives a restart.

use std::collections::{BTreeSet, HashMap};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use kitsync_core::{
    BindingRepository, CatalogCacheEntry, CatalogCacheRepository, CreateKitRequest,
    DocumentBinding, DocumentId, Error, GlobalKitRepository, ImportLogRepository, ImportRecord,
    KitContent, KitDeletion, KitDocument, KitRepository, KitSummary, KitUpdateOutcome,
    NewImportRecord, Result, StaleQueueRepository,
};

#[derive(Default)]
struct State {
    kits: HashMap<Uuid, KitDocument>,
    global: Option<Uuid>,
    bindings: HashMap<DocumentId, DocumentBinding>,
    stale: HashMap<Uuid, BTreeSet<DocumentId>>,
    catalog: Option<CatalogCacheEntry>,
    imports: Vec<ImportRecord>,
}

impl State {
    fn remove_from_all_stale(&mut self, document_id: &DocumentId) -> bool {
        let mut removed = false;
        for set in self.stale.values_mut() {
            removed |= set.remove(document_id);
        }
        self.stale.retain(|_, set| !set.is_empty());
        removed
    }

    fn missing_global(kit_id: Uuid) -> Error {
        Error::Validation(format!(
            "cannot make {} the global kit: it does not exist",
            kit_id
        ))
    }
}

/// Store that keeps everything in process memory.
#[derive(Default)]
pub struct MemoryStore {
    state: RwLock<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KitRepository for MemoryStore {
    async fn create(&self, req: CreateKitRequest) -> Result<KitDocument> {
        let now = Utc::now();
        let kit = KitDocument {
            id: Uuid::now_v7(),
            title: req.title,
            content: req.content,
            schema_version: req.schema_version,
            created_at_utc: now,
            updated_at_utc: now,
        };
        self.state.write().await.kits.insert(kit.id, kit.clone());
        Ok(kit)
    }

    async fn fetch(&self, id: Uuid) -> Result<KitDocument> {
        self.state
            .read()
            .await
            .kits
            .get(&id)
            .cloned()
            .ok_or(Error::KitNotFound(id))
    }

    async fn list(&self) -> Result<Vec<KitSummary>> {
        let state = self.state.read().await;
        let mut summaries: Vec<KitSummary> = state
            .kits
            .values()
            .map(|k| KitSummary {
                id: k.id,
                title: k.title.clone(),
                schema_version: k.schema_version,
                property_count: k.content.len(),
                is_global: state.global == Some(k.id),
                updated_at_utc: k.updated_at_utc,
            })
            .collect();
        summaries.sort_by(|a, b| {
            b.updated_at_utc
                .cmp(&a.updated_at_utc)
                .then_with(|| b.id.cmp(&a.id))
        });
        Ok(summaries)
    }

    async fn update_content(
        &self,
        id: Uuid,
        content: KitContent,
        source_document: Option<&DocumentId>,
    ) -> Result<KitUpdateOutcome> {
        let mut state = self.state.write().await;
        let kit = state.kits.get_mut(&id).ok_or(Error::KitNotFound(id))?;
        kit.content = content;
        kit.updated_at_utc = Utc::now();

        if state.global != Some(id) {
            return Ok(KitUpdateOutcome::default());
        }

        let others: Vec<DocumentId> = state
            .bindings
            .values()
            .filter(|b| b.kit_id == Some(id) && Some(&b.document_id) != source_document)
            .map(|b| b.document_id.clone())
            .collect();

        let set = state.stale.entry(id).or_default();
        let mut enqueued: Vec<DocumentId> = others
            .into_iter()
            .filter(|doc| set.insert(doc.clone()))
            .collect();
        if let Some(source) = source_document {
            set.remove(source);
        }
        if set.is_empty() {
            state.stale.remove(&id);
        }
        enqueued.sort();

        debug!(
            subsystem = "db",
            component = "memory",
            op = "update_content",
            kit_id = %id,
            enqueued_count = enqueued.len(),
            "Kit content updated"
        );
        Ok(KitUpdateOutcome {
            was_global: true,
            enqueued,
        })
    }

    async fn replace_migrated(
        &self,
        base: &KitDocument,
        content: KitContent,
        schema_version: i32,
    ) -> Result<bool> {
        let mut state = self.state.write().await;
        let kit = state
            .kits
            .get_mut(&base.id)
            .ok_or(Error::KitNotFound(base.id))?;
        if kit.schema_version != base.schema_version
            || kit.updated_at_utc != base.updated_at_utc
            || kit.content != base.content
        {
            debug!(
                subsystem = "db",
                component = "memory",
                op = "replace_migrated",
                kit_id = %base.id,
                "Kit changed since fetch, upgrade not written"
            );
            return Ok(false);
        }
        kit.content = content;
        kit.schema_version = schema_version;
        Ok(true)
    }

    async fn list_outdated(&self, schema_version: i32) -> Result<Vec<Uuid>> {
        let state = self.state.read().await;
        let mut ids: Vec<Uuid> = state
            .kits
            .values()
            .filter(|k| k.schema_version < schema_version)
            .map(|k| k.id)
            .collect();
        ids.sort();
        Ok(ids)
    }

    async fn delete(&self, id: Uuid) -> Result<KitDeletion> {
        let mut state = self.state.write().await;
        if state.kits.remove(&id).is_none() {
            return Err(Error::KitNotFound(id));
        }

        let now = Utc::now();
        let mut unbound_documents: Vec<DocumentId> = state
            .bindings
            .values_mut()
            .filter(|b| b.kit_id == Some(id))
            .map(|b| {
                b.kit_id = None;
                b.updated_at_utc = now;
                b.document_id.clone()
            })
            .collect();
        unbound_documents.sort();

        state.stale.remove(&id);
        let was_global = state.global == Some(id);
        if was_global {
            state.global = None;
        }

        Ok(KitDeletion {
            kit_id: id,
            was_global,
            unbound_documents,
        })
    }
}

#[async_trait]
impl GlobalKitRepository for MemoryStore {
    async fn get_global(&self) -> Result<Option<Uuid>> {
        Ok(self.state.read().await.global)
    }

    async fn set_global(&self, kit_id: Option<Uuid>) -> Result<Option<Uuid>> {
        let mut state = self.state.write().await;
        if let Some(id) = kit_id {
            if !state.kits.contains_key(&id) {
                return Err(State::missing_global(id));
            }
        }
        Ok(std::mem::replace(&mut state.global, kit_id))
    }

    async fn swap_global(&self, expected: Option<Uuid>, new: Option<Uuid>) -> Result<bool> {
        let mut state = self.state.write().await;
        if state.global != expected {
            return Ok(false);
        }
        if let Some(id) = new {
            if !state.kits.contains_key(&id) {
                return Err(State::missing_global(id));
            }
        }
        state.global = new;
        Ok(true)
    }
}

#[async_trait]
impl BindingRepository for MemoryStore {
    async fn get_binding(&self, document_id: &DocumentId) -> Result<Option<DocumentBinding>> {
        Ok(self.state.read().await.bindings.get(document_id).cloned())
    }

    async fn bind(&self, document_id: &DocumentId, kit_id: Uuid) -> Result<DocumentBinding> {
        let mut state = self.state.write().await;
        if !state.kits.contains_key(&kit_id) {
            return Err(Error::KitNotFound(kit_id));
        }
        let binding = DocumentBinding {
            document_id: document_id.clone(),
            kit_id: Some(kit_id),
            recently_imported: false,
            updated_at_utc: Utc::now(),
        };
        state.bindings.insert(document_id.clone(), binding.clone());
        state.remove_from_all_stale(document_id);
        Ok(binding)
    }

    async fn clear_binding(&self, document_id: &DocumentId) -> Result<bool> {
        let mut state = self.state.write().await;
        let had_kit = match state.bindings.get_mut(document_id) {
            Some(binding) if binding.kit_id.is_some() => {
                binding.kit_id = None;
                binding.updated_at_utc = Utc::now();
                true
            }
            _ => false,
        };
        state.remove_from_all_stale(document_id);
        Ok(had_kit)
    }

    async fn mark_recently_imported(&self, document_id: &DocumentId) -> Result<()> {
        let mut state = self.state.write().await;
        let now = Utc::now();
        state
            .bindings
            .entry(document_id.clone())
            .and_modify(|b| {
                b.recently_imported = true;
                b.updated_at_utc = now;
            })
            .or_insert_with(|| DocumentBinding {
                document_id: document_id.clone(),
                kit_id: None,
                recently_imported: true,
                updated_at_utc: now,
            });
        Ok(())
    }

    async fn list_bound(&self, kit_id: Uuid) -> Result<Vec<DocumentId>> {
        let state = self.state.read().await;
        let mut ids: Vec<DocumentId> = state
            .bindings
            .values()
            .filter(|b| b.kit_id == Some(kit_id))
            .map(|b| b.document_id.clone())
            .collect();
        ids.sort();
        Ok(ids)
    }
}

#[async_trait]
impl StaleQueueRepository for MemoryStore {
    async fn is_stale(&self, document_id: &DocumentId) -> Result<bool> {
        let state = self.state.read().await;
        Ok(state
            .global
            .and_then(|global| state.stale.get(&global))
            .map(|set| set.contains(document_id))
            .unwrap_or(false))
    }

    async fn stale_documents(&self, kit_id: Uuid) -> Result<Vec<DocumentId>> {
        let state = self.state.read().await;
        Ok(state
            .stale
            .get(&kit_id)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default())
    }

    async fn remove_stale(&self, document_id: &DocumentId) -> Result<bool> {
        Ok(self.state.write().await.remove_from_all_stale(document_id))
    }
}

#[async_trait]
impl CatalogCacheRepository for MemoryStore {
    async fn load_catalog(&self) -> Result<Option<CatalogCacheEntry>> {
        Ok(self.state.read().await.catalog.clone())
    }

    async fn store_catalog(&self, entry: &CatalogCacheEntry) -> Result<()> {
        self.state.write().await.catalog = Some(entry.clone());
        Ok(())
    }
}

#[async_trait]
impl ImportLogRepository for MemoryStore {
    async fn record_import(&self, req: NewImportRecord) -> Result<ImportRecord> {
        let record = ImportRecord {
            id: Uuid::now_v7(),
            template_id: req.template_id,
            document_id: req.document_id,
            method: req.method,
            imported_at: Utc::now(),
        };
        self.state.write().await.imports.push(record.clone());
        Ok(record)
    }

    async fn list_imports(&self, limit: i64) -> Result<Vec<ImportRecord>> {
        let state = self.state.read().await;
        Ok(state
            .imports
            .iter()
            .rev()
            .take(limit.max(0) as usize)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kitsync_core::{PropertyValue, CURRENT_SCHEMA_VERSION};

    fn content(pairs: &[(&str, &str)]) -> KitContent {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), PropertyValue::from(*v)))
            .collect()
    }

    async fn kit(store: &MemoryStore, title: &str) -> Uuid {
        store
            .create(CreateKitRequest {
                title: title.to_string(),
                content: content(&[("ang_color", "red")]),
                schema_version: CURRENT_SCHEMA_VERSION,
            })
            .await
            .unwrap()
            .id
    }

    #[tokio::test]
    async fn test_update_global_enqueues_other_documents() {
        let store = MemoryStore::new();
        let k = kit(&store, "Global").await;
        store.set_global(Some(k)).await.unwrap();
        for doc in ["1", "2", "3"] {
            store.bind(&DocumentId::from(doc), k).await.unwrap();
        }

        let outcome = store
            .update_content(k, content(&[("ang_color", "blue")]), Some(&"1".into()))
            .await
            .unwrap();

        assert!(outcome.was_global);
        assert_eq!(outcome.enqueued, vec![DocumentId::from("2"), DocumentId::from("3")]);
        assert!(!store.is_stale(&"1".into()).await.unwrap());
        assert!(store.is_stale(&"2".into()).await.unwrap());
    }

    #[tokio::test]
    async fn test_update_non_global_does_not_enqueue() {
        let store = MemoryStore::new();
        let k = kit(&store, "Local").await;
        store.bind(&"1".into(), k).await.unwrap();
        store.bind(&"2".into(), k).await.unwrap();

        let outcome = store
            .update_content(k, content(&[("ang_color", "blue")]), None)
            .await
            .unwrap();
        assert!(!outcome.was_global);
        assert!(store.stale_documents(k).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_replace_migrated_refuses_after_concurrent_update() {
        let store = MemoryStore::new();
        let k = kit(&store, "Legacy").await;
        let base = store.fetch(k).await.unwrap();

        store
            .update_content(k, content(&[("ang_color", "blue")]), None)
            .await
            .unwrap();
        let written = store
            .replace_migrated(&base, content(&[("ang_color", "upgraded")]), 2)
            .await
            .unwrap();
        assert!(!written);
        let stored = store.fetch(k).await.unwrap();
        assert_eq!(stored.content, content(&[("ang_color", "blue")]));
        assert_eq!(stored.schema_version, CURRENT_SCHEMA_VERSION);

        let written = store
            .replace_migrated(&stored, content(&[("ang_color", "upgraded")]), 2)
            .await
            .unwrap();
        assert!(written);
        assert_eq!(
            store.fetch(k).await.unwrap().content,
            content(&[("ang_color", "upgraded")])
        );
    }

    #[tokio::test]
    async fn test_reenqueue_has_no_duplicates() {
        let store = MemoryStore::new();
        let k = kit(&store, "Global").await;
        store.set_global(Some(k)).await.unwrap();
        store.bind(&"2".into(), k).await.unwrap();

        store.update_content(k, KitContent::new(), None).await.unwrap();
        let second = store.update_content(k, KitContent::new(), None).await.unwrap();
        assert!(second.enqueued.is_empty());
        assert_eq!(store.stale_documents(k).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_bind_removes_from_stale_sets() {
        let store = MemoryStore::new();
        let k = kit(&store, "Global").await;
        store.set_global(Some(k)).await.unwrap();
        store.bind(&"2".into(), k).await.unwrap();
        store.update_content(k, KitContent::new(), None).await.unwrap();
        assert!(store.is_stale(&"2".into()).await.unwrap());

        store.bind(&"2".into(), k).await.unwrap();
        assert!(!store.is_stale(&"2".into()).await.unwrap());
    }

    #[tokio::test]
    async fn test_delete_global_clears_pointer_and_bindings() {
        let store = MemoryStore::new();
        let k = kit(&store, "Global").await;
        store.set_global(Some(k)).await.unwrap();
        store.bind(&"1".into(), k).await.unwrap();
        store.bind(&"2".into(), k).await.unwrap();
        store.update_content(k, KitContent::new(), Some(&"1".into())).await.unwrap();

        let deletion = store.delete(k).await.unwrap();
        assert!(deletion.was_global);
        assert_eq!(deletion.unbound_documents.len(), 2);
        assert_eq!(store.get_global().await.unwrap(), None);
        let binding = store.get_binding(&"1".into()).await.unwrap().unwrap();
        assert_eq!(binding.kit_id, None);
        assert!(store.stale_documents(k).await.unwrap().is_empty());
        assert!(matches!(store.fetch(k).await, Err(Error::KitNotFound(_))));
    }

    #[tokio::test]
    async fn test_set_global_rejects_missing_kit() {
        let store = MemoryStore::new();
        let result = store.set_global(Some(Uuid::now_v7())).await;
        assert!(matches!(result, Err(Error::Validation(_))));
    }

    #[tokio::test]
    async fn test_swap_global_compares() {
        let store = MemoryStore::new();
        let a = kit(&store, "A").await;
        let b = kit(&store, "B").await;
        assert!(store.swap_global(None, Some(a)).await.unwrap());
        assert!(!store.swap_global(None, Some(b)).await.unwrap());
        assert_eq!(store.get_global().await.unwrap(), Some(a));
        assert!(store.swap_global(Some(a), Some(b)).await.unwrap());
        assert_eq!(store.get_global().await.unwrap(), Some(b));
    }

    #[tokio::test]
    async fn test_clear_binding_is_idempotent() {
        let store = MemoryStore::new();
        let k = kit(&store, "A").await;
        store.bind(&"9".into(), k).await.unwrap();
        assert!(store.clear_binding(&"9".into()).await.unwrap());
        assert!(!store.clear_binding(&"9".into()).await.unwrap());
        assert!(!store.clear_binding(&"never".into()).await.unwrap());
    }

    #[tokio::test]
    async fn test_list_flags_global() {
        let store = MemoryStore::new();
        let a = kit(&store, "A").await;
        let _b = kit(&store, "B").await;
        store.set_global(Some(a)).await.unwrap();
        let summaries = store.list().await.unwrap();
        assert_eq!(summaries.len(), 2);
        assert_eq!(summaries.iter().filter(|s| s.is_global).count(), 1);
        assert!(summaries.iter().any(|s| s.id == a && s.is_global));
    }

    #[tokio::test]
    async fn test_import_log_newest_first() {
        let store = MemoryStore::new();
        for template_id in [1, 2, 3] {
            store
                .record_import(NewImportRecord {
                    template_id,
                    document_id: "10".into(),
                    method: "page".to_string(),
                })
                .await
                .unwrap();
        }
        let records = store.list_imports(2).await.unwrap();
        let ids: Vec<_> = records.iter().map(|r| r.template_id).collect();
        assert_eq!(ids, vec![3, 2]);
    }
}
