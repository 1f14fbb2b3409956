//! # kitsync-db
//!
//! Storage backends for kitsync.
//!
//! This crate provides:
//! - Connection pool management
//! - PostgreSQL repositories for kits, the global kit pointer, document
//!   bindings, the stale queue, the catalog snapshot and import history
//! - [`MemoryStore`], an in-process store implementing the same traits
//!
//! ## Example
//!
//! ```rust,ignore
//! use kitsync_db::{Database, PoolConfig};
//! use kitsync_core::KitRepository;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let db = Database::connect("postgres://localhost/kitsync", &PoolConfig::default()).await?;
//!     for kit in db.list().await? {
//!         println!("{} {}", kit.id, kit.title);
//!     }
//!     Ok(())
//! }
//! ```

pub mod bindings;
pub mod catalog_cache;
pub mod imports;
pub mod kits;
pub mod memory;
pub mod pool;

// Always compiled so integration tests (in tests/) can use DEFAULT_TEST_DATABASE_URL
pub mod test_fixtures;

use async_trait::async_trait;
use uuid::Uuid;

pub use bindings::PgBindingRepository;
pub use catalog_cache::PgCatalogCacheRepository;
pub use imports::PgImportLogRepository;
pub use kits::PgKitRepository;
pub use memory::MemoryStore;
pub use pool::{open_pool, PoolConfig};

pub use kitsync_core::{
    BindingRepository, CatalogCacheRepository, GlobalKitRepository, ImportLogRepository,
    KitRepository, KitStore, StaleQueueRepository,
};

use kitsync_core::{
    CatalogCacheEntry, CreateKitRequest, DocumentBinding, DocumentId, ImportRecord, KitContent,
    KitDeletion, KitDocument, KitSummary, KitUpdateOutcome, NewImportRecord, Result,
};

/// Combined database context with all repositories.
#[derive(Clone)]
pub struct Database {
    /// The underlying connection pool.
    pub pool: sqlx::Pool<sqlx::Postgres>,
    /// Kits and the global kit pointer.
    pub kits: PgKitRepository,
    /// Document bindings and stale sets.
    pub bindings: PgBindingRepository,
    /// Remote catalog snapshot.
    pub catalog: PgCatalogCacheRepository,
    /// Template import history.
    pub imports: PgImportLogRepository,
}

impl Database {
    /// Create a new Database instance from a connection pool.
    pub fn new(pool: sqlx::Pool<sqlx::Postgres>) -> Self {
        Self {
            kits: PgKitRepository::new(pool.clone()),
            bindings: PgBindingRepository::new(pool.clone()),
            catalog: PgCatalogCacheRepository::new(pool.clone()),
            imports: PgImportLogRepository::new(pool.clone()),
            pool,
        }
    }

    /// Connect to `url` with the given pool settings.
    pub async fn connect(url: &str, config: &PoolConfig) -> Result<Self> {
        let pool = open_pool(url, config).await?;
        Ok(Self::new(pool))
    }

    /// Run pending migrations.
    #[cfg(feature = "migrations")]
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("../../migrations")
            .run(&self.pool)
            .await
            .map_err(|e| kitsync_core::Error::Database(sqlx::Error::Migrate(Box::new(e))))?;
        Ok(())
    }

    /// Get the underlying connection pool.
    pub fn pool(&self) -> &sqlx::Pool<sqlx::Postgres> {
        &self.pool
    }
}

// The service layer works against `dyn KitStore`; forward each trait to the
// repository that owns the tables.

#[async_trait]
impl KitRepository for Database {
    async fn create(&self, req: CreateKitRequest) -> Result<KitDocument> {
        self.kits.create(req).await
    }

    async fn fetch(&self, id: Uuid) -> Result<KitDocument> {
        self.kits.fetch(id).await
    }

    async fn list(&self) -> Result<Vec<KitSummary>> {
        self.kits.list().await
    }

    async fn update_content(
        &self,
        id: Uuid,
        content: KitContent,
        source_document: Option<&DocumentId>,
    ) -> Result<KitUpdateOutcome> {
        self.kits.update_content(id, content, source_document).await
    }

    async fn replace_migrated(
        &self,
        base: &KitDocument,
        content: KitContent,
        schema_version: i32,
    ) -> Result<bool> {
        self.kits
            .replace_migrated(base, content, schema_version)
            .await
    }

    async fn list_outdated(&self, schema_version: i32) -> Result<Vec<Uuid>> {
        self.kits.list_outdated(schema_version).await
    }

    async fn delete(&self, id: Uuid) -> Result<KitDeletion> {
        self.kits.delete(id).await
    }
}

#[async_trait]
impl GlobalKitRepository for Database {
    async fn get_global(&self) -> Result<Option<Uuid>> {
        self.kits.get_global().await
    }

    async fn set_global(&self, kit_id: Option<Uuid>) -> Result<Option<Uuid>> {
        self.kits.set_global(kit_id).await
    }

    async fn swap_global(&self, expected: Option<Uuid>, new: Option<Uuid>) -> Result<bool> {
        self.kits.swap_global(expected, new).await
    }
}

#[async_trait]
impl BindingRepository for Database {
    async fn get_binding(&self, document_id: &DocumentId) -> Result<Option<DocumentBinding>> {
        self.bindings.get_binding(document_id).await
    }

    async fn bind(&self, document_id: &DocumentId, kit_id: Uuid) -> Result<DocumentBinding> {
        self.bindings.bind(document_id, kit_id).await
    }

    async fn clear_binding(&self, document_id: &DocumentId) -> Result<bool> {
        self.bindings.clear_binding(document_id).await
    }

    async fn mark_recently_imported(&self, document_id: &DocumentId) -> Result<()> {
        self.bindings.mark_recently_imported(document_id).await
    }

    async fn list_bound(&self, kit_id: Uuid) -> Result<Vec<DocumentId>> {
        self.bindings.list_bound(kit_id).await
    }
}

#[async_trait]
impl StaleQueueRepository for Database {
    async fn is_stale(&self, document_id: &DocumentId) -> Result<bool> {
        self.bindings.is_stale(document_id).await
    }

    async fn stale_documents(&self, kit_id: Uuid) -> Result<Vec<DocumentId>> {
        self.bindings.stale_documents(kit_id).await
    }

    async fn remove_stale(&self, document_id: &DocumentId) -> Result<bool> {
        self.bindings.remove_stale(document_id).await
    }
}

#[async_trait]
impl CatalogCacheRepository for Database {
    async fn load_catalog(&self) -> Result<Option<CatalogCacheEntry>> {
        self.catalog.load_catalog().await
    }

    async fn store_catalog(&self, entry: &CatalogCacheEntry) -> Result<()> {
        self.catalog.store_catalog(entry).await
    }
}

#[async_trait]
impl ImportLogRepository for Database {
    async fn record_import(&self, req: NewImportRecord) -> Result<ImportRecord> {
        self.imports.record_import(req).await
    }

    async fn list_imports(&self, limit: i64) -> Result<Vec<ImportRecord>> {
        self.imports.list_imports(limit).await
    }
}
