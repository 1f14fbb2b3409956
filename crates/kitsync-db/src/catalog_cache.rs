//! Persisted remote catalog snapshot.

use async_trait::async_trait;
use sqlx::types::Json;
use sqlx::{Pool, Postgres, Row};

use kitsync_core::{CatalogCacheEntry, CatalogCacheRepository, Error, Result, TemplateSummary};

/// PostgreSQL implementation of CatalogCacheRepository.
#[derive(Clone)]
pub struct PgCatalogCacheRepository {
    pool: Pool<Postgres>,
}

impl PgCatalogCacheRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CatalogCacheRepository for PgCatalogCacheRepository {
    async fn load_catalog(&self) -> Result<Option<CatalogCacheEntry>> {
        let row = sqlx::query(
            "SELECT templates, template_count, fetched_at FROM catalog_cache WHERE singleton",
        )
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(row.map(|r| CatalogCacheEntry {
            templates: r.get::<Json<Vec<TemplateSummary>>, _>("templates").0,
            count: r.get::<i32, _>("template_count") as usize,
            fetched_at: r.get("fetched_at"),
        }))
    }

    async fn store_catalog(&self, entry: &CatalogCacheEntry) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO catalog_cache (singleton, templates, template_count, fetched_at)
            VALUES (TRUE, $1, $2, $3)
            ON CONFLICT (singleton) DO UPDATE
                SET templates = EXCLUDED.templates,
                    template_count = EXCLUDED.template_count,
                    fetched_at = EXCLUDED.fetched_at
            "#,
        )
        .bind(Json(&entry.templates))
        .bind(entry.count as i32)
        .bind(entry.fetched_at)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(())
    }
}
