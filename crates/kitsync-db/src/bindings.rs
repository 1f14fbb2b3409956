//! Document binding and stale queue repository implementation.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::postgres::PgRow;
use sqlx::{Pool, Postgres, Row};
use tracing::debug;
use uuid::Uuid;

use kitsync_core::{
    BindingRepository, DocumentBinding, DocumentId, Error, Result, StaleQueueRepository,
};

/// PostgreSQL implementation of BindingRepository and StaleQueueRepository.
#[derive(Clone)]
pub struct PgBindingRepository {
    pool: Pool<Postgres>,
}

impl PgBindingRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

fn binding_from_row(r: PgRow) -> DocumentBinding {
    DocumentBinding {
        document_id: DocumentId::from(r.get::<String, _>("document_id")),
        kit_id: r.get("kit_id"),
        recently_imported: r.get("recently_imported"),
        updated_at_utc: r.get("updated_at_utc"),
    }
}

fn ids_from_rows(rows: Vec<PgRow>) -> Vec<DocumentId> {
    rows.into_iter()
        .map(|r| DocumentId::from(r.get::<String, _>("document_id")))
        .collect()
}

#[async_trait]
impl BindingRepository for PgBindingRepository {
    async fn get_binding(&self, document_id: &DocumentId) -> Result<Option<DocumentBinding>> {
        let row = sqlx::query(
            r#"
            SELECT document_id, kit_id, recently_imported, updated_at_utc
            FROM document_binding
            WHERE document_id = $1
            "#,
        )
        .bind(document_id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(row.map(binding_from_row))
    }

    async fn bind(&self, document_id: &DocumentId, kit_id: Uuid) -> Result<DocumentBinding> {
        let mut tx = self.pool.begin().await.map_err(Error::Database)?;

        let kit = sqlx::query("SELECT id FROM kit WHERE id = $1 FOR SHARE")
            .bind(kit_id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(Error::Database)?;
        if kit.is_none() {
            return Err(Error::KitNotFound(kit_id));
        }

        let row = sqlx::query(
            r#"
            INSERT INTO document_binding (document_id, kit_id, recently_imported, updated_at_utc)
            VALUES ($1, $2, FALSE, $3)
            ON CONFLICT (document_id) DO UPDATE
                SET kit_id = EXCLUDED.kit_id,
                    recently_imported = FALSE,
                    updated_at_utc = EXCLUDED.updated_at_utc
            RETURNING document_id, kit_id, recently_imported, updated_at_utc
            "#,
        )
        .bind(document_id.as_str())
        .bind(kit_id)
        .bind(Utc::now())
        .fetch_one(&mut *tx)
        .await
        .map_err(Error::Database)?;

        sqlx::query("DELETE FROM kit_stale WHERE document_id = $1")
            .bind(document_id.as_str())
            .execute(&mut *tx)
            .await
            .map_err(Error::Database)?;

        tx.commit().await.map_err(Error::Database)?;
        debug!(
            subsystem = "db",
            component = "bindings",
            op = "bind",
            document_id = %document_id,
            kit_id = %kit_id,
            "Document bound"
        );
        Ok(binding_from_row(row))
    }

    async fn clear_binding(&self, document_id: &DocumentId) -> Result<bool> {
        let mut tx = self.pool.begin().await.map_err(Error::Database)?;

        let result = sqlx::query(
            r#"
            UPDATE document_binding
            SET kit_id = NULL, updated_at_utc = $2
            WHERE document_id = $1 AND kit_id IS NOT NULL
            "#,
        )
        .bind(document_id.as_str())
        .bind(Utc::now())
        .execute(&mut *tx)
        .await
        .map_err(Error::Database)?;

        sqlx::query("DELETE FROM kit_stale WHERE document_id = $1")
            .bind(document_id.as_str())
            .execute(&mut *tx)
            .await
            .map_err(Error::Database)?;

        tx.commit().await.map_err(Error::Database)?;
        Ok(result.rows_affected() > 0)
    }

    async fn mark_recently_imported(&self, document_id: &DocumentId) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO document_binding (document_id, kit_id, recently_imported, updated_at_utc)
            VALUES ($1, NULL, TRUE, $2)
            ON CONFLICT (document_id) DO UPDATE
                SET recently_imported = TRUE, updated_at_utc = EXCLUDED.updated_at_utc
            "#,
        )
        .bind(document_id.as_str())
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(())
    }

    async fn list_bound(&self, kit_id: Uuid) -> Result<Vec<DocumentId>> {
        let rows = sqlx::query(
            "SELECT document_id FROM document_binding WHERE kit_id = $1 ORDER BY document_id",
        )
        .bind(kit_id)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(ids_from_rows(rows))
    }
}

#[async_trait]
impl StaleQueueRepository for PgBindingRepository {
    async fn is_stale(&self, document_id: &DocumentId) -> Result<bool> {
        let row = sqlx::query(
            r#"
            SELECT EXISTS (
                SELECT 1
                FROM kit_stale s
                JOIN global_kit g ON g.kit_id = s.kit_id
                WHERE s.document_id = $1
            ) AS stale
            "#,
        )
        .bind(document_id.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(row.get("stale"))
    }

    async fn stale_documents(&self, kit_id: Uuid) -> Result<Vec<DocumentId>> {
        let rows =
            sqlx::query("SELECT document_id FROM kit_stale WHERE kit_id = $1 ORDER BY document_id")
                .bind(kit_id)
                .fetch_all(&self.pool)
                .await
                .map_err(Error::Database)?;
        Ok(ids_from_rows(rows))
    }

    async fn remove_stale(&self, document_id: &DocumentId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM kit_stale WHERE document_id = $1")
            .bind(document_id.as_str())
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(result.rows_affected() > 0)
    }
}
