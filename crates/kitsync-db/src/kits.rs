//! Kit and global kit repository implementation.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::postgres::PgRow;
use sqlx::types::Json;
use sqlx::{Pool, Postgres, Row, Transaction};
use tracing::{debug, info};
use uuid::Uuid;

use kitsync_core::{
    CreateKitRequest, DocumentId, Error, GlobalKitRepository, KitContent, KitDeletion,
    KitDocument, KitRepository, KitSummary, KitUpdateOutcome, Result,
};

/// PostgreSQL implementation of KitRepository and GlobalKitRepository.
#[derive(Clone)]
pub struct PgKitRepository {
    pool: Pool<Postgres>,
}

impl PgKitRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Lock the global pointer row for the rest of the transaction.
    async fn lock_global(tx: &mut Transaction<'_, Postgres>) -> Result<Option<Uuid>> {
        let row = sqlx::query("SELECT kit_id FROM global_kit WHERE singleton FOR UPDATE")
            .fetch_optional(&mut **tx)
            .await
            .map_err(Error::Database)?;
        Ok(row.and_then(|r| r.get::<Option<Uuid>, _>("kit_id")))
    }

    async fn write_global(tx: &mut Transaction<'_, Postgres>, kit_id: Option<Uuid>) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO global_kit (singleton, kit_id, updated_at_utc)
            VALUES (TRUE, $1, $2)
            ON CONFLICT (singleton) DO UPDATE
                SET kit_id = EXCLUDED.kit_id, updated_at_utc = EXCLUDED.updated_at_utc
            "#,
        )
        .bind(kit_id)
        .bind(Utc::now())
        .execute(&mut **tx)
        .await
        .map_err(Error::Database)?;
        Ok(())
    }

    async fn ensure_exists(tx: &mut Transaction<'_, Postgres>, kit_id: Uuid) -> Result<bool> {
        let row = sqlx::query("SELECT id FROM kit WHERE id = $1 FOR SHARE")
            .bind(kit_id)
            .fetch_optional(&mut **tx)
            .await
            .map_err(Error::Database)?;
        Ok(row.is_some())
    }
}

fn kit_from_row(r: PgRow) -> KitDocument {
    KitDocument {
        id: r.get("id"),
        title: r.get("title"),
        content: r.get::<Json<KitContent>, _>("content").0,
        schema_version: r.get("schema_version"),
        created_at_utc: r.get("created_at_utc"),
        updated_at_utc: r.get("updated_at_utc"),
    }
}

#[async_trait]
impl KitRepository for PgKitRepository {
    async fn create(&self, req: CreateKitRequest) -> Result<KitDocument> {
        let id = Uuid::now_v7();
        let now = Utc::now();

        let row = sqlx::query(
            r#"
            INSERT INTO kit (id, title, content, schema_version, created_at_utc, updated_at_utc)
            VALUES ($1, $2, $3, $4, $5, $5)
            RETURNING id, title, content, schema_version, created_at_utc, updated_at_utc
            "#,
        )
        .bind(id)
        .bind(&req.title)
        .bind(Json(&req.content))
        .bind(req.schema_version)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(Error::Database)?;

        info!(subsystem = "db", component = "kits", op = "create", kit_id = %id, "Kit created");
        Ok(kit_from_row(row))
    }

    async fn fetch(&self, id: Uuid) -> Result<KitDocument> {
        let row = sqlx::query(
            r#"
            SELECT id, title, content, schema_version, created_at_utc, updated_at_utc
            FROM kit
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        row.map(kit_from_row).ok_or(Error::KitNotFound(id))
    }

    async fn list(&self) -> Result<Vec<KitSummary>> {
        let rows = sqlx::query(
            r#"
            SELECT k.id, k.title, k.schema_version, k.updated_at_utc,
                   (SELECT COUNT(*) FROM jsonb_object_keys(k.content)) AS property_count,
                   (g.kit_id IS NOT NULL) AS is_global
            FROM kit k
            LEFT JOIN global_kit g ON g.kit_id = k.id
            ORDER BY k.updated_at_utc DESC, k.id DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(rows
            .into_iter()
            .map(|r| KitSummary {
                id: r.get("id"),
                title: r.get("title"),
                schema_version: r.get("schema_version"),
                property_count: r.get::<i64, _>("property_count") as usize,
                is_global: r.get("is_global"),
                updated_at_utc: r.get("updated_at_utc"),
            })
            .collect())
    }

    async fn update_content(
        &self,
        id: Uuid,
        content: KitContent,
        source_document: Option<&DocumentId>,
    ) -> Result<KitUpdateOutcome> {
        let mut tx = self.pool.begin().await.map_err(Error::Database)?;
        let global = Self::lock_global(&mut tx).await?;

        let updated = sqlx::query(
            "UPDATE kit SET content = $2, updated_at_utc = $3 WHERE id = $1 RETURNING id",
        )
        .bind(id)
        .bind(Json(&content))
        .bind(Utc::now())
        .fetch_optional(&mut *tx)
        .await
        .map_err(Error::Database)?;
        if updated.is_none() {
            return Err(Error::KitNotFound(id));
        }

        let source = source_document.map(|d| d.as_str());
        let mut outcome = KitUpdateOutcome::default();
        if global == Some(id) {
            let rows = sqlx::query(
                r#"
                INSERT INTO kit_stale (kit_id, document_id)
                SELECT $1, document_id
                FROM document_binding
                WHERE kit_id = $1 AND ($2::text IS NULL OR document_id <> $2)
                ON CONFLICT (kit_id, document_id) DO NOTHING
                RETURNING document_id
                "#,
            )
            .bind(id)
            .bind(source)
            .fetch_all(&mut *tx)
            .await
            .map_err(Error::Database)?;

            if let Some(source) = source {
                sqlx::query("DELETE FROM kit_stale WHERE kit_id = $1 AND document_id = $2")
                    .bind(id)
                    .bind(source)
                    .execute(&mut *tx)
                    .await
                    .map_err(Error::Database)?;
            }

            let mut enqueued: Vec<DocumentId> = rows
                .into_iter()
                .map(|r| DocumentId::from(r.get::<String, _>("document_id")))
                .collect();
            enqueued.sort();
            outcome = KitUpdateOutcome {
                was_global: true,
                enqueued,
            };
        }

        tx.commit().await.map_err(Error::Database)?;
        debug!(
            subsystem = "db",
            component = "kits",
            op = "update_content",
            kit_id = %id,
            was_global = outcome.was_global,
            enqueued_count = outcome.enqueued.len(),
            "Kit content updated"
        );
        Ok(outcome)
    }

    async fn replace_migrated(
        &self,
        base: &KitDocument,
        content: KitContent,
        schema_version: i32,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE kit SET content = $2, schema_version = $3
            WHERE id = $1
              AND schema_version = $4
              AND updated_at_utc = $5
              AND content = $6
            "#,
        )
        .bind(base.id)
        .bind(Json(&content))
        .bind(schema_version)
        .bind(base.schema_version)
        .bind(base.updated_at_utc)
        .bind(Json(&base.content))
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;
        if result.rows_affected() == 1 {
            return Ok(true);
        }

        let exists = sqlx::query("SELECT id FROM kit WHERE id = $1")
            .bind(base.id)
            .fetch_optional(&self.pool)
            .await
            .map_err(Error::Database)?;
        if exists.is_none() {
            return Err(Error::KitNotFound(base.id));
        }
        debug!(
            subsystem = "db",
            component = "kits",
            op = "replace_migrated",
            kit_id = %base.id,
            "Kit changed since fetch, upgrade not written"
        );
        Ok(false)
    }

    async fn list_outdated(&self, schema_version: i32) -> Result<Vec<Uuid>> {
        let rows = sqlx::query("SELECT id FROM kit WHERE schema_version < $1 ORDER BY id")
            .bind(schema_version)
            .fetch_all(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(rows.into_iter().map(|r| r.get("id")).collect())
    }

    async fn delete(&self, id: Uuid) -> Result<KitDeletion> {
        let mut tx = self.pool.begin().await.map_err(Error::Database)?;
        let global = Self::lock_global(&mut tx).await?;

        let exists = sqlx::query("SELECT id FROM kit WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(Error::Database)?;
        if exists.is_none() {
            return Err(Error::KitNotFound(id));
        }

        let unbound = sqlx::query(
            r#"
            UPDATE document_binding
            SET kit_id = NULL, updated_at_utc = $2
            WHERE kit_id = $1
            RETURNING document_id
            "#,
        )
        .bind(id)
        .bind(Utc::now())
        .fetch_all(&mut *tx)
        .await
        .map_err(Error::Database)?;

        sqlx::query("DELETE FROM kit_stale WHERE kit_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(Error::Database)?;

        let was_global = global == Some(id);
        if was_global {
            Self::write_global(&mut tx, None).await?;
        }

        sqlx::query("DELETE FROM kit WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(Error::Database)?;

        tx.commit().await.map_err(Error::Database)?;

        let mut unbound_documents: Vec<DocumentId> = unbound
            .into_iter()
            .map(|r| DocumentId::from(r.get::<String, _>("document_id")))
            .collect();
        unbound_documents.sort();

        info!(
            subsystem = "db",
            component = "kits",
            op = "delete",
            kit_id = %id,
            was_global,
            unbound = unbound_documents.len(),
            "Kit deleted"
        );
        Ok(KitDeletion {
            kit_id: id,
            was_global,
            unbound_documents,
        })
    }
}

#[async_trait]
impl GlobalKitRepository for PgKitRepository {
    async fn get_global(&self) -> Result<Option<Uuid>> {
        let row = sqlx::query("SELECT kit_id FROM global_kit WHERE singleton")
            .fetch_optional(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(row.and_then(|r| r.get::<Option<Uuid>, _>("kit_id")))
    }

    async fn set_global(&self, kit_id: Option<Uuid>) -> Result<Option<Uuid>> {
        let mut tx = self.pool.begin().await.map_err(Error::Database)?;
        let previous = Self::lock_global(&mut tx).await?;

        if let Some(id) = kit_id {
            if !Self::ensure_exists(&mut tx, id).await? {
                return Err(Error::Validation(format!(
                    "cannot make {} the global kit: it does not exist",
                    id
                )));
            }
        }

        Self::write_global(&mut tx, kit_id).await?;
        tx.commit().await.map_err(Error::Database)?;
        Ok(previous)
    }

    async fn swap_global(&self, expected: Option<Uuid>, new: Option<Uuid>) -> Result<bool> {
        let mut tx = self.pool.begin().await.map_err(Error::Database)?;
        let current = Self::lock_global(&mut tx).await?;
        if current != expected {
            return Ok(false);
        }

        if let Some(id) = new {
            if !Self::ensure_exists(&mut tx, id).await? {
                return Err(Error::Validation(format!(
                    "cannot make {} the global kit: it does not exist",
                    id
                )));
            }
        }

        Self::write_global(&mut tx, new).await?;
        tx.commit().await.map_err(Error::Database)?;
        Ok(true)
    }
}
