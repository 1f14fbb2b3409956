//! Template import history.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Pool, Postgres, Row};
use uuid::Uuid;

use kitsync_core::{DocumentId, Error, ImportLogRepository, ImportRecord, NewImportRecord, Result};

/// PostgreSQL implementation of ImportLogRepository.
#[derive(Clone)]
pub struct PgImportLogRepository {
    pool: Pool<Postgres>,
}

impl PgImportLogRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ImportLogRepository for PgImportLogRepository {
    async fn record_import(&self, req: NewImportRecord) -> Result<ImportRecord> {
        let record = ImportRecord {
            id: Uuid::now_v7(),
            template_id: req.template_id,
            document_id: req.document_id,
            method: req.method,
            imported_at: Utc::now(),
        };

        sqlx::query(
            r#"
            INSERT INTO template_import (id, template_id, document_id, method, imported_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(record.id)
        .bind(record.template_id)
        .bind(record.document_id.as_str())
        .bind(&record.method)
        .bind(record.imported_at)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(record)
    }

    async fn list_imports(&self, limit: i64) -> Result<Vec<ImportRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT id, template_id, document_id, method, imported_at
            FROM template_import
            ORDER BY imported_at DESC, id DESC
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(rows
            .into_iter()
            .map(|r| ImportRecord {
                id: r.get("id"),
                template_id: r.get("template_id"),
                document_id: DocumentId::from(r.get::<String, _>("document_id")),
                method: r.get("method"),
                imported_at: r.get("imported_at"),
            })
            .collect())
    }
}
