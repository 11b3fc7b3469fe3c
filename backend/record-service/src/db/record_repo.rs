use crate::error::{AppError, Result};
use crate::models::{Record, Visibility};
use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

/// Durable record storage.
///
/// Every operation treats soft-deleted rows as absent unless the caller asks
/// for `Visibility::IncludeDeleted`. Failures are returned as-is; nothing here
/// retries.
#[async_trait]
pub trait RecordRepository: Send + Sync {
    async fn create(&self, content: &str) -> Result<Record>;

    async fn get(&self, id: Uuid, visibility: Visibility) -> Result<Record>;

    async fn update(&self, id: Uuid, content: &str) -> Result<Record>;

    /// Soft delete: sets `deleted_at`, keeps the row
    async fn delete(&self, id: Uuid) -> Result<()>;

    /// Hard delete, regardless of the soft-delete marker
    async fn purge(&self, id: Uuid) -> Result<()>;

    /// Live records newest first, plus the total number of live records
    async fn list(&self, limit: i64, offset: i64) -> Result<(Vec<Record>, i64)>;
}

/// PostgreSQL-backed repository over the `records` table
#[derive(Clone)]
pub struct PgRecordRepository {
    pool: PgPool,
}

impl PgRecordRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RecordRepository for PgRecordRepository {
    async fn create(&self, content: &str) -> Result<Record> {
        let record = sqlx::query_as::<_, Record>(
            r#"
            INSERT INTO records (content)
            VALUES ($1)
            RETURNING id, content, created_at, updated_at, deleted_at
            "#,
        )
        .bind(content)
        .fetch_one(&self.pool)
        .await?;

        Ok(record)
    }

    async fn get(&self, id: Uuid, visibility: Visibility) -> Result<Record> {
        let query = match visibility {
            Visibility::Live => {
                r#"
                SELECT id, content, created_at, updated_at, deleted_at
                FROM records
                WHERE id = $1 AND deleted_at IS NULL
                "#
            }
            Visibility::IncludeDeleted => {
                r#"
                SELECT id, content, created_at, updated_at, deleted_at
                FROM records
                WHERE id = $1
                "#
            }
        };

        sqlx::query_as::<_, Record>(query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(AppError::NotFound(id))
    }

    async fn update(&self, id: Uuid, content: &str) -> Result<Record> {
        // updated_at is maintained by the records_touch_updated_at trigger
        sqlx::query_as::<_, Record>(
            r#"
            UPDATE records
            SET content = $2
            WHERE id = $1 AND deleted_at IS NULL
            RETURNING id, content, created_at, updated_at, deleted_at
            "#,
        )
        .bind(id)
        .bind(content)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(AppError::NotFound(id))
    }

    async fn delete(&self, id: Uuid) -> Result<()> {
        let result = sqlx::query(
            "UPDATE records SET deleted_at = NOW() WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(id));
        }

        Ok(())
    }

    async fn purge(&self, id: Uuid) -> Result<()> {
        let result = sqlx::query("DELETE FROM records WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(id));
        }

        Ok(())
    }

    async fn list(&self, limit: i64, offset: i64) -> Result<(Vec<Record>, i64)> {
        let total: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM records WHERE deleted_at IS NULL")
                .fetch_one(&self.pool)
                .await?;

        let records = sqlx::query_as::<_, Record>(
            r#"
            SELECT id, content, created_at, updated_at, deleted_at
            FROM records
            WHERE deleted_at IS NULL
            ORDER BY created_at DESC, id DESC
            LIMIT $1 OFFSET $2
            "#,
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok((records, total))
    }
}
