//! Metadata recorder backed by PostgreSQL.
//!
//! Each call runs in its own transaction: ensure the `uploads` table exists,
//! insert the name unless present, and count the rows. A transaction that is
//! dropped before commit rolls back, so the pooled connection is released
//! cleanly on every exit path.

use crate::{config::AppConfig, models::upload_record::UploadRecord};
use async_trait::async_trait;
use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions};
use thiserror::Error;
use tracing::{debug, instrument};

const CREATE_UPLOADS_TABLE: &str = "CREATE TABLE IF NOT EXISTS uploads (
    name TEXT PRIMARY KEY,
    uploaded_at TIMESTAMPTZ NOT NULL DEFAULT now()
)";
const INSERT_UPLOAD: &str = "INSERT INTO uploads (name) VALUES ($1) ON CONFLICT DO NOTHING
    RETURNING name, uploaded_at";
const COUNT_UPLOADS: &str = "SELECT count(*) FROM uploads";

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

pub type PersistenceResult<T> = Result<T, PersistenceError>;

/// Relational record of uploaded names.
#[async_trait]
pub trait MetadataRecorder: Send + Sync {
    /// Record `name` unless already present and return the total row count
    /// observed after the insert attempt.
    async fn record_if_new(&self, name: &str) -> PersistenceResult<i64>;

    /// Cheap connectivity check used by the readiness probe.
    async fn ping(&self) -> PersistenceResult<()>;
}

#[derive(Clone)]
pub struct PgMetadataRecorder {
    pool: PgPool,
}

impl PgMetadataRecorder {
    /// Build a lazily-connecting pool; connections are opened on first use.
    pub fn new(cfg: &AppConfig) -> Self {
        let opts = PgConnectOptions::new()
            .host(&cfg.db_host)
            .port(cfg.db_port)
            .username(&cfg.db_user)
            .password(&cfg.db_password)
            .database(&cfg.db_name);

        Self::with_pool(PgPoolOptions::new().max_connections(5).connect_lazy_with(opts))
    }

    pub fn with_pool(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MetadataRecorder for PgMetadataRecorder {
    #[instrument(skip(self))]
    async fn record_if_new(&self, name: &str) -> PersistenceResult<i64> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(CREATE_UPLOADS_TABLE).execute(&mut *tx).await?;
        // ON CONFLICT DO NOTHING yields no row for an existing name.
        let created: Option<UploadRecord> = sqlx::query_as(INSERT_UPLOAD)
            .bind(name)
            .fetch_optional(&mut *tx)
            .await?;
        let total: i64 = sqlx::query_scalar(COUNT_UPLOADS)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;

        match created {
            Some(record) => debug!(uploaded_at = %record.uploaded_at, total, "recorded new upload"),
            None => debug!(total, "upload already recorded"),
        }
        Ok(total)
    }

    async fn ping(&self) -> PersistenceResult<()> {
        sqlx::query_scalar::<_, i32>("SELECT 1")
            .fetch_one(&self.pool)
            .await?;
        Ok(())
    }
}


#[cfg(test)]
mod tests {
    use super::{memory::MemoryMetadataRecorder, *};

    #[tokio::test]
    async fn new_names_increment_the_count() {
        let recorder = MemoryMetadataRecorder::default();
        assert_eq!(recorder.record_if_new("a.txt").await.unwrap(), 1);
        assert_eq!(recorder.record_if_new("b.txt").await.unwrap(), 2);
    }

    #[tokio::test]
    async fn repeated_name_keeps_one_row_and_original_timestamp() {
        let recorder = MemoryMetadataRecorder::default();
        recorder.record_if_new("a.txt").await.unwrap();
        let first = recorder.records().await[0].uploaded_at;

        assert_eq!(recorder.record_if_new("a.txt").await.unwrap(), 1);
        let records = recorder.records().await;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].uploaded_at, first);
    }

    #[tokio::test]
    async fn failures_surface_as_persistence_errors() {
        let recorder = MemoryMetadataRecorder::default();
        recorder.fail_all();
        assert!(recorder.record_if_new("a.txt").await.is_err());
        assert!(recorder.ping().await.is_err());
    }

    #[test]
    fn insert_is_conflict_tolerant() {
        assert!(INSERT_UPLOAD.contains("ON CONFLICT DO NOTHING"));
        assert!(CREATE_UPLOADS_TABLE.contains("IF NOT EXISTS"));
        assert!(CREATE_UPLOADS_TABLE.contains("name TEXT PRIMARY KEY"));
    }

    /// Pool on a throwaway schema of the database named by `DATABASE_URL`.
    ///
    /// `None` when the variable is unset, so the suite runs without Postgres.
    async fn scratch_pool(schema: &str) -> Option<PgPool> {
        let url = std::env::var("DATABASE_URL").ok()?;
        let create = format!("CREATE SCHEMA IF NOT EXISTS {}", schema);
        let search_path = format!("SET search_path TO {}", schema);
        let pool = PgPoolOptions::new()
            .max_connections(2)
            .after_connect(move |conn, _meta| {
                let create = create.clone();
                let search_path = search_path.clone();
                Box::pin(async move {
                    sqlx::query(&create).execute(&mut *conn).await?;
                    sqlx::query(&search_path).execute(&mut *conn).await?;
                    Ok(())
                })
            })
            .connect(&url)
            .await
            .expect("connect to DATABASE_URL");
        Some(pool)
    }

    #[tokio::test]
    async fn postgres_records_each_name_once() {
        let schema = format!(
            "upload_service_test_{}_{}",
            std::process::id(),
            chrono::Utc::now().timestamp_micros()
        );
        let Some(pool) = scratch_pool(&schema).await else {
            eprintln!("DATABASE_URL not set; skipping postgres_records_each_name_once");
            return;
        };
        let recorder = PgMetadataRecorder::with_pool(pool.clone());

        assert_eq!(recorder.record_if_new("a.txt").await.unwrap(), 1);
        let first: UploadRecord =
            sqlx::query_as("SELECT name, uploaded_at FROM uploads WHERE name = $1")
                .bind("a.txt")
                .fetch_one(&pool)
                .await
                .unwrap();

        assert_eq!(recorder.record_if_new("a.txt").await.unwrap(), 1);
        assert_eq!(recorder.record_if_new("b.txt").await.unwrap(), 2);

        let rows: Vec<UploadRecord> =
            sqlx::query_as("SELECT name, uploaded_at FROM uploads WHERE name = $1")
                .bind("a.txt")
                .fetch_all(&pool)
                .await
                .unwrap();
        assert_eq!(rows, vec![first]);
        recorder.ping().await.unwrap();

        sqlx::query(&format!("DROP SCHEMA {} CASCADE", schema))
            .execute(&pool)
            .await
            .unwrap();
    }
}
