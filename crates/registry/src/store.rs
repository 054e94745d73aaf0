//! Upload registry trait and the SQLite implementation.

use crate::error::RegistryResult;
use crate::models::UploadRow;
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use upchunk_core::{FileIdentity, UploadId, UploadSession};

/// Registry of active upload sessions, keyed by file identity.
#[async_trait]
pub trait UploadRegistry: Send + Sync {
    /// Find an existing session with the given file identity.
    async fn find_by_identity(&self, identity: &FileIdentity)
        -> RegistryResult<Option<UploadSession>>;

    /// Persist a newly created session.
    async fn create(&self, session: &UploadSession) -> RegistryResult<()>;

    /// Get a session by upload id.
    async fn get(&self, upload_id: UploadId) -> RegistryResult<Option<UploadSession>>;

    /// Delete a session. Deleting an unknown id is not an error.
    async fn delete(&self, upload_id: UploadId) -> RegistryResult<()>;

    /// Run database migrations.
    async fn migrate(&self) -> RegistryResult<()>;

    /// Check connectivity and health.
    async fn health_check(&self) -> RegistryResult<()>;
}

/// SQLite-backed registry.
pub struct SqliteRegistry {
    pool: Pool<Sqlite>,
}

impl SqliteRegistry {
    /// Open (creating if missing) a registry database at `path`.
    pub async fn new(path: impl AsRef<Path>) -> RegistryResult<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        tracing::debug!(path = %path.display(), "opening upload registry database");

        let opts = SqliteConnectOptions::from_str(&format!("sqlite:{}?mode=rwc", path.display()))?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
            // Prevent transient "database is locked" errors under concurrent access.
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            // SQLite permits limited write concurrency; a single connection avoids
            // persistent "database is locked" failures under server concurrency.
            .max_connections(1)
            .connect_with(opts)
            .await?;

        let registry = Self { pool };
        registry.migrate().await?;
        Ok(registry)
    }
}

#[async_trait]
impl UploadRegistry for SqliteRegistry {
    async fn find_by_identity(
        &self,
        identity: &FileIdentity,
    ) -> RegistryResult<Option<UploadSession>> {
        let row = sqlx::query_as::<_, UploadRow>(
            r#"
            SELECT * FROM uploads
            WHERE file_name = ? AND file_size = ? AND file_num_chunks = ? AND file_digest = ?
            "#,
        )
        .bind(&identity.file_name)
        .bind(identity.file_size as i64)
        .bind(identity.num_chunks as i64)
        .bind(identity.file_digest.to_hex())
        .fetch_optional(&self.pool)
        .await?;

        row.map(UploadRow::into_session).transpose()
    }

    async fn create(&self, session: &UploadSession) -> RegistryResult<()> {
        let row = UploadRow::from_session(session);
        sqlx::query(
            r#"
            INSERT INTO uploads (
                upload_id, file_name, file_size, file_num_chunks, file_digest,
                created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(row.upload_id)
        .bind(&row.file_name)
        .bind(row.file_size)
        .bind(row.file_num_chunks)
        .bind(&row.file_digest)
        .bind(row.created_at)
        .bind(row.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get(&self, upload_id: UploadId) -> RegistryResult<Option<UploadSession>> {
        let row =
            sqlx::query_as::<_, UploadRow>("SELECT * FROM uploads WHERE upload_id = ?")
                .bind(*upload_id.as_uuid())
                .fetch_optional(&self.pool)
                .await?;
        row.map(UploadRow::into_session).transpose()
    }

    async fn delete(&self, upload_id: UploadId) -> RegistryResult<()> {
        sqlx::query("DELETE FROM uploads WHERE upload_id = ?")
            .bind(*upload_id.as_uuid())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn migrate(&self) -> RegistryResult<()> {
        sqlx::query(SCHEMA_SQL).execute(&self.pool).await?;
        Ok(())
    }

    async fn health_check(&self) -> RegistryResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

/// SQL schema for SQLite.
const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS uploads (
    upload_id BLOB PRIMARY KEY,
    file_name TEXT NOT NULL,
    file_size INTEGER NOT NULL,
    file_num_chunks INTEGER NOT NULL,
    file_digest TEXT NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
CREATE UNIQUE INDEX IF NOT EXISTS idx_uploads_identity
    ON uploads(file_name, file_size, file_num_chunks, file_digest);
CREATE INDEX IF NOT EXISTS idx_uploads_digest ON uploads(file_digest);
"#;
