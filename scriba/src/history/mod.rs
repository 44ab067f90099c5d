//! Processed-media history, persisted in SQLite with sqlx.
//!
//! Remembers which source files have already been exported so re-runs skip
//! them, and hands out sequential title numbers. Job and session state is
//! deliberately not persisted here; only completed exports are recorded.

use std::str::FromStr;

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{Pool, Sqlite, SqlitePool};

use crate::{Error, Result};

/// Database connection pool type alias.
pub type DbPool = Pool<Sqlite>;

/// Default connection pool size.
const DEFAULT_POOL_SIZE: u32 = 5;

/// Create a SQLite pool with WAL journaling and foreign keys enabled.
pub async fn init_pool(database_url: &str) -> Result<DbPool> {
    let options = SqliteConnectOptions::from_str(database_url)
        .map_err(Error::DatabaseSqlx)?
        .journal_mode(SqliteJournalMode::Wal)
        .foreign_keys(true)
        .create_if_missing(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(DEFAULT_POOL_SIZE)
        .connect_with(options)
        .await?;
    Ok(pool)
}

/// Apply pending migrations.
pub async fn run_migrations(pool: &DbPool) -> Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

/// A successfully processed job, as recorded in history.
#[derive(Debug, Clone)]
pub struct HistoryEntry {
    pub source_path: String,
    pub prefix: String,
    pub naming_mode: String,
    pub sequential_number: Option<i64>,
    pub output_title: String,
    pub output_mode: String,
    pub output_reference: Option<String>,
    pub language: Option<String>,
}

/// History repository trait.
#[async_trait]
pub trait HistoryRepository: Send + Sync {
    /// Next available 1-based sequential number for a prefix.
    async fn next_sequential_number(&self, prefix: &str) -> Result<i64>;
    /// True if this exact source+prefix+mode combination was already exported.
    async fn is_already_processed(
        &self,
        source_path: &str,
        prefix: &str,
        output_mode: &str,
    ) -> Result<bool>;
    /// True if the title was already used for the given mode.
    async fn output_title_exists(&self, output_title: &str, output_mode: &str) -> Result<bool>;
    /// Persist a successfully processed job.
    async fn record(&self, entry: &HistoryEntry) -> Result<()>;
}

/// SQLx implementation of [`HistoryRepository`].
pub struct SqlxHistoryRepository {
    pool: SqlitePool,
}

impl SqlxHistoryRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl HistoryRepository for SqlxHistoryRepository {
    async fn next_sequential_number(&self, prefix: &str) -> Result<i64> {
        let (max,): (i64,) = sqlx::query_as(
            "SELECT COALESCE(MAX(sequential_number), 0) FROM processed_media \
             WHERE prefix = ? AND naming_mode = 'sequential'",
        )
        .bind(prefix)
        .fetch_one(&self.pool)
        .await?;
        Ok(max + 1)
    }

    async fn is_already_processed(
        &self,
        source_path: &str,
        prefix: &str,
        output_mode: &str,
    ) -> Result<bool> {
        let row: Option<(i64,)> = sqlx::query_as(
            "SELECT 1 FROM processed_media \
             WHERE source_path = ? AND prefix = ? AND output_mode = ? LIMIT 1",
        )
        .bind(source_path)
        .bind(prefix)
        .bind(output_mode)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.is_some())
    }

    async fn output_title_exists(&self, output_title: &str, output_mode: &str) -> Result<bool> {
        let row: Option<(i64,)> = sqlx::query_as(
            "SELECT 1 FROM processed_media \
             WHERE output_title = ? AND output_mode = ? LIMIT 1",
        )
        .bind(output_title)
        .bind(output_mode)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.is_some())
    }

    async fn record(&self, entry: &HistoryEntry) -> Result<()> {
        sqlx::query(
            "INSERT INTO processed_media \
             (source_path, prefix, naming_mode, sequential_number, \
              output_title, output_mode, output_reference, language) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&entry.source_path)
        .bind(&entry.prefix)
        .bind(&entry.naming_mode)
        .bind(entry.sequential_number)
        .bind(&entry.output_title)
        .bind(&entry.output_mode)
        .bind(&entry.output_reference)
        .bind(&entry.language)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
