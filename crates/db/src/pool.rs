use std::path::Path;
use std::time::Duration;

use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};

use crate::error::StoreError;

/// Default lock timeout for database operations (spec §4.1, §5).
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(5);

/// Open (creating if needed) the SparkQ SQLite database in WAL mode so
/// readers never block writers, and apply pending migrations.
///
/// `lock_timeout` backs SQLite's `busy_timeout`: a writer that can't
/// acquire the database lock within this window surfaces a retryable
/// error rather than blocking forever (spec §4.1 "Database lock beyond
/// the configured lock timeout").
pub async fn connect(path: &Path, lock_timeout: Duration) -> Result<SqlitePool, StoreError> {
    let options = SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(true)
        .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
        .busy_timeout(lock_timeout)
        .foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(8)
        .connect_with(options)
        .await?;

    sqlx::migrate!("./migrations").run(&pool).await.map_err(|e| {
        StoreError::Database(sqlx::Error::Migrate(Box::new(e)))
    })?;

    Ok(pool)
}

/// Convenience wrapper using the default lock timeout.
pub async fn connect_default(path: &Path) -> Result<SqlitePool, StoreError> {
    connect(path, DEFAULT_LOCK_TIMEOUT).await
}

/// Open an in-memory database for tests; same schema, no file on disk.
pub async fn connect_in_memory() -> Result<SqlitePool, StoreError> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await?;
    sqlx::migrate!("./migrations").run(&pool).await.map_err(|e| {
        StoreError::Database(sqlx::Error::Migrate(Box::new(e)))
    })?;
    Ok(pool)
}
