//! Database initialization
//!
//! Opens (or creates) the roster database and makes sure every table the
//! services rely on exists. Safe to run on every startup.

use crate::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::Path;
use std::time::Duration;
use tracing::info;

/// Initialize database connection and create tables if needed
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    // Create parent directory if it doesn't exist
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    // Per-connection settings; WAL lets list reads proceed while an upload
    // transaction is open
    let options = SqliteConnectOptions::new()
        .filename(db_path)
        .create_if_missing(true)
        .foreign_keys(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_millis(5000));

    let pool = SqlitePoolOptions::new()
        .max_connections(10)
        .connect_with(options)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    create_schema(&pool).await?;

    Ok(pool)
}

/// Single-connection in-memory database with the full schema
///
/// Every pooled connection to `sqlite::memory:` would get its own empty
/// database, so the pool is capped at one connection.
pub async fn init_memory_database() -> Result<SqlitePool> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await?;

    create_schema(&pool).await?;

    Ok(pool)
}

/// Create all tables (idempotent)
pub async fn create_schema(pool: &SqlitePool) -> Result<()> {
    create_agents_table(pool).await?;
    create_distributed_lists_table(pool).await?;
    Ok(())
}

async fn create_agents_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS agents (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            email TEXT NOT NULL UNIQUE,
            mobile_number TEXT NOT NULL,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// One row per agent per distribution run
///
/// Agent identity is copied (not referenced) so a batch stays readable even
/// if the roster changes afterwards. `items` holds the contacts as JSON.
async fn create_distributed_lists_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS distributed_lists (
            id TEXT PRIMARY KEY,
            agent_id TEXT NOT NULL,
            agent_name TEXT NOT NULL,
            agent_email TEXT NOT NULL,
            items TEXT NOT NULL,
            upload_batch TEXT NOT NULL,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_distributed_lists_agent_name \
         ON distributed_lists(agent_name)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn table_exists(pool: &SqlitePool, name: &str) -> bool {
        sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?)",
        )
        .bind(name)
        .fetch_one(pool)
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn test_memory_database_has_schema() {
        let pool = init_memory_database().await.unwrap();

        assert!(table_exists(&pool, "agents").await);
        assert!(table_exists(&pool, "distributed_lists").await);
    }

    #[tokio::test]
    async fn test_create_schema_idempotent() {
        let pool = init_memory_database().await.unwrap();

        // Second run must not fail on existing tables/indexes
        create_schema(&pool).await.unwrap();
        create_schema(&pool).await.unwrap();

        assert!(table_exists(&pool, "agents").await);
    }

    #[tokio::test]
    async fn test_agent_email_unique() {
        let pool = init_memory_database().await.unwrap();

        let insert = "INSERT INTO agents (id, name, email, mobile_number, created_at) \
                      VALUES (?, ?, ?, ?, ?)";
        sqlx::query(insert)
            .bind("a1")
            .bind("Ann")
            .bind("ann@example.com")
            .bind("+100")
            .bind("2025-01-01T00:00:00+00:00")
            .execute(&pool)
            .await
            .unwrap();

        let duplicate = sqlx::query(insert)
            .bind("a2")
            .bind("Ann Again")
            .bind("ann@example.com")
            .bind("+101")
            .bind("2025-01-01T00:00:00+00:00")
            .execute(&pool)
            .await;

        assert!(duplicate.is_err());
    }
}
