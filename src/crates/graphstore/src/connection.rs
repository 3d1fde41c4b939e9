//! Database connection management for the graph store.

use crate::error::Result;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use std::sync::Arc;

/// Type alias for the database connection pool.
pub type GraphPool = SqlitePool;

/// Database connection wrapper for the graph store.
#[derive(Clone)]
pub struct GraphDatabase {
    pool: Arc<GraphPool>,
}

impl GraphDatabase {
    /// Create a new database connection from a connection string.
    ///
    /// # Arguments
    /// * `database_url` - SQLite connection string (e.g., "sqlite:graph.db" or "sqlite::memory:")
    pub async fn new(database_url: &str) -> Result<Self> {
        Self::with_max_connections(database_url, 5).await
    }

    /// Create a new database connection with custom pool size.
    pub async fn with_max_connections(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;

        Ok(Self {
            pool: Arc::new(pool),
        })
    }

    /// Create an in-memory database with migrations applied, for tests and
    /// ephemeral runs.
    pub async fn in_memory() -> Result<Self> {
        let db = Self::new("sqlite::memory:").await?;
        db.run_migrations().await?;
        Ok(db)
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &GraphPool {
        &self.pool
    }

    /// Run migrations on the database.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("./migrations").run(self.pool.as_ref()).await?;
        Ok(())
    }

    /// Perform a health check by running a simple query.
    pub async fn health_check(&self) -> Result<()> {
        sqlx::query("SELECT 1").fetch_one(self.pool.as_ref()).await?;
        Ok(())
    }

    /// Close the connection pool gracefully.
    pub async fn close(self) {
        self.pool.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_connection() {
        let db = GraphDatabase::new("sqlite::memory:").await.unwrap();
        assert!(db.pool().acquire().await.is_ok());
    }

    #[tokio::test]
    async fn test_health_check() {
        let db = GraphDatabase::new("sqlite::memory:").await.unwrap();
        assert!(db.health_check().await.is_ok());
    }

    #[tokio::test]
    async fn test_in_memory_runs_migrations() {
        let db = GraphDatabase::in_memory().await.unwrap();
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM persons")
            .fetch_one(db.pool())
            .await
            .unwrap();
        assert_eq!(count.0, 0);
    }

    #[tokio::test]
    async fn test_file_backed_database_survives_reconnect() {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite://{}/graph.db?mode=rwc", dir.path().display());

        let db = GraphDatabase::new(&url).await.unwrap();
        db.run_migrations().await.unwrap();
        sqlx::query(
            "INSERT INTO persons (id, name, normalised_name, first_seen_at) VALUES (?, ?, ?, ?)",
        )
        .bind("solo-person")
        .bind("Solo Person")
        .bind("solo person")
        .bind("2026-01-01T00:00:00Z")
        .execute(db.pool())
        .await
        .unwrap();
        db.close().await;

        let reopened = GraphDatabase::new(&url).await.unwrap();
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM persons")
            .fetch_one(reopened.pool())
            .await
            .unwrap();
        assert_eq!(count.0, 1);
    }
}
