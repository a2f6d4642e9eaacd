mod config;
mod posts;
mod subreddits;


use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;
use subwatch_core::{CoreError, DatabaseError, DatabaseSettings};
use tracing::info;

/// SQLite-backed store for subreddits, monitored posts and the monitor
/// config. Cheap to clone; clones share one pool.
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    pub async fn connect(settings: &DatabaseSettings) -> Result<Self, CoreError> {
        Self::connect_url(&settings.url, settings.max_connections).await
    }

    pub async fn connect_url(url: &str, max_connections: u32) -> Result<Self, CoreError> {
        let options = SqliteConnectOptions::from_str(url)
            .map_err(|e| DatabaseError::ConnectionFailed {
                reason: e.to_string(),
            })?
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await
            .map_err(|e| DatabaseError::ConnectionFailed {
                reason: e.to_string(),
            })?;

        info!(url, "Connected to database");
        Ok(Self { pool })
    }

    pub async fn run_migrations(&self) -> Result<(), CoreError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| DatabaseError::MigrationFailed {
                migration: e.to_string(),
            })?;
        Ok(())
    }

    /// Connects and brings the schema up to date.
    pub async fn open(settings: &DatabaseSettings) -> Result<Self, CoreError> {
        let db = Self::connect(settings).await?;
        db.run_migrations().await?;
        Ok(db)
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}
