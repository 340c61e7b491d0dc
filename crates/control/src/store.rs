use edu_models::EduError;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::Path;
use std::str::FromStr;
use tracing::{info, warn};

use crate::migrations;

/// Relational persistence for users, series, lessons, subscriptions and
/// lesson tracking. Operations are split across the sibling modules.
#[derive(Clone, Debug)]
pub struct Store {
    pub(crate) pool: SqlitePool,
}

pub(crate) fn db_error(e: sqlx::Error) -> EduError {
    EduError::SqlxError(e)
}

impl Store {
    /// Wraps the pool and brings the schema up to date.
    pub async fn new(pool: SqlitePool) -> Result<Self, EduError> {
        migrations::run_migrations(&pool)
            .await
            .map_err(|e| EduError::DatabaseError {
                reason: e.to_string(),
            })?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

fn is_memory(db_url: &str) -> bool {
    db_url.contains(":memory:") || db_url.contains("mode=memory")
}

/// Opens a SQLite pool, creating the database file and its directory when
/// missing. In-memory databases get a single connection so that every query
/// sees the same data.
pub async fn connect_pool(db_url: &str) -> Result<SqlitePool, EduError> {
    let config_err = |e: sqlx::Error| EduError::ConfigError {
        reason: format!("invalid database url {db_url}: {e}"),
    };

    if is_memory(db_url) {
        return SqlitePoolOptions::new()
            .max_connections(1)
            .connect(db_url)
            .await
            .map_err(config_err);
    }

    let db_path = db_url
        .strip_prefix("sqlite://")
        .or_else(|| db_url.strip_prefix("sqlite:"));
    if let Some(parent) = db_path.and_then(|p| Path::new(p).parent()) {
        if !parent.as_os_str().is_empty() {
            if let Err(e) = std::fs::create_dir_all(parent) {
                warn!("Failed to create DB parent directory {:?}: {}", parent, e);
            }
        }
    }

    let options = SqliteConnectOptions::from_str(db_url)
        .map_err(config_err)?
        .create_if_missing(true)
        .foreign_keys(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(8)
        .connect_with(options)
        .await
        .map_err(EduError::SqlxError)?;
    info!("Database connected: {}", db_url);
    Ok(pool)
}
