use sqlx::{Pool, Sqlite};
use tracing::info;

/// Embedded migration scripts
const MIGRATION_001_INITIAL: &str = include_str!("../migrations/001_initial.sql");
const MIGRATION_002_TRACKING: &str = include_str!("../migrations/002_tracking.sql");

/// Run all embedded migrations. Every statement is idempotent.
pub async fn run_migrations(pool: &Pool<Sqlite>) -> Result<(), sqlx::Error> {
    info!("Running database migrations...");

    info!("Running migration 001: Catalog schema");
    sqlx::query(MIGRATION_001_INITIAL).execute(pool).await?;

    info!("Running migration 002: Lesson tracking");
    sqlx::query(MIGRATION_002_TRACKING).execute(pool).await?;

    info!("All migrations completed successfully");
    Ok(())
}
