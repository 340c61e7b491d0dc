use anyhow::{Context, Result};
use edu_control::{connect_pool, RoleChange, Store};
use edu_models::{Config, Role};
use tracing::info;

/// Opens the configured database and brings its schema up to date.
pub async fn open_store(config: &Config) -> Result<Store> {
    let pool = connect_pool(&config.data.db_url)
        .await
        .with_context(|| format!("failed to open database {}", config.data.db_url))?;
    let store = Store::new(pool).await.context("failed to run migrations")?;
    Ok(store)
}

/// Grants the instructor role. The message is what the operator sees; the
/// flag is false when no user has that email.
pub async fn promote(store: &Store, email: &str) -> Result<(String, bool)> {
    let email = email.trim();
    let outcome = store
        .set_role_by_email(email, Role::Instructor)
        .await
        .context("failed to update role")?;
    info!(email = %email, outcome = ?outcome, "Promotion requested");
    Ok(match outcome {
        RoleChange::NotFound => (format!("Error: User with email '{email}' not found."), false),
        RoleChange::Unchanged => (
            format!("Warning: User '{email}' is already an instructor."),
            true,
        ),
        RoleChange::Updated => (
            format!("Success: User '{email}' has been promoted to instructor."),
            true,
        ),
    })
}

pub async fn migrate(config: &Config) -> Result<String> {
    open_store(config).await?;
    Ok(format!("Migrations applied to {}", config.data.db_url))
}

pub fn render_config(config: &Config) -> Result<String> {
    toml::to_string_pretty(config).context("failed to render configuration")
}
