//! Shared fixtures for the EduConnect test suites: signed tokens, in-memory
//! stores, media and mail fakes, and an in-process application.

pub mod app;
pub mod fakes;
pub mod tokens;

pub use app::*;
pub use fakes::*;
pub use tokens::*;

use anyhow::Result;
use edu_control::{connect_pool, Platform, Store};
use edu_models::{AuthConfig, Config};
use edu_notify::LocalNotifier;
use std::sync::Arc;
use tempfile::TempDir;

/// Fresh migrated store backed by a private in-memory database.
pub async fn test_store() -> Result<Store> {
    let pool = connect_pool("sqlite::memory:").await?;
    Ok(Store::new(pool).await?)
}

/// Migrated store backed by a database file inside a temporary directory.
/// The directory lives as long as the returned guard.
pub async fn file_store() -> Result<(TempDir, Store)> {
    let dir = tempfile::tempdir()?;
    let url = format!("sqlite://{}/educonnect.db", dir.path().display());
    let store = Store::new(connect_pool(&url).await?).await?;
    Ok((dir, store))
}

/// Configuration wired to the test key set. The key set URL is unreachable,
/// so only the preloaded test key resolves.
pub fn test_config() -> Config {
    let mut config = Config::default();
    config.data.db_url = "sqlite::memory:".to_string();
    config.auth = AuthConfig {
        user_pool_id: Some("pool".to_string()),
        app_client_id: Some(TEST_CLIENT_ID.to_string()),
        jwks_url: Some("http://127.0.0.1:9/jwks.json".to_string()),
        ..AuthConfig::default()
    };
    config.notify.sender = Some("noreply@educonnect.test".to_string());
    config
}

/// Platform over an in-memory store, with handles to its fakes.
pub struct TestPlatform {
    pub platform: Arc<Platform>,
    pub media: Arc<FakeMediaStore>,
    pub notifier: Arc<LocalNotifier>,
    pub mailer: Arc<RecordingMailer>,
}

impl TestPlatform {
    pub async fn new() -> Result<Self> {
        Self::with_config(&test_config()).await
    }

    pub async fn with_config(config: &Config) -> Result<Self> {
        Self::with_notifier(config, LocalNotifier::new()).await
    }

    pub async fn with_notifier(config: &Config, notifier: LocalNotifier) -> Result<Self> {
        let media = Arc::new(FakeMediaStore::new());
        let notifier = Arc::new(notifier);
        let mailer = Arc::new(RecordingMailer::new());
        let platform = Platform::new(
            test_store().await?,
            media.clone(),
            notifier.clone(),
            mailer.clone(),
            &config.cache,
            config.tracking.clone(),
        );
        Ok(Self {
            platform: Arc::new(platform),
            media,
            notifier,
            mailer,
        })
    }
}
