use anyhow::{Context, Result};
use edu_api::{build_app, serve, AppState};
use edu_auth::Authenticator;
use edu_control::{connect_pool, Platform, Store};
use edu_media::MediaClient;
use edu_metrics::MetricsService;
use edu_models::Config;
use edu_notify::{mailer_from_config, LocalNotifier};
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn};

/// Opens the database and builds every service the handlers need.
pub async fn build_state(config: Config) -> Result<AppState> {
    let pool = connect_pool(&config.data.db_url).await?;
    let store = Store::new(pool).await?;
    info!("Database ready at {}", config.data.db_url);

    let platform = Platform::new(
        store,
        Arc::new(MediaClient::new(&config.media)),
        Arc::new(LocalNotifier::new()),
        mailer_from_config(&config.notify),
        &config.cache,
        config.tracking.clone(),
    );

    let auth = Authenticator::from_config(&config.auth);
    match auth.jwks() {
        Some(jwks) => info!("Verifying tokens against {}", jwks.url()),
        None if config.auth.allow_insecure => {}
        None => warn!("No user pool configured: authenticated routes will reject every request"),
    }

    let metrics = MetricsService::new()?;
    Ok(AppState::new(
        config,
        Arc::new(platform),
        Arc::new(auth),
        Arc::new(metrics),
    ))
}

/// Serves on `listener` until `shutdown` resolves. The maintenance loop runs
/// alongside and stops with the server.
pub async fn run_with_listener<F>(state: AppState, listener: TcpListener, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let maintenance = state.platform.spawn_maintenance();
    let app = build_app(state);

    let result = serve(listener, app, shutdown).await;
    maintenance.abort();
    info!("EduConnect server stopped");
    result.context("server error")
}

pub async fn run<F>(config: Config, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let address = config.bind_address();
    let state = build_state(config).await?;
    let listener = TcpListener::bind(&address)
        .await
        .with_context(|| format!("failed to bind {address}"))?;
    run_with_listener(state, listener, shutdown).await
}
