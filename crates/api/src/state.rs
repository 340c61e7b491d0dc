use edu_auth::Authenticator;
use edu_control::Platform;
use edu_metrics::MetricsService;
use edu_models::Config;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub platform: Arc<Platform>,
    pub auth: Arc<Authenticator>,
    pub metrics: Arc<MetricsService>,
}

impl AppState {
    pub fn new(
        config: Config,
        platform: Arc<Platform>,
        auth: Arc<Authenticator>,
        metrics: Arc<MetricsService>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            platform,
            auth,
            metrics,
        }
    }
}
