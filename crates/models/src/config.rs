use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::EduError;

/// Locations searched when no explicit config path is given.
pub const CONFIG_PATHS: [&str; 2] = ["configs/default.toml", "config/config.toml"];

/// Environment variable naming an explicit config file.
pub const CONFIG_PATH_ENV: &str = "EDU_CONFIG";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub data: DataConfig,
    pub auth: AuthConfig,
    pub media: MediaConfig,
    pub notify: NotifyConfig,
    pub cache: CacheConfig,
    pub tracking: TrackingConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    pub bind: String,
    pub port: u16,
    /// Worker threads of the async runtime serving requests.
    pub workers: usize,
    pub request_timeout_secs: u64,
    pub max_request_body_size_mb: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct DataConfig {
    pub db_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct AuthConfig {
    pub user_pool_id: Option<String>,
    pub app_client_id: Option<String>,
    pub region: String,
    pub jwks_url: Option<String>,
    pub issuer: Option<String>,
    pub jwks_cache_ttl_secs: u64,
    pub leeway_secs: u64,
    /// Accept unsigned tokens when no key set is configured. Development only.
    pub allow_insecure: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct MediaConfig {
    pub base_url: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct NotifyConfig {
    pub sender: Option<String>,
    pub relay_url: Option<String>,
    pub batch_size: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct CacheConfig {
    pub lessons_ttl_secs: u64,
    pub max_entries: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct TrackingConfig {
    pub stale_after_mins: i64,
    pub sweep_interval_secs: u64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingConfig {
    pub format: LogFormat,
    pub level: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0".to_string(),
            port: 5001,
            workers: 4,
            request_timeout_secs: 120,
            max_request_body_size_mb: 512, // lesson videos go through this process
        }
    }
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            db_url: "sqlite://data/educonnect.db".to_string(),
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            user_pool_id: None,
            app_client_id: None,
            region: "ap-southeast-1".to_string(),
            jwks_url: None,
            issuer: None,
            jwks_cache_ttl_secs: 86_400,
            leeway_secs: 0,
            allow_insecure: false,
        }
    }
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:5002".to_string(),
            timeout_secs: 300,
        }
    }
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            sender: None,
            relay_url: None,
            batch_size: 50,
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            lessons_ttl_secs: 300,
            max_entries: 1000,
        }
    }
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            stale_after_mins: 30,
            sweep_interval_secs: 60,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::Pretty,
            level: "info".to_string(),
        }
    }
}

impl AuthConfig {
    /// Key set location: explicit URL, else derived from the user pool.
    pub fn resolved_jwks_url(&self) -> Option<String> {
        if let Some(url) = non_empty(&self.jwks_url) {
            return Some(url.to_string());
        }
        self.pool_base()
            .map(|base| format!("{base}/.well-known/jwks.json"))
    }

    pub fn resolved_issuer(&self) -> Option<String> {
        if let Some(issuer) = non_empty(&self.issuer) {
            return Some(issuer.to_string());
        }
        self.pool_base()
    }

    fn pool_base(&self) -> Option<String> {
        let pool = non_empty(&self.user_pool_id)?;
        if self.region.is_empty() {
            return None;
        }
        Some(format!(
            "https://cognito-idp.{}.amazonaws.com/{}",
            self.region, pool
        ))
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.trim().is_empty())
}

fn parse_flag(value: &str) -> bool {
    matches!(value.trim().to_ascii_lowercase().as_str(), "true" | "1" | "yes")
}

impl Config {
    /// Layered load: defaults, TOML file, legacy flat variables, then `EDU_*`
    /// variables (`EDU_SERVER__PORT=5001`).
    pub fn load(path: Option<&Path>) -> Result<Self, EduError> {
        let explicit = path
            .map(Path::to_path_buf)
            .or_else(|| std::env::var(CONFIG_PATH_ENV).ok().map(Into::into));

        let mut figment = Figment::from(Serialized::defaults(Config::default()));
        match explicit {
            Some(file) => {
                if !file.exists() {
                    return Err(EduError::ConfigError {
                        reason: format!("config file not found: {}", file.display()),
                    });
                }
                figment = figment.merge(Toml::file(file));
            }
            None => {
                if let Some(found) = CONFIG_PATHS.iter().map(Path::new).find(|p| p.exists()) {
                    figment = figment.merge(Toml::file(found));
                }
            }
        }

        let mut config: Config = figment.extract().map_err(|e| EduError::ConfigError {
            reason: e.to_string(),
        })?;
        config.apply_legacy_env(|key| std::env::var(key).ok());

        Figment::from(Serialized::defaults(config))
            .merge(Env::prefixed("EDU_").split("__").ignore(&["config"]))
            .extract()
            .map_err(|e| EduError::ConfigError {
                reason: e.to_string(),
            })
    }

    /// Variables understood by earlier deployments of the service.
    pub fn apply_legacy_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let first = |keys: &[&str]| {
            keys.iter()
                .find_map(|k| lookup(k).filter(|v| !v.trim().is_empty()))
        };

        if let Some(port) = first(&["PORT"]).and_then(|v| v.trim().parse().ok()) {
            self.server.port = port;
        }
        if let Some(url) = first(&["DATABASE_URL"]) {
            self.data.db_url = url;
        }
        if let Some(pool) = first(&["COGNITO_USER_POOL_ID", "COGNITO_POOL_ID"]) {
            self.auth.user_pool_id = Some(pool);
        }
        if let Some(client) = first(&["COGNITO_APP_CLIENT_ID"]) {
            self.auth.app_client_id = Some(client);
        }
        if let Some(region) = first(&["COGNITO_REGION", "AWS_REGION"]) {
            self.auth.region = region;
        }
        if let Some(url) = first(&["COGNITO_JWKS_URL", "JWKS_URL"]) {
            self.auth.jwks_url = Some(url);
        }
        if let Some(issuer) = first(&["JWT_ISSUER", "COGNITO_ISSUER"]) {
            self.auth.issuer = Some(issuer);
        }
        if let Some(leeway) = first(&["JWT_LEEWAY"]).and_then(|v| v.trim().parse().ok()) {
            self.auth.leeway_secs = leeway;
        }
        if let Some(ttl) = first(&["JWKS_CACHE_TTL"]).and_then(|v| v.trim().parse().ok()) {
            self.auth.jwks_cache_ttl_secs = ttl;
        }
        if let Some(flag) = first(&["ALLOW_INSECURE_JWT"]) {
            self.auth.allow_insecure = parse_flag(&flag);
        }
        if let Some(url) = first(&["MEDIA_SERVICE_URL"]) {
            self.media.base_url = url;
        }
        if let Some(sender) = first(&["MAIL_SENDER", "AWS_SES_SENDER_EMAIL"]) {
            self.notify.sender = Some(sender);
        }
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.bind, self.server.port)
    }
}
