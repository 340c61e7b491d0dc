use jsonwebtoken::DecodingKey;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::{debug, error, warn};

/// One RSA public key from the identity provider's key set.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Jwk {
    pub kid: String,
    pub kty: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alg: Option<String>,
    #[serde(rename = "use", default, skip_serializing_if = "Option::is_none")]
    pub key_use: Option<String>,
    pub n: String,
    pub e: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct JwkSet {
    #[serde(default)]
    pub keys: Vec<Jwk>,
}

impl Jwk {
    pub fn decoding_key(&self) -> Option<DecodingKey> {
        if self.kty != "RSA" {
            warn!(kid = %self.kid, kty = %self.kty, "Unsupported key type in key set");
            return None;
        }
        match DecodingKey::from_rsa_components(&self.n, &self.e) {
            Ok(key) => Some(key),
            Err(e) => {
                error!(kid = %self.kid, "Failed to convert JWK: {}", e);
                None
            }
        }
    }
}

#[derive(Debug)]
struct CachedKeys {
    keys: Vec<Jwk>,
    fetched_at: Instant,
}

/// Key set fetched from a URL and kept for `ttl`.
#[derive(Debug)]
pub struct JwksCache {
    url: String,
    ttl: Duration,
    client: reqwest::Client,
    state: RwLock<Option<CachedKeys>>,
}

impl JwksCache {
    pub fn new(url: impl Into<String>, ttl: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(5))
            .build()
            .unwrap_or_default();
        Self {
            url: url.into(),
            ttl,
            client,
            state: RwLock::new(None),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Seeds the cache as if the keys had just been fetched.
    pub async fn preload(&self, keys: Vec<Jwk>) {
        *self.state.write().await = Some(CachedKeys {
            keys,
            fetched_at: Instant::now(),
        });
    }

    pub async fn invalidate(&self) {
        *self.state.write().await = None;
    }

    /// Key for `kid`; an unknown kid forces one refetch.
    pub async fn find(&self, kid: &str) -> Option<Jwk> {
        if let Some(jwk) = self.cached_keys().await.and_then(|keys| pick(keys, kid)) {
            return Some(jwk);
        }
        debug!(kid = %kid, "Key not cached, refreshing key set");
        self.invalidate().await;
        self.cached_keys().await.and_then(|keys| pick(keys, kid))
    }

    async fn cached_keys(&self) -> Option<Vec<Jwk>> {
        {
            let state = self.state.read().await;
            if let Some(cached) = state.as_ref() {
                if cached.fetched_at.elapsed() < self.ttl {
                    return Some(cached.keys.clone());
                }
            }
        }

        let keys = self.fetch().await?;
        *self.state.write().await = Some(CachedKeys {
            keys: keys.clone(),
            fetched_at: Instant::now(),
        });
        Some(keys)
    }

    async fn fetch(&self) -> Option<Vec<Jwk>> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .and_then(|r| r.error_for_status());
        match response {
            Ok(response) => match response.json::<JwkSet>().await {
                Ok(set) => Some(set.keys),
                Err(e) => {
                    error!(url = %self.url, "Failed to parse JWKS: {}", e);
                    None
                }
            },
            Err(e) => {
                error!(url = %self.url, "Failed to fetch JWKS: {}", e);
                None
            }
        }
    }
}

fn pick(keys: Vec<Jwk>, kid: &str) -> Option<Jwk> {
    keys.into_iter().find(|k| k.kid == kid)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{routing::get, Json, Router};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn key(kid: &str) -> Jwk {
        Jwk {
            kid: kid.to_string(),
            kty: "RSA".into(),
            alg: Some("RS256".into()),
            key_use: Some("sig".into()),
            n: "AQAB".into(),
            e: "AQAB".into(),
        }
    }

    async fn serve_keys(hits: Arc<AtomicUsize>) -> String {
        let app = Router::new().route(
            "/jwks.json",
            get(move || {
                let hits = hits.clone();
                async move {
                    hits.fetch_add(1, Ordering::SeqCst);
                    Json(JwkSet {
                        keys: vec![key("served")],
                    })
                }
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}/jwks.json")
    }

    #[tokio::test]
    async fn fetches_once_within_ttl() {
        let hits = Arc::new(AtomicUsize::new(0));
        let cache = JwksCache::new(serve_keys(hits.clone()).await, Duration::from_secs(60));

        assert!(cache.find("served").await.is_some());
        assert!(cache.find("served").await.is_some());
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn unknown_kid_refetches_once() {
        let hits = Arc::new(AtomicUsize::new(0));
        let cache = JwksCache::new(serve_keys(hits.clone()).await, Duration::from_secs(60));
        cache.preload(vec![key("old")]).await;

        assert!(cache.find("old").await.is_some());
        assert_eq!(hits.load(Ordering::SeqCst), 0);

        assert!(cache.find("served").await.is_some());
        assert_eq!(hits.load(Ordering::SeqCst), 1);

        assert!(cache.find("nope").await.is_none());
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn expired_entries_are_refreshed() {
        let hits = Arc::new(AtomicUsize::new(0));
        let cache = JwksCache::new(serve_keys(hits.clone()).await, Duration::ZERO);
        cache.find("served").await;
        cache.find("served").await;
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn non_rsa_keys_are_rejected() {
        let mut jwk = key("ec");
        jwk.kty = "EC".into();
        assert!(jwk.decoding_key().is_none());
    }
}
