use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use edu_models::{AuthConfig, EduError};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, decode_header, Algorithm, Validation};
use serde_json::Value;
use std::time::Duration;
use tracing::{error, warn};

use crate::jwks::JwksCache;
use crate::user::CurrentUser;

/// Token from an `Authorization: Bearer <token>` header value.
pub fn bearer_token(header: &str) -> Option<&str> {
    header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Payload of a JWT without any verification.
pub fn decode_unverified_claims(token: &str) -> Result<Value, EduError> {
    let malformed = |reason: &str| EduError::MalformedToken {
        reason: reason.to_string(),
    };
    let mut parts = token.split('.');
    let (Some(_header), Some(payload), Some(_signature), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(malformed("Not enough segments"));
    };
    let bytes = URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .map_err(|_| malformed("Invalid payload padding"))?;
    let claims: Value =
        serde_json::from_slice(&bytes).map_err(|_| malformed("Invalid payload string"))?;
    if !claims.is_object() {
        return Err(malformed("Invalid payload string: must be a json object"));
    }
    Ok(claims)
}

fn map_jwt_error(err: jsonwebtoken::errors::Error) -> EduError {
    match err.kind() {
        ErrorKind::ExpiredSignature => EduError::TokenExpired,
        ErrorKind::InvalidAudience => EduError::InvalidAudience,
        ErrorKind::InvalidIssuer => EduError::InvalidIssuer,
        _ => EduError::InvalidToken {
            reason: err.to_string(),
        },
    }
}

fn invalid(reason: impl Into<String>) -> EduError {
    EduError::InvalidToken {
        reason: reason.into(),
    }
}

/// Verifies identity provider tokens (ID and access tokens) against the
/// provider's published key set.
#[derive(Debug)]
pub struct Authenticator {
    jwks: Option<JwksCache>,
    issuer: Option<String>,
    app_client_id: Option<String>,
    leeway_secs: u64,
    allow_insecure: bool,
}

impl Authenticator {
    pub fn from_config(config: &AuthConfig) -> Self {
        let jwks = config.resolved_jwks_url().map(|url| {
            JwksCache::new(url, Duration::from_secs(config.jwks_cache_ttl_secs))
        });
        if jwks.is_none() && config.allow_insecure {
            warn!("No key set configured: tokens will be accepted WITHOUT signature verification");
        }
        Self {
            jwks,
            issuer: config.resolved_issuer(),
            app_client_id: config
                .app_client_id
                .clone()
                .filter(|id| !id.trim().is_empty()),
            leeway_secs: config.leeway_secs,
            allow_insecure: config.allow_insecure,
        }
    }

    pub fn jwks(&self) -> Option<&JwksCache> {
        self.jwks.as_ref()
    }

    pub async fn authenticate(&self, token: &str) -> Result<CurrentUser, EduError> {
        let Some(jwks) = &self.jwks else {
            if !self.allow_insecure {
                return Err(EduError::AuthNotConfigured);
            }
            let claims = decode_unverified_claims(token)?;
            warn!("JWT verification in INSECURE mode - not for production!");
            return CurrentUser::from_claims(token, &claims);
        };

        let claims = self.verify(jwks, token).await.map_err(|e| {
            if matches!(e, EduError::InvalidToken { .. }) {
                error!("Token verification failed: {}", e);
            }
            e
        })?;
        CurrentUser::from_claims(token, &claims)
    }

    async fn verify(&self, jwks: &JwksCache, token: &str) -> Result<Value, EduError> {
        let header =
            decode_header(token).map_err(|e| invalid(format!("Invalid token header: {e}")))?;
        let kid = header
            .kid
            .ok_or_else(|| invalid("Token missing kid in header"))?;

        let key = jwks
            .find(&kid)
            .await
            .and_then(|jwk| jwk.decoding_key())
            .ok_or_else(|| invalid("Public key not found for kid"))?;

        let token_use = decode_unverified_claims(token)
            .ok()
            .and_then(|claims| claims.get("token_use")?.as_str().map(str::to_string));

        let mut validation = Validation::new(Algorithm::RS256);
        validation.leeway = self.leeway_secs;
        if let Some(issuer) = &self.issuer {
            validation.set_issuer(&[issuer]);
        }
        match (token_use.as_deref(), &self.app_client_id) {
            (Some("id"), Some(client_id)) => validation.set_audience(&[client_id]),
            _ => validation.validate_aud = false,
        }

        let claims = decode::<Value>(token, &key, &validation)
            .map_err(map_jwt_error)?
            .claims;

        if token_use.as_deref() == Some("access") {
            if let (Some(expected), Some(actual)) = (
                &self.app_client_id,
                claims.get("client_id").and_then(Value::as_str),
            ) {
                if actual != expected {
                    return Err(EduError::InvalidAudience);
                }
            }
        }

        if let Some(token_use) = &token_use {
            if token_use != "id" && token_use != "access" {
                return Err(invalid(format!("Invalid token_use: {token_use}")));
            }
        }

        Ok(claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jwks::JwkSet;
    use jsonwebtoken::{encode, EncodingKey, Header};
    use serde_json::json;

    const TEST_KEY_PEM: &str = include_str!("../../testsupport/fixtures/test_rsa.pem");
    const TEST_JWKS: &str = include_str!("../../testsupport/fixtures/test_jwks.json");
    const KID: &str = "edu-test-key";
    const ISSUER: &str = "https://cognito-idp.ap-southeast-1.amazonaws.com/pool";

    fn now() -> i64 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_secs() as i64
    }

    fn sign(kid: Option<&str>, claims: &Value) -> String {
        let mut header = Header::new(Algorithm::RS256);
        header.kid = kid.map(str::to_string);
        let key = EncodingKey::from_rsa_pem(TEST_KEY_PEM.as_bytes()).unwrap();
        encode(&header, claims, &key).unwrap()
    }

    fn id_claims() -> Value {
        json!({
            "sub": "user-1",
            "email": "lan@example.com",
            "token_use": "id",
            "aud": "client-1",
            "iss": ISSUER,
            "exp": now() + 3600,
        })
    }

    async fn authenticator() -> Authenticator {
        let config = AuthConfig {
            user_pool_id: Some("pool".into()),
            app_client_id: Some("client-1".into()),
            // Unreachable so that unknown kids cannot be resolved remotely.
            jwks_url: Some("http://127.0.0.1:9/jwks.json".into()),
            ..AuthConfig::default()
        };
        let auth = Authenticator::from_config(&config);
        let set: JwkSet = serde_json::from_str(TEST_JWKS).unwrap();
        auth.jwks().unwrap().preload(set.keys).await;
        auth
    }

    #[test]
    fn bearer_prefix_is_required() {
        assert_eq!(bearer_token("Bearer abc"), Some("abc"));
        assert_eq!(bearer_token("Basic abc"), None);
        assert_eq!(bearer_token("Bearer "), None);
    }

    #[tokio::test]
    async fn valid_id_token() {
        let auth = authenticator().await;
        let user = auth.authenticate(&sign(Some(KID), &id_claims())).await.unwrap();
        assert_eq!(user.user_id, "user-1");
        assert_eq!(user.email.as_deref(), Some("lan@example.com"));
    }

    #[tokio::test]
    async fn expired_token() {
        let auth = authenticator().await;
        let mut claims = id_claims();
        claims["exp"] = json!(now() - 600);
        let err = auth.authenticate(&sign(Some(KID), &claims)).await.unwrap_err();
        assert!(matches!(err, EduError::TokenExpired));
    }

    #[tokio::test]
    async fn audience_and_issuer_mismatch() {
        let auth = authenticator().await;

        let mut claims = id_claims();
        claims["aud"] = json!("someone-else");
        let err = auth.authenticate(&sign(Some(KID), &claims)).await.unwrap_err();
        assert!(matches!(err, EduError::InvalidAudience));

        let mut claims = id_claims();
        claims["iss"] = json!("https://evil.example");
        let err = auth.authenticate(&sign(Some(KID), &claims)).await.unwrap_err();
        assert!(matches!(err, EduError::InvalidIssuer));
    }

    #[tokio::test]
    async fn access_token_client_id_must_match() {
        let auth = authenticator().await;
        let claims = json!({
            "sub": "user-1",
            "token_use": "access",
            "client_id": "client-1",
            "iss": ISSUER,
            "exp": now() + 3600,
        });
        assert!(auth.authenticate(&sign(Some(KID), &claims)).await.is_ok());

        let mut claims = claims;
        claims["client_id"] = json!("other-client");
        let err = auth.authenticate(&sign(Some(KID), &claims)).await.unwrap_err();
        assert!(matches!(err, EduError::InvalidAudience));
    }

    #[tokio::test]
    async fn rejects_missing_kid_unknown_kid_and_bad_token_use() {
        let auth = authenticator().await;

        let err = auth.authenticate(&sign(None, &id_claims())).await.unwrap_err();
        assert!(matches!(err, EduError::InvalidToken { .. }));

        let err = auth
            .authenticate(&sign(Some("rotated"), &id_claims()))
            .await
            .unwrap_err();
        assert!(matches!(err, EduError::InvalidToken { .. }));

        let mut claims = id_claims();
        claims["token_use"] = json!("refresh");
        let err = auth.authenticate(&sign(Some(KID), &claims)).await.unwrap_err();
        assert!(matches!(err, EduError::InvalidToken { .. }));

        let err = auth.authenticate("not-a-jwt").await.unwrap_err();
        assert!(matches!(err, EduError::InvalidToken { .. }));
    }

    #[tokio::test]
    async fn unconfigured_key_set() {
        let auth = Authenticator::from_config(&AuthConfig::default());
        let err = auth.authenticate("a.b.c").await.unwrap_err();
        assert!(matches!(err, EduError::AuthNotConfigured));
        assert_eq!(err.http_status(), 500);
    }

    #[tokio::test]
    async fn insecure_mode_decodes_without_verification() {
        let auth = Authenticator::from_config(&AuthConfig {
            allow_insecure: true,
            ..AuthConfig::default()
        });
        let payload = URL_SAFE_NO_PAD.encode(br#"{"sub":"dev-user","email":"dev@example.com"}"#);
        let token = format!("eyJhbGciOiJub25lIn0.{payload}.");
        let user = auth.authenticate(&token).await.unwrap();
        assert_eq!(user.user_id, "dev-user");

        let err = auth.authenticate("garbage").await.unwrap_err();
        assert!(matches!(err, EduError::MalformedToken { .. }));
        assert_eq!(err.http_status(), 401);
    }
}
