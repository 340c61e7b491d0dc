use chrono::Utc;
use edu_auth::JwkSet;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde_json::{json, Value};

pub const TEST_KID: &str = "edu-test-key";
pub const TEST_CLIENT_ID: &str = "client-1";
/// Issuer derived from the `pool` user pool in the default region.
pub const TEST_ISSUER: &str = "https://cognito-idp.ap-southeast-1.amazonaws.com/pool";

const TEST_KEY_PEM: &str = include_str!("../fixtures/test_rsa.pem");
const TEST_JWKS: &str = include_str!("../fixtures/test_jwks.json");

/// Public half of the test signing key.
pub fn test_jwk_set() -> JwkSet {
    serde_json::from_str(TEST_JWKS).expect("test key set fixture is valid JSON")
}

/// Signs `claims` with the test key.
pub fn mint_token(claims: &Value) -> String {
    let mut header = Header::new(Algorithm::RS256);
    header.kid = Some(TEST_KID.to_string());
    let key = EncodingKey::from_rsa_pem(TEST_KEY_PEM.as_bytes())
        .expect("test signing key fixture is valid PEM");
    encode(&header, claims, &key).expect("test claims can be signed")
}

pub fn id_claims(user_id: &str, email: &str) -> Value {
    json!({
        "sub": user_id,
        "email": email,
        "email_verified": true,
        "name": format!("User {user_id}"),
        "token_use": "id",
        "aud": TEST_CLIENT_ID,
        "iss": TEST_ISSUER,
        "iat": Utc::now().timestamp(),
        "exp": Utc::now().timestamp() + 3600,
    })
}

/// Valid ID token for `user_id`.
pub fn id_token_for(user_id: &str, email: &str) -> String {
    mint_token(&id_claims(user_id, email))
}

pub fn expired_token_for(user_id: &str, email: &str) -> String {
    let mut claims = id_claims(user_id, email);
    claims["exp"] = json!(Utc::now().timestamp() - 600);
    mint_token(&claims)
}
