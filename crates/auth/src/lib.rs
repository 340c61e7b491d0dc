//! Bearer-token authentication for identity-provider issued JWTs.

pub mod jwks;
pub mod user;
pub mod verifier;

pub use jwks::{Jwk, JwkSet, JwksCache};
pub use user::CurrentUser;
pub use verifier::{bearer_token, decode_unverified_claims, Authenticator};
