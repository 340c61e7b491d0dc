use axum::{
    async_trait,
    extract::{FromRequestParts, Request, State},
    http::{header::AUTHORIZATION, request::Parts},
    middleware::Next,
    response::Response,
};
use edu_auth::{bearer_token, CurrentUser};
use edu_metrics::TracingService;
use edu_models::EduError;
use std::time::Instant;

use crate::error::ApiError;
use crate::state::AppState;

/// Caller identity from a verified `Authorization: Bearer` token.
#[derive(Debug, Clone)]
pub struct AuthUser(pub CurrentUser);

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let result = match parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(bearer_token)
        {
            Some(token) => state.auth.authenticate(token).await,
            None => Err(EduError::MissingToken),
        };

        result.map(AuthUser).map_err(|e| {
            TracingService::log_auth_failure(&e);
            state.metrics.record_auth_failure(e.error_type());
            ApiError(e)
        })
    }
}

/// Counts every request by method and status and records its latency.
pub async fn track_metrics(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let method = request.method().to_string();
    let started = Instant::now();
    let response = next.run(request).await;
    state.metrics.record_request(
        &method,
        response.status().as_u16(),
        started.elapsed().as_secs_f64() * 1000.0,
    );
    response
}
