use axum::{
    extract::State,
    http::{header::CONTENT_TYPE, StatusCode},
    response::{IntoResponse, Json, Response},
};
use serde_json::{json, Value};
use tracing::error;

use crate::middleware::AuthUser;
use crate::state::AppState;

#[utoipa::path(get, path = "/", tag = "system", responses((status = 200, description = "Welcome message")))]
pub async fn root() -> Json<Value> {
    Json(json!({"message": "Welcome to EduConnect API"}))
}

#[utoipa::path(get, path = "/health", tag = "system", responses((status = 200, description = "Service is up")))]
pub async fn health_check() -> Json<Value> {
    Json(json!({"status": "ok"}))
}

#[utoipa::path(get, path = "/metrics", tag = "system", responses((status = 200, description = "Prometheus text exposition")))]
pub async fn metrics(State(state): State<AppState>) -> Response {
    match state.metrics.get_prometheus_metrics() {
        Ok(text) => ([(CONTENT_TYPE, "text/plain; version=0.0.4")], text).into_response(),
        Err(e) => {
            error!("Failed to render metrics: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

#[utoipa::path(
    get,
    path = "/api/me-test",
    tag = "system",
    responses((status = 200, description = "The authenticated caller"), (status = 401, description = "No token"))
)]
pub async fn me_test(AuthUser(user): AuthUser) -> Json<Value> {
    Json(json!({"status": "authenticated", "user": user}))
}
