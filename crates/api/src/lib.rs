pub mod error;
pub mod handlers;
pub mod middleware;
pub mod openapi;
pub mod response;
pub mod routes;
pub mod state;
pub mod submission;

pub use error::*;
pub use middleware::*;
pub use openapi::*;
pub use routes::*;
pub use state::*;
pub use submission::Submission;

use axum::extract::DefaultBodyLimit;
use axum::Router;
use std::future::Future;
use std::time::Duration;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    cors::CorsLayer,
    timeout::TimeoutLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::{info, Level};

/// Full application: API routes, API docs and the shared middleware stack.
pub fn build_app(state: AppState) -> Router {
    let timeout = Duration::from_secs(state.config.server.request_timeout_secs);
    build_app_with_timeout(state, timeout)
}

/// Same as [`build_app`] with an explicit per-request deadline.
pub fn build_app_with_timeout(state: AppState, timeout: Duration) -> Router {
    let body_size_limit = (state.config.server.max_request_body_size_mb * 1024 * 1024) as usize;

    Router::new()
        .merge(build_router(state.clone()))
        .merge(create_swagger_ui())
        .layer(axum::middleware::from_fn_with_state(state, track_metrics))
        .layer(
            ServiceBuilder::new()
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                        .on_response(DefaultOnResponse::new().level(Level::INFO)),
                )
                .layer(CorsLayer::permissive())
                .layer(TimeoutLayer::new(timeout))
                .layer(DefaultBodyLimit::max(body_size_limit)),
        )
}

/// Serves `app` until `shutdown` resolves, then drains in-flight requests.
pub async fn serve<F>(listener: TcpListener, app: Router, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    if let Ok(addr) = listener.local_addr() {
        info!("EduConnect API listening on {}", addr);
    }
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
}
