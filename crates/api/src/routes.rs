use axum::{
    routing::{delete, get, post},
    Router,
};

use crate::handlers::{lessons, series, system, tracking, users};
use crate::state::AppState;

pub fn create_router() -> Router<AppState> {
    Router::new()
        // Service
        .route("/", get(system::root))
        .route("/health", get(system::health_check))
        .route("/metrics", get(system::metrics))
        .route("/api/me-test", get(system::me_test))
        .nest("/api/v1", api_v1())
}

fn api_v1() -> Router<AppState> {
    Router::new()
        // Users
        .route(
            "/users/profile",
            post(users::create_profile).get(users::current_profile),
        )
        .route("/users/sync", post(users::sync_user))
        .route("/users/:user_id", get(users::get_user).put(users::update_user))
        // Series
        .route("/series", post(series::create_serie).get(series::list_series))
        .route("/series/subscriptions", get(series::subscribed_series))
        .route("/series/me", get(series::my_series))
        .route("/series/search", get(series::search_series))
        .route(
            "/series/:serie_id",
            get(series::get_serie)
                .patch(series::update_serie)
                .delete(series::delete_serie),
        )
        .route("/series/:serie_id/subscribe", post(series::subscribe))
        .route("/series/:serie_id/unsubscribe", post(series::unsubscribe))
        .route("/series/:serie_id/notify", post(series::notify_subscribers))
        // Lessons
        .route(
            "/series/:serie_id/lessons",
            post(lessons::create_lesson).get(lessons::list_lessons),
        )
        .route(
            "/series/:serie_id/lessons/:lesson_id",
            get(lessons::get_lesson)
                .patch(lessons::update_lesson)
                .delete(lessons::delete_lesson),
        )
        .route(
            "/series/:serie_id/lessons/:lesson_id/documents",
            delete(lessons::delete_document),
        )
        // Tracking
        .route("/tracking/lesson/enter", post(tracking::enter_lesson))
        .route("/tracking/lesson/exit", post(tracking::exit_lesson))
        .route("/tracking/lesson/focus", post(tracking::focus_lesson))
        .route(
            "/tracking/user/:user_id/current",
            get(tracking::current_lesson),
        )
}

pub fn build_router(state: AppState) -> Router {
    create_router().with_state(state)
}
