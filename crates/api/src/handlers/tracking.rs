//! Per-tab lesson tracking. These routes carry no authentication; the
//! front end reports the user id itself.

use axum::{
    extract::{Path, State},
    response::Json,
};
use edu_models::{ActiveLesson, CurrentLesson, EnterLessonRequest, TabRequest, TrackingAck};
use tracing::instrument;

use crate::error::ApiResult;
use crate::response::{ack, Ack};
use crate::state::AppState;
use crate::submission::Submission;

#[utoipa::path(
    post,
    path = "/api/v1/tracking/lesson/enter",
    tag = "tracking",
    request_body = EnterLessonRequest,
    responses((status = 200, description = "Current lesson set"), (status = 400, description = "Missing required fields"))
)]
#[instrument(skip_all)]
pub async fn enter_lesson(
    State(state): State<AppState>,
    body: Submission,
) -> ApiResult<Json<Ack<TrackingAck>>> {
    let request: EnterLessonRequest = body.parse()?;
    let tracked = state.platform.enter_lesson(request).await?;
    Ok(ack("Current lesson set successfully", Some(tracked)))
}

#[utoipa::path(
    post,
    path = "/api/v1/tracking/lesson/exit",
    tag = "tracking",
    request_body = TabRequest,
    responses((status = 200, description = "Tab removed"), (status = 400, description = "Missing required fields"))
)]
#[instrument(skip_all)]
pub async fn exit_lesson(
    State(state): State<AppState>,
    body: Submission,
) -> ApiResult<Json<Ack<()>>> {
    let request: TabRequest = body.parse()?;
    let outcome = state.platform.exit_lesson(request).await?;
    Ok(ack(outcome.message(), None))
}

#[utoipa::path(
    post,
    path = "/api/v1/tracking/lesson/focus",
    tag = "tracking",
    request_body = TabRequest,
    responses((status = 200, description = "Focus updated"), (status = 404, description = "Unknown user or tab"))
)]
#[instrument(skip_all)]
pub async fn focus_lesson(
    State(state): State<AppState>,
    body: Submission,
) -> ApiResult<Json<Ack<ActiveLesson>>> {
    let request: TabRequest = body.parse()?;
    let focused = state.platform.focus_lesson(request).await?;
    Ok(ack("Focus updated successfully", Some(focused)))
}

#[utoipa::path(
    get,
    path = "/api/v1/tracking/user/{user_id}/current",
    tag = "tracking",
    params(("user_id" = String, Path, description = "User id reported by the front end")),
    responses((status = 200, body = CurrentLesson))
)]
#[instrument(skip(state))]
pub async fn current_lesson(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> ApiResult<Json<CurrentLesson>> {
    Ok(Json(state.platform.current_lesson(&user_id).await?))
}
