use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
};
use edu_control::LessonMedia;
use edu_models::{DeleteDocumentRequest, EduError, Lesson, LessonDraft, LessonPatch};
use serde_json::json;
use tracing::instrument;

use crate::error::{ApiError, ApiResult};
use crate::middleware::AuthUser;
use crate::response::cached_json;
use crate::state::AppState;
use crate::submission::Submission;

fn lesson_media(body: &Submission) -> LessonMedia {
    LessonMedia {
        video: body.file("lesson_video"),
        documents: body.files("lesson_documents"),
    }
}

#[utoipa::path(
    post,
    path = "/api/v1/series/{serie_id}/lessons",
    tag = "lessons",
    params(("serie_id" = String, Path, description = "Series id")),
    request_body = LessonDraft,
    responses(
        (status = 201, body = Lesson),
        (status = 403, description = "Not the owner of the series"),
        (status = 404, description = "Serie not found")
    )
)]
#[instrument(skip(state, caller, body))]
pub async fn create_lesson(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    Path(serie_id): Path<String>,
    body: Submission,
) -> ApiResult<Response> {
    let draft: LessonDraft = body.parse()?;
    let lesson = state
        .platform
        .create_lesson(&serie_id, &draft, &caller.user_id, &lesson_media(&body))
        .await?;
    state.metrics.record_lesson_created();
    Ok((StatusCode::CREATED, Json(lesson)).into_response())
}

#[utoipa::path(
    get,
    path = "/api/v1/series/{serie_id}/lessons",
    tag = "lessons",
    params(("serie_id" = String, Path, description = "Series id")),
    responses((status = 200, body = [Lesson]), (status = 304, description = "Not modified"))
)]
#[instrument(skip(state, _user, headers))]
pub async fn list_lessons(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(serie_id): Path<String>,
    headers: HeaderMap,
) -> ApiResult<Response> {
    let cached = state.platform.lessons_response(&serie_id).await?;
    Ok(cached_json(&headers, cached))
}

#[utoipa::path(
    get,
    path = "/api/v1/series/{serie_id}/lessons/{lesson_id}",
    tag = "lessons",
    params(("serie_id" = String, Path, description = "Series id"), ("lesson_id" = String, Path, description = "Lesson id")),
    responses(
        (status = 200, body = Lesson),
        (status = 304, description = "Not modified"),
        (status = 404, description = "Lesson not found")
    )
)]
#[instrument(skip(state, _user, headers))]
pub async fn get_lesson(
    State(state): State<AppState>,
    _user: AuthUser,
    Path((serie_id, lesson_id)): Path<(String, String)>,
    headers: HeaderMap,
) -> ApiResult<Response> {
    let cached = state
        .platform
        .lesson_response(&serie_id, &lesson_id)
        .await?;
    Ok(cached_json(&headers, cached))
}

#[utoipa::path(
    patch,
    path = "/api/v1/series/{serie_id}/lessons/{lesson_id}",
    tag = "lessons",
    params(("serie_id" = String, Path, description = "Series id"), ("lesson_id" = String, Path, description = "Lesson id")),
    request_body = LessonPatch,
    responses((status = 200, body = Lesson), (status = 404, description = "Lesson not found"))
)]
#[instrument(skip(state, caller, body))]
pub async fn update_lesson(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    Path((serie_id, lesson_id)): Path<(String, String)>,
    body: Submission,
) -> ApiResult<Json<Lesson>> {
    let patch: LessonPatch = body.parse()?;
    state
        .platform
        .update_lesson(
            &serie_id,
            &lesson_id,
            &patch,
            &caller.user_id,
            &lesson_media(&body),
        )
        .await?
        .map(Json)
        .ok_or_else(|| ApiError(EduError::LessonNotFound { lesson_id }))
}

#[utoipa::path(
    delete,
    path = "/api/v1/series/{serie_id}/lessons/{lesson_id}",
    tag = "lessons",
    params(("serie_id" = String, Path, description = "Series id"), ("lesson_id" = String, Path, description = "Lesson id")),
    responses((status = 200, description = "Lesson deleted"), (status = 404, description = "Lesson not found"))
)]
#[instrument(skip(state, caller))]
pub async fn delete_lesson(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    Path((serie_id, lesson_id)): Path<(String, String)>,
) -> ApiResult<Json<serde_json::Value>> {
    state
        .platform
        .delete_lesson(&serie_id, &lesson_id, &caller.user_id)
        .await?;
    Ok(Json(json!({"success": true, "message": "Lesson deleted successfully"})))
}

#[utoipa::path(
    delete,
    path = "/api/v1/series/{serie_id}/lessons/{lesson_id}/documents",
    tag = "lessons",
    params(("serie_id" = String, Path, description = "Series id"), ("lesson_id" = String, Path, description = "Lesson id")),
    request_body = DeleteDocumentRequest,
    responses(
        (status = 200, description = "Document removed"),
        (status = 400, description = "docUrl missing or not part of the lesson"),
        (status = 404, description = "Lesson not found")
    )
)]
#[instrument(skip(state, caller, body))]
pub async fn delete_document(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    Path((serie_id, lesson_id)): Path<(String, String)>,
    body: Submission,
) -> ApiResult<Json<serde_json::Value>> {
    let request: DeleteDocumentRequest = body.parse()?;
    state
        .platform
        .delete_document(
            &serie_id,
            &lesson_id,
            request.doc_url.as_deref(),
            &caller.user_id,
        )
        .await?;
    Ok(Json(json!({"success": true, "message": "Document deleted successfully"})))
}
