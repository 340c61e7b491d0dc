use axum::{
    extract::{rejection::QueryRejection, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use edu_models::{
    AnnouncementReport, AnnouncementRequest, EduError, SearchQuery, Serie, SerieDraft,
    SerieListQuery, SeriePatch, SubscriptionOutcome, UnsubscriptionOutcome,
};
use serde_json::json;
use tracing::instrument;

use crate::error::{ApiError, ApiResult};
use crate::middleware::AuthUser;
use crate::state::AppState;
use crate::submission::Submission;

const THUMBNAIL_FIELD: &str = "serie_thumbnail";

fn query<T>(query: Result<Query<T>, QueryRejection>) -> ApiResult<T> {
    query
        .map(|Query(q)| q)
        .map_err(|e| ApiError(EduError::invalid(e.body_text())))
}

fn caller_email(caller: &edu_auth::CurrentUser) -> ApiResult<&str> {
    caller
        .email
        .as_deref()
        .ok_or_else(|| ApiError(EduError::invalid("Missing user email in token")))
}

#[utoipa::path(
    post,
    path = "/api/v1/series",
    tag = "series",
    request_body = SerieDraft,
    responses((status = 201, body = Serie), (status = 400, description = "Invalid series"))
)]
#[instrument(skip_all)]
pub async fn create_serie(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    body: Submission,
) -> ApiResult<Response> {
    let draft: SerieDraft = body.parse()?;
    let thumbnail = body.file(THUMBNAIL_FIELD);
    let serie = state
        .platform
        .create_serie(&draft, &caller.user_id, thumbnail.as_ref())
        .await?;
    state.metrics.record_serie_created();
    Ok((StatusCode::CREATED, Json(serie)).into_response())
}

#[utoipa::path(
    get,
    path = "/api/v1/series",
    tag = "series",
    params(
        ("page" = Option<u32>, Query, description = "Page number, starting at 1"),
        ("limit" = Option<u32>, Query, description = "Page size, 1 to 100"),
        ("published" = Option<bool>, Query, description = "Only published or unpublished series")
    ),
    responses((status = 200, body = [Serie]), (status = 400, description = "Bad paging"))
)]
#[instrument(skip_all)]
pub async fn list_series(
    State(state): State<AppState>,
    _user: AuthUser,
    params: Result<Query<SerieListQuery>, QueryRejection>,
) -> ApiResult<Json<Vec<Serie>>> {
    let params = query(params)?;
    Ok(Json(state.platform.list_series(&params).await?))
}

#[utoipa::path(get, path = "/api/v1/series/subscriptions", tag = "series", responses((status = 200, body = [Serie])))]
#[instrument(skip_all)]
pub async fn subscribed_series(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
) -> ApiResult<Json<Vec<Serie>>> {
    Ok(Json(state.platform.subscribed_series(&caller.user_id).await?))
}

#[utoipa::path(get, path = "/api/v1/series/me", tag = "series", responses((status = 200, body = [Serie])))]
#[instrument(skip_all)]
pub async fn my_series(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
) -> ApiResult<Json<Vec<Serie>>> {
    Ok(Json(state.platform.series_by_owner(&caller.user_id).await?))
}

#[utoipa::path(
    get,
    path = "/api/v1/series/search",
    tag = "series",
    params(("keyword" = String, Query, description = "Case-insensitive title fragment")),
    responses((status = 200, body = [Serie]), (status = 400, description = "Missing keyword"))
)]
#[instrument(skip_all)]
pub async fn search_series(
    State(state): State<AppState>,
    params: Result<Query<SearchQuery>, QueryRejection>,
) -> ApiResult<Json<Vec<Serie>>> {
    let params = query(params)?;
    Ok(Json(
        state.platform.search_series(params.keyword.as_deref()).await?,
    ))
}

#[utoipa::path(
    get,
    path = "/api/v1/series/{serie_id}",
    tag = "series",
    params(("serie_id" = String, Path, description = "Series id")),
    responses((status = 200, body = Serie), (status = 404, description = "Serie not found"))
)]
#[instrument(skip(state))]
pub async fn get_serie(
    State(state): State<AppState>,
    Path(serie_id): Path<String>,
) -> ApiResult<Json<Serie>> {
    Ok(Json(state.platform.get_serie(&serie_id).await?))
}

#[utoipa::path(
    patch,
    path = "/api/v1/series/{serie_id}",
    tag = "series",
    params(("serie_id" = String, Path, description = "Series id")),
    request_body = SeriePatch,
    responses(
        (status = 200, body = Serie),
        (status = 403, description = "Not the owner"),
        (status = 404, description = "Serie not found")
    )
)]
#[instrument(skip(state, caller, body))]
pub async fn update_serie(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    Path(serie_id): Path<String>,
    body: Submission,
) -> ApiResult<Json<Serie>> {
    let patch: SeriePatch = body.parse()?;
    let thumbnail = body.file(THUMBNAIL_FIELD);
    state
        .platform
        .update_serie(&serie_id, &patch, &caller.user_id, thumbnail.as_ref())
        .await?
        .map(Json)
        .ok_or_else(|| ApiError(EduError::SerieNotFound { serie_id }))
}

#[utoipa::path(
    delete,
    path = "/api/v1/series/{serie_id}",
    tag = "series",
    params(("serie_id" = String, Path, description = "Series id")),
    responses(
        (status = 200, description = "Serie deleted"),
        (status = 400, description = "Serie still has lessons"),
        (status = 404, description = "Serie not found")
    )
)]
#[instrument(skip(state, caller))]
pub async fn delete_serie(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    Path(serie_id): Path<String>,
) -> ApiResult<Response> {
    state
        .platform
        .delete_serie(&serie_id, &caller.user_id)
        .await?;
    Ok(Json(json!({"success": true, "message": "Serie deleted successfully"})).into_response())
}

#[utoipa::path(
    post,
    path = "/api/v1/series/{serie_id}/subscribe",
    tag = "series",
    params(("serie_id" = String, Path, description = "Series id")),
    responses((status = 200, body = SubscriptionOutcome), (status = 404, description = "Serie or user not found"))
)]
#[instrument(skip(state, caller))]
pub async fn subscribe(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    Path(serie_id): Path<String>,
) -> ApiResult<Json<SubscriptionOutcome>> {
    let email = caller_email(&caller)?;
    Ok(Json(
        state
            .platform
            .subscribe_serie(&serie_id, &caller.user_id, email)
            .await?,
    ))
}

#[utoipa::path(
    post,
    path = "/api/v1/series/{serie_id}/unsubscribe",
    tag = "series",
    params(("serie_id" = String, Path, description = "Series id")),
    responses((status = 200, body = UnsubscriptionOutcome), (status = 404, description = "Serie or user not found"))
)]
#[instrument(skip(state, caller))]
pub async fn unsubscribe(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    Path(serie_id): Path<String>,
) -> ApiResult<Json<UnsubscriptionOutcome>> {
    let email = caller_email(&caller)?;
    Ok(Json(
        state
            .platform
            .unsubscribe_serie(&serie_id, &caller.user_id, email)
            .await?,
    ))
}

#[utoipa::path(
    post,
    path = "/api/v1/series/{serie_id}/notify",
    tag = "series",
    params(("serie_id" = String, Path, description = "Series id")),
    request_body = AnnouncementRequest,
    responses(
        (status = 200, body = AnnouncementReport),
        (status = 400, description = "Missing title or message"),
        (status = 403, description = "Not the owner")
    )
)]
#[instrument(skip(state, caller, body))]
pub async fn notify_subscribers(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    Path(serie_id): Path<String>,
    body: Submission,
) -> ApiResult<Json<AnnouncementReport>> {
    let request: AnnouncementRequest = body.parse()?;
    let report = state
        .platform
        .notify_subscribers(&serie_id, &caller.user_id, &request)
        .await?;
    state
        .metrics
        .record_notifications_sent(report.recipient_count.unwrap_or(0));
    Ok(Json(report))
}
