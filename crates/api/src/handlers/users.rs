use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use edu_models::{CreateUserRequest, SyncUserRequest, UpdateUserRequest, User};
use tracing::{info, instrument};

use crate::error::ApiResult;
use crate::middleware::AuthUser;
use crate::response::{envelope, envelope_with};
use crate::state::AppState;
use crate::submission::Submission;

#[utoipa::path(
    post,
    path = "/api/v1/users/profile",
    tag = "users",
    request_body = CreateUserRequest,
    responses(
        (status = 201, description = "Profile created", body = User),
        (status = 400, description = "userId missing"),
        (status = 409, description = "Profile already exists")
    )
)]
#[instrument(skip_all)]
pub async fn create_profile(
    State(state): State<AppState>,
    _user: AuthUser,
    body: Submission,
) -> ApiResult<Response> {
    let request: CreateUserRequest = body.parse()?;
    let user = state.platform.create_profile(&request).await?;
    info!(user_id = %user.id, "User profile created");
    Ok((
        StatusCode::CREATED,
        envelope_with(user, "User profile created successfully"),
    )
        .into_response())
}

#[utoipa::path(
    get,
    path = "/api/v1/users/profile",
    tag = "users",
    responses(
        (status = 200, description = "Profile of the caller", body = User),
        (status = 201, description = "Profile created from the token")
    )
)]
#[instrument(skip_all)]
pub async fn current_profile(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
) -> ApiResult<Response> {
    let (user, created) = state
        .platform
        .current_profile(&caller.user_id, caller.name.clone(), caller.email.clone())
        .await?;
    if created {
        return Ok((
            StatusCode::CREATED,
            envelope_with(user, "User profile created automatically"),
        )
            .into_response());
    }
    Ok(envelope(user).into_response())
}

#[utoipa::path(
    post,
    path = "/api/v1/users/sync",
    tag = "users",
    request_body = SyncUserRequest,
    responses((status = 200, description = "Profile synced from the token", body = User))
)]
#[instrument(skip_all)]
pub async fn sync_user(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    body: Submission,
) -> ApiResult<Response> {
    let extra: SyncUserRequest = body.parse()?;
    let user = state
        .platform
        .sync_user(&caller.user_id, caller.email.clone(), caller.name.clone(), extra)
        .await?;
    Ok(envelope_with(user, "User synced successfully").into_response())
}

#[utoipa::path(
    get,
    path = "/api/v1/users/{user_id}",
    tag = "users",
    params(("user_id" = String, Path, description = "Identity provider subject")),
    responses((status = 200, body = User), (status = 404, description = "User not found"))
)]
#[instrument(skip(state, _user))]
pub async fn get_user(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(user_id): Path<String>,
) -> ApiResult<Response> {
    let user = state.platform.get_user(&user_id).await?;
    Ok(envelope(user).into_response())
}

#[utoipa::path(
    put,
    path = "/api/v1/users/{user_id}",
    tag = "users",
    params(("user_id" = String, Path, description = "Identity provider subject")),
    request_body = UpdateUserRequest,
    responses(
        (status = 200, body = User),
        (status = 403, description = "Not your profile"),
        (status = 404, description = "User not found")
    )
)]
#[instrument(skip(state, caller, body))]
pub async fn update_user(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    Path(user_id): Path<String>,
    body: Submission,
) -> ApiResult<Response> {
    let fields: UpdateUserRequest = body.parse()?;
    let user = state
        .platform
        .update_user(&caller.user_id, &user_id, &fields)
        .await?;
    Ok(envelope_with(user, "User updated successfully").into_response())
}
