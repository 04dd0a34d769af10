use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};

use crate::auth::{AuthUser, Capability, UserSummary};
use crate::errors::ServiceError;
use crate::services::users::{CreateUserRequest, EditUserRequest, UserListing};
use crate::{ApiResponse, ApiResult, AppState};

#[utoipa::path(
    get,
    path = "/api/v1/admin/users",
    summary = "List accounts",
    description = "Newest accounts first, with the number awaiting activation.",
    responses(
        (status = 200, description = "Accounts", body = ApiResponse<UserListing>),
        (status = 403, description = "Admin only", body = crate::errors::ErrorResponse),
    ),
    security(("bearer_auth" = [])),
    tag = "admin"
)]
pub async fn list_users(
    State(state): State<AppState>,
    Extension(actor): Extension<AuthUser>,
) -> ApiResult<UserListing> {
    let listing = state.services.users.list(&actor).await?;
    Ok(Json(ApiResponse::success(listing)))
}

#[utoipa::path(
    post,
    path = "/api/v1/admin/users",
    summary = "Create an account",
    request_body = CreateUserRequest,
    responses(
        (status = 201, description = "Created", body = ApiResponse<UserSummary>),
        (status = 409, description = "Username taken", body = crate::errors::ErrorResponse),
    ),
    security(("bearer_auth" = [])),
    tag = "admin"
)]
pub async fn create_user(
    State(state): State<AppState>,
    Extension(actor): Extension<AuthUser>,
    Json(payload): Json<CreateUserRequest>,
) -> Result<(StatusCode, Json<ApiResponse<UserSummary>>), ServiceError> {
    actor.require(Capability::ManageUsers)?;
    let user = state.services.users.create(payload).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(user))))
}

#[utoipa::path(
    post,
    path = "/api/v1/admin/users/{id}/toggle",
    summary = "Activate or deactivate an account",
    params(("id" = i64, Path, description = "User id")),
    responses(
        (status = 200, description = "Activation flipped", body = ApiResponse<UserSummary>),
        (status = 404, description = "No such user", body = crate::errors::ErrorResponse),
    ),
    security(("bearer_auth" = [])),
    tag = "admin"
)]
pub async fn toggle_user(
    State(state): State<AppState>,
    Extension(actor): Extension<AuthUser>,
    Path(id): Path<i64>,
) -> ApiResult<UserSummary> {
    let user = state.services.users.toggle_active(&actor, id).await?;
    let message = format!(
        "{} {}",
        user.username,
        if user.is_active { "activated" } else { "deactivated" }
    );
    Ok(Json(ApiResponse::success(user).with_message(message)))
}

#[utoipa::path(
    put,
    path = "/api/v1/admin/users/{id}",
    summary = "Edit an account",
    params(("id" = i64, Path, description = "User id")),
    request_body = EditUserRequest,
    responses(
        (status = 200, description = "Updated", body = ApiResponse<UserSummary>),
        (status = 400, description = "Invalid fields", body = crate::errors::ErrorResponse),
        (status = 409, description = "Username taken", body = crate::errors::ErrorResponse),
    ),
    security(("bearer_auth" = [])),
    tag = "admin"
)]
pub async fn edit_user(
    State(state): State<AppState>,
    Extension(actor): Extension<AuthUser>,
    Path(id): Path<i64>,
    Json(payload): Json<EditUserRequest>,
) -> ApiResult<UserSummary> {
    let user = state.services.users.edit(&actor, id, payload).await?;
    Ok(Json(ApiResponse::success(user).with_message("User updated".to_string())))
}
