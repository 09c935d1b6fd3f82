use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use service_core::error::AppError;
use validator::Validate;

use crate::{
    dtos::{
        admin::{CreateUserRequest, PaginationQuery, UserResponse},
        ErrorResponse, MessageResponse,
    },
    middleware::AuthSession,
    models::Tier,
    services::UserDraft,
    utils::{Password, ValidatedJson},
    AppState,
};

const DEFAULT_PAGE_SIZE: i64 = 10;

/// List users with their department and job group names
#[utoipa::path(
    get,
    path = "/api/v1/admin/users",
    params(PaginationQuery),
    responses(
        (status = 200, description = "Page of users", body = [UserResponse]),
        (status = 401, description = "Not authenticated", body = ErrorResponse),
        (status = 403, description = "Not an admin", body = ErrorResponse)
    ),
    tag = "Admin",
    security(("bearer_auth" = []))
)]
pub async fn list_users(
    State(state): State<AppState>,
    Query(query): Query<PaginationQuery>,
) -> Result<impl IntoResponse, AppError> {
    query.validate()?;

    let users = state
        .directory
        .list_users(
            query.skip.unwrap_or(0),
            query.limit.unwrap_or(DEFAULT_PAGE_SIZE),
        )
        .await?;

    Ok(Json(
        users
            .into_iter()
            .map(UserResponse::from)
            .collect::<Vec<_>>(),
    ))
}

/// Create a user
#[utoipa::path(
    post,
    path = "/api/v1/admin/users",
    request_body = CreateUserRequest,
    responses(
        (status = 201, description = "User created", body = UserResponse),
        (status = 400, description = "Employee id already registered", body = ErrorResponse),
        (status = 404, description = "Unknown department or job group", body = ErrorResponse),
        (status = 422, description = "Validation error", body = ErrorResponse)
    ),
    tag = "Admin",
    security(("bearer_auth" = []))
)]
pub async fn create_user(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<CreateUserRequest>,
) -> Result<impl IntoResponse, AppError> {
    let tier = Tier::from_marker(&req.permission).ok_or_else(|| {
        AppError::BadRequest(anyhow::anyhow!("Unknown permission marker"))
    })?;

    let user = state
        .directory
        .create_user(UserDraft {
            employee_id: req.employee_id,
            name: req.name,
            password: Password::new(req.password),
            department_id: req.department_id,
            job_group_id: req.job_group_id,
            tier,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(UserResponse::from(user))))
}

/// Look up a user by employee id
#[utoipa::path(
    get,
    path = "/api/v1/admin/users/{employee_id}",
    params(("employee_id" = String, Path, description = "Employee id")),
    responses(
        (status = 200, description = "User found", body = UserResponse),
        (status = 404, description = "No such user", body = ErrorResponse)
    ),
    tag = "Admin",
    security(("bearer_auth" = []))
)]
pub async fn get_user(
    State(state): State<AppState>,
    Path(employee_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let user = state.directory.profile_by_employee_id(&employee_id).await?;
    Ok(Json(UserResponse::from(user)))
}

/// Delete a user together with their token pair and experience entries
#[utoipa::path(
    delete,
    path = "/api/v1/admin/users/{employee_id}",
    params(("employee_id" = String, Path, description = "Employee id")),
    responses(
        (status = 200, description = "User deleted", body = MessageResponse),
        (status = 404, description = "No such user", body = ErrorResponse)
    ),
    tag = "Admin",
    security(("bearer_auth" = []))
)]
pub async fn delete_user(
    State(state): State<AppState>,
    Path(employee_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    state.directory.delete_user(&employee_id).await?;
    Ok(Json(MessageResponse::new("User deleted")))
}

/// Pin an employee to the calling admin's favorites
#[utoipa::path(
    post,
    path = "/api/v1/admin/users/{employee_id}/favorite",
    params(("employee_id" = String, Path, description = "Employee id")),
    responses(
        (status = 201, description = "Favorite added", body = MessageResponse),
        (status = 400, description = "Already a favorite", body = ErrorResponse),
        (status = 404, description = "No such user", body = ErrorResponse)
    ),
    tag = "Admin",
    security(("bearer_auth" = []))
)]
pub async fn add_favorite(
    State(state): State<AppState>,
    AuthSession(session): AuthSession,
    Path(employee_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    state
        .directory
        .add_favorite(session.principal_id(), &employee_id)
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(MessageResponse::new("Favorite added successfully")),
    ))
}

#[utoipa::path(
    delete,
    path = "/api/v1/admin/users/{employee_id}/favorite",
    params(("employee_id" = String, Path, description = "Employee id")),
    responses(
        (status = 200, description = "Favorite removed", body = MessageResponse),
        (status = 404, description = "No such user or not a favorite", body = ErrorResponse)
    ),
    tag = "Admin",
    security(("bearer_auth" = []))
)]
pub async fn remove_favorite(
    State(state): State<AppState>,
    AuthSession(session): AuthSession,
    Path(employee_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    state
        .directory
        .remove_favorite(session.principal_id(), &employee_id)
        .await?;
    Ok(Json(MessageResponse::new("Favorite removed")))
}

/// The calling admin's favorite employees, oldest first
#[utoipa::path(
    get,
    path = "/api/v1/admin/favorites",
    responses(
        (status = 200, description = "Favorite employees", body = [UserResponse]),
        (status = 401, description = "Not authenticated", body = ErrorResponse)
    ),
    tag = "Admin",
    security(("bearer_auth" = []))
)]
pub async fn list_favorites(
    State(state): State<AppState>,
    AuthSession(session): AuthSession,
) -> Result<impl IntoResponse, AppError> {
    let favorites = state.directory.list_favorites(session.principal_id()).await?;
    Ok(Json(
        favorites
            .into_iter()
            .map(UserResponse::from)
            .collect::<Vec<_>>(),
    ))
}
