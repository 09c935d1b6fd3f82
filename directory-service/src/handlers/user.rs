use axum::{
    extract::{Path, State},
    response::IntoResponse,
    Json,
};
use service_core::error::AppError;

use crate::{
    dtos::{
        admin::UserResponse,
        auth::{LoginForm, RefreshRequest, TokenResponse},
        experience::ExperienceSummaryResponse,
        ErrorResponse, MessageResponse,
    },
    middleware::AuthSession,
    models::{PrincipalKind, Tier},
    services::permission,
    utils::{Password, ValidatedForm, ValidatedJson},
    AppState,
};

/// Employee login with employee id and password (form encoded)
#[utoipa::path(
    post,
    path = "/api/v1/user/auth/login",
    request_body(content = LoginForm, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 200, description = "Login successful", body = TokenResponse),
        (status = 401, description = "Incorrect username or password", body = ErrorResponse),
        (status = 429, description = "Too many login attempts", body = ErrorResponse)
    ),
    tag = "User Authentication"
)]
pub async fn login(
    State(state): State<AppState>,
    ValidatedForm(form): ValidatedForm<LoginForm>,
) -> Result<impl IntoResponse, AppError> {
    let pair = state
        .sessions
        .login(PrincipalKind::User, &form.username, Password::new(form.password))
        .await?;
    Ok(Json(TokenResponse::bearer(
        pair,
        state.jwt.access_token_expiry_seconds(),
    )))
}

#[utoipa::path(
    post,
    path = "/api/v1/user/auth/refresh",
    request_body = RefreshRequest,
    responses(
        (status = 200, description = "Access token refreshed", body = TokenResponse),
        (status = 401, description = "Invalid, expired or superseded refresh token", body = ErrorResponse)
    ),
    tag = "User Authentication"
)]
pub async fn refresh(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<RefreshRequest>,
) -> Result<impl IntoResponse, AppError> {
    let pair = state
        .sessions
        .refresh(PrincipalKind::User, &req.refresh_token)
        .await?;
    Ok(Json(TokenResponse::bearer(
        pair,
        state.jwt.access_token_expiry_seconds(),
    )))
}

#[utoipa::path(
    post,
    path = "/api/v1/user/auth/logout",
    responses(
        (status = 200, description = "Logged out", body = MessageResponse),
        (status = 401, description = "Not authenticated", body = ErrorResponse)
    ),
    tag = "User Authentication",
    security(("bearer_auth" = []))
)]
pub async fn logout(
    State(state): State<AppState>,
    AuthSession(session): AuthSession,
) -> Result<impl IntoResponse, AppError> {
    state
        .sessions
        .logout(session.kind, session.principal_id())
        .await?;
    Ok(Json(MessageResponse::new("Logged out successfully")))
}

/// Profile of the calling employee
#[utoipa::path(
    get,
    path = "/api/v1/user/me",
    responses(
        (status = 200, description = "Own profile", body = UserResponse),
        (status = 401, description = "Not authenticated", body = ErrorResponse)
    ),
    tag = "User",
    security(("bearer_auth" = []))
)]
pub async fn get_me(
    State(state): State<AppState>,
    AuthSession(session): AuthSession,
) -> Result<impl IntoResponse, AppError> {
    let user = state.directory.profile_by_id(session.principal_id()).await?;
    Ok(Json(UserResponse::from(user)))
}

/// Experience history, total and level of the calling employee
#[utoipa::path(
    get,
    path = "/api/v1/user/experience",
    responses(
        (status = 200, description = "Own experience", body = ExperienceSummaryResponse),
        (status = 401, description = "Not authenticated", body = ErrorResponse)
    ),
    tag = "User",
    security(("bearer_auth" = []))
)]
pub async fn my_experience(
    State(state): State<AppState>,
    AuthSession(session): AuthSession,
) -> Result<impl IntoResponse, AppError> {
    let summary = state
        .directory
        .experience_summary(session.principal_id())
        .await?;
    Ok(Json(ExperienceSummaryResponse::from(summary)))
}

/// Experience of another employee. Leaders and above only.
#[utoipa::path(
    get,
    path = "/api/v1/user/experience/{employee_id}",
    params(("employee_id" = String, Path, description = "Employee id")),
    responses(
        (status = 200, description = "Employee experience", body = ExperienceSummaryResponse),
        (status = 403, description = "Not enough permissions", body = ErrorResponse),
        (status = 404, description = "No such employee", body = ErrorResponse)
    ),
    tag = "User",
    security(("bearer_auth" = []))
)]
pub async fn employee_experience(
    State(state): State<AppState>,
    AuthSession(session): AuthSession,
    Path(employee_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    permission::require_user_at_least(&session, Tier::Leader)?;

    let summary = state
        .directory
        .experience_summary_for_employee(&employee_id)
        .await?;
    Ok(Json(ExperienceSummaryResponse::from(summary)))
}
