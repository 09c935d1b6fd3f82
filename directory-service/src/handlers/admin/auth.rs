use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use service_core::error::AppError;

use crate::{
    dtos::{
        admin::{AdminResponse, CreateAdminRequest},
        auth::{LoginForm, RefreshRequest, TokenResponse},
        ErrorResponse, MessageResponse,
    },
    middleware::AuthSession,
    models::PrincipalKind,
    utils::{Password, ValidatedForm, ValidatedJson},
    AppState,
};

/// Create an admin account
///
/// Authorised by an admin access token, or by the `x-bootstrap-key` header
/// when no admin exists yet.
#[utoipa::path(
    post,
    path = "/api/v1/admin",
    request_body = CreateAdminRequest,
    responses(
        (status = 201, description = "Admin created", body = AdminResponse),
        (status = 400, description = "Username already taken", body = ErrorResponse),
        (status = 401, description = "Not authenticated", body = ErrorResponse),
        (status = 403, description = "Not an admin", body = ErrorResponse),
        (status = 422, description = "Validation error", body = ErrorResponse)
    ),
    tag = "Admin",
    security(("bearer_auth" = []), ("bootstrap_key" = []))
)]
pub async fn create_admin(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<CreateAdminRequest>,
) -> Result<impl IntoResponse, AppError> {
    let admin = state
        .directory
        .create_admin(&req.username, Password::new(req.password))
        .await?;
    Ok((StatusCode::CREATED, Json(AdminResponse::from(admin))))
}

/// Admin login with username and password (form encoded)
#[utoipa::path(
    post,
    path = "/api/v1/admin/auth/login",
    request_body(content = LoginForm, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 200, description = "Login successful", body = TokenResponse),
        (status = 401, description = "Incorrect username or password", body = ErrorResponse),
        (status = 429, description = "Too many login attempts", body = ErrorResponse)
    ),
    tag = "Admin Authentication"
)]
pub async fn login(
    State(state): State<AppState>,
    ValidatedForm(form): ValidatedForm<LoginForm>,
) -> Result<impl IntoResponse, AppError> {
    let pair = state
        .sessions
        .login(PrincipalKind::Admin, &form.username, Password::new(form.password))
        .await?;
    Ok(Json(TokenResponse::bearer(
        pair,
        state.jwt.access_token_expiry_seconds(),
    )))
}

/// Exchange an admin refresh token for a new access token
#[utoipa::path(
    post,
    path = "/api/v1/admin/auth/refresh",
    request_body = RefreshRequest,
    responses(
        (status = 200, description = "Access token refreshed", body = TokenResponse),
        (status = 401, description = "Invalid, expired or superseded refresh token", body = ErrorResponse)
    ),
    tag = "Admin Authentication"
)]
pub async fn refresh(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<RefreshRequest>,
) -> Result<impl IntoResponse, AppError> {
    let pair = state
        .sessions
        .refresh(PrincipalKind::Admin, &req.refresh_token)
        .await?;
    Ok(Json(TokenResponse::bearer(
        pair,
        state.jwt.access_token_expiry_seconds(),
    )))
}

/// Revoke the calling admin's token pair
#[utoipa::path(
    post,
    path = "/api/v1/admin/auth/logout",
    responses(
        (status = 200, description = "Logged out", body = MessageResponse),
        (status = 401, description = "Not authenticated", body = ErrorResponse)
    ),
    tag = "Admin Authentication",
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
