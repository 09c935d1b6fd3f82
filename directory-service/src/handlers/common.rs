//! Routes shared by admins and employees.

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use service_core::error::AppError;

use crate::{
    dtos::{
        admin::LevelResponse,
        experience::{ExperienceResponse, GrantExperienceRequest},
        ErrorResponse,
    },
    middleware::AuthSession,
    services::permission,
    utils::ValidatedJson,
    AppState,
};

/// Grant experience points to an employee
#[utoipa::path(
    post,
    path = "/api/v1/common/experience",
    request_body = GrantExperienceRequest,
    responses(
        (status = 201, description = "Experience granted", body = ExperienceResponse),
        (status = 400, description = "Amount must be greater than 0", body = ErrorResponse),
        (status = 403, description = "Not enough permissions", body = ErrorResponse),
        (status = 404, description = "No such employee", body = ErrorResponse)
    ),
    tag = "Common",
    security(("bearer_auth" = []))
)]
pub async fn grant_experience(
    State(state): State<AppState>,
    AuthSession(session): AuthSession,
    ValidatedJson(req): ValidatedJson<GrantExperienceRequest>,
) -> Result<impl IntoResponse, AppError> {
    permission::require_admin_or_leader(&session)?;

    let experience = state
        .directory
        .grant_experience(&req.employee_id, req.amount)
        .await?;

    tracing::info!(
        kind = %session.kind,
        principal_id = session.principal_id(),
        "Experience grant recorded"
    );
    Ok((StatusCode::CREATED, Json(ExperienceResponse::from(experience))))
}

/// All levels ordered by required experience
#[utoipa::path(
    get,
    path = "/api/v1/common/levels",
    responses(
        (status = 200, description = "Levels", body = [LevelResponse]),
        (status = 401, description = "Not authenticated", body = ErrorResponse)
    ),
    tag = "Common",
    security(("bearer_auth" = []))
)]
pub async fn list_levels(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let levels = state.directory.list_levels().await?;
    Ok(Json(
        levels
            .into_iter()
            .map(LevelResponse::from)
            .collect::<Vec<_>>(),
    ))
}
