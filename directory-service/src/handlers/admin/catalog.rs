//! Departments, job groups and levels.

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use service_core::error::AppError;

use crate::{
    dtos::{
        admin::{CreateLevelRequest, LevelResponse, NameRequest, NamedResponse},
        ErrorResponse,
    },
    utils::ValidatedJson,
    AppState,
};

#[utoipa::path(
    get,
    path = "/api/v1/admin/departments",
    responses((status = 200, description = "All departments", body = [NamedResponse])),
    tag = "Admin",
    security(("bearer_auth" = []))
)]
pub async fn list_departments(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let departments = state.directory.list_departments().await?;
    Ok(Json(
        departments
            .into_iter()
            .map(NamedResponse::from)
            .collect::<Vec<_>>(),
    ))
}

#[utoipa::path(
    post,
    path = "/api/v1/admin/departments",
    request_body = NameRequest,
    responses(
        (status = 201, description = "Department created", body = NamedResponse),
        (status = 400, description = "Name already taken", body = ErrorResponse)
    ),
    tag = "Admin",
    security(("bearer_auth" = []))
)]
pub async fn create_department(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<NameRequest>,
) -> Result<impl IntoResponse, AppError> {
    let department = state.directory.create_department(&req.name).await?;
    Ok((StatusCode::CREATED, Json(NamedResponse::from(department))))
}

#[utoipa::path(
    get,
    path = "/api/v1/admin/job_groups",
    responses((status = 200, description = "All job groups", body = [NamedResponse])),
    tag = "Admin",
    security(("bearer_auth" = []))
)]
pub async fn list_job_groups(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let job_groups = state.directory.list_job_groups().await?;
    Ok(Json(
        job_groups
            .into_iter()
            .map(NamedResponse::from)
            .collect::<Vec<_>>(),
    ))
}

#[utoipa::path(
    post,
    path = "/api/v1/admin/job_groups",
    request_body = NameRequest,
    responses(
        (status = 201, description = "Job group created", body = NamedResponse),
        (status = 400, description = "Name already taken", body = ErrorResponse)
    ),
    tag = "Admin",
    security(("bearer_auth" = []))
)]
pub async fn create_job_group(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<NameRequest>,
) -> Result<impl IntoResponse, AppError> {
    let job_group = state.directory.create_job_group(&req.name).await?;
    Ok((StatusCode::CREATED, Json(NamedResponse::from(job_group))))
}

/// Define a level and the cumulative experience it requires
#[utoipa::path(
    post,
    path = "/api/v1/admin/levels",
    request_body = CreateLevelRequest,
    responses(
        (status = 201, description = "Level created", body = LevelResponse),
        (status = 400, description = "Name already taken", body = ErrorResponse),
        (status = 422, description = "Validation error", body = ErrorResponse)
    ),
    tag = "Admin",
    security(("bearer_auth" = []))
)]
pub async fn create_level(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<CreateLevelRequest>,
) -> Result<impl IntoResponse, AppError> {
    let level = state
        .directory
        .create_level(&req.name, req.total_required_experience)
        .await?;
    Ok((StatusCode::CREATED, Json(LevelResponse::from(level))))
}
