use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use validator::{Validate, ValidationError};

use crate::models::{Admin, Department, JobGroup, Level, Tier, User, UserListing};

fn validate_permission_marker(marker: &str) -> Result<(), ValidationError> {
    if Tier::from_marker(marker).is_some() {
        Ok(())
    } else {
        Err(ValidationError::new("permission")
            .with_message("Permission must be one of \"*\", \"mod\" or \"-\"".into()))
    }
}

fn default_permission() -> String {
    Tier::User.marker().to_string()
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateAdminRequest {
    #[validate(length(min = 1, max = 50, message = "Username must be 1-50 characters"))]
    #[schema(example = "root")]
    pub username: String,

    #[validate(length(min = 1, message = "Password is required"))]
    #[schema(example = "pw1")]
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AdminResponse {
    pub id: i64,
    #[schema(example = "root")]
    pub username: String,
    pub created_utc: DateTime<Utc>,
}

impl From<Admin> for AdminResponse {
    fn from(admin: Admin) -> Self {
        Self {
            id: admin.id,
            username: admin.username,
            created_utc: admin.created_utc,
        }
    }
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateUserRequest {
    #[validate(length(min = 1, max = 50, message = "Employee id must be 1-50 characters"))]
    #[schema(example = "E001")]
    pub employee_id: String,

    #[validate(length(min = 1, max = 100, message = "Name must be 1-100 characters"))]
    #[schema(example = "Kim Minji")]
    pub name: String,

    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,

    pub department_id: i64,
    pub job_group_id: i64,

    /// Permission marker: "*" admin, "mod" leader, "-" user
    #[serde(default = "default_permission")]
    #[validate(custom(function = "validate_permission_marker"))]
    #[schema(example = "-")]
    pub permission: String,
}

/// A user as shown to admins and to the user themself. Never includes the hash.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UserResponse {
    pub id: i64,
    #[schema(example = "E001")]
    pub employee_id: String,
    pub name: String,
    pub department_id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub department_name: Option<String>,
    pub job_group_id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_group_name: Option<String>,
    #[schema(example = "-")]
    pub permission: String,
    pub created_utc: DateTime<Utc>,
    pub last_login_utc: Option<DateTime<Utc>>,
}

fn marker_for_code(code: &str) -> String {
    Tier::from_code(code)
        .unwrap_or(Tier::User)
        .marker()
        .to_string()
}

impl From<UserListing> for UserResponse {
    fn from(user: UserListing) -> Self {
        Self {
            id: user.id,
            employee_id: user.employee_id,
            name: user.name,
            department_id: user.department_id,
            department_name: Some(user.department_name),
            job_group_id: user.job_group_id,
            job_group_name: Some(user.job_group_name),
            permission: marker_for_code(&user.permission_code),
            created_utc: user.created_utc,
            last_login_utc: user.last_login_utc,
        }
    }
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            employee_id: user.employee_id,
            name: user.name,
            department_id: user.department_id,
            department_name: None,
            job_group_id: user.job_group_id,
            job_group_name: None,
            permission: marker_for_code(&user.permission_code),
            created_utc: user.created_utc,
            last_login_utc: user.last_login_utc,
        }
    }
}

#[derive(Debug, Deserialize, Validate, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct PaginationQuery {
    /// Rows to skip
    #[validate(range(min = 0))]
    #[param(example = 0)]
    pub skip: Option<i64>,

    /// Page size, at most 100
    #[validate(range(min = 1, max = 100))]
    #[param(example = 10)]
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct NameRequest {
    #[validate(length(min = 1, max = 100, message = "Name must be 1-100 characters"))]
    #[schema(example = "Platform")]
    pub name: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct NamedResponse {
    pub id: i64,
    pub name: String,
    pub created_utc: DateTime<Utc>,
}

impl From<Department> for NamedResponse {
    fn from(d: Department) -> Self {
        Self {
            id: d.id,
            name: d.name,
            created_utc: d.created_utc,
        }
    }
}

impl From<JobGroup> for NamedResponse {
    fn from(j: JobGroup) -> Self {
        Self {
            id: j.id,
            name: j.name,
            created_utc: j.created_utc,
        }
    }
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateLevelRequest {
    #[validate(length(min = 1, max = 20, message = "Name must be 1-20 characters"))]
    #[schema(example = "F1-I")]
    pub name: String,

    #[validate(range(min = 0, message = "Required experience must not be negative"))]
    #[schema(example = 1000)]
    pub total_required_experience: i64,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct LevelResponse {
    pub id: i64,
    #[schema(example = "F1-I")]
    pub name: String,
    pub total_required_experience: i64,
}

impl From<Level> for LevelResponse {
    fn from(l: Level) -> Self {
        Self {
            id: l.id,
            name: l.name,
            total_required_experience: l.total_required_experience,
        }
    }
}
