//! Admin-driven directory management and experience accounting.

use std::sync::Arc;

use super::{PrincipalStore, ServiceError};
use crate::models::{
    Admin, Department, Experience, JobGroup, Level, LevelProgress, NewAdmin, NewUser, Tier, User,
    UserListing,
};
use crate::utils::{hash_password, Password};

pub const MAX_PAGE_SIZE: i64 = 100;

/// Upper bound on a single experience grant.
pub const MAX_EXPERIENCE_GRANT: i64 = 1_000_000;

/// Input for creating a user; the password is hashed before it reaches the store.
#[derive(Debug, Clone)]
pub struct UserDraft {
    pub employee_id: String,
    pub name: String,
    pub password: Password,
    pub department_id: i64,
    pub job_group_id: i64,
    pub tier: Tier,
}

#[derive(Debug, Clone)]
pub struct ExperienceSummary {
    pub total_experience: i64,
    pub progress: LevelProgress,
    pub entries: Vec<Experience>,
}

#[derive(Clone)]
pub struct DirectoryService {
    store: Arc<dyn PrincipalStore>,
}

impl DirectoryService {
    pub fn new(store: Arc<dyn PrincipalStore>) -> Self {
        Self { store }
    }

    pub async fn create_admin(&self, username: &str, password: Password) -> Result<Admin, ServiceError> {
        let password_hash = hash_password(&password)?.into_string();
        let admin = self
            .store
            .insert_admin(NewAdmin {
                username: username.to_string(),
                password_hash,
            })
            .await?;

        tracing::info!(principal_id = admin.id, "Admin created");
        Ok(admin)
    }

    pub async fn create_user(&self, draft: UserDraft) -> Result<User, ServiceError> {
        self.department(draft.department_id).await?;
        self.job_group(draft.job_group_id).await?;

        let password_hash = hash_password(&draft.password)?.into_string();
        let user = self
            .store
            .insert_user(NewUser {
                employee_id: draft.employee_id,
                name: draft.name,
                password_hash,
                department_id: draft.department_id,
                job_group_id: draft.job_group_id,
                tier: draft.tier,
            })
            .await?;

        tracing::info!(principal_id = user.id, tier = user.tier().as_code(), "User created");
        Ok(user)
    }

    pub async fn list_users(&self, skip: i64, limit: i64) -> Result<Vec<UserListing>, ServiceError> {
        self.store
            .list_users(skip.max(0), limit.clamp(1, MAX_PAGE_SIZE))
            .await
    }

    pub async fn profile_by_id(&self, user_id: i64) -> Result<UserListing, ServiceError> {
        let user = self
            .store
            .find_user_by_id(user_id)
            .await?
            .ok_or_else(user_not_found)?;
        self.listing(user).await
    }

    pub async fn profile_by_employee_id(&self, employee_id: &str) -> Result<UserListing, ServiceError> {
        let user = self.user_by_employee_id(employee_id).await?;
        self.listing(user).await
    }

    pub async fn delete_user(&self, employee_id: &str) -> Result<(), ServiceError> {
        if !self.store.delete_user(employee_id).await? {
            return Err(user_not_found());
        }
        tracing::info!(employee_id, "User deleted");
        Ok(())
    }

    pub async fn add_favorite(&self, admin_id: i64, employee_id: &str) -> Result<(), ServiceError> {
        let user = self.user_by_employee_id(employee_id).await?;
        self.store
            .insert_favorite(admin_id, user.id)
            .await
            .map_err(|e| match e {
                ServiceError::Conflict(_) => ServiceError::Conflict(
                    "The user is already in the favorite list".to_string(),
                ),
                other => other,
            })?;

        tracing::info!(principal_id = admin_id, user_id = user.id, "Favorite added");
        Ok(())
    }

    pub async fn list_favorites(&self, admin_id: i64) -> Result<Vec<UserListing>, ServiceError> {
        self.store.list_favorites(admin_id).await
    }

    pub async fn remove_favorite(&self, admin_id: i64, employee_id: &str) -> Result<(), ServiceError> {
        let user = self.user_by_employee_id(employee_id).await?;
        if !self.store.delete_favorite(admin_id, user.id).await? {
            return Err(ServiceError::NotFound(
                "The user is not in the favorite list".to_string(),
            ));
        }
        Ok(())
    }

    pub async fn create_department(&self, name: &str) -> Result<Department, ServiceError> {
        self.store.insert_department(name.trim()).await
    }

    pub async fn list_departments(&self) -> Result<Vec<Department>, ServiceError> {
        self.store.list_departments().await
    }

    pub async fn create_job_group(&self, name: &str) -> Result<JobGroup, ServiceError> {
        self.store.insert_job_group(name.trim()).await
    }

    pub async fn list_job_groups(&self) -> Result<Vec<JobGroup>, ServiceError> {
        self.store.list_job_groups().await
    }

    pub async fn create_level(
        &self,
        name: &str,
        total_required_experience: i64,
    ) -> Result<Level, ServiceError> {
        if total_required_experience < 0 {
            return Err(ServiceError::Validation(
                "The required experience must not be negative".to_string(),
            ));
        }
        self.store
            .insert_level(name.trim(), total_required_experience)
            .await
    }

    pub async fn list_levels(&self) -> Result<Vec<Level>, ServiceError> {
        self.store.list_levels().await
    }

    pub async fn grant_experience(
        &self,
        employee_id: &str,
        amount: i64,
    ) -> Result<Experience, ServiceError> {
        if amount <= 0 {
            return Err(ServiceError::Validation(
                "The amount must be greater than 0".to_string(),
            ));
        }
        if amount > MAX_EXPERIENCE_GRANT {
            return Err(ServiceError::Validation(format!(
                "The amount must not exceed {}",
                MAX_EXPERIENCE_GRANT
            )));
        }

        let user = self.store.find_user_by_employee_id(employee_id).await?.ok_or_else(|| {
            ServiceError::NotFound(
                "The employee with this ID does not exist in the system".to_string(),
            )
        })?;

        let experience = self.store.insert_experience(user.id, amount).await?;
        tracing::info!(principal_id = user.id, amount, "Experience granted");
        Ok(experience)
    }

    pub async fn experience_summary(&self, user_id: i64) -> Result<ExperienceSummary, ServiceError> {
        let entries = self.store.list_experiences_for_user(user_id).await?;
        let total_experience = entries
            .iter()
            .try_fold(0i64, |total, e| total.checked_add(e.amount))
            .ok_or_else(|| {
                ServiceError::Internal(anyhow::anyhow!(
                    "Experience total for user {} overflows",
                    user_id
                ))
            })?;
        let levels = self.store.list_levels().await?;

        Ok(ExperienceSummary {
            total_experience,
            progress: LevelProgress::locate(&levels, total_experience),
            entries,
        })
    }

    pub async fn experience_summary_for_employee(
        &self,
        employee_id: &str,
    ) -> Result<ExperienceSummary, ServiceError> {
        let user = self.user_by_employee_id(employee_id).await?;
        self.experience_summary(user.id).await
    }

    async fn user_by_employee_id(&self, employee_id: &str) -> Result<User, ServiceError> {
        self.store
            .find_user_by_employee_id(employee_id)
            .await?
            .ok_or_else(user_not_found)
    }

    async fn department(&self, id: i64) -> Result<Department, ServiceError> {
        self.store
            .find_department_by_id(id)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Department not found".to_string()))
    }

    async fn job_group(&self, id: i64) -> Result<JobGroup, ServiceError> {
        self.store
            .find_job_group_by_id(id)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Job group not found".to_string()))
    }

    async fn listing(&self, user: User) -> Result<UserListing, ServiceError> {
        let department = self.department(user.department_id).await?;
        let job_group = self.job_group(user.job_group_id).await?;

        Ok(UserListing {
            id: user.id,
            employee_id: user.employee_id,
            name: user.name,
            department_id: department.id,
            department_name: department.name,
            job_group_id: job_group.id,
            job_group_name: job_group.name,
            permission_code: user.permission_code,
            created_utc: user.created_utc,
            last_login_utc: user.last_login_utc,
        })
    }
}

fn user_not_found() -> ServiceError {
    ServiceError::NotFound("User not found".to_string())
}
