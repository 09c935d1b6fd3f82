//! Persistence boundary for principals, their token pairs and directory data.

use async_trait::async_trait;

use super::ServiceError;
use crate::models::{
    Admin, Department, Experience, JobGroup, Level, NewAdmin, NewUser, PrincipalKind,
    StoredTokenPair, User, UserListing,
};

/// Storage used by the session and directory services.
///
/// Creates fail with `Conflict` on a duplicate unique key and `NotFound`
/// on a dangling reference. Token-pair writes are atomic per principal.
#[async_trait]
pub trait PrincipalStore: Send + Sync {
    async fn health_check(&self) -> Result<(), ServiceError>;

    // Admins
    async fn find_admin_by_username(&self, username: &str) -> Result<Option<Admin>, ServiceError>;
    async fn find_admin_by_id(&self, id: i64) -> Result<Option<Admin>, ServiceError>;
    async fn insert_admin(&self, admin: NewAdmin) -> Result<Admin, ServiceError>;

    // Users
    async fn find_user_by_employee_id(
        &self,
        employee_id: &str,
    ) -> Result<Option<User>, ServiceError>;
    async fn find_user_by_id(&self, id: i64) -> Result<Option<User>, ServiceError>;
    async fn insert_user(&self, user: NewUser) -> Result<User, ServiceError>;
    /// Ordered by id.
    async fn list_users(&self, skip: i64, limit: i64) -> Result<Vec<UserListing>, ServiceError>;
    /// Returns whether a user was deleted. Cascades to token pair, experience
    /// and favorites.
    async fn delete_user(&self, employee_id: &str) -> Result<bool, ServiceError>;

    // Departments and job groups
    async fn insert_department(&self, name: &str) -> Result<Department, ServiceError>;
    async fn find_department_by_id(&self, id: i64) -> Result<Option<Department>, ServiceError>;
    async fn list_departments(&self) -> Result<Vec<Department>, ServiceError>;
    async fn insert_job_group(&self, name: &str) -> Result<JobGroup, ServiceError>;
    async fn find_job_group_by_id(&self, id: i64) -> Result<Option<JobGroup>, ServiceError>;
    async fn list_job_groups(&self) -> Result<Vec<JobGroup>, ServiceError>;

    // Levels and experience
    async fn insert_level(
        &self,
        name: &str,
        total_required_experience: i64,
    ) -> Result<Level, ServiceError>;
    /// Ordered by required experience, ascending.
    async fn list_levels(&self) -> Result<Vec<Level>, ServiceError>;
    async fn insert_experience(&self, user_id: i64, amount: i64)
        -> Result<Experience, ServiceError>;
    async fn list_experiences_for_user(&self, user_id: i64)
        -> Result<Vec<Experience>, ServiceError>;

    // Admin favorites
    /// Fails with `Conflict` if `user_id` is already one of the admin's favorites.
    async fn insert_favorite(&self, admin_id: i64, user_id: i64) -> Result<(), ServiceError>;
    /// Ordered by when each favorite was added.
    async fn list_favorites(&self, admin_id: i64) -> Result<Vec<UserListing>, ServiceError>;
    async fn delete_favorite(&self, admin_id: i64, user_id: i64) -> Result<bool, ServiceError>;

    // Token pairs
    /// Upsert the principal's pair. For users, also stamps `last_login_utc`.
    async fn save_token_pair(
        &self,
        kind: PrincipalKind,
        pair: &StoredTokenPair,
    ) -> Result<(), ServiceError>;
    async fn find_token_pair(
        &self,
        kind: PrincipalKind,
        principal_id: i64,
    ) -> Result<Option<StoredTokenPair>, ServiceError>;
    /// Swap the access digest only while the stored refresh digest still
    /// equals `refresh_token_hash`. Returns whether a row was updated.
    async fn replace_access_token(
        &self,
        kind: PrincipalKind,
        principal_id: i64,
        refresh_token_hash: &str,
        access_token_hash: &str,
    ) -> Result<bool, ServiceError>;
    async fn delete_token_pair(
        &self,
        kind: PrincipalKind,
        principal_id: i64,
    ) -> Result<bool, ServiceError>;
}
