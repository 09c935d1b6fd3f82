//! PostgreSQL-backed principal store.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::postgres::PgPool;

use super::{PrincipalStore, ServiceError};
use crate::models::{
    Admin, Department, Experience, JobGroup, Level, NewAdmin, NewUser, PrincipalKind,
    StoredTokenPair, User, UserListing,
};

const UNIQUE_VIOLATION: &str = "23505";
const FOREIGN_KEY_VIOLATION: &str = "23503";

/// PostgreSQL database wrapper.
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// Create a new database wrapper from a connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Get the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

/// Table and key column holding each kind's token pair.
fn token_table(kind: PrincipalKind) -> (&'static str, &'static str) {
    match kind {
        PrincipalKind::Admin => ("admin_token_pairs", "admin_id"),
        PrincipalKind::User => ("user_token_pairs", "user_id"),
    }
}

fn db_error(e: sqlx::Error) -> ServiceError {
    ServiceError::Database(anyhow::anyhow!(e))
}

/// Map constraint violations on insert to domain errors naming `entity`.
fn insert_error(entity: &'static str) -> impl Fn(sqlx::Error) -> ServiceError {
    move |e| {
        if let sqlx::Error::Database(db_err) = &e {
            match db_err.code().as_deref() {
                Some(UNIQUE_VIOLATION) => {
                    return ServiceError::Conflict(format!("{} already exists", entity));
                }
                Some(FOREIGN_KEY_VIOLATION) => {
                    return ServiceError::NotFound(format!(
                        "{} references a record that does not exist",
                        entity
                    ));
                }
                _ => {}
            }
        }
        db_error(e)
    }
}

#[async_trait]
impl PrincipalStore for Database {
    async fn health_check(&self) -> Result<(), ServiceError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!("Database health check failed: {}", e);
                db_error(e)
            })?;
        Ok(())
    }

    // ==================== Admin Operations ====================

    async fn find_admin_by_username(&self, username: &str) -> Result<Option<Admin>, ServiceError> {
        sqlx::query_as::<_, Admin>("SELECT * FROM admins WHERE username = $1")
            .bind(username)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error)
    }

    async fn find_admin_by_id(&self, id: i64) -> Result<Option<Admin>, ServiceError> {
        sqlx::query_as::<_, Admin>("SELECT * FROM admins WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error)
    }

    async fn insert_admin(&self, admin: NewAdmin) -> Result<Admin, ServiceError> {
        sqlx::query_as::<_, Admin>(
            r#"
            INSERT INTO admins (username, password_hash, created_utc)
            VALUES ($1, $2, $3)
            RETURNING *
            "#,
        )
        .bind(&admin.username)
        .bind(&admin.password_hash)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await
        .map_err(insert_error("Admin"))
    }

    // ==================== User Operations ====================

    async fn find_user_by_employee_id(
        &self,
        employee_id: &str,
    ) -> Result<Option<User>, ServiceError> {
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE employee_id = $1")
            .bind(employee_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error)
    }

    async fn find_user_by_id(&self, id: i64) -> Result<Option<User>, ServiceError> {
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error)
    }

    async fn insert_user(&self, user: NewUser) -> Result<User, ServiceError> {
        sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (employee_id, name, password_hash, department_id, job_group_id, permission_code, created_utc)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *
            "#,
        )
        .bind(&user.employee_id)
        .bind(&user.name)
        .bind(&user.password_hash)
        .bind(user.department_id)
        .bind(user.job_group_id)
        .bind(user.tier.as_code())
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await
        .map_err(insert_error("User"))
    }

    async fn list_users(&self, skip: i64, limit: i64) -> Result<Vec<UserListing>, ServiceError> {
        sqlx::query_as::<_, UserListing>(
            r#"
            SELECT u.id, u.employee_id, u.name,
                   u.department_id, d.name AS department_name,
                   u.job_group_id, j.name AS job_group_name,
                   u.permission_code, u.created_utc, u.last_login_utc
            FROM users u
            JOIN departments d ON d.id = u.department_id
            JOIN job_groups j ON j.id = u.job_group_id
            ORDER BY u.id
            OFFSET $1 LIMIT $2
            "#,
        )
        .bind(skip)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)
    }

    async fn delete_user(&self, employee_id: &str) -> Result<bool, ServiceError> {
        let result = sqlx::query("DELETE FROM users WHERE employee_id = $1")
            .bind(employee_id)
            .execute(&self.pool)
            .await
            .map_err(db_error)?;
        Ok(result.rows_affected() > 0)
    }

    // ==================== Department / Job Group Operations ====================

    async fn insert_department(&self, name: &str) -> Result<Department, ServiceError> {
        sqlx::query_as::<_, Department>(
            "INSERT INTO departments (name, created_utc) VALUES ($1, $2) RETURNING *",
        )
        .bind(name)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await
        .map_err(insert_error("Department"))
    }

    async fn find_department_by_id(&self, id: i64) -> Result<Option<Department>, ServiceError> {
        sqlx::query_as::<_, Department>("SELECT * FROM departments WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error)
    }

    async fn list_departments(&self) -> Result<Vec<Department>, ServiceError> {
        sqlx::query_as::<_, Department>("SELECT * FROM departments ORDER BY id")
            .fetch_all(&self.pool)
            .await
            .map_err(db_error)
    }

    async fn insert_job_group(&self, name: &str) -> Result<JobGroup, ServiceError> {
        sqlx::query_as::<_, JobGroup>(
            "INSERT INTO job_groups (name, created_utc) VALUES ($1, $2) RETURNING *",
        )
        .bind(name)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await
        .map_err(insert_error("Job group"))
    }

    async fn find_job_group_by_id(&self, id: i64) -> Result<Option<JobGroup>, ServiceError> {
        sqlx::query_as::<_, JobGroup>("SELECT * FROM job_groups WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error)
    }

    async fn list_job_groups(&self) -> Result<Vec<JobGroup>, ServiceError> {
        sqlx::query_as::<_, JobGroup>("SELECT * FROM job_groups ORDER BY id")
            .fetch_all(&self.pool)
            .await
            .map_err(db_error)
    }

    // ==================== Level / Experience Operations ====================

    async fn insert_level(
        &self,
        name: &str,
        total_required_experience: i64,
    ) -> Result<Level, ServiceError> {
        sqlx::query_as::<_, Level>(
            "INSERT INTO levels (name, total_required_experience) VALUES ($1, $2) RETURNING *",
        )
        .bind(name)
        .bind(total_required_experience)
        .fetch_one(&self.pool)
        .await
        .map_err(insert_error("Level"))
    }

    async fn list_levels(&self) -> Result<Vec<Level>, ServiceError> {
        sqlx::query_as::<_, Level>("SELECT * FROM levels ORDER BY total_required_experience, id")
            .fetch_all(&self.pool)
            .await
            .map_err(db_error)
    }

    async fn insert_experience(
        &self,
        user_id: i64,
        amount: i64,
    ) -> Result<Experience, ServiceError> {
        sqlx::query_as::<_, Experience>(
            r#"
            INSERT INTO experiences (user_id, amount, created_utc)
            VALUES ($1, $2, $3)
            RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(amount)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await
        .map_err(insert_error("Experience"))
    }

    async fn list_experiences_for_user(
        &self,
        user_id: i64,
    ) -> Result<Vec<Experience>, ServiceError> {
        sqlx::query_as::<_, Experience>(
            "SELECT * FROM experiences WHERE user_id = $1 ORDER BY created_utc, id",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)
    }

    // ==================== Favorite Operations ====================

    async fn insert_favorite(&self, admin_id: i64, user_id: i64) -> Result<(), ServiceError> {
        sqlx::query("INSERT INTO favorites (admin_id, user_id, created_utc) VALUES ($1, $2, $3)")
            .bind(admin_id)
            .bind(user_id)
            .bind(Utc::now())
            .execute(&self.pool)
            .await
            .map_err(insert_error("Favorite"))?;
        Ok(())
    }

    async fn list_favorites(&self, admin_id: i64) -> Result<Vec<UserListing>, ServiceError> {
        sqlx::query_as::<_, UserListing>(
            r#"
            SELECT u.id, u.employee_id, u.name,
                   u.department_id, d.name AS department_name,
                   u.job_group_id, j.name AS job_group_name,
                   u.permission_code, u.created_utc, u.last_login_utc
            FROM favorites f
            JOIN users u ON u.id = f.user_id
            JOIN departments d ON d.id = u.department_id
            JOIN job_groups j ON j.id = u.job_group_id
            WHERE f.admin_id = $1
            ORDER BY f.created_utc, u.id
            "#,
        )
        .bind(admin_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)
    }

    async fn delete_favorite(&self, admin_id: i64, user_id: i64) -> Result<bool, ServiceError> {
        let result = sqlx::query("DELETE FROM favorites WHERE admin_id = $1 AND user_id = $2")
            .bind(admin_id)
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(db_error)?;
        Ok(result.rows_affected() > 0)
    }

    // ==================== Token Pair Operations ====================

    async fn save_token_pair(
        &self,
        kind: PrincipalKind,
        pair: &StoredTokenPair,
    ) -> Result<(), ServiceError> {
        let (table, key) = token_table(kind);

        let mut tx = self.pool.begin().await.map_err(db_error)?;

        sqlx::query(&format!(
            r#"
            INSERT INTO {table} ({key}, access_token_hash, refresh_token_hash, updated_utc)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT ({key}) DO UPDATE
            SET access_token_hash = EXCLUDED.access_token_hash,
                refresh_token_hash = EXCLUDED.refresh_token_hash,
                updated_utc = EXCLUDED.updated_utc
            "#
        ))
        .bind(pair.principal_id)
        .bind(&pair.access_token_hash)
        .bind(&pair.refresh_token_hash)
        .bind(pair.updated_utc)
        .execute(&mut *tx)
        .await
        .map_err(insert_error("Token pair"))?;

        if kind == PrincipalKind::User {
            sqlx::query("UPDATE users SET last_login_utc = $1 WHERE id = $2")
                .bind(pair.updated_utc)
                .bind(pair.principal_id)
                .execute(&mut *tx)
                .await
                .map_err(db_error)?;
        }

        tx.commit().await.map_err(db_error)?;
        Ok(())
    }

    async fn find_token_pair(
        &self,
        kind: PrincipalKind,
        principal_id: i64,
    ) -> Result<Option<StoredTokenPair>, ServiceError> {
        let (table, key) = token_table(kind);
        sqlx::query_as::<_, StoredTokenPair>(&format!(
            r#"
            SELECT {key} AS principal_id, access_token_hash, refresh_token_hash, updated_utc
            FROM {table}
            WHERE {key} = $1
            "#
        ))
        .bind(principal_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error)
    }

    async fn replace_access_token(
        &self,
        kind: PrincipalKind,
        principal_id: i64,
        refresh_token_hash: &str,
        access_token_hash: &str,
    ) -> Result<bool, ServiceError> {
        let (table, key) = token_table(kind);
        let result = sqlx::query(&format!(
            r#"
            UPDATE {table}
            SET access_token_hash = $1, updated_utc = $2
            WHERE {key} = $3 AND refresh_token_hash = $4
            "#
        ))
        .bind(access_token_hash)
        .bind(Utc::now())
        .bind(principal_id)
        .bind(refresh_token_hash)
        .execute(&self.pool)
        .await
        .map_err(db_error)?;
        Ok(result.rows_affected() == 1)
    }

    async fn delete_token_pair(
        &self,
        kind: PrincipalKind,
        principal_id: i64,
    ) -> Result<bool, ServiceError> {
        let (table, key) = token_table(kind);
        let result = sqlx::query(&format!("DELETE FROM {table} WHERE {key} = $1"))
            .bind(principal_id)
            .execute(&self.pool)
            .await
            .map_err(db_error)?;
        Ok(result.rows_affected() > 0)
    }
}
