//! Session lifecycle against a real PostgreSQL database.
//!
//! Run with `TEST_DATABASE_URL=postgres://... cargo test -- --ignored`.

mod common;

use directory_service::{
    config::DatabaseConfig,
    db,
    models::{PrincipalKind, Tier},
    services::{
        Database, DirectoryService, JwtService, PrincipalStore, ServiceError, SessionService,
        UserDraft,
    },
    utils::Password,
};
use sqlx::PgPool;
use std::sync::Arc;

async fn test_pool() -> PgPool {
    let url = std::env::var("TEST_DATABASE_URL").expect("TEST_DATABASE_URL must be set");
    let pool = db::create_pool(&DatabaseConfig {
        url,
        max_connections: 2,
        min_connections: 0,
        acquire_timeout_seconds: 5,
        statement_timeout_seconds: 5,
    })
    .await
    .expect("Failed to connect to test database");

    db::run_migrations(&pool)
        .await
        .expect("Failed to run migrations");

    sqlx::query(
        "TRUNCATE favorites, experiences, levels, user_token_pairs, admin_token_pairs, users, admins, \
         departments, job_groups RESTART IDENTITY CASCADE",
    )
    .execute(&pool)
    .await
    .expect("Failed to clean test database");

    pool
}

#[tokio::test]
#[ignore] // Requires PostgreSQL
async fn test_session_lifecycle_on_postgres() {
    let store: Arc<dyn PrincipalStore> = Arc::new(Database::new(test_pool().await));
    let jwt = JwtService::new(&common::test_config().jwt).expect("Failed to create JWT service");
    let sessions = SessionService::new(store.clone(), jwt).expect("Failed to create sessions");
    let directory = DirectoryService::new(store.clone());

    store.health_check().await.expect("Health check failed");

    let department = directory.create_department("Platform").await.unwrap();
    let job_group = directory.create_job_group("Engineering").await.unwrap();
    let user = directory
        .create_user(UserDraft {
            employee_id: "E001".to_string(),
            name: "Employee E001".to_string(),
            password: Password::new("secret".to_string()),
            department_id: department.id,
            job_group_id: job_group.id,
            tier: Tier::Leader,
        })
        .await
        .unwrap();

    let duplicate = directory.create_department("Platform").await;
    assert!(matches!(duplicate, Err(ServiceError::Conflict(_))));

    let first = sessions
        .login(PrincipalKind::User, "E001", Password::new("secret".to_string()))
        .await
        .unwrap();
    let second = sessions
        .login(PrincipalKind::User, "E001", Password::new("secret".to_string()))
        .await
        .unwrap();

    let session = sessions
        .authenticate(PrincipalKind::User, &second.access_token)
        .await
        .unwrap();
    assert_eq!(session.principal_id(), user.id);
    assert_eq!(session.tier(), Tier::Leader);

    assert!(matches!(
        sessions
            .authenticate(PrincipalKind::User, &first.access_token)
            .await,
        Err(ServiceError::SessionRevoked)
    ));
    assert!(matches!(
        sessions.refresh(PrincipalKind::User, &first.refresh_token).await,
        Err(ServiceError::SessionRevoked)
    ));

    let refreshed = sessions
        .refresh(PrincipalKind::User, &second.refresh_token)
        .await
        .unwrap();
    assert_eq!(refreshed.refresh_token, second.refresh_token);

    let profile = directory.profile_by_id(user.id).await.unwrap();
    assert!(profile.last_login_utc.is_some());

    let admin = directory
        .create_admin("root", Password::new("pw1".to_string()))
        .await
        .unwrap();
    directory.add_favorite(admin.id, "E001").await.unwrap();
    assert!(matches!(
        directory.add_favorite(admin.id, "E001").await,
        Err(ServiceError::Conflict(_))
    ));
    assert_eq!(directory.list_favorites(admin.id).await.unwrap().len(), 1);

    directory.delete_user("E001").await.unwrap();
    assert!(directory.list_favorites(admin.id).await.unwrap().is_empty());
    assert!(store
        .find_token_pair(PrincipalKind::User, user.id)
        .await
        .unwrap()
        .is_none());
}
