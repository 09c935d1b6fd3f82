//! Shared setup for directory-service integration tests.
//!
//! Drives the real router with `oneshot` over the in-memory store.

#![allow(dead_code)]

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use directory_service::{
    build_router,
    config::{
        DatabaseConfig, DirectoryConfig, Environment, JwtConfig, RateLimitConfig, SecurityConfig,
        SigningSecret, SwaggerConfig, SwaggerMode,
    },
    models::PrincipalKind,
    services::{InMemoryStore, PrincipalStore},
    AppState,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::util::ServiceExt;

pub const TEST_BOOTSTRAP_KEY: &str = "test-bootstrap-key";
pub const ROOT_USERNAME: &str = "root";
pub const ROOT_PASSWORD: &str = "pw1";

pub fn test_config() -> DirectoryConfig {
    DirectoryConfig {
        common: service_core::config::Config::default(),
        environment: Environment::Dev,
        service_name: "directory-service-test".to_string(),
        service_version: "0.0.0".to_string(),
        log_level: "warn".to_string(),
        otlp_endpoint: None,
        request_timeout_seconds: 10,
        database: DatabaseConfig {
            url: "postgres://unused".to_string(),
            max_connections: 1,
            min_connections: 0,
            acquire_timeout_seconds: 1,
            statement_timeout_seconds: 1,
        },
        jwt: JwtConfig {
            user_access_secret: SigningSecret::new("test-user-access"),
            user_refresh_secret: SigningSecret::new("test-user-refresh"),
            admin_access_secret: SigningSecret::new("test-admin-access"),
            admin_refresh_secret: SigningSecret::new("test-admin-refresh"),
            access_token_expiry_days: 7,
            refresh_token_expiry_days: 30,
        },
        security: SecurityConfig {
            allowed_origins: vec!["http://localhost:3000".to_string()],
            bootstrap_api_key: Some(SigningSecret::new(TEST_BOOTSTRAP_KEY)),
        },
        swagger: SwaggerConfig {
            enabled: SwaggerMode::Public,
        },
        rate_limit: RateLimitConfig {
            login_attempts: 1000,
            login_window_seconds: 60,
            global_ip_limit: 10_000,
            global_ip_window_seconds: 60,
            trusted_proxies: Vec::new(),
        },
    }
}

/// A response status plus its JSON body (`Value::Null` when the body is not JSON).
pub struct TestResponse {
    pub status: StatusCode,
    pub body: Value,
}

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub store: Arc<InMemoryStore>,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_config(test_config())
    }

    pub fn with_config(config: DirectoryConfig) -> Self {
        service_core::observability::logging::init_test_tracing();

        let store = Arc::new(InMemoryStore::new());
        let state = AppState::new(config, store.clone() as Arc<dyn PrincipalStore>)
            .expect("Failed to build app state");
        let router = build_router(state.clone()).expect("Failed to build router");

        Self {
            router,
            state,
            store,
        }
    }

    pub async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Router failed");

        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("Failed to read body");
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);

        TestResponse { status, body }
    }

    pub async fn get(&self, path: &str, token: Option<&str>) -> TestResponse {
        let mut builder = Request::builder().method("GET").uri(path);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        self.send(builder.body(Body::empty()).unwrap()).await
    }

    pub async fn delete(&self, path: &str, token: Option<&str>) -> TestResponse {
        let mut builder = Request::builder().method("DELETE").uri(path);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        self.send(builder.body(Body::empty()).unwrap()).await
    }

    pub async fn post_json(&self, path: &str, token: Option<&str>, body: Value) -> TestResponse {
        let mut builder = Request::builder()
            .method("POST")
            .uri(path)
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        self.send(builder.body(Body::from(body.to_string())).unwrap())
            .await
    }

    pub async fn post_form(&self, path: &str, form: &str) -> TestResponse {
        let request = Request::builder()
            .method("POST")
            .uri(path)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(form.to_string()))
            .unwrap();
        self.send(request).await
    }

    /// Create an admin through the bootstrap key.
    pub async fn bootstrap_admin(&self, username: &str, password: &str) -> TestResponse {
        let request = Request::builder()
            .method("POST")
            .uri("/api/v1/admin")
            .header(header::CONTENT_TYPE, "application/json")
            .header("x-bootstrap-key", TEST_BOOTSTRAP_KEY)
            .body(Body::from(
                json!({ "username": username, "password": password }).to_string(),
            ))
            .unwrap();
        self.send(request).await
    }

    pub async fn login(&self, kind: PrincipalKind, username: &str, password: &str) -> TestResponse {
        let path = match kind {
            PrincipalKind::Admin => "/api/v1/admin/auth/login",
            PrincipalKind::User => "/api/v1/user/auth/login",
        };
        self.post_form(path, &format!("username={}&password={}", username, password))
            .await
    }

    /// Bootstrap root/pw1 and return its access token.
    pub async fn root_token(&self) -> String {
        let created = self.bootstrap_admin(ROOT_USERNAME, ROOT_PASSWORD).await;
        assert_eq!(created.status, StatusCode::CREATED);

        let login = self
            .login(PrincipalKind::Admin, ROOT_USERNAME, ROOT_PASSWORD)
            .await;
        assert_eq!(login.status, StatusCode::OK);
        access_token(&login)
    }

    /// Create a department and job group and return their ids.
    pub async fn seed_org(&self, admin_token: &str) -> (i64, i64) {
        let department = self
            .post_json(
                "/api/v1/admin/departments",
                Some(admin_token),
                json!({ "name": "Platform" }),
            )
            .await;
        assert_eq!(department.status, StatusCode::CREATED);

        let job_group = self
            .post_json(
                "/api/v1/admin/job_groups",
                Some(admin_token),
                json!({ "name": "Engineering" }),
            )
            .await;
        assert_eq!(job_group.status, StatusCode::CREATED);

        (
            department.body["id"].as_i64().unwrap(),
            job_group.body["id"].as_i64().unwrap(),
        )
    }

    pub async fn create_user(
        &self,
        admin_token: &str,
        (department_id, job_group_id): (i64, i64),
        employee_id: &str,
        password: &str,
        permission: &str,
    ) -> TestResponse {
        self.post_json(
            "/api/v1/admin/users",
            Some(admin_token),
            json!({
                "employee_id": employee_id,
                "name": format!("Employee {}", employee_id),
                "password": password,
                "department_id": department_id,
                "job_group_id": job_group_id,
                "permission": permission,
            }),
        )
        .await
    }

    /// Create a user and log them in, returning the login response.
    pub async fn user_session(
        &self,
        admin_token: &str,
        org: (i64, i64),
        employee_id: &str,
        permission: &str,
    ) -> TestResponse {
        let created = self
            .create_user(admin_token, org, employee_id, "secret", permission)
            .await;
        assert_eq!(created.status, StatusCode::CREATED);

        let login = self.login(PrincipalKind::User, employee_id, "secret").await;
        assert_eq!(login.status, StatusCode::OK);
        login
    }
}

pub fn access_token(response: &TestResponse) -> String {
    response.body["access_token"]
        .as_str()
        .expect("access_token missing")
        .to_string()
}

pub fn refresh_token(response: &TestResponse) -> String {
    response.body["refresh_token"]
        .as_str()
        .expect("refresh_token missing")
        .to_string()
}
