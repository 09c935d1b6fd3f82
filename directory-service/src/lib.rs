pub mod config;
pub mod db;
pub mod dtos;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;
pub mod utils;

use std::{sync::Arc, time::Duration};

use axum::{
    extract::State,
    http::{header, HeaderName, HeaderValue, Method, Request},
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post},
    Json, Router,
};
use service_core::error::AppError;
use service_core::middleware::{
    rate_limit::{create_ip_rate_limiter, ip_rate_limit_middleware, IpRateLimiter},
    security_headers::security_headers_middleware,
    tracing::{request_id_middleware, REQUEST_ID_HEADER},
};
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use utoipa::{
    openapi::security::{ApiKey, ApiKeyValue, HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

use crate::config::DirectoryConfig;
use crate::dtos::ErrorResponse;
use crate::middleware::BOOTSTRAP_KEY_HEADER;
use crate::services::{DirectoryService, JwtService, PrincipalStore, SessionService};

#[derive(OpenApi)]
#[openapi(
    paths(
        health_check,
        handlers::admin::auth::create_admin,
        handlers::admin::auth::login,
        handlers::admin::auth::refresh,
        handlers::admin::auth::logout,
        handlers::admin::users::list_users,
        handlers::admin::users::create_user,
        handlers::admin::users::get_user,
        handlers::admin::users::delete_user,
        handlers::admin::users::add_favorite,
        handlers::admin::users::remove_favorite,
        handlers::admin::users::list_favorites,
        handlers::admin::catalog::list_departments,
        handlers::admin::catalog::create_department,
        handlers::admin::catalog::list_job_groups,
        handlers::admin::catalog::create_job_group,
        handlers::admin::catalog::create_level,
        handlers::user::login,
        handlers::user::refresh,
        handlers::user::logout,
        handlers::user::get_me,
        handlers::user::my_experience,
        handlers::user::employee_experience,
        handlers::common::grant_experience,
        handlers::common::list_levels,
    ),
    components(
        schemas(
            dtos::ErrorResponse,
            dtos::MessageResponse,
            dtos::auth::LoginForm,
            dtos::auth::RefreshRequest,
            dtos::auth::TokenResponse,
            dtos::admin::CreateAdminRequest,
            dtos::admin::AdminResponse,
            dtos::admin::CreateUserRequest,
            dtos::admin::UserResponse,
            dtos::admin::NameRequest,
            dtos::admin::NamedResponse,
            dtos::admin::CreateLevelRequest,
            dtos::admin::LevelResponse,
            dtos::experience::GrantExperienceRequest,
            dtos::experience::ExperienceResponse,
            dtos::experience::ExperienceSummaryResponse,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Admin Authentication", description = "Admin login, refresh and logout"),
        (name = "Admin", description = "Directory administration"),
        (name = "User Authentication", description = "Employee login, refresh and logout"),
        (name = "User", description = "Employee self-service"),
        (name = "Common", description = "Experience points and levels"),
        (name = "Observability", description = "Service health"),
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
            components.add_security_scheme(
                "bootstrap_key",
                SecurityScheme::ApiKey(ApiKey::Header(ApiKeyValue::new(BOOTSTRAP_KEY_HEADER))),
            );
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub config: DirectoryConfig,
    pub store: Arc<dyn PrincipalStore>,
    pub jwt: JwtService,
    pub sessions: SessionService,
    pub directory: DirectoryService,
    pub login_rate_limiter: IpRateLimiter,
    pub ip_rate_limiter: IpRateLimiter,
}

impl AppState {
    /// Wire services over `store`. Fails if the JWT configuration is unusable.
    pub fn new(config: DirectoryConfig, store: Arc<dyn PrincipalStore>) -> Result<Self, AppError> {
        let jwt = JwtService::new(&config.jwt).map_err(AppError::ConfigError)?;
        let sessions = SessionService::new(store.clone(), jwt.clone())?;
        let directory = DirectoryService::new(store.clone());

        let trusted_proxies = config.rate_limit.trusted_proxies.clone();
        let login_rate_limiter = create_ip_rate_limiter(
            config.rate_limit.login_attempts,
            config.rate_limit.login_window_seconds,
        )
        .with_trusted_proxies(trusted_proxies.clone());
        let ip_rate_limiter = create_ip_rate_limiter(
            config.rate_limit.global_ip_limit,
            config.rate_limit.global_ip_window_seconds,
        )
        .with_trusted_proxies(trusted_proxies);

        Ok(Self {
            config,
            store,
            jwt,
            sessions,
            directory,
            login_rate_limiter,
            ip_rate_limiter,
        })
    }
}

pub fn build_router(state: AppState) -> Result<Router, AppError> {
    // Both login routes share the stricter per-IP limiter
    let login_routes = Router::new()
        .route("/admin/auth/login", post(handlers::admin::login))
        .route("/user/auth/login", post(handlers::user::login))
        .layer(from_fn_with_state(
            state.login_rate_limiter.clone(),
            ip_rate_limit_middleware,
        ));

    let bootstrap_routes = Router::new()
        .route("/admin", post(handlers::admin::create_admin))
        .layer(from_fn_with_state(
            state.clone(),
            middleware::admin_or_bootstrap_middleware,
        ));

    let admin_routes = Router::new()
        .route("/admin/auth/logout", post(handlers::admin::logout))
        .route(
            "/admin/users",
            get(handlers::admin::list_users).post(handlers::admin::create_user),
        )
        .route(
            "/admin/users/:employee_id",
            get(handlers::admin::get_user).delete(handlers::admin::delete_user),
        )
        .route(
            "/admin/users/:employee_id/favorite",
            post(handlers::admin::add_favorite).delete(handlers::admin::remove_favorite),
        )
        .route("/admin/favorites", get(handlers::admin::list_favorites))
        .route(
            "/admin/departments",
            get(handlers::admin::list_departments).post(handlers::admin::create_department),
        )
        .route(
            "/admin/job_groups",
            get(handlers::admin::list_job_groups).post(handlers::admin::create_job_group),
        )
        .route("/admin/levels", post(handlers::admin::create_level))
        .layer(from_fn_with_state(
            state.clone(),
            middleware::admin_auth_middleware,
        ));

    let user_routes = Router::new()
        .route("/user/auth/logout", post(handlers::user::logout))
        .route("/user/me", get(handlers::user::get_me))
        .route("/user/experience", get(handlers::user::my_experience))
        .route(
            "/user/experience/:employee_id",
            get(handlers::user::employee_experience),
        )
        .layer(from_fn_with_state(
            state.clone(),
            middleware::user_auth_middleware,
        ));

    let common_routes = Router::new()
        .route("/common/experience", post(handlers::common::grant_experience))
        .route("/common/levels", get(handlers::common::list_levels))
        .layer(from_fn_with_state(
            state.clone(),
            middleware::any_auth_middleware,
        ));

    let api = Router::new()
        .route("/admin/auth/refresh", post(handlers::admin::refresh))
        .route("/user/auth/refresh", post(handlers::user::refresh))
        .merge(login_routes)
        .merge(bootstrap_routes)
        .merge(admin_routes)
        .merge(user_routes)
        .merge(common_routes);

    let mut app = Router::new()
        .route("/health", get(health_check))
        .nest("/api/v1", api);

    if state.config.swagger_enabled() {
        app =
            app.merge(SwaggerUi::new("/docs").url("/.well-known/openapi.json", ApiDoc::openapi()));
    }

    let cors = cors_layer(&state.config.security.allowed_origins)?;
    let request_timeout = Duration::from_secs(state.config.request_timeout_seconds);

    let app = app
        .with_state(state.clone())
        .layer(from_fn_with_state(
            state.ip_rate_limiter.clone(),
            ip_rate_limit_middleware,
        ))
        .layer(TimeoutLayer::new(request_timeout))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &Request<_>| {
                let request_id = request
                    .headers()
                    .get(REQUEST_ID_HEADER)
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or("-");

                tracing::info_span!(
                    "http_request",
                    request_id = %request_id,
                    method = %request.method(),
                    uri = %request.uri(),
                    version = ?request.version(),
                )
            }),
        )
        .layer(from_fn(request_id_middleware))
        .layer(from_fn(security_headers_middleware))
        .layer(cors);

    Ok(app)
}

fn cors_layer(allowed_origins: &[String]) -> Result<CorsLayer, AppError> {
    // Config validation rejects "*" in prod, so a wildcard only reaches here in dev
    let allow_origin = if allowed_origins.iter().any(|o| o == "*") {
        AllowOrigin::any()
    } else {
        AllowOrigin::list(parse_origins(allowed_origins)?)
    };

    Ok(CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            HeaderName::from_static(BOOTSTRAP_KEY_HEADER),
            HeaderName::from_static(REQUEST_ID_HEADER),
        ]))
}

fn parse_origins(allowed_origins: &[String]) -> Result<Vec<HeaderValue>, AppError> {
    allowed_origins
        .iter()
        .map(|origin| {
            origin.parse::<HeaderValue>().map_err(|e| {
                AppError::ConfigError(anyhow::anyhow!("Invalid CORS origin '{}': {}", origin, e))
            })
        })
        .collect()
}

/// Service health check
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service is healthy"),
        (status = 500, description = "Database unreachable", body = ErrorResponse)
    ),
    tag = "Observability"
)]
pub async fn health_check(
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, AppError> {
    state.store.health_check().await.map_err(|e| {
        tracing::error!(error = %e, "Database health check failed");
        AppError::from(e)
    })?;

    Ok(Json(serde_json::json!({
        "status": "healthy",
        "service": state.config.service_name,
        "version": state.config.service_version,
        "environment": format!("{:?}", state.config.environment),
        "checks": {
            "database": "up"
        }
    })))
}
