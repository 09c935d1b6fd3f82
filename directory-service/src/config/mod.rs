use service_core::config as core_config;
use service_core::error::AppError;
use std::collections::HashSet;
use std::env;
use std::fmt;
use std::net::IpAddr;

#[derive(Debug, Clone)]
pub struct DirectoryConfig {
    pub common: core_config::Config,
    pub environment: Environment,
    pub service_name: String,
    pub service_version: String,
    pub log_level: String,
    pub otlp_endpoint: Option<String>,
    pub request_timeout_seconds: u64,
    pub database: DatabaseConfig,
    pub jwt: JwtConfig,
    pub security: SecurityConfig,
    pub swagger: SwaggerConfig,
    pub rate_limit: RateLimitConfig,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Environment {
    Dev,
    Prod,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout_seconds: u64,
    pub statement_timeout_seconds: u64,
}

/// HMAC key material. `Debug` never prints the value.
#[derive(Clone, PartialEq, Eq)]
pub struct SigningSecret(String);

impl SigningSecret {
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Debug for SigningSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SigningSecret(***)")
    }
}

/// One secret per (principal kind, token subject).
#[derive(Debug, Clone)]
pub struct JwtConfig {
    pub user_access_secret: SigningSecret,
    pub user_refresh_secret: SigningSecret,
    pub admin_access_secret: SigningSecret,
    pub admin_refresh_secret: SigningSecret,
    pub access_token_expiry_days: i64,
    pub refresh_token_expiry_days: i64,
}

impl JwtConfig {
    pub fn validate(&self) -> Result<(), AppError> {
        let secrets = [
            ("JWT_USER_ACCESS_SECRET", &self.user_access_secret),
            ("JWT_USER_REFRESH_SECRET", &self.user_refresh_secret),
            ("JWT_ADMIN_ACCESS_SECRET", &self.admin_access_secret),
            ("JWT_ADMIN_REFRESH_SECRET", &self.admin_refresh_secret),
        ];

        for (key, secret) in &secrets {
            if secret.is_empty() {
                return Err(AppError::ConfigError(anyhow::anyhow!(
                    "{} must not be empty",
                    key
                )));
            }
        }

        let distinct: HashSet<&str> = secrets.iter().map(|(_, s)| s.expose()).collect();
        if distinct.len() != secrets.len() {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "JWT secrets must be pairwise distinct"
            )));
        }

        if self.access_token_expiry_days <= 0 {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "JWT_ACCESS_TOKEN_EXPIRY_DAYS must be positive"
            )));
        }

        if self.refresh_token_expiry_days <= 0 {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "JWT_REFRESH_TOKEN_EXPIRY_DAYS must be positive"
            )));
        }

        if self.access_token_expiry_days >= self.refresh_token_expiry_days {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "JWT_ACCESS_TOKEN_EXPIRY_DAYS must be shorter than JWT_REFRESH_TOKEN_EXPIRY_DAYS"
            )));
        }

        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct SecurityConfig {
    pub allowed_origins: Vec<String>,
    /// Authorises `POST /admin` without an admin token. `None` disables it.
    pub bootstrap_api_key: Option<SigningSecret>,
}

#[derive(Debug, Clone)]
pub struct SwaggerConfig {
    pub enabled: SwaggerMode,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SwaggerMode {
    Public,
    Disabled,
}

#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    pub login_attempts: u32,
    pub login_window_seconds: u64,
    pub global_ip_limit: u32,
    pub global_ip_window_seconds: u64,
    /// Peers whose `x-forwarded-for` header is believed. Empty means none.
    pub trusted_proxies: Vec<IpAddr>,
}

impl DirectoryConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let common_config = core_config::Config::load()?;

        let env_str = env::var("ENVIRONMENT").unwrap_or_else(|_| "dev".to_string());
        let environment: Environment = env_str
            .parse()
            .map_err(|e: String| AppError::ConfigError(anyhow::anyhow!(e)))?;

        let is_prod = environment == Environment::Prod;

        let config = DirectoryConfig {
            common: common_config,
            environment: environment.clone(),
            service_name: get_env("SERVICE_NAME", Some("directory-service"), is_prod)?,
            service_version: get_env("SERVICE_VERSION", Some(env!("CARGO_PKG_VERSION")), is_prod)?,
            log_level: get_env("LOG_LEVEL", Some("info"), is_prod)?,
            otlp_endpoint: env::var("OTLP_ENDPOINT").ok().filter(|s| !s.is_empty()),
            request_timeout_seconds: parse_env("REQUEST_TIMEOUT_SECONDS", "10", is_prod)?,
            database: DatabaseConfig {
                url: get_env("DATABASE_URL", None, is_prod)?,
                max_connections: parse_env("DATABASE_MAX_CONNECTIONS", "10", is_prod)?,
                min_connections: parse_env("DATABASE_MIN_CONNECTIONS", "1", is_prod)?,
                acquire_timeout_seconds: parse_env(
                    "DATABASE_ACQUIRE_TIMEOUT_SECONDS",
                    "5",
                    is_prod,
                )?,
                statement_timeout_seconds: parse_env(
                    "DATABASE_STATEMENT_TIMEOUT_SECONDS",
                    "5",
                    is_prod,
                )?,
            },
            jwt: JwtConfig {
                user_access_secret: SigningSecret::new(get_env(
                    "JWT_USER_ACCESS_SECRET",
                    None,
                    is_prod,
                )?),
                user_refresh_secret: SigningSecret::new(get_env(
                    "JWT_USER_REFRESH_SECRET",
                    None,
                    is_prod,
                )?),
                admin_access_secret: SigningSecret::new(get_env(
                    "JWT_ADMIN_ACCESS_SECRET",
                    None,
                    is_prod,
                )?),
                admin_refresh_secret: SigningSecret::new(get_env(
                    "JWT_ADMIN_REFRESH_SECRET",
                    None,
                    is_prod,
                )?),
                access_token_expiry_days: parse_env("JWT_ACCESS_TOKEN_EXPIRY_DAYS", "7", is_prod)?,
                refresh_token_expiry_days: parse_env(
                    "JWT_REFRESH_TOKEN_EXPIRY_DAYS",
                    "30",
                    is_prod,
                )?,
            },
            security: SecurityConfig {
                allowed_origins: get_env("ALLOWED_ORIGINS", Some("http://localhost:3000"), is_prod)?
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect(),
                bootstrap_api_key: env::var("BOOTSTRAP_API_KEY")
                    .ok()
                    .map(SigningSecret::new)
                    .filter(|s| !s.is_empty()),
            },
            swagger: SwaggerConfig {
                enabled: get_env("ENABLE_SWAGGER", Some("public"), is_prod)?
                    .parse()
                    .map_err(|e: String| AppError::ConfigError(anyhow::anyhow!(e)))?,
            },
            rate_limit: RateLimitConfig {
                login_attempts: parse_env("RATE_LIMIT_LOGIN_ATTEMPTS", "5", is_prod)?,
                login_window_seconds: parse_env("RATE_LIMIT_LOGIN_WINDOW_SECONDS", "900", is_prod)?,
                global_ip_limit: parse_env("RATE_LIMIT_GLOBAL_IP_LIMIT", "100", is_prod)?,
                global_ip_window_seconds: parse_env(
                    "RATE_LIMIT_GLOBAL_IP_WINDOW_SECONDS",
                    "60",
                    is_prod,
                )?,
                trusted_proxies: parse_ip_list(
                    &env::var("TRUSTED_PROXIES").unwrap_or_default(),
                )?,
            },
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if self.common.port == 0 {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "PORT must be greater than 0"
            )));
        }

        if self.request_timeout_seconds == 0 {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "REQUEST_TIMEOUT_SECONDS must be positive"
            )));
        }

        self.jwt.validate()?;

        if self.environment == Environment::Prod {
            if self.security.allowed_origins.iter().any(|o| o == "*") {
                return Err(AppError::ConfigError(anyhow::anyhow!(
                    "Wildcard CORS origin not allowed in production"
                )));
            }

            if self.swagger.enabled == SwaggerMode::Public {
                tracing::warn!("Swagger UI is publicly accessible in production");
            }
        }

        Ok(())
    }

    pub fn swagger_enabled(&self) -> bool {
        match self.environment {
            Environment::Dev => true,
            Environment::Prod => self.swagger.enabled == SwaggerMode::Public,
        }
    }
}

fn get_env(key: &str, default: Option<&str>, is_prod: bool) -> Result<String, AppError> {
    match env::var(key) {
        Ok(val) => Ok(val),
        Err(_) => {
            if is_prod {
                Err(AppError::ConfigError(anyhow::anyhow!(
                    "{} is required in production but not set",
                    key
                )))
            } else if let Some(def) = default {
                Ok(def.to_string())
            } else {
                Err(AppError::ConfigError(anyhow::anyhow!(
                    "{} is required but not set",
                    key
                )))
            }
        }
    }
}

fn parse_env<T>(key: &str, default: &str, is_prod: bool) -> Result<T, AppError>
where
    T: std::str::FromStr,
    T::Err: fmt::Display,
{
    get_env(key, Some(default), is_prod)?
        .parse()
        .map_err(|e: T::Err| AppError::ConfigError(anyhow::anyhow!("{}: {}", key, e)))
}

fn parse_ip_list(raw: &str) -> Result<Vec<IpAddr>, AppError> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<IpAddr>().map_err(|e| {
                AppError::ConfigError(anyhow::anyhow!("TRUSTED_PROXIES: '{}': {}", s, e))
            })
        })
        .collect()
}

impl std::str::FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "dev" => Ok(Environment::Dev),
            "prod" => Ok(Environment::Prod),
            _ => Err(format!("Invalid environment: {}", s)),
        }
    }
}

impl std::str::FromStr for SwaggerMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "public" | "true" => Ok(SwaggerMode::Public),
            "disabled" | "false" => Ok(SwaggerMode::Disabled),
            _ => Err(format!("Invalid swagger mode: {}", s)),
        }
    }
}
