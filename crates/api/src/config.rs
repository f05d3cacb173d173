//! Application configuration

use std::env;
use std::time::Duration;

use crate::tenancy::OverrideMode;

/// Deployment environment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AppEnv {
    #[default]
    Production,
    Development,
}

impl AppEnv {
    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }

    /// Anything that is not explicitly a development environment is production
    fn from_env_value(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "development" | "dev" | "local" | "test" => Self::Development,
            _ => Self::Production,
        }
    }
}

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    // Server
    pub bind_address: String,
    pub base_domain: String, // e.g., "campfire.org" for *.campfire.org tenants
    pub app_env: AppEnv,

    // Database
    pub database_url: String,
    pub database_max_connections: u32,

    // Redis (cross-instance cache invalidation)
    pub redis_url: Option<String>,

    // Tenant directory cache
    pub tenant_cache_ttl: Duration,
    pub tenant_negative_cache_ttl: Duration,
    pub tenant_cache_cleanup_interval: Duration,

    // Tenant overrides
    pub tenant_override: OverrideMode,
    pub tenant_override_header: String,
    pub tenant_override_query: String,

    // Platform administration
    pub admin_api_token: Option<String>,

    // Logging
    pub log_level: String,
    pub log_json: bool,
}

/// Minimum length of the platform admin token
const MIN_ADMIN_TOKEN_LEN: usize = 32;

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let app_env = env::var("APP_ENV")
            .map(|v| AppEnv::from_env_value(&v))
            .unwrap_or_default();

        let tenant_override = match env::var("TENANT_OVERRIDE") {
            Ok(value) => value
                .parse::<OverrideMode>()
                .map_err(|_| ConfigError::Invalid("TENANT_OVERRIDE", value))?,
            // Overrides are a development convenience unless enabled explicitly
            Err(_) if app_env.is_production() => OverrideMode::Disabled,
            Err(_) => OverrideMode::Open,
        };

        if app_env.is_production() && tenant_override == OverrideMode::Open {
            return Err(ConfigError::InsecureOverride);
        }

        let admin_api_token = env::var("ADMIN_API_TOKEN").ok().filter(|t| !t.is_empty());
        if let Some(token) = &admin_api_token {
            if token.len() < MIN_ADMIN_TOKEN_LEN {
                return Err(ConfigError::WeakSecret(
                    "ADMIN_API_TOKEN must be at least 32 characters",
                ));
            }
        }

        Ok(Self {
            // Server
            bind_address: env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:3000".to_string()),
            base_domain: env::var("BASE_DOMAIN").unwrap_or_else(|_| "localhost".to_string()),
            app_env,

            // Database
            database_url: env::var("DATABASE_URL")
                .map_err(|_| ConfigError::Missing("DATABASE_URL"))?,
            database_max_connections: env::var("DATABASE_MAX_CONNECTIONS")
                .unwrap_or_else(|_| "10".to_string())
                .parse()
                .unwrap_or(10),

            // Redis
            redis_url: env::var("REDIS_URL").ok().filter(|u| !u.is_empty()),

            // Tenant directory cache
            tenant_cache_ttl: secs_from_env("TENANT_CACHE_TTL_SECS", 300),
            tenant_negative_cache_ttl: secs_from_env("TENANT_NEGATIVE_CACHE_TTL_SECS", 30),
            tenant_cache_cleanup_interval: secs_from_env("TENANT_CACHE_CLEANUP_SECS", 60),

            // Tenant overrides
            tenant_override,
            tenant_override_header: env::var("TENANT_OVERRIDE_HEADER")
                .unwrap_or_else(|_| "x-tenant-override".to_string())
                .to_lowercase(),
            tenant_override_query: env::var("TENANT_OVERRIDE_QUERY")
                .unwrap_or_else(|_| "tenant".to_string()),

            // Platform administration
            admin_api_token,

            // Logging
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            log_json: env::var("LOG_FORMAT")
                .map(|f| f.eq_ignore_ascii_case("json"))
                .unwrap_or(false),
        })
    }
}

fn secs_from_env(name: &str, default: u64) -> Duration {
    let secs = env::var(name)
        .unwrap_or_else(|_| default.to_string())
        .parse()
        .unwrap_or(default);
    Duration::from_secs(secs)
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),
    #[error("Invalid value for {0}: {1}")]
    Invalid(&'static str, String),
    #[error("TENANT_OVERRIDE=open is not allowed in production")]
    InsecureOverride,
    #[error("Weak secret: {0}")]
    WeakSecret(&'static str),
}
