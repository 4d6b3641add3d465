use crate::rate_limit::RateLimitConfig;

/// Upper bound for `ACCESS_TOKEN_AGE`: 30 days.
pub const MAX_ACCESS_TOKEN_AGE: i64 = 30 * 24 * 60 * 60;

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),
    #[error("JWT_SECRET must be at least 32 characters long")]
    WeakSecret,
    #[error("invalid value for {0}")]
    Invalid(&'static str),
}

/// Runtime configuration collected from environment variables.
#[derive(Clone, Debug)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub database_url: Option<String>,
    pub database_max_connections: u32,
    pub jwt_secret: String,
    pub access_token_age: i64,
    pub frontend_url: Option<String>,
    pub enable_hsts: bool,
    pub rate_limit_enabled: bool,
    pub rate_limit: RateLimitConfig,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from an arbitrary variable lookup; `from_env` passes the process environment.
    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        fn parse<T: std::str::FromStr>(raw: Option<String>, name: &'static str, default: T) -> Result<T, ConfigError> {
            match raw {
                Some(v) => v.parse().map_err(|_| ConfigError::Invalid(name)),
                None => Ok(default),
            }
        }
        fn flag(raw: Option<String>) -> bool {
            raw.map(|v| v == "1" || v.eq_ignore_ascii_case("true")).unwrap_or(false)
        }

        let jwt_secret = get("JWT_SECRET").ok_or(ConfigError::Missing("JWT_SECRET"))?;
        if jwt_secret.len() < 32 {
            return Err(ConfigError::WeakSecret);
        }
        let access_token_age = parse(get("ACCESS_TOKEN_AGE"), "ACCESS_TOKEN_AGE", 3600)?;
        if !(1..=MAX_ACCESS_TOKEN_AGE).contains(&access_token_age) {
            return Err(ConfigError::Invalid("ACCESS_TOKEN_AGE"));
        }

        Ok(Self {
            host: get("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port: parse(get("PORT"), "PORT", 5000)?,
            database_url: get("DATABASE_URL"),
            database_max_connections: parse(get("DATABASE_MAX_CONNECTIONS"), "DATABASE_MAX_CONNECTIONS", 5)?,
            jwt_secret,
            access_token_age,
            frontend_url: get("FRONTEND_URL"),
            enable_hsts: flag(get("ENABLE_HSTS")),
            rate_limit_enabled: get("RL_ENABLED").map(|v| flag(Some(v))).unwrap_or(true),
            rate_limit: RateLimitConfig::from_lookup(&get)?,
        })
    }
}
