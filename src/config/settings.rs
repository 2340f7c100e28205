//! Process settings from environment variables, each with a default.

use crate::error::ConfigError;
use std::str::FromStr;
use std::time::Duration;

pub const PRODUCTION: &str = "production";

#[derive(Clone, Debug)]
pub struct Settings {
    pub database_url: String,
    pub listen_addr: String,
    /// Deployment environment. Cache keys outside production carry it as a suffix.
    pub environment: String,
    pub cache_expiry: Duration,
    pub default_limit: u64,
    pub max_connections: u32,
    pub model_path: String,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            database_url: "postgres://localhost/crud".into(),
            listen_addr: "0.0.0.0:3000".into(),
            environment: "development".into(),
            cache_expiry: Duration::from_secs(60),
            default_limit: 100,
            max_connections: 5,
            model_path: "model.json".into(),
        }
    }
}

impl Settings {
    /// Read settings from the process environment. Call `dotenvy::dotenv()` first to honor a `.env` file.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let d = Settings::default();
        Ok(Settings {
            database_url: get("DATABASE_URL").unwrap_or(d.database_url),
            listen_addr: get("CRUD_LISTEN_ADDR").unwrap_or(d.listen_addr),
            environment: get("CRUD_ENVIRONMENT").unwrap_or(d.environment),
            cache_expiry: parsed(&get, "CRUD_CACHE_EXPIRY_SECONDS")?
                .map(Duration::from_secs)
                .unwrap_or(d.cache_expiry),
            default_limit: parsed(&get, "CRUD_DEFAULT_LIMIT")?.unwrap_or(d.default_limit),
            max_connections: parsed(&get, "CRUD_MAX_CONNECTIONS")?.unwrap_or(d.max_connections),
            model_path: get("CRUD_MODEL_PATH").unwrap_or(d.model_path),
        })
    }
}

fn parsed<T: FromStr>(
    get: &impl Fn(&str) -> Option<String>,
    name: &'static str,
) -> Result<Option<T>, ConfigError>
where
    T::Err: std::fmt::Display,
{
    get(name)
        .map(|raw| {
            raw.trim().parse::<T>().map_err(|e| ConfigError::Setting {
                name,
                reason: format!("{:?}: {}", raw, e),
            })
        })
        .transpose()
}
