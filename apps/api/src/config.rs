use anyhow::{bail, Context, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    Postgres,
    Memory,
}

/// Application configuration loaded from environment variables.
/// Startup fails if a required variable is missing or malformed.
#[derive(Debug, Clone)]
pub struct Config {
    pub storage_backend: StorageBackend,
    /// Required when `storage_backend` is `Postgres`.
    pub database_url: Option<String>,
    pub port: u16,
    pub rust_log: String,
    /// Load-apply-commit attempts before a concurrency conflict is returned.
    pub commit_max_attempts: u32,
    /// Upper bound for `limit` on history queries.
    pub history_limit_max: usize,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        let storage_backend = match optional_env("STORAGE_BACKEND")
            .unwrap_or_else(|| "postgres".to_string())
            .to_lowercase()
            .as_str()
        {
            "postgres" => StorageBackend::Postgres,
            "memory" => StorageBackend::Memory,
            other => bail!("STORAGE_BACKEND must be 'postgres' or 'memory', got '{other}'"),
        };

        let database_url = match storage_backend {
            StorageBackend::Postgres => Some(require_env("DATABASE_URL")?),
            StorageBackend::Memory => optional_env("DATABASE_URL"),
        };

        let commit_max_attempts = parse_env("COMMIT_MAX_ATTEMPTS", 3u32)?;
        if commit_max_attempts == 0 {
            bail!("COMMIT_MAX_ATTEMPTS must be at least 1");
        }

        Ok(Config {
            storage_backend,
            database_url,
            port: parse_env("PORT", 8080u16).context("PORT must be a valid port number")?,
            rust_log: optional_env("RUST_LOG").unwrap_or_else(|| "info".to_string()),
            commit_max_attempts,
            history_limit_max: parse_env("HISTORY_LIMIT_MAX", 100usize)?,
        })
    }
}

fn optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn require_env(key: &str) -> Result<String> {
    optional_env(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

fn parse_env<T>(key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match optional_env(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("Environment variable '{key}' has invalid value '{raw}'")),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_env_default_when_unset() {
        let value: u32 = parse_env("WASTEWISE_TEST_SURELY_UNSET_VAR", 7).unwrap();
        assert_eq!(value, 7);
    }
}
