use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{name} must be a number, got {value:?}")]
    Invalid { name: &'static str, value: String },
}

/// Startup settings, read from `TODO_*` environment variables.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub port: u16,
    pub database_uri: String,
    pub static_dir: PathBuf,
    pub base_path: String,
    pub log_level: String,
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    pub shutdown_timeout: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str, default: &str| lookup(name).unwrap_or_else(|| default.to_string());

        Ok(Config {
            port: parse(&lookup, "TODO_PORT", 9000)?,
            database_uri: var("TODO_DATABASE_URI", "file:todos.db"),
            static_dir: PathBuf::from(var("TODO_STATIC_DIR", "static")),
            base_path: lookup("TODO_BASE_PATH")
                .map(|path| normalize_base_path(&path))
                .unwrap_or_default(),
            log_level: var("TODO_LOG_LEVEL", "info"),
            connect_timeout: Duration::from_secs(parse(&lookup, "TODO_CONNECT_TIMEOUT_SECS", 10)?),
            request_timeout: Duration::from_secs(parse(&lookup, "TODO_REQUEST_TIMEOUT_SECS", 60)?),
            shutdown_timeout: Duration::from_secs(parse(
                &lookup,
                "TODO_SHUTDOWN_TIMEOUT_SECS",
                30,
            )?),
        })
    }
}

fn parse<F, T>(lookup: &F, name: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(name) {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { name, value }),
        None => Ok(default),
    }
}

fn normalize_base_path(path: &str) -> String {
    let path = path.trim_end_matches('/');
    if path.is_empty() || path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{}", path)
    }
}
