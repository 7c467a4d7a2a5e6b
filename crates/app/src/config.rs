//! Runtime configuration for the CLI.
//!
//! Values come from the environment (a `.env` file is honoured outside of
//! tests) and can be overridden by command-line flags.

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::Level;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for the environment variable {0}: {1}")]
    InvalidValue(&'static str, String),
    #[error("invalid database url: {0}")]
    InvalidDbUrl(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[derive(Clone, Debug)]
pub struct Config {
    pub db_url: String,
    /// Provider-issued token; anonymous sign-in when absent.
    pub auth_token: Option<String>,
    pub admin_user: Option<String>,
    /// Where the anonymous user id is kept between runs.
    pub identity_file: PathBuf,
    pub log_level: Level,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` for an unparsable log level.
    pub fn from_env() -> Result<Self, ConfigError> {
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }

        let db_url = std::env::var("READING_DB_URL")
            .ok()
            .map_or_else(|| "sqlite://reading.sqlite3".into(), normalize_sqlite_url);
        let auth_token = non_empty(std::env::var("READING_AUTH_TOKEN").ok());
        let admin_user = non_empty(std::env::var("READING_ADMIN_USER").ok());
        let identity_file = std::env::var("READING_IDENTITY_FILE")
            .map_or_else(|_| PathBuf::from(".reading-identity"), PathBuf::from);

        let raw_level = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into());
        let log_level = raw_level
            .parse::<Level>()
            .map_err(|_| ConfigError::InvalidValue("RUST_LOG", raw_level.clone()))?;

        Ok(Self {
            db_url,
            auth_token,
            admin_user,
            identity_file,
            log_level,
        })
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Turns `sqlite:path` or a bare path into an absolute `sqlite://` URL.
pub fn normalize_sqlite_url(raw: String) -> String {
    if raw == "sqlite::memory:" || raw.starts_with("sqlite://") {
        return raw;
    }

    let trimmed = raw.trim().to_string();
    let path_str = trimmed
        .strip_prefix("sqlite:")
        .unwrap_or(trimmed.as_str())
        .to_string();
    let path = Path::new(&path_str);
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .unwrap_or_else(|_| PathBuf::from("."))
            .join(path)
    };
    format!("sqlite://{}", absolute.display())
}

/// Makes sure the database file and its directory exist.
///
/// # Errors
///
/// Returns `ConfigError` if the URL has no path or the file cannot be created.
pub fn prepare_sqlite_file(db_url: &str) -> Result<(), ConfigError> {
    if db_url == "sqlite::memory:" {
        return Ok(());
    }

    let path = db_url
        .strip_prefix("sqlite://")
        .ok_or_else(|| ConfigError::InvalidDbUrl(db_url.to_string()))?;
    let path = path.split('?').next().unwrap_or(path);
    if path.is_empty() {
        return Err(ConfigError::InvalidDbUrl(db_url.to_string()));
    }

    let path = Path::new(path);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    if !path.exists() {
        std::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(path)?;
    }

    Ok(())
}
