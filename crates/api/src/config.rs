use std::path::PathBuf;

use pagekit_core::types::DbId;

/// Server configuration loaded from environment variables.
///
/// All fields have sensible defaults suitable for local development.
/// In production, override via environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS` env var.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// How long background jobs get to stop after shutdown starts (default: `30`).
    pub shutdown_timeout_secs: u64,
    /// Root of the public extraction tree (default: `public/templates`).
    pub templates_dir: PathBuf,
    /// Destination of editor image uploads (default: `public/storage/uploads`).
    pub uploads_dir: PathBuf,
    /// Extractions older than this many days are removed (default: `30`).
    pub extraction_retention_days: i64,
    /// Interval between cleanup runs in seconds (default: `86400`).
    pub extraction_cleanup_interval_secs: u64,
    /// Owner assigned to templates created without a user (default: `1`).
    pub default_owner_id: DbId,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                            | Default                    |
    /// |------------------------------------|----------------------------|
    /// | `HOST`                             | `0.0.0.0`                  |
    /// | `PORT`                             | `3000`                     |
    /// | `CORS_ORIGINS`                     | `http://localhost:5173`    |
    /// | `REQUEST_TIMEOUT_SECS`             | `30`                       |
    /// | `SHUTDOWN_TIMEOUT_SECS`            | `30`                       |
    /// | `TEMPLATES_DIR`                    | `public/templates`         |
    /// | `UPLOADS_DIR`                      | `public/storage/uploads`   |
    /// | `EXTRACTION_RETENTION_DAYS`        | `30`                       |
    /// | `EXTRACTION_CLEANUP_INTERVAL_SECS` | `86400`                    |
    /// | `DEFAULT_OWNER_ID`                 | `1`                        |
    pub fn from_env() -> Self {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());

        let port: u16 = std::env::var("PORT")
            .unwrap_or_else(|_| "3000".into())
            .parse()
            .expect("PORT must be a valid u16");

        let cors_origins: Vec<String> = std::env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:5173".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let request_timeout_secs: u64 = std::env::var("REQUEST_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".into())
            .parse()
            .expect("REQUEST_TIMEOUT_SECS must be a valid u64");

        let shutdown_timeout_secs: u64 = std::env::var("SHUTDOWN_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".into())
            .parse()
            .expect("SHUTDOWN_TIMEOUT_SECS must be a valid u64");

        let templates_dir = PathBuf::from(
            std::env::var("TEMPLATES_DIR").unwrap_or_else(|_| "public/templates".into()),
        );

        let uploads_dir = PathBuf::from(
            std::env::var("UPLOADS_DIR").unwrap_or_else(|_| "public/storage/uploads".into()),
        );

        let extraction_retention_days: i64 = std::env::var("EXTRACTION_RETENTION_DAYS")
            .unwrap_or_else(|_| "30".into())
            .parse()
            .expect("EXTRACTION_RETENTION_DAYS must be a valid i64");

        let extraction_cleanup_interval_secs: u64 =
            std::env::var("EXTRACTION_CLEANUP_INTERVAL_SECS")
                .unwrap_or_else(|_| "86400".into())
                .parse()
                .expect("EXTRACTION_CLEANUP_INTERVAL_SECS must be a valid u64");

        let default_owner_id: DbId = std::env::var("DEFAULT_OWNER_ID")
            .unwrap_or_else(|_| "1".into())
            .parse()
            .expect("DEFAULT_OWNER_ID must be a valid i64");

        Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            shutdown_timeout_secs,
            templates_dir,
            uploads_dir,
            extraction_retention_days,
            extraction_cleanup_interval_secs,
            default_owner_id,
        }
    }
}
