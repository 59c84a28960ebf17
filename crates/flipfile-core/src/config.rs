//! Configuration module
//!
//! Environment-driven configuration for the conversion service. Every knob
//! has a default so the service starts with no environment at all.

use std::env;
use std::path::PathBuf;

const DEFAULT_SERVER_PORT: u16 = 5000;
const DEFAULT_MAX_FILE_SIZE_MB: usize = 50;
const DEFAULT_RATE_LIMIT: u32 = 10;
const DEFAULT_RATE_WINDOW_SECS: u64 = 60;
const DEFAULT_SWEEP_MAX_AGE_SECS: u64 = 3600;
const DEFAULT_UPLOAD_DIR: &str = "uploads";

/// Service configuration, loaded once at startup.
#[derive(Clone, Debug)]
pub struct Config {
    server_port: u16,
    cors_origins: Vec<String>,
    upload_dir: PathBuf,
    max_file_size_bytes: usize,
    rate_limit: u32,
    rate_window_secs: u64,
    sweep_max_age_secs: u64,
    pdfium_library_path: Option<PathBuf>,
    trusted_proxy_count: usize,
    environment: String,
}

impl Config {
    /// Load configuration from the environment (with `.env` support).
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();

        let max_file_size_mb = parse_env("MAX_FILE_SIZE_MB", DEFAULT_MAX_FILE_SIZE_MB)?;

        Ok(Config {
            server_port: parse_env("PORT", DEFAULT_SERVER_PORT)?,
            cors_origins: env::var("CORS_ORIGINS")
                .unwrap_or_else(|_| "*".to_string())
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            upload_dir: PathBuf::from(
                env::var("UPLOAD_DIR").unwrap_or_else(|_| DEFAULT_UPLOAD_DIR.to_string()),
            ),
            max_file_size_bytes: max_file_size_mb * 1024 * 1024,
            rate_limit: parse_env("RATE_LIMIT", DEFAULT_RATE_LIMIT)?,
            rate_window_secs: parse_env("RATE_WINDOW_SECS", DEFAULT_RATE_WINDOW_SECS)?,
            sweep_max_age_secs: parse_env("SWEEP_MAX_AGE_SECS", DEFAULT_SWEEP_MAX_AGE_SECS)?,
            pdfium_library_path: env::var("PDFIUM_LIB_PATH").ok().map(PathBuf::from),
            trusted_proxy_count: parse_env("TRUSTED_PROXY_COUNT", 1)?,
            environment: env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string()),
        })
    }

    pub fn server_port(&self) -> u16 {
        self.server_port
    }

    pub fn cors_origins(&self) -> &[String] {
        &self.cors_origins
    }

    pub fn upload_dir(&self) -> &PathBuf {
        &self.upload_dir
    }

    pub fn max_file_size_bytes(&self) -> usize {
        self.max_file_size_bytes
    }

    pub fn rate_limit(&self) -> u32 {
        self.rate_limit
    }

    pub fn rate_window_secs(&self) -> u64 {
        self.rate_window_secs
    }

    pub fn sweep_max_age_secs(&self) -> u64 {
        self.sweep_max_age_secs
    }

    /// Explicit pdfium shared-library location, when the operator pinned one.
    pub fn pdfium_library_path(&self) -> Option<&PathBuf> {
        self.pdfium_library_path.as_ref()
    }

    pub fn trusted_proxy_count(&self) -> usize {
        self.trusted_proxy_count
    }

    pub fn environment(&self) -> &str {
        &self.environment
    }

    pub fn is_production(&self) -> bool {
        let env = self.environment.to_lowercase();
        env == "production" || env == "prod"
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> Result<T, anyhow::Error>
where
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .parse::<T>()
            .map_err(|e| anyhow::anyhow!("Invalid value for {}: {}", key, e)),
        Err(_) => Ok(default),
    }
}
