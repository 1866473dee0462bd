//! Configuration module
//!
//! Environment-driven configuration with per-field defaults. The bundle is
//! immutable after startup and handed to the API state rather than read
//! ambiently by callees.

use std::env;
use std::path::PathBuf;

const DEFAULT_PORT: u16 = 8000;
const DEFAULT_MAX_FILE_SIZE: usize = 10 * 1024 * 1024;
const DEFAULT_UPLOAD_FOLDER: &str = "uploads";
const DEFAULT_DATABASE_URL: &str = "sqlite://rowlens.db";
const DEFAULT_ALLOWED_ORIGINS: &str = "http://localhost:3000";
const MAX_CONNECTIONS: u32 = 5;
const CONNECTION_TIMEOUT_SECS: u64 = 30;

/// Application configuration.
#[derive(Clone, Debug)]
pub struct Config {
    pub server_port: u16,
    pub database_url: String,
    pub db_max_connections: u32,
    pub db_timeout_seconds: u64,
    pub upload_folder: PathBuf,
    pub max_file_size_bytes: usize,
    pub allowed_origins: Vec<String>,
    pub environment: String,
}

/// Load a `.env` file if one is present. Missing files are fine; deployment
/// platforms set real environment variables directly.
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

impl Config {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        load_dotenv();

        let environment = env::var("ENVIRONMENT")
            .or_else(|_| env::var("APP_ENV"))
            .unwrap_or_else(|_| "development".to_string());

        let allowed_origins: Vec<String> = env::var("ALLOWED_ORIGINS")
            .unwrap_or_else(|_| DEFAULT_ALLOWED_ORIGINS.to_string())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let config = Config {
            server_port: env::var("PORT")
                .unwrap_or_else(|_| DEFAULT_PORT.to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("PORT must be a valid number"))?,
            database_url: env::var("DATABASE_URL")
                .unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_string()),
            db_max_connections: env::var("DB_MAX_CONNECTIONS")
                .unwrap_or_else(|_| MAX_CONNECTIONS.to_string())
                .parse()
                .unwrap_or(MAX_CONNECTIONS),
            db_timeout_seconds: env::var("DB_TIMEOUT_SECONDS")
                .unwrap_or_else(|_| CONNECTION_TIMEOUT_SECS.to_string())
                .parse()
                .unwrap_or(CONNECTION_TIMEOUT_SECS),
            upload_folder: PathBuf::from(
                env::var("UPLOAD_FOLDER").unwrap_or_else(|_| DEFAULT_UPLOAD_FOLDER.to_string()),
            ),
            max_file_size_bytes: env::var("MAX_FILE_SIZE")
                .unwrap_or_else(|_| DEFAULT_MAX_FILE_SIZE.to_string())
                .parse()
                .unwrap_or(DEFAULT_MAX_FILE_SIZE),
            allowed_origins,
            environment,
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.max_file_size_bytes == 0 {
            return Err(anyhow::anyhow!("MAX_FILE_SIZE must be greater than zero"));
        }
        if self.is_production() && self.allowed_origins.iter().any(|o| o == "*") {
            return Err(anyhow::anyhow!(
                "ALLOWED_ORIGINS cannot be '*' in production. Please specify explicit origins."
            ));
        }
        Ok(())
    }

    pub fn is_production(&self) -> bool {
        let env = self.environment.to_lowercase();
        env == "production" || env == "prod"
    }

    pub fn max_file_size_mb(&self) -> f64 {
        self.max_file_size_bytes as f64 / (1024.0 * 1024.0)
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            server_port: DEFAULT_PORT,
            database_url: DEFAULT_DATABASE_URL.to_string(),
            db_max_connections: MAX_CONNECTIONS,
            db_timeout_seconds: CONNECTION_TIMEOUT_SECS,
            upload_folder: PathBuf::from(DEFAULT_UPLOAD_FOLDER),
            max_file_size_bytes: DEFAULT_MAX_FILE_SIZE,
            allowed_origins: vec![DEFAULT_ALLOWED_ORIGINS.to_string()],
            environment: "development".to_string(),
        }
    }
}
