//! Application configuration loaded from environment variables.
//!
//! Credentials are a hard precondition: a run must fail before any network
//! activity when they are absent.

use std::env;
use std::path::PathBuf;

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// Strava OAuth client ID (public)
    pub strava_client_id: String,
    /// Strava OAuth client secret
    pub strava_client_secret: String,
    /// Local port the callback listener binds (0 picks an ephemeral port)
    pub port: u16,
    /// Seconds to wait for the OAuth redirect before giving up (0 disables)
    pub callback_timeout_secs: u64,
    /// Directory the activity export is written to
    pub export_dir: PathBuf,
}

impl Default for Config {
    /// Default config for testing only.
    fn default() -> Self {
        Self {
            strava_client_id: "test_client_id".to_string(),
            strava_client_secret: "test_secret".to_string(),
            port: 0,
            callback_timeout_secs: 5,
            export_dir: PathBuf::from("activities"),
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        Ok(Self {
            strava_client_id: env::var("STRAVA_CLIENT_ID")
                .map_err(|_| ConfigError::Missing("STRAVA_CLIENT_ID"))?,
            strava_client_secret: env::var("STRAVA_CLIENT_SECRET")
                .map(|v| v.trim().to_string())
                .map_err(|_| ConfigError::Missing("STRAVA_CLIENT_SECRET"))?,
            port: env::var("PORT")
                .unwrap_or_else(|_| "8000".to_string())
                .parse()
                .unwrap_or(8000),
            callback_timeout_secs: env::var("CALLBACK_TIMEOUT_SECS")
                .unwrap_or_else(|_| "300".to_string())
                .parse()
                .unwrap_or(300),
            export_dir: env::var("EXPORT_DIR")
                .unwrap_or_else(|_| "activities".to_string())
                .into(),
        })
    }

    /// Redirect URI registered with Strava for this run.
    pub fn redirect_uri(&self) -> String {
        format!("http://localhost:{}", self.port)
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),
}
