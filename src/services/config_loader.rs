use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

use crate::error::ApiError;

pub const ENV_CONFIG_PATH: &str = "EVALBOARD_CONFIG";
pub const ENV_API_URL: &str = "EVALBOARD_API_URL";
pub const DEFAULT_CONFIG_FILE: &str = "evalboard.toml";

#[derive(Debug, Clone, Deserialize)]
pub struct PollingConfig {
    #[serde(default = "default_leaderboard_seconds")]
    pub leaderboard_seconds: u64,
    #[serde(default = "default_worker_logs_seconds")]
    pub worker_logs_seconds: u64,
    #[serde(default = "default_submission_status_seconds")]
    pub submission_status_seconds: u64,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            leaderboard_seconds: default_leaderboard_seconds(),
            worker_logs_seconds: default_worker_logs_seconds(),
            submission_status_seconds: default_submission_status_seconds(),
        }
    }
}

impl PollingConfig {
    pub fn leaderboard_interval(&self) -> Duration {
        Duration::from_secs(self.leaderboard_seconds.max(1))
    }

    pub fn worker_logs_interval(&self) -> Duration {
        Duration::from_secs(self.worker_logs_seconds.max(1))
    }

    pub fn submission_status_interval(&self) -> Duration {
        Duration::from_secs(self.submission_status_seconds.max(1))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DisplayConfig {
    /// Offset used for every rendered timestamp, e.g. `"+05:30"`.
    #[serde(default = "default_utc_offset")]
    pub utc_offset: String,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            utc_offset: default_utc_offset(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_session_file")]
    pub session_file: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            session_file: default_session_file(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_dir: default_log_dir(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct EvalboardConfig {
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
    /// The host submissions list derives its last page from `count / submissions_page_size`.
    #[serde(default = "default_submissions_page_size")]
    pub submissions_page_size: u64,
    #[serde(default)]
    pub polling: PollingConfig,
    #[serde(default)]
    pub display: DisplayConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for EvalboardConfig {
    fn default() -> Self {
        Self {
            api_base_url: default_api_base_url(),
            submissions_page_size: default_submissions_page_size(),
            polling: PollingConfig::default(),
            display: DisplayConfig::default(),
            storage: StorageConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

fn default_api_base_url() -> String {
    "http://localhost:8000/api/".to_string()
}

fn default_submissions_page_size() -> u64 {
    100
}

fn default_leaderboard_seconds() -> u64 {
    5
}

fn default_worker_logs_seconds() -> u64 {
    5
}

fn default_submission_status_seconds() -> u64 {
    5
}

fn default_utc_offset() -> String {
    "+00:00".to_string()
}

fn default_session_file() -> PathBuf {
    PathBuf::from(".evalboard").join("session.json")
}

fn default_log_dir() -> PathBuf {
    PathBuf::from("logs")
}

/// Resolves the config path from an explicit flag, then `EVALBOARD_CONFIG`, then the default file.
pub fn resolve_config_path(explicit: Option<&str>) -> PathBuf {
    if let Some(path) = explicit {
        return PathBuf::from(path);
    }
    match std::env::var(ENV_CONFIG_PATH) {
        Ok(path) if !path.trim().is_empty() => PathBuf::from(path.trim()),
        _ => PathBuf::from(DEFAULT_CONFIG_FILE),
    }
}

pub fn load_evalboard_config(config_path: &Path) -> Result<EvalboardConfig, ApiError> {
    let mut config = if !config_path.exists() {
        info!(
            "config file not found, using defaults: {}",
            config_path.display()
        );
        EvalboardConfig::default()
    } else {
        let raw = fs::read_to_string(config_path).map_err(|err| {
            ApiError::Configuration(format!(
                "Failed to read config at {}: {}",
                config_path.display(),
                err
            ))
        })?;
        parse_evalboard_config(&raw).map_err(|err| {
            ApiError::Configuration(format!(
                "Failed to parse config at {}: {}",
                config_path.display(),
                err
            ))
        })?
    };

    if let Ok(url) = std::env::var(ENV_API_URL)
        && !url.trim().is_empty()
    {
        info!("api_base_url overridden from {}", ENV_API_URL);
        config.api_base_url = url.trim().to_string();
    }

    if config.submissions_page_size == 0 {
        return Err(ApiError::Configuration(
            "submissions_page_size must be greater than zero".to_string(),
        ));
    }

    Ok(config)
}

pub fn parse_evalboard_config(raw: &str) -> Result<EvalboardConfig, toml::de::Error> {
    toml::from_str::<EvalboardConfig>(raw)
}
