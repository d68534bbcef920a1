use std::time::Duration;

use thiserror::Error;
use url::Url;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub directories: DirectoryConfig,
    pub logging: LoggingConfig,
    pub monitor: MonitorConfig,
    pub analysis: AnalysisConfig,
    pub notify: NotifyConfig,
}

#[derive(Debug, Clone)]
pub struct DirectoryConfig {
    pub logs_dir: String,
    pub data_dir: String,
    pub db_filename: String,
}

#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub level: String,
}

#[derive(Debug, Clone)]
pub struct MonitorConfig {
    pub debounce: Duration,
    pub min_webpage_body_chars: usize,
}

#[derive(Debug, Clone)]
pub struct AnalysisConfig {
    pub request_timeout: Duration,
    pub loopback_hosts: [String; 2],
}

#[derive(Debug, Clone)]
pub struct NotifyConfig {
    pub webhook_url: Option<Url>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {key}: {value:?}")]
    Invalid { key: &'static str, value: String },
}
