use std::{env, str::FromStr, time::Duration};

use url::Url;

use super::{
    env::{
        AnalysisConfig, AppConfig, ConfigError, DirectoryConfig, LoggingConfig, MonitorConfig,
        NotifyConfig,
    },
    settings::{DEFAULT_API_BASE, FALLBACK_API_BASE},
};

pub fn load_config() -> Result<AppConfig, ConfigError> {
    AppConfig::from_lookup(|key| env::var(key).ok())
}

impl AppConfig {
    fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let directories = DirectoryConfig {
            logs_dir: var("LOGS_DIR").unwrap_or_else(|| "logs".to_string()),
            data_dir: var("DATA_DIR").unwrap_or_else(|| "data".to_string()),
            db_filename: var("DB_FILENAME").unwrap_or_else(|| "phish_guard.db".to_string()),
        };

        let logging = LoggingConfig {
            level: var("LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
        };

        let monitor = MonitorConfig {
            debounce: Duration::from_millis(parse_or("DEBOUNCE_MS", var("DEBOUNCE_MS"), 700)?),
            min_webpage_body_chars: parse_or(
                "MIN_WEBPAGE_BODY_CHARS",
                var("MIN_WEBPAGE_BODY_CHARS"),
                80,
            )?,
        };

        let loopback_hosts = match var("ANALYSIS_LOOPBACK_HOSTS") {
            Some(value) => parse_host_pair(&value)?,
            None => [DEFAULT_API_BASE.to_string(), FALLBACK_API_BASE.to_string()],
        };
        let analysis = AnalysisConfig {
            request_timeout: Duration::from_millis(parse_or(
                "ANALYSIS_TIMEOUT_MS",
                var("ANALYSIS_TIMEOUT_MS"),
                10_000,
            )?),
            loopback_hosts,
        };

        let webhook_url = match var("NOTIFY_WEBHOOK_URL") {
            Some(value) => Some(Url::parse(&value).map_err(|_| ConfigError::Invalid {
                key: "NOTIFY_WEBHOOK_URL",
                value,
            })?),
            None => None,
        };

        Ok(Self {
            directories,
            logging,
            monitor,
            analysis,
            notify: NotifyConfig { webhook_url },
        })
    }
}

fn parse_or<T: FromStr>(key: &'static str, value: Option<String>, default: T) -> Result<T, ConfigError> {
    match value {
        Some(value) => value
            .parse::<T>()
            .map_err(|_| ConfigError::Invalid { key, value }),
        None => Ok(default),
    }
}

fn parse_host_pair(value: &str) -> Result<[String; 2], ConfigError> {
    let hosts: Vec<String> = value
        .split(';')
        .map(|part| part.trim().trim_end_matches('/').to_string())
        .filter(|part| !part.is_empty())
        .collect();
    match <[String; 2]>::try_from(hosts) {
        Ok(pair) if pair.iter().all(|host| Url::parse(host).is_ok()) => Ok(pair),
        _ => Err(ConfigError::Invalid {
            key: "ANALYSIS_LOOPBACK_HOSTS",
            value: value.to_string(),
        }),
    }
}
