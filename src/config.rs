use std::env;
use std::time::Duration;

use reqwest::Url;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} is not set; the analysis service endpoint must be configured")]
    Missing(&'static str),
    #[error("{name} is not a valid URL: {reason}")]
    InvalidUrl { name: &'static str, reason: String },
    #[error("{name} must be a positive number of seconds, got '{value}'")]
    InvalidDuration { name: &'static str, value: String },
    #[error("Failed to build HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),
}

#[derive(Debug, Clone)]
pub struct Config {
    pub endpoint: Url,
    pub request_timeout: Duration,
    pub connect_timeout: Duration,
}

impl Config {
    pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
    pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_env_with_endpoint(None)
    }

    /// Like [`Config::from_env`], but an explicit endpoint (e.g. from a CLI
    /// flag) takes precedence over `ANALYSIS_API_URL`.
    pub fn from_env_with_endpoint(endpoint: Option<&str>) -> Result<Self, ConfigError> {
        let endpoint = match endpoint {
            Some(url) => url.to_string(),
            None => env::var("ANALYSIS_API_URL")
                .map_err(|_| ConfigError::Missing("ANALYSIS_API_URL"))?,
        };

        Ok(Config {
            endpoint: parse_endpoint("ANALYSIS_API_URL", &endpoint)?,
            request_timeout: seconds_from_env("ANALYSIS_TIMEOUT_SECS", Self::DEFAULT_TIMEOUT_SECS)?,
            connect_timeout: seconds_from_env(
                "ANALYSIS_CONNECT_TIMEOUT_SECS",
                Self::DEFAULT_CONNECT_TIMEOUT_SECS,
            )?,
        })
    }

    /// Build a config for an explicit endpoint with default timeouts.
    pub fn new(endpoint: &str) -> Result<Self, ConfigError> {
        Ok(Config {
            endpoint: parse_endpoint("endpoint", endpoint)?,
            request_timeout: Duration::from_secs(Self::DEFAULT_TIMEOUT_SECS),
            connect_timeout: Duration::from_secs(Self::DEFAULT_CONNECT_TIMEOUT_SECS),
        })
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// `{endpoint}/analyze`, tolerating a trailing slash on the base URL.
    pub fn analyze_url(&self) -> String {
        format!("{}/analyze", self.endpoint.as_str().trim_end_matches('/'))
    }

    pub fn health_url(&self) -> String {
        format!("{}/", self.endpoint.as_str().trim_end_matches('/'))
    }
}

fn parse_endpoint(name: &'static str, value: &str) -> Result<Url, ConfigError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ConfigError::Missing(name));
    }

    let url = Url::parse(trimmed).map_err(|e| ConfigError::InvalidUrl {
        name,
        reason: e.to_string(),
    })?;

    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(ConfigError::InvalidUrl {
            name,
            reason: format!("unsupported scheme '{other}'"),
        }),
    }
}

fn seconds_from_env(name: &'static str, default: u64) -> Result<Duration, ConfigError> {
    match env::var(name) {
        Ok(value) => match value.trim().parse::<u64>() {
            Ok(secs) if secs > 0 => Ok(Duration::from_secs(secs)),
            _ => Err(ConfigError::InvalidDuration { name, value }),
        },
        Err(_) => Ok(Duration::from_secs(default)),
    }
}
