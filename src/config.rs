use std::env;
use std::str::FromStr;

use crate::{GatewayError, Result};

/// Output format of the log subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

impl FromStr for LogFormat {
    type Err = GatewayError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "text" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            other => Err(GatewayError::Config(format!(
                "LOG_FORMAT must be 'text' or 'json', got '{}'",
                other
            ))),
        }
    }
}

/// Gateway configuration, read from the environment at startup and handed
/// to every handler through `AppState`.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub bind_addr: String,
    pub port: u16,
    /// Base URL of the Elasticsearch cluster.
    pub elasticsearch_url: String,
    /// Externally visible base URL used when building `href` links.
    pub public_url: String,
    pub config_index: String,
    pub workflow_index: String,
    /// Upper bound on documents returned by the list endpoints.
    pub list_limit: usize,
    pub log_format: LogFormat,
    pub cors_enabled: bool,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0".to_string(),
            port: 3030,
            elasticsearch_url: "http://localhost:9200".to_string(),
            public_url: "http://localhost:3030".to_string(),
            config_index: "mf_configs".to_string(),
            workflow_index: "mf_workflows".to_string(),
            list_limit: 1000,
            log_format: LogFormat::Text,
            cors_enabled: true,
        }
    }
}

impl GatewayConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build a configuration from an arbitrary key lookup. Unset keys keep
    /// their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let port = match lookup("PORT") {
            Some(raw) => parse_var("PORT", &raw)?,
            None => defaults.port,
        };

        let public_url = lookup("PUBLIC_URL")
            .unwrap_or_else(|| format!("http://localhost:{}", port))
            .trim_end_matches('/')
            .to_string();

        let elasticsearch_url = lookup("ELASTICSEARCH_URL")
            .unwrap_or(defaults.elasticsearch_url)
            .trim_end_matches('/')
            .to_string();

        let list_limit = match lookup("LIST_LIMIT") {
            Some(raw) => parse_var("LIST_LIMIT", &raw)?,
            None => defaults.list_limit,
        };

        let log_format = match lookup("LOG_FORMAT") {
            Some(raw) => raw.parse()?,
            None => defaults.log_format,
        };

        let cors_enabled = match lookup("CORS_ENABLED") {
            Some(raw) => parse_var("CORS_ENABLED", &raw)?,
            None => defaults.cors_enabled,
        };

        Ok(Self {
            bind_addr: lookup("BIND_ADDR").unwrap_or(defaults.bind_addr),
            port,
            elasticsearch_url,
            public_url,
            config_index: lookup("CONFIG_INDEX").unwrap_or(defaults.config_index),
            workflow_index: lookup("WORKFLOW_INDEX").unwrap_or(defaults.workflow_index),
            list_limit,
            log_format,
            cors_enabled,
        })
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.bind_addr, self.port)
    }

    pub fn workflow_href(&self, workflow_id: &str) -> String {
        format!("{}/workflows/{}", self.public_url, workflow_id)
    }

    pub fn config_href(&self, platform_id: &str) -> String {
        format!("{}/configs/{}", self.public_url, platform_id)
    }
}

fn parse_var<T: FromStr>(key: &str, raw: &str) -> Result<T> {
    raw.trim()
        .parse()
        .map_err(|_| GatewayError::Config(format!("{} has an invalid value '{}'", key, raw)))
}
