//! Logic for loading configuration in to an object model

mod server;

use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use displaydoc::Display;
use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

pub use self::server::Server;

/// Configuration error.
#[derive(Debug, Error, Display)]
#[non_exhaustive]
pub enum ConfigurationError {
    /// could not read configuration file {path}: {error}
    CannotReadConfigFile {
        path: String,
        error: std::io::Error,
    },
    /// could not deserialize configuration: {0}
    DeserializeConfigError(serde_yaml::Error),
    /// {message}: {error}
    InvalidConfiguration {
        message: &'static str,
        error: String,
    },
}

/// The configuration for the endpoint.
///
/// Can be created through `serde::Deserialize` from various formats,
/// or inline in Rust code with the builders.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Configuration {
    /// Configuration options pertaining to the http server component.
    #[serde(default)]
    pub server: Server,

    /// The interactive explorer served to browsers.
    #[serde(default)]
    pub explorer: Explorer,

    /// Streaming of subscription results.
    #[serde(default)]
    pub subscription: Subscription,

    /// The upstream used by the bundled HTTP executor.
    #[serde(default)]
    pub executor: ExecutorConfig,
}

#[buildstructor::buildstructor]
impl Configuration {
    #[builder]
    pub fn new(
        server: Option<Server>,
        explorer: Option<Explorer>,
        subscription: Option<Subscription>,
        executor: Option<ExecutorConfig>,
    ) -> Result<Self, ConfigurationError> {
        let configuration = Self {
            server: server.unwrap_or_default(),
            explorer: explorer.unwrap_or_default(),
            subscription: subscription.unwrap_or_default(),
            executor: executor.unwrap_or_default(),
        };
        configuration.validate()
    }

    /// Read and validate a YAML configuration file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigurationError> {
        let raw = std::fs::read_to_string(path).map_err(|error| {
            ConfigurationError::CannotReadConfigFile {
                path: path.display().to_string(),
                error,
            }
        })?;
        raw.parse()
    }

    pub(crate) fn validate(self) -> Result<Self, ConfigurationError> {
        if !self.server.path.starts_with('/') {
            return Err(ConfigurationError::InvalidConfiguration {
                message: "invalid 'server.path' configuration",
                error: format!("'{}' must start with '/'", self.server.path),
            });
        }
        if self.server.max_request_bytes == 0 {
            return Err(ConfigurationError::InvalidConfiguration {
                message: "invalid 'server.max_request_bytes' configuration",
                error: "the limit must be greater than zero".to_string(),
            });
        }
        if self.subscription.heartbeat_interval.is_zero() {
            return Err(ConfigurationError::InvalidConfiguration {
                message: "invalid 'subscription.heartbeat_interval' configuration",
                error: "the interval must be greater than zero".to_string(),
            });
        }
        if let Some(url) = &self.executor.url {
            reqwest::Url::parse(url).map_err(|error| ConfigurationError::InvalidConfiguration {
                message: "invalid 'executor.url' configuration",
                error: error.to_string(),
            })?;
        }
        Ok(self)
    }
}

impl FromStr for Configuration {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // an empty file is an empty configuration
        if s.trim().is_empty() {
            return Ok(Configuration::default());
        }
        serde_yaml::from_str::<Configuration>(s)
            .map_err(ConfigurationError::DeserializeConfigError)?
            .validate()
    }
}

fn default_explorer_enabled() -> bool {
    true
}

fn default_explorer_title() -> String {
    String::from("GraphiQL")
}

/// Configuration for the explorer page
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields, default)]
pub struct Explorer {
    /// Serve the explorer to clients preferring HTML; defaults to true
    pub enabled: bool,

    /// The page title; defaults to GraphiQL
    pub title: String,
}

impl Default for Explorer {
    fn default() -> Self {
        Self {
            enabled: default_explorer_enabled(),
            title: default_explorer_title(),
        }
    }
}

#[buildstructor::buildstructor]
impl Explorer {
    #[builder]
    pub fn new(enabled: Option<bool>, title: Option<String>) -> Self {
        Self {
            enabled: enabled.unwrap_or_else(default_explorer_enabled),
            title: title.unwrap_or_else(default_explorer_title),
        }
    }
}

fn default_heartbeat_interval() -> Duration {
    Duration::from_secs(5)
}

/// Configuration for subscription responses
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields, default)]
pub struct Subscription {
    /// Interval between heartbeat parts, in human-readable format; defaults to 5s
    #[serde(with = "humantime_serde")]
    pub heartbeat_interval: Duration,
}

impl Default for Subscription {
    fn default() -> Self {
        Self {
            heartbeat_interval: default_heartbeat_interval(),
        }
    }
}

#[buildstructor::buildstructor]
impl Subscription {
    #[builder]
    pub fn new(heartbeat_interval: Option<Duration>) -> Self {
        Self {
            heartbeat_interval: heartbeat_interval.unwrap_or_else(default_heartbeat_interval),
        }
    }
}

fn default_executor_timeout() -> Duration {
    Duration::from_secs(30)
}

/// Configuration for the bundled HTTP executor
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields, default)]
pub struct ExecutorConfig {
    /// The upstream GraphQL endpoint
    pub url: Option<String>,

    /// Timeout for single responses, in human-readable format; defaults to 30s
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            url: None,
            timeout: default_executor_timeout(),
        }
    }
}

#[buildstructor::buildstructor]
impl ExecutorConfig {
    #[builder]
    pub fn new(url: Option<String>, timeout: Option<Duration>) -> Self {
        Self {
            url,
            timeout: timeout.unwrap_or_else(default_executor_timeout),
        }
    }
}
