use registry::config::{RegistryConfig, ValidationError};
use serde::Deserialize;
use std::fs::File;
use std::path::Path;

#[derive(Deserialize, Debug)]
pub struct Listener {
    pub host: String,
    pub port: u16,
}

impl Default for Listener {
    fn default() -> Self {
        Listener {
            host: "127.0.0.1".into(),
            port: 3000,
        }
    }
}

#[derive(Deserialize, Debug)]
pub struct MetricsConfig {
    pub statsd_host: String,
    pub statsd_port: u16,
}

#[derive(Deserialize, Debug)]
pub struct LoggingConfig {
    pub sentry_dsn: String,
}

/// Rate-limiter parameters applied over the built-in defaults at startup.
/// Zero tokens/refill values keep the defaults; capacity always applies.
#[derive(Deserialize, Debug)]
pub struct RateLimiterSettings {
    #[serde(default = "RateLimiterSettings::default_capacity")]
    pub capacity: u32,
    #[serde(default)]
    pub tokens: u32,
    #[serde(default)]
    pub refill_duration: u64,
}

impl RateLimiterSettings {
    fn default_capacity() -> u32 {
        20
    }
}

#[derive(Deserialize, Debug)]
pub struct Config {
    #[serde(default)]
    pub listener: Listener,
    pub registry: RegistryConfig,
    pub rate_limiter: Option<RateLimiterSettings>,
    pub metrics: Option<MetricsConfig>,
    pub logging: Option<LoggingConfig>,
}

impl Config {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let file = File::open(path)?;
        let config = serde_yaml::from_reader(file)?;

        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        self.registry.validate()
    }
}

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("could not load config from file: {0}")]
    LoadError(#[from] std::io::Error),
    #[error("could not parse config: {0}")]
    ParseError(#[from] serde_yaml::Error),
}
