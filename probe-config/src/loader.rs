//! Configuration loading and environment variable handling

use crate::domains::ProbeConfig;
use crate::error::{ConfigError, ConfigResult};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// Configuration loader with environment variable support
pub struct ConfigLoader {
    /// Environment variable prefix
    prefix: String,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    /// Create a new config loader with default prefix
    pub fn new() -> Self {
        Self {
            prefix: "EWMA_PROBE".to_string(),
        }
    }

    /// Create a new config loader with custom prefix
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    /// Load configuration from a YAML file with environment overrides
    pub fn from_file(&self, path: impl AsRef<Path>) -> ConfigResult<ProbeConfig> {
        let path = path.as_ref();
        tracing::debug!("Loading configuration from {}", path.display());

        let content = std::fs::read_to_string(path)?;
        let mut config: ProbeConfig = serde_yaml::from_str(&content)?;

        self.apply_env_overrides(&mut config)?;
        config.validate_all()?;

        Ok(config)
    }

    /// Load configuration from environment variables only
    pub fn from_env(&self) -> ConfigResult<ProbeConfig> {
        let mut config = ProbeConfig::default();
        self.apply_env_overrides(&mut config)?;
        config.validate_all()?;
        Ok(config)
    }

    /// Load configuration with fallback chain
    pub fn load(&self, config_path: Option<impl AsRef<Path>>) -> ConfigResult<ProbeConfig> {
        match config_path {
            Some(path) => self.from_file(path),
            None => self.from_env(),
        }
    }

    /// Apply environment variable overrides to configuration
    fn apply_env_overrides(&self, config: &mut ProbeConfig) -> ConfigResult<()> {
        if let Some(level) = self.parsed_env("LOG_LEVEL")? {
            config.logging.level = level;
        }
        if let Some(format) = self.parsed_env("LOG_FORMAT")? {
            config.logging.format = format;
        }

        if let Some(seconds) = self.parsed_env::<u64>("HTTP_TIMEOUT")? {
            config.http.timeout = Duration::from_secs(seconds);
        }

        if let Some(port) = self.parsed_env("CALLBACK_PORT")? {
            config.callback.port = port;
        }
        if let Ok(host) = self.get_env_var("CALLBACK_PUBLIC_HOST") {
            config.callback.public_host = host;
        }

        if let Ok(url) = self.get_env_var("DISCOVERY_URL") {
            config.discovery.base_url = url;
        }
        if let Ok(url) = self.get_env_var("BALANCER_URL") {
            config.balancer.base_url = url;
        }

        if let Some(total) = self.parsed_env("TOTAL_REQUESTS")? {
            config.routing.total_requests = total;
        }
        if let Some(threshold) = self.parsed_env("SLOW_RATIO_THRESHOLD")? {
            config.routing.slow_ratio_threshold = threshold;
        }

        if let Ok(url) = self.get_env_var("PEOPLE_URL") {
            config.people.base_url = url;
        }

        Ok(())
    }

    /// Read and parse an optional environment variable
    fn parsed_env<T>(&self, key: &str) -> ConfigResult<Option<T>>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        match self.get_env_var(key) {
            Ok(raw) => raw.trim().parse::<T>().map(Some).map_err(|e| {
                ConfigError::EnvError(format!("Invalid {}_{}: {}", self.prefix, key, e))
            }),
            Err(_) => Ok(None),
        }
    }

    /// Get environment variable with prefix
    fn get_env_var(&self, key: &str) -> Result<String, std::env::VarError> {
        std::env::var(format!("{}_{}", self.prefix, key))
    }
}
