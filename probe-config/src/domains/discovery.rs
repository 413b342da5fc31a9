//! Service discovery configuration

use crate::error::ConfigResult;
use crate::validation::{validate_path, validate_positive, validate_required_string, validate_url, Validatable};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Consul agent configuration used to register ephemeral backends
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    /// Agent base URL
    pub base_url: String,

    /// Service name the balancer watches
    pub service_name: String,

    /// Address advertised for every registered backend
    pub advertise_address: String,

    /// Path probed by the agent's HTTP health check
    pub health_path: String,

    /// Health check interval
    #[serde(with = "humantime_serde")]
    pub check_interval: Duration,

    /// Health check timeout
    #[serde(with = "humantime_serde")]
    pub check_timeout: Duration,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8500".to_string(),
            service_name: "test-service".to_string(),
            advertise_address: "127.0.0.1".to_string(),
            health_path: "/ping".to_string(),
            check_interval: Duration::from_secs(2),
            check_timeout: Duration::from_millis(1000),
        }
    }
}

impl Validatable for DiscoveryConfig {
    fn validate(&self) -> ConfigResult<()> {
        validate_url(&self.base_url, "base_url", self.domain_name())?;
        validate_required_string(&self.service_name, "service_name", self.domain_name())?;
        validate_required_string(
            &self.advertise_address,
            "advertise_address",
            self.domain_name(),
        )?;
        validate_path(&self.health_path, "health_path", self.domain_name())?;
        validate_positive(
            self.check_interval.as_millis(),
            "check_interval",
            self.domain_name(),
        )?;
        validate_positive(
            self.check_timeout.as_millis(),
            "check_timeout",
            self.domain_name(),
        )?;
        Ok(())
    }

    fn domain_name(&self) -> &'static str {
        "discovery"
    }
}
