//! Routing verification run configuration

use crate::error::ConfigResult;
use crate::validation::{validate_positive, validate_required_string, validate_unit_ratio, Validatable};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Simulated latency class of an ephemeral backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendClass {
    Fast,
    Slow,
}

impl BackendClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendClass::Fast => "fast",
            BackendClass::Slow => "slow",
        }
    }

    pub fn all() -> &'static [BackendClass] {
        &[BackendClass::Fast, BackendClass::Slow]
    }
}

impl fmt::Display for BackendClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackendClass {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "fast" => Ok(BackendClass::Fast),
            "slow" => Ok(BackendClass::Slow),
            _ => Err(format!("Invalid backend class: {}", s)),
        }
    }
}

/// One ephemeral backend started and registered by the harness
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BackendConfig {
    /// Service ID used for registration
    pub id: String,
    pub class: BackendClass,
    /// Listening port, 0 picks an ephemeral port
    pub port: u16,
}

/// Routing verification run configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RoutingConfig {
    /// Number of sequential probes sent through the balancer
    pub total_requests: u32,

    /// Pause between probes
    #[serde(with = "humantime_serde")]
    pub inter_request_delay: Duration,

    /// The run fails when the slow share exceeds this ratio
    pub slow_ratio_threshold: f64,

    /// Artificial delay applied by slow backends to workload requests
    #[serde(with = "humantime_serde")]
    pub slow_delay: Duration,

    /// Latency constant used for the fast class prediction, in milliseconds
    pub fast_latency_ms: f64,

    /// Latency constant used for the slow class prediction, in milliseconds
    pub slow_latency_ms: f64,

    /// Interface ephemeral backends bind to
    pub bind_host: String,

    pub backends: Vec<BackendConfig>,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            total_requests: 100,
            inter_request_delay: Duration::from_millis(100),
            slow_ratio_threshold: 0.15,
            slow_delay: Duration::from_millis(500),
            fast_latency_ms: 5.0,
            slow_latency_ms: 500.0,
            bind_host: "127.0.0.1".to_string(),
            backends: vec![
                BackendConfig {
                    id: "test-fast-1".to_string(),
                    class: BackendClass::Fast,
                    port: 7081,
                },
                BackendConfig {
                    id: "test-slow-1".to_string(),
                    class: BackendClass::Slow,
                    port: 7082,
                },
            ],
        }
    }
}

impl Validatable for RoutingConfig {
    fn validate(&self) -> ConfigResult<()> {
        validate_positive(self.total_requests, "total_requests", self.domain_name())?;
        validate_unit_ratio(
            self.slow_ratio_threshold,
            "slow_ratio_threshold",
            self.domain_name(),
        )?;
        validate_required_string(&self.bind_host, "bind_host", self.domain_name())?;

        if self.fast_latency_ms < 0.0 || self.slow_latency_ms < 0.0 {
            return Err(self.validation_error("latency constants cannot be negative"));
        }

        let mut ids = HashSet::new();
        let mut ports = HashSet::new();
        for backend in &self.backends {
            validate_required_string(&backend.id, "backends[].id", self.domain_name())?;
            if !ids.insert(backend.id.as_str()) {
                return Err(self.validation_error(format!("duplicate backend id '{}'", backend.id)));
            }
            // Port 0 binds an ephemeral port, so only fixed ports can collide
            if backend.port != 0 && !ports.insert(backend.port) {
                return Err(self.validation_error(format!("duplicate backend port {}", backend.port)));
            }
        }

        for class in BackendClass::all() {
            if !self.backends.iter().any(|b| b.class == *class) {
                return Err(self.validation_error(format!("no {} backend configured", class)));
            }
        }

        Ok(())
    }

    fn domain_name(&self) -> &'static str {
        "routing"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_class_parsing() {
        assert_eq!("FAST".parse::<BackendClass>().unwrap(), BackendClass::Fast);
        assert_eq!(BackendClass::Slow.to_string(), "slow");
        assert!("medium".parse::<BackendClass>().is_err());
    }

    #[test]
    fn test_requires_both_classes() {
        let mut config = RoutingConfig::default();
        config.backends.retain(|b| b.class == BackendClass::Fast);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_duplicate_ports() {
        let mut config = RoutingConfig::default();
        config.backends[1].port = config.backends[0].port;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_ephemeral_ports_may_repeat() {
        let mut config = RoutingConfig::default();
        for backend in &mut config.backends {
            backend.port = 0;
        }
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_rejects_threshold_out_of_range() {
        let config = RoutingConfig {
            slow_ratio_threshold: 1.2,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
