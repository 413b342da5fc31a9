//! Load balancer under test

use crate::error::ConfigResult;
use crate::validation::{validate_path, validate_positive, validate_url, Validatable};
use probe_resilience::{BackoffStrategy, RetryPolicy};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Endpoints and timings for talking to the EWMA load balancer
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BalancerConfig {
    /// Balancer base URL
    pub base_url: String,

    /// Proxied path that reaches the registered service
    pub proxy_path: String,

    /// Debug endpoint listing per-instance counters
    pub debug_path: String,

    /// Timeout for a single load-balanced probe
    #[serde(with = "humantime_serde")]
    pub probe_timeout: Duration,

    /// Pause after registration before the first telemetry read
    #[serde(with = "humantime_serde")]
    pub settle_delay: Duration,

    /// How the readiness gate polls the debug endpoint; `deadline` bounds
    /// the whole wait
    pub readiness: RetryPolicy,
}

impl Default for BalancerConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8777".to_string(),
            proxy_path: "/proxy/test-service/probe".to_string(),
            debug_path: "/debug/instances".to_string(),
            probe_timeout: Duration::from_secs(5),
            settle_delay: Duration::from_secs(3),
            readiness: RetryPolicy::default(),
        }
    }
}

impl BalancerConfig {
    pub fn proxy_url(&self) -> String {
        join_url(&self.base_url, &self.proxy_path)
    }

    pub fn debug_url(&self) -> String {
        join_url(&self.base_url, &self.debug_path)
    }
}

pub(crate) fn join_url(base: &str, path: &str) -> String {
    format!("{}{}", base.trim_end_matches('/'), path)
}

impl Validatable for BalancerConfig {
    fn validate(&self) -> ConfigResult<()> {
        validate_url(&self.base_url, "base_url", self.domain_name())?;
        validate_path(&self.proxy_path, "proxy_path", self.domain_name())?;
        validate_path(&self.debug_path, "debug_path", self.domain_name())?;
        validate_positive(
            self.probe_timeout.as_millis(),
            "probe_timeout",
            self.domain_name(),
        )?;
        self.validate_readiness()
    }

    fn domain_name(&self) -> &'static str {
        "balancer"
    }
}

impl BalancerConfig {
    fn validate_readiness(&self) -> ConfigResult<()> {
        let readiness = &self.readiness;
        validate_positive(
            readiness.initial_delay.as_millis(),
            "readiness.initial_delay",
            self.domain_name(),
        )?;
        validate_positive(readiness.max_attempts, "readiness.max_attempts", self.domain_name())?;

        if readiness.max_delay < readiness.initial_delay {
            return Err(self.validation_error("readiness.max_delay cannot be below readiness.initial_delay"));
        }
        match readiness.deadline {
            Some(deadline) if readiness.initial_delay > deadline => {
                return Err(self.validation_error("readiness.initial_delay cannot exceed readiness.deadline"));
            }
            None if readiness.max_attempts == u32::MAX => {
                return Err(self.validation_error("readiness needs a deadline or a finite max_attempts"));
            }
            _ => {}
        }
        if let BackoffStrategy::Exponential { base } = readiness.backoff_strategy {
            if !(base >= 1.0 && base.is_finite()) {
                return Err(self.validation_error("readiness exponential base must be at least 1.0"));
            }
        }

        Ok(())
    }
}
