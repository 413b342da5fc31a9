//! Webhook receiver configuration

use crate::error::ConfigResult;
use crate::validation::{validate_positive, validate_required_string, Validatable};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Callback receiver configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CallbackConfig {
    /// Interface the receiver binds to
    pub bind_host: String,

    /// Host name the system under test uses to reach the receiver
    pub public_host: String,

    /// Listening port, 0 picks an ephemeral port
    pub port: u16,

    /// Fallback poll interval while waiting for a delivery
    #[serde(with = "humantime_serde")]
    pub poll_interval: Duration,

    /// Default wait applied by callers that do not supply one
    #[serde(with = "humantime_serde")]
    pub default_wait: Duration,
}

impl Default for CallbackConfig {
    fn default() -> Self {
        Self {
            bind_host: "127.0.0.1".to_string(),
            public_host: "localhost".to_string(),
            port: 8089,
            poll_interval: Duration::from_millis(200),
            default_wait: Duration::from_secs(10),
        }
    }
}

impl Validatable for CallbackConfig {
    fn validate(&self) -> ConfigResult<()> {
        validate_required_string(&self.bind_host, "bind_host", self.domain_name())?;
        validate_required_string(&self.public_host, "public_host", self.domain_name())?;
        validate_positive(
            self.poll_interval.as_millis(),
            "poll_interval",
            self.domain_name(),
        )?;

        if self.poll_interval > self.default_wait {
            return Err(self.validation_error("poll_interval cannot exceed default_wait"));
        }

        Ok(())
    }

    fn domain_name(&self) -> &'static str {
        "callback"
    }
}
