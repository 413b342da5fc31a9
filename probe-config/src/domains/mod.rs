//! Domain-specific configuration modules

pub mod balancer;
pub mod callback;
pub mod discovery;
pub mod http;
pub mod logging;
pub mod people;
pub mod routing;

use crate::error::ConfigResult;
use crate::validation::Validatable;
use serde::{Deserialize, Serialize};

/// Main harness configuration combining all domains
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ProbeConfig {
    /// HTTP client configuration
    pub http: http::HttpConfig,

    /// Logging configuration
    pub logging: logging::LoggingConfig,

    /// Webhook receiver configuration
    pub callback: callback::CallbackConfig,

    /// Service discovery (Consul agent) configuration
    pub discovery: discovery::DiscoveryConfig,

    /// Load balancer under test
    pub balancer: balancer::BalancerConfig,

    /// Routing verification run
    pub routing: routing::RoutingConfig,

    /// People API used for asynchronous search
    pub people: people::PeopleApiConfig,
}

impl ProbeConfig {
    /// Validate all domain configurations
    pub fn validate_all(&self) -> ConfigResult<()> {
        self.http.validate()?;
        self.logging.validate()?;
        self.callback.validate()?;
        self.discovery.validate()?;
        self.balancer.validate()?;
        self.routing.validate()?;
        self.people.validate()?;
        Ok(())
    }

    /// Render the configuration as YAML
    pub fn to_yaml(&self) -> ConfigResult<String> {
        Ok(serde_yaml::to_string(self)?)
    }
}
