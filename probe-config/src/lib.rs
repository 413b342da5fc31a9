//! Domain-driven configuration for the ewma-probe harness
//!
//! Configuration is split by functional domain (callback receiver, discovery,
//! balancer, routing run, people API, HTTP client, logging). Each domain has
//! defaults, validation and environment variable overrides.

pub mod error;
pub mod loader;
pub mod validation;

// Domain-specific configuration modules
pub mod domains;

// Re-export main types
pub use error::{ConfigError, ConfigResult};
pub use loader::ConfigLoader;
pub use validation::Validatable;

// Re-export domain configurations
pub use domains::{
    balancer::BalancerConfig,
    callback::CallbackConfig,
    discovery::DiscoveryConfig,
    http::HttpConfig,
    logging::{LogFormat, LogLevel, LoggingConfig},
    people::PeopleApiConfig,
    routing::{BackendClass, BackendConfig, RoutingConfig},
    ProbeConfig,
};
