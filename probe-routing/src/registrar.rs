//! Service discovery registration (Consul agent API)

use crate::errors::RoutingError;
use probe_config::DiscoveryConfig;
use probe_http::HttpManager;
use serde::Serialize;
use std::time::Duration;
use tracing::{info, warn};

const REGISTER_PATH: &str = "/v1/agent/service/register";
const DEREGISTER_PATH: &str = "/v1/agent/service/deregister";

/// HTTP health check attached to a registration
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct HealthCheck {
    #[serde(rename = "HTTP")]
    pub http: String,
    pub interval: String,
    pub timeout: String,
}

/// Body of an agent service registration
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ServiceRegistration {
    pub name: String,
    #[serde(rename = "ID")]
    pub id: String,
    pub address: String,
    pub port: u16,
    pub check: HealthCheck,
}

impl ServiceRegistration {
    /// Registration for a backend listening on `port`
    pub fn for_backend(discovery: &DiscoveryConfig, id: &str, port: u16) -> Self {
        Self {
            name: discovery.service_name.clone(),
            id: id.to_string(),
            address: discovery.advertise_address.clone(),
            port,
            check: HealthCheck {
                http: format!(
                    "http://{}:{}{}",
                    discovery.advertise_address, port, discovery.health_path
                ),
                interval: go_duration(discovery.check_interval),
                timeout: go_duration(discovery.check_timeout),
            },
        }
    }
}

/// Format a duration the way the agent API parses it
fn go_duration(duration: Duration) -> String {
    let millis = duration.as_millis();
    if millis % 1000 == 0 {
        format!("{}s", millis / 1000)
    } else {
        format!("{}ms", millis)
    }
}

/// Registers and deregisters backends with the discovery agent
#[derive(Debug, Clone)]
pub struct ServiceRegistrar {
    http: HttpManager,
    base_url: String,
}

impl ServiceRegistrar {
    pub fn new(http: HttpManager, discovery: &DiscoveryConfig) -> Self {
        Self {
            http,
            base_url: discovery.base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Register a service instance. Any non-2xx answer is fatal.
    pub async fn register(&self, registration: &ServiceRegistration) -> Result<(), RoutingError> {
        let url = format!("{}{}", self.base_url, REGISTER_PATH);
        let response = self
            .http
            .put_json(&url, Some(registration))
            .await
            .map_err(|source| RoutingError::Registration {
                id: registration.id.clone(),
                source,
            })?;

        if !response.is_success() {
            return Err(RoutingError::RegistrationRejected {
                id: registration.id.clone(),
                status: response.status,
                body: response.body,
            });
        }

        info!(
            "Registered '{}' as {} on port {}",
            registration.id, registration.name, registration.port
        );
        Ok(())
    }

    /// Remove a service instance. Failures are logged and otherwise ignored.
    /// Returns whether the agent acknowledged the removal.
    pub async fn deregister(&self, id: &str) -> bool {
        let url = format!("{}{}/{}", self.base_url, DEREGISTER_PATH, id);
        match self.http.put_json::<()>(&url, None).await {
            Ok(response) if response.is_success() => {
                info!("Deregistered '{}'", id);
                true
            }
            Ok(response) => {
                warn!(
                    "Deregistration of '{}' answered {}: {}",
                    id, response.status, response.body
                );
                false
            }
            Err(e) => {
                warn!("Deregistration of '{}' failed: {}", id, e);
                false
            }
        }
    }

    /// Best-effort removal of every id, in order
    pub async fn deregister_all<'a, I>(&self, ids: I)
    where
        I: IntoIterator<Item = &'a str>,
    {
        for id in ids {
            self.deregister(id).await;
        }
    }
}
