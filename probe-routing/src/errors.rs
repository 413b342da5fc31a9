//! Routing verification error types

use probe_http::HttpError;
use probe_resilience::Retryable;

#[derive(Debug, thiserror::Error)]
pub enum RoutingError {
    #[error("Failed to start backend '{id}' on {addr}: {source}")]
    BackendBind {
        id: String,
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Registration of '{id}' was rejected (status {status}): {body}")]
    RegistrationRejected { id: String, status: u16, body: String },

    #[error("Registration of '{id}' failed: {source}")]
    Registration {
        id: String,
        #[source]
        source: HttpError,
    },

    #[error("Balancer telemetry unavailable: {0}")]
    Telemetry(#[from] HttpError),

    #[error("Balancer does not list backends yet: {}", .missing.join(", "))]
    NotReady { missing: Vec<String> },

    #[error("Backends never became visible to the balancer: {0}")]
    ReadinessTimeout(String),
}

impl Retryable for RoutingError {
    fn is_retryable(&self) -> bool {
        matches!(self, RoutingError::NotReady { .. } | RoutingError::Telemetry(_))
    }
}
