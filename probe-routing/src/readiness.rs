//! Gate that waits until the balancer lists every started backend

use crate::errors::RoutingError;
use crate::telemetry::{DebugSnapshot, TelemetryClient};
use probe_config::BackendConfig;
use probe_resilience::{RetryExecutor, RetryPolicy};
use tracing::info;

/// Poll the debug endpoint until every backend in `backends` is listed.
///
/// Returns the first snapshot that lists them all. Gives up with
/// [`RoutingError::ReadinessTimeout`] once the policy is exhausted.
pub async fn wait_until_ready(
    telemetry: &TelemetryClient,
    backends: &[BackendConfig],
    policy: RetryPolicy,
) -> Result<DebugSnapshot, RoutingError> {
    let executor = RetryExecutor::new(policy);

    let snapshot = executor
        .execute(|_| check_listed(telemetry, backends))
        .await
        .map_err(|e| RoutingError::ReadinessTimeout(e.to_string()))?;

    info!(
        "Balancer lists all {} backends ({} instances total)",
        backends.len(),
        snapshot.instances.len()
    );
    Ok(snapshot)
}

async fn check_listed(
    telemetry: &TelemetryClient,
    backends: &[BackendConfig],
) -> Result<DebugSnapshot, RoutingError> {
    let snapshot = telemetry.fetch().await?;
    let missing: Vec<String> = backends
        .iter()
        .filter(|backend| !snapshot.lists(backend))
        .map(|backend| backend.id.clone())
        .collect();

    if missing.is_empty() {
        Ok(snapshot)
    } else {
        Err(RoutingError::NotReady { missing })
    }
}
