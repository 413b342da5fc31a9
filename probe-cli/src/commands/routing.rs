use anyhow::{Context, Result};
use probe_config::{ProbeConfig, Validatable};
use probe_http::{HttpConfig, HttpManager};
use probe_routing::RoutingHarness;
use std::process::ExitCode;
use tracing::info;

/// Run the routing harness; the exit code is the verdict
pub async fn routing_command(
    mut config: ProbeConfig,
    requests: Option<u32>,
    threshold: Option<f64>,
) -> Result<ExitCode> {
    if let Some(requests) = requests {
        config.routing.total_requests = requests;
    }
    if let Some(threshold) = threshold {
        config.routing.slow_ratio_threshold = threshold;
    }
    config
        .routing
        .validate()
        .context("Invalid routing options")?;

    info!(
        "Verifying EWMA routing through {} with {} probes",
        config.balancer.proxy_url(),
        config.routing.total_requests
    );

    let http = HttpManager::with_config(HttpConfig::from(&config.http))?;
    let harness = RoutingHarness::new(http, config.discovery, config.balancer, config.routing);
    let report = harness.run().await.context("Routing verification aborted")?;

    println!("{}", report);
    Ok(if report.is_pass() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
