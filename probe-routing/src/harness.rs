//! End-to-end routing verification run

use crate::backend::EphemeralBackend;
use crate::errors::RoutingError;
use crate::predictor::WeightPrediction;
use crate::readiness::wait_until_ready;
use crate::registrar::{ServiceRegistrar, ServiceRegistration};
use crate::report::RoutingReport;
use crate::sampler::RoutingSampler;
use crate::telemetry::TelemetryClient;
use futures::FutureExt;
use probe_config::{BackendConfig, BalancerConfig, DiscoveryConfig, RoutingConfig};
use probe_http::HttpManager;
use std::future::Future;
use std::panic::{resume_unwind, AssertUnwindSafe};
use tracing::{info, warn};

/// Drives one verification run against a live balancer and discovery agent.
///
/// Every backend that was registered is deregistered before [`run`](Self::run)
/// or [`run_scoped`](Self::run_scoped) returns, even when the run errors or
/// panics.
pub struct RoutingHarness {
    http: HttpManager,
    discovery: DiscoveryConfig,
    balancer: BalancerConfig,
    routing: RoutingConfig,
}

impl RoutingHarness {
    pub fn new(
        http: HttpManager,
        discovery: DiscoveryConfig,
        balancer: BalancerConfig,
        routing: RoutingConfig,
    ) -> Self {
        Self {
            http,
            discovery,
            balancer,
            routing,
        }
    }

    pub fn prediction(&self) -> WeightPrediction {
        WeightPrediction::from_latencies(self.routing.fast_latency_ms, self.routing.slow_latency_ms)
    }

    pub async fn run(&self) -> Result<RoutingReport, RoutingError> {
        self.run_scoped(|backends| self.observe(backends)).await
    }

    /// Start and register the backends, hand their descriptors to `body`,
    /// then deregister them again.
    ///
    /// Cleanup also runs when `body` panics; the panic is resumed afterwards.
    pub async fn run_scoped<F, Fut, T>(&self, body: F) -> Result<T, RoutingError>
    where
        F: FnOnce(Vec<BackendConfig>) -> Fut,
        Fut: Future<Output = Result<T, RoutingError>>,
    {
        let backends = self.start_backends().await?;
        let descriptors: Vec<BackendConfig> = backends.iter().map(EphemeralBackend::descriptor).collect();

        let registrar = ServiceRegistrar::new(self.http.clone(), &self.discovery);
        self.register_all(&registrar, &descriptors).await?;

        let outcome = AssertUnwindSafe(body(descriptors.clone()))
            .catch_unwind()
            .await;

        registrar
            .deregister_all(descriptors.iter().map(|b| b.id.as_str()))
            .await;
        drop(backends);

        match outcome {
            Ok(result) => result,
            Err(panic) => resume_unwind(panic),
        }
    }

    async fn start_backends(&self) -> Result<Vec<EphemeralBackend>, RoutingError> {
        let mut backends = Vec::with_capacity(self.routing.backends.len());
        for backend in &self.routing.backends {
            backends.push(
                EphemeralBackend::spawn(backend, &self.routing.bind_host, self.routing.slow_delay).await?,
            );
        }
        Ok(backends)
    }

    /// Register in order; on the first failure, roll back what was registered
    async fn register_all(
        &self,
        registrar: &ServiceRegistrar,
        backends: &[BackendConfig],
    ) -> Result<(), RoutingError> {
        for (registered, backend) in backends.iter().enumerate() {
            let registration = ServiceRegistration::for_backend(&self.discovery, &backend.id, backend.port);
            if let Err(e) = registrar.register(&registration).await {
                warn!("Registration failed, rolling back {} registrations", registered);
                registrar
                    .deregister_all(backends[..registered].iter().map(|b| b.id.as_str()))
                    .await;
                return Err(e);
            }
        }
        Ok(())
    }

    async fn observe(&self, backends: Vec<BackendConfig>) -> Result<RoutingReport, RoutingError> {
        info!(
            "Waiting {:?} for the balancer to pick up registrations",
            self.balancer.settle_delay
        );
        tokio::time::sleep(self.balancer.settle_delay).await;

        let telemetry = TelemetryClient::new(self.http.clone(), self.balancer.debug_url());
        wait_until_ready(&telemetry, &backends, self.balancer.readiness.clone()).await?;

        let mut sampler = RoutingSampler::new(self.http.clone(), &self.balancer, &self.routing, backends);
        sampler.map_instances().await;
        let tally = sampler.sample(self.routing.total_requests).await;

        let report = RoutingReport::evaluate(tally, self.prediction(), self.routing.slow_ratio_threshold);
        info!("{}", report.verdict);
        Ok(report)
    }
}
