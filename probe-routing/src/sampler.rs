//! Sequential probing through the balancer

use crate::telemetry::{attribute, DebugSnapshot, InstanceMap, TelemetryClient};
use probe_config::{BackendClass, BackendConfig, BalancerConfig, RoutingConfig};
use probe_http::HttpManager;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Per-class probe counts of one sampling run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RoutingTally {
    counts: BTreeMap<BackendClass, u64>,
    failed: u64,
    unattributed: u64,
    upstreams: BTreeMap<String, u64>,
}

impl RoutingTally {
    pub fn record(&mut self, class: BackendClass) {
        *self.counts.entry(class).or_insert(0) += 1;
    }

    /// A probe that never got a successful answer
    pub fn record_failure(&mut self) {
        self.failed += 1;
    }

    /// A probe that succeeded but could not be tied to a known backend
    pub fn record_unattributed(&mut self) {
        self.unattributed += 1;
    }

    /// A successful probe whose answer named the upstream it came from
    pub fn record_upstream(&mut self, marker: &str) {
        *self.upstreams.entry(marker.to_string()).or_insert(0) += 1;
    }

    /// Successful probes per upstream marker reported by the balancer
    pub fn upstreams(&self) -> &BTreeMap<String, u64> {
        &self.upstreams
    }

    pub fn count(&self, class: BackendClass) -> u64 {
        self.counts.get(&class).copied().unwrap_or(0)
    }

    pub fn failed(&self) -> u64 {
        self.failed
    }

    pub fn unattributed(&self) -> u64 {
        self.unattributed
    }

    /// Probes credited to some class
    pub fn attributed(&self) -> u64 {
        self.counts.values().sum()
    }

    /// Every probe sent, whatever its outcome
    pub fn attempted(&self) -> u64 {
        self.attributed() + self.failed + self.unattributed
    }

    /// Share of attributed probes that went to `class`
    pub fn ratio(&self, class: BackendClass) -> Option<f64> {
        match self.attributed() {
            0 => None,
            total => Some(self.count(class) as f64 / total as f64),
        }
    }
}

/// Sends probes through the balancer and attributes each one
#[derive(Debug, Clone)]
pub struct RoutingSampler {
    http: HttpManager,
    telemetry: TelemetryClient,
    proxy_url: String,
    probe_timeout: Duration,
    inter_request_delay: Duration,
    backends: Vec<BackendConfig>,
    instances: InstanceMap,
}

impl RoutingSampler {
    /// `backends` must carry the ports the backends actually listen on
    pub fn new(
        http: HttpManager,
        balancer: &BalancerConfig,
        routing: &RoutingConfig,
        backends: Vec<BackendConfig>,
    ) -> Self {
        Self {
            telemetry: TelemetryClient::new(http.clone(), balancer.debug_url()),
            http,
            proxy_url: balancer.proxy_url(),
            probe_timeout: balancer.probe_timeout,
            inter_request_delay: routing.inter_request_delay,
            backends,
            instances: InstanceMap::default(),
        }
    }

    pub fn instances(&self) -> &InstanceMap {
        &self.instances
    }

    /// Read the debug endpoint once and map listed instances to classes.
    ///
    /// A failed read leaves the mapping empty; every later probe is then
    /// unattributed and the run cannot pass.
    pub async fn map_instances(&mut self) -> &InstanceMap {
        self.instances = match self.telemetry.fetch().await {
            Ok(snapshot) => InstanceMap::classify(&snapshot, &self.backends),
            Err(e) => {
                warn!("Could not map balancer instances: {}", e);
                InstanceMap::default()
            }
        };

        for (id, class) in self.instances.iter() {
            info!("Instance '{}' is the {} backend", id, class);
        }
        &self.instances
    }

    /// Send `total` sequential probes and tally where each one landed.
    ///
    /// Probe failures and telemetry failures are logged and counted, never
    /// fatal.
    pub async fn sample(&self, total: u32) -> RoutingTally {
        let mut tally = RoutingTally::default();
        let mut previous = self.telemetry.fetch().await.ok();

        for i in 1..=total {
            match self.http.get(&self.proxy_url, Some(self.probe_timeout)).await {
                Err(e) => {
                    warn!("Probe {}/{} failed: {}", i, total, e);
                    tally.record_failure();
                    self.refresh_baseline(&mut previous).await;
                }
                Ok(response) if !response.is_success() => {
                    warn!("Probe {}/{} answered {}", i, total, response.status);
                    tally.record_failure();
                    self.refresh_baseline(&mut previous).await;
                }
                Ok(response) => {
                    if let Some(real_ip) = &response.real_ip {
                        debug!("Probe {} answered via upstream {}", i, real_ip);
                        tally.record_upstream(real_ip);
                    }
                    match self.telemetry.fetch().await {
                        Err(e) => {
                            warn!("Telemetry read after probe {} failed: {}", i, e);
                            tally.record_unattributed();
                        }
                        Ok(snapshot) => {
                            self.attribute_probe(i, previous.as_ref(), &snapshot, &mut tally);
                            previous = Some(snapshot);
                        }
                    }
                }
            }

            if i < total && !self.inter_request_delay.is_zero() {
                tokio::time::sleep(self.inter_request_delay).await;
            }
        }

        info!(
            "Sampled {} probes: {} attributed, {} unattributed, {} failed",
            tally.attempted(),
            tally.attributed(),
            tally.unattributed(),
            tally.failed()
        );
        tally
    }

    /// The balancer may have counted a failed probe; re-read the counters so
    /// the next delta only reflects the next probe
    async fn refresh_baseline(&self, previous: &mut Option<DebugSnapshot>) {
        if let Ok(snapshot) = self.telemetry.fetch().await {
            *previous = Some(snapshot);
        }
    }

    fn attribute_probe(
        &self,
        i: u32,
        previous: Option<&DebugSnapshot>,
        snapshot: &DebugSnapshot,
        tally: &mut RoutingTally,
    ) {
        let served_by = attribute(previous, snapshot)
            .and_then(|instance| self.instances.class_of(&instance.id).map(|class| (instance, class)));

        match served_by {
            Some((instance, class)) => {
                debug!("Probe {} routed to {} ({})", i, instance.id, class);
                tally.record(class);
            }
            None => {
                debug!("Probe {} could not be attributed", i);
                tally.record_unattributed();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tally_ratios() {
        let mut tally = RoutingTally::default();
        assert_eq!(tally.ratio(BackendClass::Slow), None);

        for _ in 0..9 {
            tally.record(BackendClass::Fast);
        }
        tally.record(BackendClass::Slow);
        tally.record_failure();
        tally.record_unattributed();

        assert_eq!(tally.attributed(), 10);
        assert_eq!(tally.attempted(), 12);
        assert_eq!(tally.ratio(BackendClass::Slow), Some(0.1));
        assert_eq!(tally.ratio(BackendClass::Fast), Some(0.9));
    }

    #[test]
    fn test_upstream_markers_do_not_affect_ratios() {
        let mut tally = RoutingTally::default();
        tally.record(BackendClass::Fast);
        tally.record_upstream("10.0.0.1");
        tally.record_upstream("10.0.0.1");
        tally.record_upstream("10.0.0.2");

        assert_eq!(tally.upstreams().get("10.0.0.1"), Some(&2));
        assert_eq!(tally.upstreams().len(), 2);
        assert_eq!(tally.attempted(), 1);
    }

    #[test]
    fn test_failures_do_not_dilute_ratio() {
        let mut tally = RoutingTally::default();
        tally.record(BackendClass::Slow);
        for _ in 0..5 {
            tally.record_failure();
        }
        assert_eq!(tally.ratio(BackendClass::Slow), Some(1.0));
        assert_eq!(tally.count(BackendClass::Fast), 0);
    }
}
