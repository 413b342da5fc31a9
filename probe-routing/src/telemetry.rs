//! Balancer debug telemetry and per-probe attribution

use probe_config::{BackendClass, BackendConfig};
use probe_http::{HttpError, HttpManager};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;
use url::Url;

/// Counters the balancer reports for one upstream instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstanceTelemetry {
    pub id: String,
    pub url: String,
    #[serde(default)]
    pub active_requests: i64,
    #[serde(default)]
    pub total_requests: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub healthy: Option<bool>,
    /// Some balancers render this as a string, e.g. `"4.20"`
    #[serde(
        default,
        deserialize_with = "lenient_millis",
        skip_serializing_if = "Option::is_none"
    )]
    pub ewma_latency_ms: Option<f64>,
}

fn lenient_millis<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(match Option::<serde_json::Value>::deserialize(deserializer)? {
        Some(serde_json::Value::Number(n)) => n.as_f64(),
        Some(serde_json::Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    })
}

impl InstanceTelemetry {
    /// Port of the instance URL, if it has one
    pub fn port(&self) -> Option<u16> {
        Url::parse(&self.url).ok().and_then(|url| url.port_or_known_default())
    }

    /// Whether this entry describes `backend`, by id or by listening port
    pub fn describes(&self, backend: &BackendConfig) -> bool {
        if self.id == backend.id {
            return true;
        }
        match self.port() {
            Some(port) => port == backend.port,
            None => self.url.contains(&format!(":{}", backend.port)),
        }
    }

    fn has_activity(&self) -> bool {
        self.active_requests > 0 || self.total_requests > 0
    }
}

/// One read of the debug endpoint
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DebugSnapshot {
    #[serde(default)]
    pub instances: Vec<InstanceTelemetry>,
}

impl DebugSnapshot {
    pub fn find(&self, id: &str) -> Option<&InstanceTelemetry> {
        self.instances.iter().find(|instance| instance.id == id)
    }

    /// Whether some listed instance describes `backend`
    pub fn lists(&self, backend: &BackendConfig) -> bool {
        self.instances.iter().any(|instance| instance.describes(backend))
    }
}

/// Instance id to latency class, built from one snapshot
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InstanceMap {
    classes: BTreeMap<String, BackendClass>,
}

impl InstanceMap {
    /// Map every listed instance that corresponds to one of `backends`.
    /// Instances the harness did not start are left out.
    pub fn classify(snapshot: &DebugSnapshot, backends: &[BackendConfig]) -> Self {
        let classes = snapshot
            .instances
            .iter()
            .filter_map(|instance| {
                backends
                    .iter()
                    .find(|backend| instance.describes(backend))
                    .map(|backend| (instance.id.clone(), backend.class))
            })
            .collect();
        Self { classes }
    }

    pub fn class_of(&self, instance_id: &str) -> Option<BackendClass> {
        self.classes.get(instance_id).copied()
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, BackendClass)> {
        self.classes.iter().map(|(id, class)| (id.as_str(), *class))
    }
}

/// Pick the instance that most likely served the last probe.
///
/// Prefers the first instance whose `totalRequests` grew since `previous`.
/// Without a usable delta, falls back to the first instance showing any
/// activity at all.
pub fn attribute<'a>(
    previous: Option<&DebugSnapshot>,
    current: &'a DebugSnapshot,
) -> Option<&'a InstanceTelemetry> {
    if let Some(previous) = previous {
        let advanced = current.instances.iter().find(|instance| {
            let before = previous
                .find(&instance.id)
                .map(|p| p.total_requests)
                .unwrap_or(0);
            instance.total_requests > before
        });
        if advanced.is_some() {
            return advanced;
        }
    }
    current.instances.iter().find(|instance| instance.has_activity())
}

/// Reads the balancer's debug endpoint
#[derive(Debug, Clone)]
pub struct TelemetryClient {
    http: HttpManager,
    debug_url: String,
}

impl TelemetryClient {
    pub fn new(http: HttpManager, debug_url: impl Into<String>) -> Self {
        Self {
            http,
            debug_url: debug_url.into(),
        }
    }

    pub fn debug_url(&self) -> &str {
        &self.debug_url
    }

    pub async fn fetch(&self) -> Result<DebugSnapshot, HttpError> {
        let snapshot: DebugSnapshot = self.http.get_json(&self.debug_url).await?;
        debug!("Balancer lists {} instances", snapshot.instances.len());
        Ok(snapshot)
    }
}
