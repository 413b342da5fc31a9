//! In-process stand-ins for the discovery agent and the load balancer

#![allow(dead_code)]

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, put};
use axum::{Json, Router};
use probe_config::ProbeConfig;
use probe_resilience::RetryPolicy;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;

/// How the fake balancer picks a backend for each proxied request
#[derive(Debug, Clone, Copy)]
pub enum RoutePolicy {
    /// Every n-th request goes to the slow backend, the rest to the fast one
    SlowEvery(u64),
    /// Alternate fast, slow, fast, slow
    Alternate,
}

#[derive(Debug, Clone)]
struct Instance {
    port: u16,
    total: u64,
}

struct InfraState {
    policy: RoutePolicy,
    reject_id: Option<String>,
    telemetry_down: AtomicBool,
    fast_failing: AtomicBool,
    services: Mutex<BTreeMap<String, Instance>>,
    registrations: Mutex<Vec<Value>>,
    deregistered: Mutex<Vec<String>>,
    proxied: AtomicU64,
    client: reqwest::Client,
}

/// Discovery agent and balancer sharing one listener
pub struct FakeInfra {
    pub base_url: String,
    state: Arc<InfraState>,
}

impl FakeInfra {
    pub async fn start(policy: RoutePolicy) -> Self {
        Self::start_with(policy, None).await
    }

    /// Like [`start`](Self::start), but answer 500 when `reject_id` registers
    pub async fn start_with(policy: RoutePolicy, reject_id: Option<&str>) -> Self {
        let state = Arc::new(InfraState {
            policy,
            reject_id: reject_id.map(str::to_string),
            telemetry_down: AtomicBool::new(false),
            fast_failing: AtomicBool::new(false),
            services: Mutex::default(),
            registrations: Mutex::default(),
            deregistered: Mutex::default(),
            proxied: AtomicU64::new(0),
            client: reqwest::Client::new(),
        });

        let app = Router::new()
            .route("/v1/agent/service/register", put(register))
            .route("/v1/agent/service/deregister/{id}", put(deregister))
            .route("/debug/instances", get(instances))
            .route("/proxy/{service}/{*rest}", get(proxy))
            .with_state(state.clone());

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url: format!("http://{}", addr),
            state,
        }
    }

    /// Make the debug endpoint answer 503 while `down` is set
    pub fn set_telemetry_down(&self, down: bool) {
        self.state.telemetry_down.store(down, Ordering::SeqCst);
    }

    /// Count requests routed to the fast backend, then answer them with 502
    pub fn set_fast_backend_failing(&self, failing: bool) {
        self.state.fast_failing.store(failing, Ordering::SeqCst);
    }

    pub fn registered_ids(&self) -> Vec<String> {
        self.state.services.lock().unwrap().keys().cloned().collect()
    }

    pub fn registrations(&self) -> Vec<Value> {
        self.state.registrations.lock().unwrap().clone()
    }

    pub fn deregistered(&self) -> Vec<String> {
        self.state.deregistered.lock().unwrap().clone()
    }

    pub fn proxied(&self) -> u64 {
        self.state.proxied.load(Ordering::SeqCst)
    }

    /// Default configuration pointed at this fake, tuned for fast runs
    pub fn config(&self, total_requests: u32) -> ProbeConfig {
        let mut config = ProbeConfig::default();
        config.discovery.base_url = self.base_url.clone();
        config.balancer.base_url = self.base_url.clone();
        config.balancer.settle_delay = Duration::ZERO;
        config.balancer.readiness = RetryPolicy::polling(Duration::from_millis(20), Duration::from_secs(2));
        config.balancer.probe_timeout = Duration::from_secs(2);
        config.routing.total_requests = total_requests;
        config.routing.inter_request_delay = Duration::ZERO;
        config.routing.slow_delay = Duration::from_millis(20);
        for backend in &mut config.routing.backends {
            backend.port = 0;
        }
        config
    }
}

async fn register(State(state): State<Arc<InfraState>>, Json(body): Json<Value>) -> StatusCode {
    let id = body["ID"].as_str().unwrap_or_default().to_string();
    state.registrations.lock().unwrap().push(body.clone());

    if state.reject_id.as_deref() == Some(id.as_str()) {
        return StatusCode::INTERNAL_SERVER_ERROR;
    }

    let port = body["Port"].as_u64().unwrap_or_default() as u16;
    state
        .services
        .lock()
        .unwrap()
        .insert(id, Instance { port, total: 0 });
    StatusCode::OK
}

async fn deregister(State(state): State<Arc<InfraState>>, Path(id): Path<String>) -> StatusCode {
    state.services.lock().unwrap().remove(&id);
    state.deregistered.lock().unwrap().push(id);
    StatusCode::OK
}

async fn instances(State(state): State<Arc<InfraState>>) -> Response {
    if state.telemetry_down.load(Ordering::SeqCst) {
        return StatusCode::SERVICE_UNAVAILABLE.into_response();
    }

    let services = state.services.lock().unwrap();
    let listed: Vec<Value> = services
        .iter()
        .map(|(id, instance)| {
            json!({
                "id": id,
                "url": format!("http://127.0.0.1:{}", instance.port),
                "ewmaLatencyMs": "1.00",
                "healthy": true,
                "activeRequests": 0,
                "totalRequests": instance.total,
            })
        })
        .collect();
    Json(json!({ "instances": listed })).into_response()
}

async fn proxy(
    State(state): State<Arc<InfraState>>,
    Path((_service, rest)): Path<(String, String)>,
) -> Response {
    let n = state.proxied.fetch_add(1, Ordering::SeqCst) + 1;
    let wants_slow = match state.policy {
        RoutePolicy::SlowEvery(every) => n % every == 0,
        RoutePolicy::Alternate => n % 2 == 0,
    };

    let target = {
        let mut services = state.services.lock().unwrap();
        services
            .iter_mut()
            .find(|(id, _)| id.contains("slow") == wants_slow)
            .map(|(_, instance)| {
                instance.total += 1;
                instance.port
            })
    };

    let Some(port) = target else {
        return (StatusCode::SERVICE_UNAVAILABLE, "no instances").into_response();
    };
    if !wants_slow && state.fast_failing.load(Ordering::SeqCst) {
        return StatusCode::BAD_GATEWAY.into_response();
    }

    let upstream_marker = format!("127.0.0.1:{}", port);

    match state
        .client
        .get(format!("http://127.0.0.1:{}/{}", port, rest))
        .send()
        .await
    {
        Ok(upstream) => {
            let status = upstream.status().as_u16();
            let body = upstream.text().await.unwrap_or_default();
            (
                StatusCode::from_u16(status).unwrap(),
                [("X-Real-IP", upstream_marker)],
                body,
            )
                .into_response()
        }
        Err(_) => StatusCode::BAD_GATEWAY.into_response(),
    }
}
