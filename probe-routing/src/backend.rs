//! Ephemeral HTTP backends with a fixed latency class

use crate::errors::RoutingError;
use axum::extract::State;
use axum::http::{Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use probe_config::{BackendClass, BackendConfig};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

/// Health check path; always answers immediately
pub const PING_PATH: &str = "/ping";

#[derive(Clone)]
struct BackendState {
    class: BackendClass,
    delay: Duration,
    served: Arc<AtomicU64>,
}

/// A running backend. Dropping it stops the listener.
pub struct EphemeralBackend {
    id: String,
    class: BackendClass,
    local_addr: SocketAddr,
    served: Arc<AtomicU64>,
    task: JoinHandle<()>,
}

impl EphemeralBackend {
    /// Router for a backend of `class`.
    ///
    /// `GET /ping` answers `OK` without delay so health checks stay green.
    /// Any other `GET` answers `pong`, after `slow_delay` for slow backends.
    pub fn router(class: BackendClass, slow_delay: Duration) -> Router {
        Self::router_with_counter(class, slow_delay, Arc::new(AtomicU64::new(0)))
    }

    fn router_with_counter(class: BackendClass, slow_delay: Duration, served: Arc<AtomicU64>) -> Router {
        let delay = match class {
            BackendClass::Fast => Duration::ZERO,
            BackendClass::Slow => slow_delay,
        };
        Router::new()
            .route(PING_PATH, get(ping))
            .fallback(workload)
            .with_state(BackendState {
                class,
                delay,
                served,
            })
    }

    /// Bind `bind_host:backend.port` and serve on a background task.
    /// Port 0 picks a free port; [`descriptor`](Self::descriptor) reports it.
    pub async fn spawn(
        backend: &BackendConfig,
        bind_host: &str,
        slow_delay: Duration,
    ) -> Result<Self, RoutingError> {
        let addr = format!("{}:{}", bind_host, backend.port);
        let bind_error = |source| RoutingError::BackendBind {
            id: backend.id.clone(),
            addr: addr.clone(),
            source,
        };
        let listener = TcpListener::bind(&addr).await.map_err(bind_error)?;
        let local_addr = listener.local_addr().map_err(bind_error)?;

        let served = Arc::new(AtomicU64::new(0));
        let app = Self::router_with_counter(backend.class, slow_delay, served.clone());
        let id = backend.id.clone();
        let task = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                error!("Backend '{}' stopped: {}", id, e);
            }
        });

        info!(
            "Started {} backend '{}' on {}",
            backend.class, backend.id, local_addr
        );

        Ok(Self {
            id: backend.id.clone(),
            class: backend.class,
            local_addr,
            served,
            task,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn class(&self) -> BackendClass {
        self.class
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn port(&self) -> u16 {
        self.local_addr.port()
    }

    /// The backend as configured, with the port it actually bound
    pub fn descriptor(&self) -> BackendConfig {
        BackendConfig {
            id: self.id.clone(),
            class: self.class,
            port: self.port(),
        }
    }

    /// Workload requests answered so far; health checks are not counted
    pub fn served(&self) -> u64 {
        self.served.load(Ordering::Relaxed)
    }

    pub fn shutdown(self) {
        self.task.abort();
    }
}

impl Drop for EphemeralBackend {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn ping() -> &'static str {
    "OK"
}

async fn workload(State(state): State<BackendState>, method: Method) -> Response {
    if method != Method::GET {
        return StatusCode::METHOD_NOT_ALLOWED.into_response();
    }
    if !state.delay.is_zero() {
        tokio::time::sleep(state.delay).await;
    }
    let served = state.served.fetch_add(1, Ordering::Relaxed) + 1;
    debug!("{} backend answered workload request #{}", state.class, served);
    "pong".into_response()
}
