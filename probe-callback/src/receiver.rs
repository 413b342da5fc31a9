//! Embedded webhook receiver

use crate::errors::CallbackError;
use crate::store::{CallbackRecord, CorrelationStore};
use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use probe_config::CallbackConfig;
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

/// The only route the receiver serves
pub const WEBHOOK_PATH: &str = "/webhook/search-results";

/// Builder for the webhook receiver
pub struct CallbackReceiver;

impl CallbackReceiver {
    /// Router serving `POST` [`WEBHOOK_PATH`] backed by `store`.
    ///
    /// Unknown paths get 404 and other methods on the webhook path get 405;
    /// neither reaches the store.
    pub fn router(store: CorrelationStore) -> Router {
        Router::new()
            .route(WEBHOOK_PATH, post(receive_search_results))
            .layer(TraceLayer::new_for_http())
            .with_state(store)
    }

    /// Bind and serve on a background task with a fresh store
    pub async fn start(config: &CallbackConfig) -> Result<CallbackReceiverHandle, CallbackError> {
        Self::start_with_store(config, CorrelationStore::new(config.poll_interval)).await
    }

    /// Bind and serve on a background task, filing deliveries into `store`
    pub async fn start_with_store(
        config: &CallbackConfig,
        store: CorrelationStore,
    ) -> Result<CallbackReceiverHandle, CallbackError> {
        let bind_addr = format!("{}:{}", config.bind_host, config.port);
        let listener = TcpListener::bind(&bind_addr)
            .await
            .map_err(|source| CallbackError::Bind {
                addr: bind_addr.clone(),
                source,
            })?;
        let local_addr = listener.local_addr().map_err(|source| CallbackError::Bind {
            addr: bind_addr,
            source,
        })?;

        let callback_url = format!(
            "http://{}:{}{}",
            config.public_host,
            local_addr.port(),
            WEBHOOK_PATH
        );

        let app = Self::router(store.clone());
        let task = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                error!("Callback receiver stopped: {}", e);
            }
        });

        info!("Callback receiver listening on {} ({})", local_addr, callback_url);

        Ok(CallbackReceiverHandle {
            local_addr,
            callback_url,
            store,
            task,
        })
    }
}

/// Running receiver. Dropping the handle stops the listener.
pub struct CallbackReceiverHandle {
    local_addr: SocketAddr,
    callback_url: String,
    store: CorrelationStore,
    task: JoinHandle<()>,
}

impl CallbackReceiverHandle {
    /// URL to hand to the system under test
    pub fn callback_url(&self) -> &str {
        &self.callback_url
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn store(&self) -> &CorrelationStore {
        &self.store
    }

    /// Wait for a delivery under `key`; see [`CorrelationStore::wait_for`]
    pub async fn wait_for(&self, key: &str, timeout: Duration) -> Option<CallbackRecord> {
        self.store.wait_for(key, timeout).await
    }

    /// Stop accepting deliveries. In-flight requests are not drained.
    pub fn shutdown(self) {
        self.task.abort();
    }
}

impl Drop for CallbackReceiverHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn receive_search_results(State(store): State<CorrelationStore>, body: Bytes) -> Response {
    match serde_json::from_slice::<Value>(&body) {
        Ok(Value::Object(record)) => {
            let key = store.insert(record);
            info!("Received callback for '{}'", key);
            (StatusCode::OK, Json(json!({"status": "success"}))).into_response()
        }
        Ok(other) => {
            warn!("Rejected callback: expected a JSON object, got {}", json_kind(&other));
            invalid_json()
        }
        Err(e) => {
            warn!("Rejected callback: {}", e);
            invalid_json()
        }
    }
}

fn invalid_json() -> Response {
    (StatusCode::BAD_REQUEST, "Invalid JSON").into_response()
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
