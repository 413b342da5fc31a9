//! Trigger side of the asynchronous search flow

use crate::errors::CallbackError;
use probe_config::PeopleApiConfig;
use probe_http::HttpManager;
use serde_json::Value;
use tracing::info;

/// Acknowledgement of an accepted asynchronous search
#[derive(Debug, Clone, PartialEq)]
pub struct SearchTicket {
    pub task_id: String,
    pub body: Value,
}

/// Submits searches that the People API answers through the webhook
#[derive(Debug, Clone)]
pub struct AsyncSearchClient {
    http: HttpManager,
    config: PeopleApiConfig,
}

impl AsyncSearchClient {
    pub fn new(http: HttpManager, config: PeopleApiConfig) -> Self {
        Self { http, config }
    }

    /// POST `criteria` to the search endpoint with the callback header set.
    ///
    /// The API must answer `202 Accepted` with a `taskId`; the result itself
    /// arrives later at `callback_url`.
    pub async fn submit(&self, criteria: &Value, callback_url: &str) -> Result<SearchTicket, CallbackError> {
        let url = self.config.search_url();
        let response = self
            .http
            .post_json(
                &url,
                criteria,
                &[(self.config.callback_header.as_str(), callback_url)],
            )
            .await?;

        if response.status != 202 {
            return Err(CallbackError::NotAccepted {
                status: response.status,
                body: response.body,
            });
        }

        let body: Value = response.json(&url)?;
        let task_id = match body.get("taskId") {
            Some(Value::String(id)) if !id.is_empty() => id.clone(),
            Some(Value::Number(id)) => id.to_string(),
            _ => return Err(CallbackError::MissingTaskId(body.to_string())),
        };

        info!("Asynchronous search accepted as task {}", task_id);
        Ok(SearchTicket { task_id, body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::post;
    use axum::{Json, Router};
    use probe_http::HttpConfig;
    use serde_json::json;
    use tokio::net::TcpListener;

    async fn people_api(app: Router) -> PeopleApiConfig {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        PeopleApiConfig {
            base_url: format!("http://{}/api/v1", addr),
            ..Default::default()
        }
    }

    fn client(config: PeopleApiConfig) -> AsyncSearchClient {
        AsyncSearchClient::new(HttpManager::with_config(HttpConfig::default()).unwrap(), config)
    }

    #[tokio::test]
    async fn test_submit_returns_task_id() {
        let app = Router::new().route(
            "/api/v1/people/search",
            post(|headers: HeaderMap, Json(_criteria): Json<Value>| async move {
                let callback = headers
                    .get("X-Callback-URL")
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or_default()
                    .to_string();
                (
                    StatusCode::ACCEPTED,
                    Json(json!({"taskId": "task-9", "callback": callback})),
                )
            }),
        );
        let config = people_api(app).await;

        let ticket = client(config)
            .submit(&json!({"filters": []}), "http://localhost:1/webhook/search-results")
            .await
            .unwrap();
        assert_eq!(ticket.task_id, "task-9");
        assert_eq!(ticket.body["callback"], "http://localhost:1/webhook/search-results");
    }

    #[tokio::test]
    async fn test_synchronous_answer_is_rejected() {
        let app = Router::new().route(
            "/api/v1/people/search",
            post(|| async { Json(json!({"people": []})) }),
        );
        let config = people_api(app).await;

        let err = client(config).submit(&json!({}), "http://cb").await.unwrap_err();
        assert!(matches!(err, CallbackError::NotAccepted { status: 200, .. }));
    }

    #[tokio::test]
    async fn test_missing_task_id() {
        let app = Router::new().route(
            "/api/v1/people/search",
            post(|| async { (StatusCode::ACCEPTED, Json(json!({"status": "queued"}))) }),
        );
        let config = people_api(app).await;

        let err = client(config).submit(&json!({}), "http://cb").await.unwrap_err();
        assert!(matches!(err, CallbackError::MissingTaskId(_)));
    }
}
