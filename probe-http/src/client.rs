//! HTTP client implementation

use crate::config::HttpConfig;
use crate::errors::HttpError;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, trace};

/// Header some proxies use to report the upstream address
pub const REAL_IP_HEADER: &str = "x-real-ip";

/// Buffered response with the bits the harness inspects
#[derive(Debug, Clone)]
pub struct PlainResponse {
    pub status: u16,
    pub real_ip: Option<String>,
    pub body: String,
}

impl PlainResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Decode the buffered body as JSON
    pub fn json<T: DeserializeOwned>(&self, url: &str) -> Result<T, HttpError> {
        serde_json::from_str(&self.body).map_err(|source| HttpError::InvalidJson {
            url: url.to_string(),
            source,
        })
    }

    /// Turn a non-2xx response into an error
    pub fn error_for_status(self, url: &str) -> Result<Self, HttpError> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(HttpError::UnexpectedStatus {
                url: url.to_string(),
                status: self.status,
                body: self.body,
            })
        }
    }
}

/// Shared, pooled HTTP client
#[derive(Debug, Clone)]
pub struct HttpManager {
    client: Client,
    config: HttpConfig,
}

impl HttpManager {
    /// Create a new HttpManager with specific configuration
    pub fn with_config(config: HttpConfig) -> Result<Self, HttpError> {
        debug!(
            "Creating HttpManager with timeout: {}ms",
            config.timeout.as_millis()
        );
        let client = Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .pool_idle_timeout(config.pool_idle_timeout)
            .user_agent(&config.user_agent)
            .build()?;

        Ok(Self { client, config })
    }

    pub fn config(&self) -> &HttpConfig {
        &self.config
    }

    /// GET a URL and decode a 2xx JSON body
    pub async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, HttpError> {
        self.get(url, None)
            .await?
            .error_for_status(url)?
            .json(url)
    }

    /// GET a URL, optionally overriding the default timeout
    pub async fn get(&self, url: &str, timeout: Option<Duration>) -> Result<PlainResponse, HttpError> {
        let mut request = self.client.get(url);
        if let Some(timeout) = timeout {
            request = request.timeout(timeout);
        }
        self.send(url, request).await
    }

    /// PUT an optional JSON body; the caller decides what a status means
    pub async fn put_json<B: Serialize + ?Sized>(
        &self,
        url: &str,
        body: Option<&B>,
    ) -> Result<PlainResponse, HttpError> {
        let mut request = self.client.put(url);
        if let Some(body) = body {
            request = request.json(body);
        }
        self.send(url, request).await
    }

    /// POST a JSON body with extra headers
    pub async fn post_json<B: Serialize + ?Sized>(
        &self,
        url: &str,
        body: &B,
        headers: &[(&str, &str)],
    ) -> Result<PlainResponse, HttpError> {
        let request = self
            .client
            .post(url)
            .headers(build_headers(headers)?)
            .json(body);
        self.send(url, request).await
    }

    async fn send(&self, url: &str, request: RequestBuilder) -> Result<PlainResponse, HttpError> {
        trace!("Sending request to {}", url);
        let response = request
            .send()
            .await
            .map_err(|e| HttpError::from_reqwest(url, e))?;

        let status = response.status().as_u16();
        let real_ip = response
            .headers()
            .get(REAL_IP_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response
            .text()
            .await
            .map_err(|e| HttpError::from_reqwest(url, e))?;

        debug!("{} responded {}", url, status);
        Ok(PlainResponse {
            status,
            real_ip,
            body,
        })
    }
}

fn build_headers(headers: &[(&str, &str)]) -> Result<HeaderMap, HttpError> {
    let mut header_map = HeaderMap::new();
    for (name, value) in headers {
        let header_name =
            HeaderName::from_str(name).map_err(|_| HttpError::InvalidHeader(name.to_string()))?;
        let header_value = HeaderValue::from_str(value)
            .map_err(|_| HttpError::InvalidHeader(format!("{}: {}", name, value)))?;
        header_map.insert(header_name, header_value);
    }
    Ok(header_map)
}
