use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, StatusCode};
use serde_json::Value;
use tracing::{debug, info, warn};
use url::Url;

use super::{ApiError, MonitorApi};
use crate::config::ClientConfig;
use crate::model::Monitor;

/// Relative to the base URL so a path prefix such as `/kener/` is kept.
const MONITOR_PATH: &str = "api/monitor";

/// Kener API client over HTTP with bearer-token authentication.
///
/// Requests are never retried; a failed call is reported to the caller once.
#[derive(Debug, Clone)]
pub struct HttpMonitorApi {
    client: Client,
    endpoint: Url,
}

impl HttpMonitorApi {
    pub fn new(config: &ClientConfig) -> Result<Self, ApiError> {
        let client = Self::build_client(config)?;
        Self::with_client(config, client)
    }

    pub fn with_client(config: &ClientConfig, client: Client) -> Result<Self, ApiError> {
        let mut base = config.base_url.clone();
        if !base.path().ends_with('/') {
            let dir = format!("{}/", base.path());
            base.set_path(&dir);
        }
        let endpoint = base
            .join(MONITOR_PATH)
            .map_err(|e| ApiError::Client(e.to_string()))?;
        debug!(%endpoint, "Initialized Kener API client");
        Ok(Self { client, endpoint })
    }

    pub fn build_client(config: &ClientConfig) -> Result<Client, ApiError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let mut bearer = HeaderValue::from_str(&format!("Bearer {}", config.token))
            .map_err(|e| ApiError::Client(format!("token is not a valid header value: {e}")))?;
        bearer.set_sensitive(true);
        headers.insert(AUTHORIZATION, bearer);

        Client::builder()
            .default_headers(headers)
            .timeout(config.request_timeout)
            .connect_timeout(config.connect_timeout)
            .gzip(true)
            .build()
            .map_err(|e| ApiError::Client(e.to_string()))
    }

    fn path_of(url: &Url) -> String {
        match url.query() {
            Some(q) => format!("{}?{}", url.path(), q),
            None => url.path().to_string(),
        }
    }

    fn network_error(path: &str, e: reqwest::Error) -> ApiError {
        if e.is_timeout() {
            ApiError::Timeout {
                path: path.to_string(),
            }
        } else {
            ApiError::Network {
                path: path.to_string(),
                reason: e.to_string(),
            }
        }
    }
}

#[async_trait]
impl MonitorApi for HttpMonitorApi {
    async fn query_monitors(&self, tag: Option<&str>) -> Result<Vec<Value>, ApiError> {
        let mut url = self.endpoint.clone();
        if let Some(tag) = tag {
            url.query_pairs_mut().append_pair("tag", tag);
        }
        let path = Self::path_of(&url);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| Self::network_error(&path, e))?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| Self::network_error(&path, e))?;

        if status != StatusCode::OK {
            warn!(%path, status = status.as_u16(), "Monitor query returned error status");
            return Err(ApiError::Http {
                path,
                status: status.as_u16(),
                body,
            });
        }

        match serde_json::from_str::<Value>(&body) {
            Ok(Value::Array(items)) => {
                debug!(%path, count = items.len(), "Monitor query succeeded");
                Ok(items)
            }
            Ok(_) => Err(ApiError::Decode {
                path,
                message: "expected a JSON array".into(),
            }),
            Err(e) => Err(ApiError::Decode {
                path,
                message: e.to_string(),
            }),
        }
    }

    async fn create_monitor(&self, monitor: &Monitor) -> Result<(), ApiError> {
        let path = self.endpoint.path().to_string();
        let payload = monitor.to_payload().map_err(|e| ApiError::Decode {
            path: path.clone(),
            message: e.to_string(),
        })?;

        let response = self
            .client
            .post(self.endpoint.clone())
            .json(&payload)
            .send()
            .await
            .map_err(|e| Self::network_error(&path, e))?;
        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        if status == StatusCode::CREATED {
            info!(tag = %monitor.tag, name = %monitor.name, "Monitor created");
            debug!(response = %body, "Create monitor response");
            Ok(())
        } else {
            Err(ApiError::Http {
                path,
                status: status.as_u16(),
                body,
            })
        }
    }
}
