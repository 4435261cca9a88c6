use std::time::Duration;

use url::Url;

use crate::client::ApiError;

/// Connection settings for a Kener instance.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Scheme, host and port of the instance, e.g. `http://10.10.3.1:3000`.
    pub base_url: Url,
    /// Bearer token sent on every request.
    pub token: String,
    /// Whole-request timeout (default: 10s).
    pub request_timeout: Duration,
    /// TCP connect timeout (default: 5s).
    pub connect_timeout: Duration,
}

impl ClientConfig {
    pub fn new(base_url: Url, token: impl Into<String>) -> Self {
        Self {
            base_url,
            token: token.into(),
            request_timeout: Duration::from_secs(10),
            connect_timeout: Duration::from_secs(5),
        }
    }

    /// Build from a stored host and port. A bare host gets `http://` and the
    /// given port; a full URL is used as written.
    pub fn from_host_port(host: &str, port: u16, token: impl Into<String>) -> Result<Self, ApiError> {
        let host = host.trim().trim_end_matches('/');
        let is_url = host.contains("://");
        let raw = if is_url {
            host.to_string()
        } else {
            format!("http://{host}")
        };
        let mut base_url =
            Url::parse(&raw).map_err(|e| ApiError::Client(format!("invalid host '{host}': {e}")))?;
        if !is_url && base_url.port().is_none() {
            base_url
                .set_port(Some(port))
                .map_err(|_| ApiError::Client(format!("cannot set port on '{host}'")))?;
        }
        Ok(Self::new(base_url, token))
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }
}
