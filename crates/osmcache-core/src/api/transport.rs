//! HTTP transport for the remote membership API.
//!
//! The transport knows nothing about credentials or entities: it posts a
//! form to a relative endpoint and hands back the decoded JSON body. The
//! `Connection` layers credentials, error classification and caching on top.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header, Client};
use serde_json::Value;
use tracing::debug;

use crate::config::ClientConfig;

use super::{OsmError, Result};

/// Form parameters, in the order they are sent.
pub type FormParams = Vec<(String, String)>;

/// A single request/response primitive. Implementations must not retry.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn post(&self, endpoint: &str, form: &FormParams) -> Result<Value>;
}

/// reqwest-backed transport.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct HttpTransport {
    client: Client,
    base_url: String,
}

impl HttpTransport {
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}/{}", self.base_url, endpoint.trim_start_matches('/'))
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn post(&self, endpoint: &str, form: &FormParams) -> Result<Value> {
        let url = self.url(endpoint);
        let response = self
            .client
            .post(&url)
            .header(header::ACCEPT, "application/json")
            .form(form)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            return Err(OsmError::from_status(endpoint, status, &text));
        }

        debug!(endpoint, bytes = text.len(), "Response received");

        // The remote system answers "no permission" with an empty body on
        // some endpoints; treat that the same as a literal `null`.
        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&text).map_err(|e| OsmError::invalid(endpoint, e))
    }
}
