//! reqwest-backed [`Transport`].

use std::time::Duration;

use async_trait::async_trait;
use feedbridge_core::{HttpMethod, RenderedRequest};
use reqwest::header::{CONTENT_TYPE, HeaderName, HeaderValue};
use reqwest::{Client, Url};
use tracing::{debug, warn};

use crate::transport::{Transport, TransportError, TransportResponse};

/// HTTP transport sharing one pooled reqwest client across workers.
#[derive(Debug, Clone, Default)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

fn map_error(err: reqwest::Error, timeout: Option<Duration>) -> TransportError {
    if err.is_timeout() {
        TransportError::Timeout(timeout.unwrap_or_default())
    } else if err.is_connect() {
        TransportError::Connection(err.to_string())
    } else if err.is_body() || err.is_decode() {
        TransportError::Body(err.to_string())
    } else {
        TransportError::Request(err.to_string())
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn execute(
        &self,
        request: &RenderedRequest,
        timeout: Option<Duration>,
    ) -> Result<TransportResponse, TransportError> {
        let url = Url::parse(&request.url).map_err(|e| TransportError::InvalidUrl {
            url: request.url.clone(),
            message: e.to_string(),
        })?;

        let mut builder = match request.method {
            HttpMethod::Get => self.client.get(url),
            HttpMethod::Post => self.client.post(url),
            HttpMethod::Put => self.client.put(url),
        };
        for (name, value) in &request.headers {
            match (
                HeaderName::from_bytes(name.as_bytes()),
                HeaderValue::from_str(value),
            ) {
                (Ok(name), Ok(value)) => builder = builder.header(name, value),
                _ => warn!(header = %name, url = %request.url, "invalid header left out"),
            }
        }
        if request.method.has_body() {
            builder = builder
                .header(CONTENT_TYPE, request.content_type.as_str())
                .body(request.body.clone().unwrap_or_default());
        }
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }

        debug!(method = %request.method, url = %request.url, "sending request");
        let resp = builder.send().await.map_err(|e| map_error(e, timeout))?;
        let status = resp.status();
        let body = resp.text().await.map_err(|e| map_error(e, timeout))?;

        Ok(TransportResponse {
            status: status.as_u16(),
            status_text: status.canonical_reason().unwrap_or_default().to_string(),
            body,
        })
    }
}
