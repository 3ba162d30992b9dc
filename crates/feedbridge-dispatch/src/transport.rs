//! The HTTP transport capability and output sinks the dispatcher talks to.

use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use feedbridge_core::{CanonicalDocument, RenderedRequest};
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::warn;

/// The only status treated as success.
pub const STATUS_OK: u16 = 200;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("invalid URL {url:?}: {message}")]
    InvalidUrl { url: String, message: String },

    #[error("building request: {0}")]
    Request(String),

    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("connection failed: {0}")]
    Connection(String),

    #[error("reading response body: {0}")]
    Body(String),
}

/// Status line and body of a completed exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    pub status: u16,
    pub status_text: String,
    pub body: String,
}

impl TransportResponse {
    pub fn ok(body: impl Into<String>) -> Self {
        Self {
            status: STATUS_OK,
            status_text: "OK".into(),
            body: body.into(),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == STATUS_OK
    }
}

/// Creates and executes HTTP requests.
///
/// Connection pooling and TLS are the implementation's business.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Execute `request`. `timeout` of `None` means the transport default.
    async fn execute(
        &self,
        request: &RenderedRequest,
        timeout: Option<Duration>,
    ) -> Result<TransportResponse, TransportError>;
}

/// Receives one document per successfully normalized response.
pub trait OutputSink: Send + Sync {
    fn emit(&self, document: CanonicalDocument);
}

impl OutputSink for mpsc::UnboundedSender<CanonicalDocument> {
    fn emit(&self, document: CanonicalDocument) {
        if self.send(document).is_err() {
            warn!("output channel closed, document dropped");
        }
    }
}

/// Sink that keeps every document in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    documents: Mutex<Vec<CanonicalDocument>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.documents
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove and return everything received so far.
    pub fn take(&self) -> Vec<CanonicalDocument> {
        std::mem::take(&mut *self.documents.lock().unwrap_or_else(PoisonError::into_inner))
    }
}

impl OutputSink for MemorySink {
    fn emit(&self, document: CanonicalDocument) {
        self.documents
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(document);
    }
}
