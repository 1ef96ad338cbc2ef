//! Error types per layer
//!
//! Runtime stream failures travel as `StreamEvent::Error`, not as these.
//! Extraction misses are values (`Extraction::Miss`), never errors.

use thiserror::Error;

/// Precondition failures of `StreamTransport::open`
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("conversation must contain at least one item")]
    EmptyConversation,
    #[error("invalid endpoint: {0}")]
    InvalidEndpoint(String),
}

/// Faults of the isolated worker
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BridgeError {
    /// A job is already outstanding
    #[error("a generation is already in progress")]
    Busy,
    /// Worker crashed or could not be started
    #[error("worker fault: {0}")]
    Fault(String),
    /// Worker was torn down before replying
    #[error("worker terminated")]
    Terminated,
}

/// Failures reported by a completion backend
#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("backend responded with status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("stream error: {0}")]
    Stream(String),
    #[error("malformed event: {0}")]
    Malformed(String),
    #[error("{0}")]
    Scripted(String),
}

/// PNG encoding failure
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("png encoding failed: {0}")]
    Encode(#[from] image::ImageError),
}

/// Server startup failures
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },
    #[error("server error: {0}")]
    Serve(#[from] std::io::Error),
}
