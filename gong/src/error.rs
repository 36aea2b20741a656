//! Error type shared by the registry, router, vendor client and host ops.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// Credentials missing or rejected. Blocks readiness.
    #[error("configuration error: {0}")]
    Config(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("store error: {0}")]
    Store(String),

    #[error("transport error: {0}")]
    Transport(String),

    /// The originator of an inbound delivery was acknowledged twice.
    #[error("request {0} was already acknowledged")]
    AlreadyAcknowledged(String),

    #[error("{0}")]
    NotFound(String),

    /// Non-2xx response from the Gong API.
    #[error("Gong API error ({method} {endpoint}): {status} {status_text} - {body}")]
    Upstream {
        method: String,
        endpoint: String,
        status: u16,
        status_text: String,
        body: String,
    },

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// JSON-RPC error code reported to the host.
    pub fn rpc_code(&self) -> i64 {
        match self {
            Error::InvalidInput(_) => -32602,
            _ => -32000,
        }
    }
}
