use thiserror::Error;

/// Top-level error type for DocGate.
#[derive(Error, Debug)]
pub enum DocGateError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("API request failed with response code: {status}")]
    Api { status: u16 },

    #[error("Invalid document: {0}")]
    InvalidDocument(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Cancelled while waiting for admission")]
    Cancelled,

    #[error("{0}")]
    Other(String),
}

/// Convenience type alias.
pub type Result<T> = std::result::Result<T, DocGateError>;
