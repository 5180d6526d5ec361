use thiserror::Error;

/// Errors returned by fleet-tracker operations.
#[derive(Error, Debug)]
pub enum TrackerError {
    /// The backend returned a non-success HTTP status.
    #[error("Backend returned HTTP {status}: {body}")]
    Http { status: u16, body: String },

    /// Network-level request failure with context.
    #[error("{context}: {source}")]
    Network {
        context: String,
        source: reqwest::Error,
    },

    /// The response body did not match the expected shape.
    #[error("Unexpected response from {endpoint}: {source}")]
    Decode {
        endpoint: String,
        source: serde_json::Error,
    },

    /// The request was rejected before it was sent.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Local I/O failure (reading an upload file).
    #[error("{context}: {source}")]
    Io {
        context: String,
        source: std::io::Error,
    },

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// JSON serialization error for outgoing payloads.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl TrackerError {
    /// Whether the failure is likely to clear on its own: network errors and
    /// 5xx responses. The poller retries every failure regardless and
    /// records this flag in its log.
    pub fn is_transient(&self) -> bool {
        match self {
            TrackerError::Network { .. } => true,
            TrackerError::Http { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

/// Convenience alias.
pub type Result<T> = std::result::Result<T, TrackerError>;
