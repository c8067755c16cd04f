use thiserror::Error;

/// Errors returned by [`crate::WarehouseClient`]
#[derive(Error, Debug)]
pub enum ApiError {
    /// 401 or 403: the token is missing, expired or lacks permission
    #[error("Unauthorized (HTTP {status}): {body}")]
    Unauthorized { status: u16, body: String },

    /// Any other non-2xx response
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// Connection, TLS or timeout failure before a response was received
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// 2xx response whose body does not match the expected shape
    #[error("Failed to decode response from {endpoint}: {message}")]
    Decode { endpoint: String, message: String },

    #[error("Invalid workspace URL '{url}': {message}")]
    InvalidUrl { url: String, message: String },
}

impl ApiError {
    /// HTTP status code, if a response was received
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Unauthorized { status, .. } | Self::Status { status, .. } => Some(*status),
            Self::Transport(e) => e.status().map(|s| s.as_u16()),
            Self::Decode { .. } | Self::InvalidUrl { .. } => None,
        }
    }

    /// Whether a retry could plausibly succeed.
    ///
    /// Server errors (5xx) and timeouts/connect failures are transient.
    /// Client errors (4xx) never are.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Status { status, .. } => (500..600).contains(status),
            Self::Transport(e) => e.is_timeout() || e.is_connect(),
            Self::Unauthorized { .. } | Self::Decode { .. } | Self::InvalidUrl { .. } => false,
        }
    }
}
