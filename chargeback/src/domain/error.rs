//! Error type for the chargeback pipeline

use thiserror::Error;
use warehouse_sdk::ApiError;

use crate::utils::string::{PREVIEW_MAX_LENGTH, truncate_preview};

/// Errors that abort a report run
#[derive(Error, Debug)]
pub enum ChargebackError {
    /// Caller supplied unusable input (e.g. no warehouse ids)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Credential rejected by the API (401/403)
    #[error("Authentication failed (HTTP {status}): {body}")]
    Auth { status: u16, body: String },

    /// Non-2xx API response other than 401/403
    #[error("Fetch failed (HTTP {status_code}): {body}")]
    Fetch { status_code: u16, body: String },

    /// No response received (connect, TLS, timeout)
    #[error("Transport error: {0}")]
    Transport(String),

    /// The API kept reporting more pages past the safety bound
    #[error("Pagination limit exceeded: more than {max_pages} pages")]
    PaginationLimitExceeded { max_pages: u32 },

    /// One roster user maps to several distinct targets
    #[error("Ambiguous roster entry for user '{user_name}': {targets:?}")]
    AmbiguousJoin {
        user_name: String,
        targets: Vec<String>,
    },

    /// API response with an unexpected or missing field shape
    #[error("Schema error: {0}")]
    Schema(String),
}

impl ChargebackError {
    /// Create a schema error for a record missing a mandatory field
    pub fn missing_field(field: &str, query_id: Option<&str>) -> Self {
        Self::Schema(match query_id {
            Some(id) => format!("query '{}' is missing required field '{}'", id, field),
            None => format!("query record is missing required field '{}'", field),
        })
    }

    /// HTTP status behind this error, if any
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Auth { status, .. } => Some(*status),
            Self::Fetch { status_code, .. } => Some(*status_code),
            _ => None,
        }
    }
}

impl From<ApiError> for ChargebackError {
    fn from(e: ApiError) -> Self {
        match e {
            ApiError::Unauthorized { status, body } => Self::Auth { status, body },
            ApiError::Status { status, body } => {
                tracing::debug!(
                    status,
                    body = %truncate_preview(&body, PREVIEW_MAX_LENGTH),
                    "Warehouse API returned an error status"
                );
                Self::Fetch {
                    status_code: status,
                    body,
                }
            }
            ApiError::Transport(e) => Self::Transport(e.to_string()),
            ApiError::Decode { endpoint, message } => {
                Self::Schema(format!("unexpected response from {}: {}", endpoint, message))
            }
            ApiError::InvalidUrl { url, message } => {
                Self::InvalidInput(format!("workspace URL '{}': {}", url, message))
            }
        }
    }
}
