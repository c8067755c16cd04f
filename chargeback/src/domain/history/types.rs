//! Normalized query-history record

use std::fmt;

use serde::{Serialize, Serializer};

/// Execution status reported by the history API.
///
/// Unrecognized values are kept verbatim in `Other`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum QueryStatus {
    Queued,
    Running,
    Canceled,
    Failed,
    Finished,
    Other(String),
}

impl QueryStatus {
    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_uppercase().as_str() {
            "QUEUED" => Self::Queued,
            "RUNNING" => Self::Running,
            "CANCELED" | "CANCELLED" => Self::Canceled,
            "FAILED" => Self::Failed,
            "FINISHED" => Self::Finished,
            _ => Self::Other(s.trim().to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Queued => "QUEUED",
            Self::Running => "RUNNING",
            Self::Canceled => "CANCELED",
            Self::Failed => "FAILED",
            Self::Finished => "FINISHED",
            Self::Other(s) => s,
        }
    }

    /// Finished or failed: the query consumed warehouse time to completion
    pub fn is_terminal_billable(&self) -> bool {
        matches!(self, Self::Finished | Self::Failed)
    }
}

impl fmt::Display for QueryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for QueryStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// One historical query execution.
///
/// Timestamps and duration are `None` when the API omitted them; they are
/// never defaulted to zero.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueryRecord {
    pub query_id: String,
    pub user_id: i64,
    pub user_name: String,
    pub status: QueryStatus,
    pub query_text: String,
    pub start_time_ms: Option<i64>,
    pub end_time_ms: Option<i64>,
    /// Milliseconds
    #[serde(rename = "duration")]
    pub duration_ms: Option<i64>,
    pub warehouse_id: Option<String>,
}

impl QueryRecord {
    /// `false` only when all three timing fields are known and disagree
    pub fn duration_consistent(&self) -> bool {
        match (self.start_time_ms, self.end_time_ms, self.duration_ms) {
            (Some(start), Some(end), Some(duration)) => end.checked_sub(start) == Some(duration),
            _ => true,
        }
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    /// Finished query with consistent timing
    pub fn record(query_id: &str, user_id: i64, user_name: &str, start_ms: i64) -> QueryRecord {
        QueryRecord {
            query_id: query_id.to_string(),
            user_id,
            user_name: user_name.to_string(),
            status: QueryStatus::Finished,
            query_text: "SELECT 1".to_string(),
            start_time_ms: Some(start_ms),
            end_time_ms: Some(start_ms + 1000),
            duration_ms: Some(1000),
            warehouse_id: Some("wh1".to_string()),
        }
    }
}
