//! Flatten raw API records into [`QueryRecord`]

use warehouse_sdk::QueryInfo;

use super::types::{QueryRecord, QueryStatus};
use crate::domain::error::ChargebackError;

/// Normalize one raw record.
///
/// `query_id`, `user_id` and `user_name` are mandatory. A missing status
/// becomes `UNKNOWN`, missing text becomes empty, and missing timing fields
/// stay unknown.
pub fn normalize(raw: QueryInfo) -> Result<QueryRecord, ChargebackError> {
    let query_id = raw
        .query_id
        .filter(|id| !id.trim().is_empty())
        .ok_or_else(|| ChargebackError::missing_field("query_id", None))?;
    let user_id = raw
        .user_id
        .ok_or_else(|| ChargebackError::missing_field("user_id", Some(&query_id)))?;
    let user_name = raw
        .user_name
        .ok_or_else(|| ChargebackError::missing_field("user_name", Some(&query_id)))?;

    let status = raw
        .status
        .as_deref()
        .map(QueryStatus::parse)
        .unwrap_or_else(|| QueryStatus::Other("UNKNOWN".to_string()));

    Ok(QueryRecord {
        query_id,
        user_id,
        user_name,
        status,
        query_text: raw.query_text.unwrap_or_default(),
        start_time_ms: raw.query_start_time_ms,
        end_time_ms: raw.query_end_time_ms,
        duration_ms: raw.duration,
        warehouse_id: raw.warehouse_id,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw() -> QueryInfo {
        QueryInfo {
            query_id: Some("q1".into()),
            user_id: Some(1),
            user_name: Some("alice".into()),
            status: Some("FINISHED".into()),
            query_text: Some("SELECT 1".into()),
            query_start_time_ms: Some(1_700_000_000_000),
            query_end_time_ms: Some(1_700_000_005_000),
            duration: Some(5000),
            warehouse_id: Some("wh1".into()),
        }
    }

    #[test]
    fn test_normalize_full_record() {
        let r = normalize(raw()).unwrap();
        assert_eq!(r.query_id, "q1");
        assert_eq!(r.user_id, 1);
        assert_eq!(r.status, QueryStatus::Finished);
        assert_eq!(r.start_time_ms, Some(1_700_000_000_000));
        assert_eq!(r.duration_ms, Some(5000));
        assert_eq!(r.warehouse_id.as_deref(), Some("wh1"));
    }

    #[test]
    fn test_normalize_missing_timing_stays_unknown() {
        let r = normalize(QueryInfo {
            query_start_time_ms: None,
            query_end_time_ms: None,
            duration: None,
            ..raw()
        })
        .unwrap();
        assert_eq!(r.start_time_ms, None);
        assert_eq!(r.end_time_ms, None);
        assert_eq!(r.duration_ms, None);
    }

    #[test]
    fn test_normalize_tolerates_missing_status_and_text() {
        let r = normalize(QueryInfo {
            status: None,
            query_text: None,
            ..raw()
        })
        .unwrap();
        assert_eq!(r.status.as_str(), "UNKNOWN");
        assert_eq!(r.query_text, "");
    }

    #[test]
    fn test_normalize_missing_user_id_is_schema_error() {
        let err = normalize(QueryInfo {
            user_id: None,
            ..raw()
        })
        .unwrap_err();
        assert!(matches!(err, ChargebackError::Schema(ref m) if m.contains("user_id") && m.contains("q1")));
    }

    #[test]
    fn test_normalize_blank_query_id_is_schema_error() {
        let err = normalize(QueryInfo {
            query_id: Some("  ".into()),
            ..raw()
        })
        .unwrap_err();
        assert!(matches!(err, ChargebackError::Schema(_)));
    }
}
