//! Billable query view

use serde::Serialize;

use super::history::{QueryRecord, QueryStatus};

/// Finished or failed query with a known duration
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BillableQuery {
    pub query_id: String,
    pub user_name: String,
    pub status: QueryStatus,
    pub seconds: f64,
    pub start_time_ms: Option<i64>,
    pub end_time_ms: Option<i64>,
}

pub fn billable_queries(records: &[QueryRecord]) -> Vec<BillableQuery> {
    records
        .iter()
        .filter(|r| r.status.is_terminal_billable())
        .filter_map(|r| {
            r.duration_ms.map(|ms| BillableQuery {
                query_id: r.query_id.clone(),
                user_name: r.user_name.clone(),
                status: r.status.clone(),
                seconds: ms as f64 / 1000.0,
                start_time_ms: r.start_time_ms,
                end_time_ms: r.end_time_ms,
            })
        })
        .collect()
}
