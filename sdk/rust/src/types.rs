//! Wire types for the query-history and warehouse endpoints

use serde::{Deserialize, Serialize};

// ============================================================================
// Query history request
// ============================================================================

/// Filter applied to the first history page
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueryFilter {
    pub warehouse_ids: Vec<String>,
}

/// Body of `GET /api/2.0/sql/history/queries`.
///
/// The provider encodes the filter inside `page_token`, so follow-up pages
/// carry the token and page size only.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ListQueriesRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter_by: Option<QueryFilter>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_results: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_token: Option<String>,
}

impl ListQueriesRequest {
    /// Request for the first page of queries run on `warehouse_ids`
    pub fn first_page(warehouse_ids: Vec<String>, max_results: u32) -> Self {
        Self {
            filter_by: Some(QueryFilter { warehouse_ids }),
            max_results: Some(max_results),
            page_token: None,
        }
    }

    /// Request for the page identified by `token`
    pub fn next_page(token: impl Into<String>, max_results: u32) -> Self {
        Self {
            filter_by: None,
            max_results: Some(max_results),
            page_token: Some(token.into()),
        }
    }
}

// ============================================================================
// Query history response
// ============================================================================

/// One query as returned by the history API.
///
/// Every field is optional on the wire. Which ones are mandatory is a
/// decision for the caller.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct QueryInfo {
    #[serde(default)]
    pub query_id: Option<String>,
    #[serde(default)]
    pub user_id: Option<i64>,
    #[serde(default)]
    pub user_name: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub query_text: Option<String>,
    #[serde(default)]
    pub query_start_time_ms: Option<i64>,
    #[serde(default)]
    pub query_end_time_ms: Option<i64>,
    #[serde(default)]
    pub duration: Option<i64>,
    #[serde(default)]
    pub warehouse_id: Option<String>,
}

/// One page of query history
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct QueryHistoryPage {
    /// Absent when the page is empty
    #[serde(default)]
    pub res: Vec<QueryInfo>,
    #[serde(default)]
    pub has_next_page: bool,
    #[serde(default)]
    pub next_page_token: Option<String>,
}

// ============================================================================
// Warehouse descriptor
// ============================================================================

/// Response of `GET /api/2.0/sql/warehouses/{id}`.
///
/// Only the fields useful for cost enrichment are typed; everything else is
/// kept in `extra`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct WarehouseInfo {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub cluster_size: Option<String>,
    #[serde(default)]
    pub min_num_clusters: Option<u32>,
    #[serde(default)]
    pub max_num_clusters: Option<u32>,
    #[serde(default)]
    pub auto_stop_mins: Option<u32>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub warehouse_type: Option<String>,
    #[serde(default)]
    pub enable_serverless_compute: Option<bool>,
    #[serde(default)]
    pub creator_name: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_first_page_request_body() {
        let req = ListQueriesRequest::first_page(vec!["wh1".into(), "wh2".into()], 50);
        assert_eq!(
            serde_json::to_value(&req).unwrap(),
            json!({
                "filter_by": { "warehouse_ids": ["wh1", "wh2"] },
                "max_results": 50
            })
        );
    }

    #[test]
    fn test_next_page_request_omits_filter() {
        let req = ListQueriesRequest::next_page("T1", 50);
        assert_eq!(
            serde_json::to_value(&req).unwrap(),
            json!({ "max_results": 50, "page_token": "T1" })
        );
    }

    #[test]
    fn test_page_missing_optional_fields() {
        let page: QueryHistoryPage = serde_json::from_str(
            r#"{"res": [{"query_id": "q1", "user_id": 7, "user_name": "alice", "status": "RUNNING"}],
                "has_next_page": false}"#,
        )
        .unwrap();
        let q = &page.res[0];
        assert_eq!(q.query_id.as_deref(), Some("q1"));
        assert_eq!(q.query_start_time_ms, None);
        assert_eq!(q.query_end_time_ms, None);
        assert_eq!(q.duration, None);
        assert_eq!(page.next_page_token, None);
    }

    #[test]
    fn test_unread_query_fields_ignored() {
        let q: QueryInfo = serde_json::from_value(json!({
            "query_id": "q1",
            "duration": 1200,
            "statement_type": "SELECT",
            "rows_produced": 10,
            "error_message": null,
            "metrics": { "compilation_time_ms": 5 }
        }))
        .unwrap();
        assert_eq!(q.query_id.as_deref(), Some("q1"));
        assert_eq!(q.duration, Some(1200));
    }

    #[test]
    fn test_empty_page_without_res() {
        let page: QueryHistoryPage = serde_json::from_str(r#"{"has_next_page": false}"#).unwrap();
        assert!(page.res.is_empty());
        assert!(!page.has_next_page);
    }

    #[test]
    fn test_warehouse_info_keeps_unknown_fields() {
        let info: WarehouseInfo = serde_json::from_value(json!({
            "id": "5badc23414",
            "name": "BI",
            "cluster_size": "Small",
            "max_num_clusters": 4,
            "spot_instance_policy": "COST_OPTIMIZED"
        }))
        .unwrap();
        assert_eq!(info.name.as_deref(), Some("BI"));
        assert_eq!(info.max_num_clusters, Some(4));
        assert_eq!(
            info.extra.get("spot_instance_policy"),
            Some(&json!("COST_OPTIMIZED"))
        );
    }
}
