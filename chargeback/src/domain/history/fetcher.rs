//! Paginated query-history fetcher

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use futures::{StreamExt, TryStreamExt, stream};
use warehouse_sdk::{ApiError, ListQueriesRequest, QueryHistoryPage, WarehouseClient};

use super::normalize::normalize;
use super::types::QueryRecord;
use crate::domain::error::ChargebackError;
use crate::utils::retry::{RetryPolicy, retry_with_backoff_async};

/// Default page size requested from the API
pub const DEFAULT_PAGE_SIZE: u32 = 100;

/// Default hard bound on pages fetched per warehouse group
pub const DEFAULT_MAX_PAGES: u32 = 1000;

/// Anything that can serve one page of query history
#[async_trait]
pub trait QueryHistorySource: Send + Sync {
    async fn list_queries(
        &self,
        request: &ListQueriesRequest,
    ) -> Result<QueryHistoryPage, ApiError>;
}

#[async_trait]
impl QueryHistorySource for WarehouseClient {
    async fn list_queries(
        &self,
        request: &ListQueriesRequest,
    ) -> Result<QueryHistoryPage, ApiError> {
        WarehouseClient::list_queries(self, request).await
    }
}

/// Fetcher tuning
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchOptions {
    pub page_size: u32,
    /// Page bound for each warehouse group; a run with several groups may
    /// fetch up to `groups * max_pages` pages in total
    pub max_pages: u32,
    pub retry: RetryPolicy,
    /// Warehouse ids per request filter (0 = all ids in one filter)
    pub group_size: usize,
    /// Groups fetched in parallel
    pub concurrency: usize,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            max_pages: DEFAULT_MAX_PAGES,
            retry: RetryPolicy::default(),
            group_size: 0,
            concurrency: 1,
        }
    }
}

/// Result of a complete fetch
#[derive(Debug, Clone, Default)]
pub struct FetchOutcome {
    /// Unique by `query_id`, sorted by `(start_time_ms, query_id)`, unknown
    /// start times last
    pub records: Vec<QueryRecord>,
    pub pages: u32,
    /// Records dropped because their `query_id` was already seen
    pub duplicates: usize,
}

struct GroupResult {
    records: Vec<QueryRecord>,
    pages: u32,
}

pub struct HistoryFetcher {
    source: Arc<dyn QueryHistorySource>,
    options: FetchOptions,
}

impl HistoryFetcher {
    pub fn new(source: Arc<dyn QueryHistorySource>, options: FetchOptions) -> Self {
        Self { source, options }
    }

    pub fn options(&self) -> &FetchOptions {
        &self.options
    }

    /// Fetch every query run on `warehouse_ids`, across all pages.
    ///
    /// Fails as a whole: no records are returned if any page fails.
    pub async fn fetch(&self, warehouse_ids: &[String]) -> Result<FetchOutcome, ChargebackError> {
        let ids = validate_warehouse_ids(warehouse_ids)?;
        let groups = split_groups(ids, self.options.group_size);
        let group_count = groups.len();

        tracing::debug!(
            groups = group_count,
            concurrency = self.options.concurrency.max(1),
            "Fetching query history"
        );

        // `buffered` keeps group order, so the merge below is deterministic
        let results: Vec<GroupResult> = stream::iter(groups)
            .map(|group| self.fetch_group(group))
            .buffered(self.options.concurrency.max(1))
            .try_collect()
            .await?;

        let mut seen = HashSet::new();
        let mut outcome = FetchOutcome::default();
        for group in results {
            outcome.pages += group.pages;
            for record in group.records {
                if seen.insert(record.query_id.clone()) {
                    outcome.records.push(record);
                } else {
                    outcome.duplicates += 1;
                }
            }
        }

        if outcome.duplicates > 0 {
            tracing::debug!(
                duplicates = outcome.duplicates,
                "Dropped queries returned on more than one page"
            );
        }

        outcome.records.sort_by(|a, b| {
            (a.start_time_ms.is_none(), a.start_time_ms, &a.query_id).cmp(&(
                b.start_time_ms.is_none(),
                b.start_time_ms,
                &b.query_id,
            ))
        });

        tracing::info!(
            records = outcome.records.len(),
            pages = outcome.pages,
            groups = group_count,
            "Query history fetched"
        );
        Ok(outcome)
    }

    async fn fetch_group(&self, warehouse_ids: Vec<String>) -> Result<GroupResult, ChargebackError> {
        let FetchOptions {
            page_size,
            max_pages,
            ..
        } = self.options;

        let mut records = Vec::new();
        let mut pages = 0u32;
        let mut request = ListQueriesRequest::first_page(warehouse_ids, page_size);

        loop {
            if pages >= max_pages {
                tracing::error!(max_pages, "API still reports more pages; giving up");
                return Err(ChargebackError::PaginationLimitExceeded { max_pages });
            }

            let page = self.fetch_page(&request).await?;
            pages += 1;
            tracing::debug!(
                page = pages,
                records = page.res.len(),
                has_next_page = page.has_next_page,
                "Fetched history page"
            );

            for raw in page.res {
                records.push(normalize(raw)?);
            }

            if !page.has_next_page {
                break;
            }

            let token = page
                .next_page_token
                .filter(|t| !t.is_empty())
                .ok_or_else(|| {
                    ChargebackError::Schema(
                        "has_next_page is true but next_page_token is missing".to_string(),
                    )
                })?;
            request = ListQueriesRequest::next_page(token, page_size);
        }

        Ok(GroupResult { records, pages })
    }

    async fn fetch_page(
        &self,
        request: &ListQueriesRequest,
    ) -> Result<QueryHistoryPage, ChargebackError> {
        retry_with_backoff_async(
            self.options.retry,
            |e: &ApiError| e.is_retryable(),
            || self.source.list_queries(request),
        )
        .await
        .map_err(|(e, attempts)| {
            tracing::warn!(error = %e, attempts, "History page request failed");
            ChargebackError::from(e)
        })
    }
}

/// Reject empty or blank ids and drop duplicates, keeping first-seen order
pub fn validate_warehouse_ids(ids: &[String]) -> Result<Vec<String>, ChargebackError> {
    if ids.is_empty() {
        return Err(ChargebackError::InvalidInput(
            "at least one warehouse id is required".to_string(),
        ));
    }

    let mut seen = HashSet::new();
    let mut out = Vec::with_capacity(ids.len());
    for id in ids {
        let id = id.trim();
        if id.is_empty() {
            return Err(ChargebackError::InvalidInput(
                "warehouse ids must not be blank".to_string(),
            ));
        }
        if seen.insert(id.to_string()) {
            out.push(id.to_string());
        }
    }
    Ok(out)
}

fn split_groups(ids: Vec<String>, group_size: usize) -> Vec<Vec<String>> {
    if group_size == 0 || ids.len() <= group_size {
        return vec![ids];
    }
    ids.chunks(group_size).map(|c| c.to_vec()).collect()
}


#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;

    const T0: i64 = 1_700_000_000_000;

    fn ids(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn fetcher(source: Arc<ScriptedSource>, options: FetchOptions) -> HistoryFetcher {
        HistoryFetcher::new(source, options)
    }

    #[tokio::test]
    async fn test_follows_pagination_until_last_page() {
        let source = Arc::new(
            ScriptedSource::new()
                .on_first_page(
                    &["wh1"],
                    page(
                        vec![raw("q1", 1, "alice", Some(T0)), raw("q2", 2, "bob", Some(T0))],
                        Some("T1"),
                    ),
                )
                .on_token("T1", page(vec![raw("q3", 1, "alice", Some(T0 + 60_000))], None)),
        );

        let outcome = fetcher(source.clone(), fast_options())
            .fetch(&ids(&["wh1"]))
            .await
            .unwrap();

        let ids: Vec<_> = outcome.records.iter().map(|r| r.query_id.as_str()).collect();
        assert_eq!(ids, vec!["q1", "q2", "q3"]);
        assert_eq!(outcome.pages, 2);
        assert_eq!(source.request_count(), 2);
    }

    #[tokio::test]
    async fn test_duplicate_query_ids_across_pages_kept_once() {
        let source = Arc::new(
            ScriptedSource::new()
                .on_first_page(&["wh1"], page(vec![raw("q1", 1, "alice", Some(T0))], Some("T1")))
                .on_token(
                    "T1",
                    page(
                        vec![raw("q1", 1, "alice", Some(T0)), raw("q2", 2, "bob", Some(T0))],
                        None,
                    ),
                ),
        );

        let outcome = fetcher(source, fast_options())
            .fetch(&ids(&["wh1"]))
            .await
            .unwrap();

        assert_eq!(outcome.records.len(), 2);
        assert_eq!(outcome.duplicates, 1);
    }

    #[tokio::test]
    async fn test_empty_ids_rejected_without_request() {
        let source = Arc::new(ScriptedSource::new());
        let err = fetcher(source.clone(), fast_options())
            .fetch(&[])
            .await
            .unwrap_err();
        assert!(matches!(err, ChargebackError::InvalidInput(_)));
        assert_eq!(source.request_count(), 0);
    }

    #[tokio::test]
    async fn test_unauthorized_aborts_without_retry() {
        let source =
            Arc::new(ScriptedSource::new().on_first_page(&["wh1"], Scripted::Status(401, "expired")));

        let err = fetcher(source.clone(), fast_options())
            .fetch(&ids(&["wh1"]))
            .await
            .unwrap_err();

        assert!(matches!(err, ChargebackError::Auth { status: 401, .. }));
        assert_eq!(source.request_count(), 1);
    }

    #[tokio::test]
    async fn test_client_error_not_retried() {
        let source =
            Arc::new(ScriptedSource::new().on_first_page(&["wh1"], Scripted::Status(400, "bad filter")));

        let err = fetcher(source.clone(), fast_options())
            .fetch(&ids(&["wh1"]))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            ChargebackError::Fetch {
                status_code: 400,
                ..
            }
        ));
        assert_eq!(source.request_count(), 1);
    }

    #[tokio::test]
    async fn test_server_error_retried_then_succeeds() {
        let source = Arc::new(
            ScriptedSource::new()
                .on_first_page(&["wh1"], Scripted::Status(503, "busy"))
                .on_first_page(&["wh1"], page(vec![raw("q1", 1, "alice", Some(T0))], None)),
        );

        let outcome = fetcher(source.clone(), fast_options())
            .fetch(&ids(&["wh1"]))
            .await
            .unwrap();

        assert_eq!(outcome.records.len(), 1);
        assert_eq!(source.request_count(), 2);
    }

    #[tokio::test]
    async fn test_server_error_gives_up_after_max_attempts() {
        let source =
            Arc::new(ScriptedSource::new().on_first_page(&["wh1"], Scripted::Status(500, "down")));

        let err = fetcher(source.clone(), fast_options())
            .fetch(&ids(&["wh1"]))
            .await
            .unwrap_err();

        assert_eq!(err.status_code(), Some(500));
        assert_eq!(source.request_count(), 3);
    }

    #[tokio::test]
    async fn test_page_limit_exceeded() {
        // The token page points at itself forever
        let source = Arc::new(
            ScriptedSource::new()
                .on_first_page(&["wh1"], page(vec![raw("q1", 1, "alice", Some(T0))], Some("T1")))
                .on_token("T1", page(vec![], Some("T1"))),
        );
        let options = FetchOptions {
            max_pages: 5,
            ..fast_options()
        };

        let err = fetcher(source.clone(), options)
            .fetch(&ids(&["wh1"]))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            ChargebackError::PaginationLimitExceeded { max_pages: 5 }
        ));
        assert_eq!(source.request_count(), 5);
    }

    #[tokio::test]
    async fn test_page_limit_applies_per_group() {
        let source = Arc::new(
            ScriptedSource::new()
                .on_first_page(&["wh1"], page(vec![raw("a", 1, "alice", Some(T0))], Some("A1")))
                .on_token("A1", page(vec![raw("b", 2, "bob", Some(T0))], None))
                .on_first_page(&["wh2"], page(vec![raw("c", 3, "carol", Some(T0))], Some("B1")))
                .on_token("B1", page(vec![raw("d", 4, "dave", Some(T0))], None)),
        );
        let options = FetchOptions {
            max_pages: 2,
            group_size: 1,
            ..fast_options()
        };

        let outcome = fetcher(source.clone(), options)
            .fetch(&ids(&["wh1", "wh2"]))
            .await
            .unwrap();

        assert_eq!(outcome.pages, 4);
        assert_eq!(outcome.records.len(), 4);
    }

    #[tokio::test]
    async fn test_missing_next_token_is_schema_error() {
        let source = Arc::new(ScriptedSource::new().on_first_page(
            &["wh1"],
            Scripted::Page(QueryHistoryPage {
                res: vec![raw("q1", 1, "alice", Some(T0))],
                has_next_page: true,
                next_page_token: None,
            }),
        ));

        let err = fetcher(source, fast_options())
            .fetch(&ids(&["wh1"]))
            .await
            .unwrap_err();
        assert!(matches!(err, ChargebackError::Schema(_)));
    }

    #[tokio::test]
    async fn test_groups_fetched_concurrently_with_deterministic_order() {
        let source = Arc::new(
            ScriptedSource::new()
                .on_first_page(&["wh1"], page(vec![raw("b", 2, "bob", Some(T0))], None))
                .on_first_page(
                    &["wh2"],
                    page(
                        vec![raw("a", 1, "alice", Some(T0)), raw("c", 3, "carol", None)],
                        None,
                    ),
                )
                .on_first_page(&["wh3"], page(vec![raw("d", 4, "dave", Some(T0 - 1))], None)),
        );
        let options = FetchOptions {
            group_size: 1,
            concurrency: 3,
            ..fast_options()
        };

        let outcome = fetcher(source.clone(), options)
            .fetch(&ids(&["wh1", "wh2", "wh3"]))
            .await
            .unwrap();

        let order: Vec<_> = outcome.records.iter().map(|r| r.query_id.as_str()).collect();
        assert_eq!(order, vec!["d", "a", "b", "c"]);
        assert_eq!(outcome.pages, 3);
        assert_eq!(source.request_count(), 3);
    }

    #[test]
    fn test_validate_warehouse_ids() {
        assert_eq!(
            validate_warehouse_ids(&ids(&[" wh1", "wh2", "wh1"])).unwrap(),
            vec!["wh1", "wh2"]
        );
        assert!(validate_warehouse_ids(&ids(&["wh1", " "])).is_err());
        assert!(validate_warehouse_ids(&[]).is_err());
    }

    #[test]
    fn test_split_groups() {
        let all = ids(&["a", "b", "c"]);
        assert_eq!(split_groups(all.clone(), 0), vec![all.clone()]);
        assert_eq!(split_groups(all.clone(), 5), vec![all.clone()]);
        assert_eq!(
            split_groups(all, 2),
            vec![ids(&["a", "b"]), ids(&["c"])]
        );
    }
}
