//! # warehouse-sdk
//!
//! Typed client for the SQL warehouse REST APIs used by chargeback reporting:
//!
//! - `GET /api/2.0/sql/history/queries`: one page of query-execution history
//! - `GET /api/2.0/sql/warehouses/{id}`: warehouse descriptor
//!
//! The client performs single requests only. Pagination, retry and
//! normalization belong to the caller, which keeps this crate easy to stub.
//!
//! ```no_run
//! # async fn demo() -> Result<(), warehouse_sdk::ApiError> {
//! use std::time::Duration;
//! use warehouse_sdk::{ListQueriesRequest, WarehouseClient};
//!
//! let client = WarehouseClient::new(
//!     "https://example.cloud.databricks.com",
//!     "dapi-token",
//!     Duration::from_secs(30),
//! )?;
//! let page = client
//!     .list_queries(&ListQueriesRequest::first_page(vec!["5badc23414".into()], 100))
//!     .await?;
//! println!("{} queries, more: {}", page.res.len(), page.has_next_page);
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod error;
pub mod types;

pub use client::WarehouseClient;
pub use error::ApiError;
pub use types::{ListQueriesRequest, QueryFilter, QueryHistoryPage, QueryInfo, WarehouseInfo};
