//! Chargeback domain: history, concurrency and attribution

pub mod attribution;
pub mod billable;
pub mod concurrency;
pub mod error;
pub mod events;
pub mod history;
pub mod pipeline;

pub use attribution::{
    AttributedRecord, AttributionJoiner, AttributionSummary, DuplicateRosterPolicy, JoinPolicy,
    RosterEntry,
};
pub use billable::BillableQuery;
pub use concurrency::{ConcurrencyAggregator, ConcurrencyBucket};
pub use error::ChargebackError;
pub use events::{EventBucket, WarehouseEvent};
pub use history::{FetchOptions, HistoryFetcher, QueryHistorySource, QueryRecord, QueryStatus};
pub use pipeline::{ChargebackPipeline, ChargebackReport, RunStats};
