//! Query history: wire normalization and paginated fetching

pub mod fetcher;
pub mod normalize;
pub mod types;

pub use fetcher::{FetchOptions, FetchOutcome, HistoryFetcher, QueryHistorySource};
pub use normalize::normalize;
pub use types::{QueryRecord, QueryStatus};
