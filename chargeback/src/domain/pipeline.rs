//! Fetch, aggregate and attribute in one run

use chrono::{DateTime, Utc};
use chrono_tz::Tz;

use super::attribution::{
    AttributedRecord, AttributionJoiner, AttributionSummary, RosterEntry, summarize,
};
use super::billable::{BillableQuery, billable_queries};
use super::concurrency::{ConcurrencyAggregator, ConcurrencyBucket};
use super::error::ChargebackError;
use super::events::{EventBucket, WarehouseEvent, bucket_events};
use super::history::{HistoryFetcher, QueryRecord};

/// Counters collected while building a report
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunStats {
    pub pages: u32,
    pub duplicates_dropped: usize,
    pub unknown_start: usize,
    pub duration_mismatches: usize,
    pub events_other_warehouses: usize,
}

#[derive(Debug, Clone)]
pub struct AttributionTables {
    pub records: Vec<AttributedRecord>,
    pub summary: Vec<AttributionSummary>,
}

/// Every table produced by one run
#[derive(Debug, Clone)]
pub struct ChargebackReport {
    pub generated_at: DateTime<Utc>,
    pub timezone: Tz,
    pub warehouse_ids: Vec<String>,
    pub queries: Vec<QueryRecord>,
    pub billable: Vec<BillableQuery>,
    pub concurrency: Vec<ConcurrencyBucket>,
    /// Present only when a roster was supplied
    pub attribution: Option<AttributionTables>,
    /// Present only when a warehouse-events export was supplied
    pub warehouse_events: Option<Vec<EventBucket>>,
    pub stats: RunStats,
}

impl ChargebackReport {
    /// The API returned no queries at all
    pub fn is_empty(&self) -> bool {
        self.queries.is_empty()
    }
}

pub struct ChargebackPipeline {
    fetcher: HistoryFetcher,
    aggregator: ConcurrencyAggregator,
    joiner: Option<AttributionJoiner>,
}

impl ChargebackPipeline {
    pub fn new(
        fetcher: HistoryFetcher,
        aggregator: ConcurrencyAggregator,
        joiner: Option<AttributionJoiner>,
    ) -> Self {
        Self {
            fetcher,
            aggregator,
            joiner,
        }
    }

    /// Run every stage; any failure aborts without a partial report
    pub async fn run(
        &self,
        warehouse_ids: &[String],
        roster: Option<&[RosterEntry]>,
        events: Option<&[WarehouseEvent]>,
    ) -> Result<ChargebackReport, ChargebackError> {
        let joiner = match (roster, self.joiner) {
            (Some(_), None) => {
                return Err(ChargebackError::InvalidInput(
                    "a join policy (inner or left) is required when a roster is supplied"
                        .to_string(),
                ));
            }
            (_, joiner) => joiner,
        };

        let fetched = self.fetcher.fetch(warehouse_ids).await?;
        let queries = fetched.records;

        let duration_mismatches = queries.iter().filter(|q| !q.duration_consistent()).count();
        if duration_mismatches > 0 {
            tracing::warn!(
                count = duration_mismatches,
                "Queries whose duration disagrees with their start and end times"
            );
        }

        let billable = billable_queries(&queries);
        let concurrency = self.aggregator.aggregate(&queries);

        let attribution = match (roster, joiner) {
            (Some(roster), Some(joiner)) => {
                let records = joiner.join(queries.clone(), roster)?;
                let summary = summarize(&records)?;
                Some(AttributionTables { records, summary })
            }
            _ => None,
        };

        let event_report = events
            .map(|events| bucket_events(events, warehouse_ids, self.aggregator.timezone()));

        let stats = RunStats {
            pages: fetched.pages,
            duplicates_dropped: fetched.duplicates,
            unknown_start: concurrency.skipped_unknown_start,
            duration_mismatches,
            events_other_warehouses: event_report
                .as_ref()
                .map_or(0, |r| r.skipped_other_warehouses),
        };

        tracing::info!(
            queries = queries.len(),
            billable = billable.len(),
            buckets = concurrency.buckets.len(),
            attributed = attribution.as_ref().map(|a| a.records.len()),
            event_buckets = event_report.as_ref().map(|r| r.buckets.len()),
            "Chargeback report built"
        );

        Ok(ChargebackReport {
            generated_at: Utc::now(),
            timezone: self.aggregator.timezone(),
            warehouse_ids: warehouse_ids.to_vec(),
            queries,
            billable,
            concurrency: concurrency.buckets,
            attribution,
            warehouse_events: event_report.map(|r| r.buckets),
            stats,
        })
    }
}
