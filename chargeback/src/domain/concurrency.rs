//! Per-minute distinct-user concurrency

use std::collections::{BTreeMap, HashSet};

use chrono::{NaiveDate, Timelike};
use chrono_tz::Tz;
use serde::Serialize;

use super::history::QueryRecord;
use crate::utils::time::millis_to_local;

/// One-minute window with the users whose queries started in it
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConcurrencyBucket {
    pub start_date: NaiveDate,
    pub start_hour: u32,
    pub start_minute: u32,
    pub distinct_user_count: usize,
    pub query_count: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConcurrencyReport {
    /// Ascending by `(start_date, start_hour, start_minute)`, unique keys
    pub buckets: Vec<ConcurrencyBucket>,
    /// Records without a usable start time
    pub skipped_unknown_start: usize,
}

type MinuteKey = (NaiveDate, u32, u32);

#[derive(Default)]
struct MinuteAcc {
    users: HashSet<i64>,
    queries: usize,
}

#[derive(Debug, Clone, Copy)]
pub struct ConcurrencyAggregator {
    timezone: Tz,
}

impl Default for ConcurrencyAggregator {
    fn default() -> Self {
        Self { timezone: Tz::UTC }
    }
}

impl ConcurrencyAggregator {
    pub fn new(timezone: Tz) -> Self {
        Self { timezone }
    }

    pub fn timezone(&self) -> Tz {
        self.timezone
    }

    pub fn aggregate(&self, records: &[QueryRecord]) -> ConcurrencyReport {
        let mut minutes: BTreeMap<MinuteKey, MinuteAcc> = BTreeMap::new();
        let mut skipped = 0usize;

        for record in records {
            let Some(local) = record
                .start_time_ms
                .and_then(|ms| millis_to_local(ms, self.timezone))
            else {
                skipped += 1;
                continue;
            };

            let acc = minutes
                .entry((local.date_naive(), local.hour(), local.minute()))
                .or_default();
            acc.users.insert(record.user_id);
            acc.queries += 1;
        }

        if skipped > 0 {
            tracing::warn!(
                skipped,
                "Queries without a usable start time left out of concurrency buckets"
            );
        }

        let buckets: Vec<_> = minutes
            .into_iter()
            .map(|((start_date, start_hour, start_minute), acc)| ConcurrencyBucket {
                start_date,
                start_hour,
                start_minute,
                distinct_user_count: acc.users.len(),
                query_count: acc.queries,
            })
            .collect();

        tracing::debug!(
            buckets = buckets.len(),
            timezone = %self.timezone,
            "Concurrency aggregated"
        );

        ConcurrencyReport {
            buckets,
            skipped_unknown_start: skipped,
        }
    }
}
