//! Warehouse lifecycle events bucketed per minute

use std::collections::{BTreeMap, BTreeSet, HashSet};

use chrono::{DateTime, NaiveDate, Timelike, Utc};
use chrono_tz::Tz;
use serde::Serialize;

/// One row of a warehouse-events export (start, stop, scale up/down)
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WarehouseEvent {
    pub warehouse_id: String,
    pub event_type: Option<String>,
    pub cluster_count: Option<i64>,
    pub event_time: DateTime<Utc>,
}

/// Events of one warehouse within one minute
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EventBucket {
    pub start_date: NaiveDate,
    pub start_hour: u32,
    pub start_minute: u32,
    pub warehouse_id: String,
    pub event_count: usize,
    /// Distinct event types, sorted
    pub event_types: Vec<String>,
    pub max_cluster_count: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventReport {
    /// Ascending by `(start_date, start_hour, start_minute, warehouse_id)`
    pub buckets: Vec<EventBucket>,
    /// Events for warehouses outside the requested set
    pub skipped_other_warehouses: usize,
}

type EventKey = (NaiveDate, u32, u32, String);

#[derive(Default)]
struct EventAcc {
    events: usize,
    types: BTreeSet<String>,
    max_clusters: Option<i64>,
}

/// Bucket `events` of the requested warehouses by local minute in `timezone`.
///
/// Requested warehouses without any event are logged as a cross-check
/// against the query history.
pub fn bucket_events(
    events: &[WarehouseEvent],
    warehouse_ids: &[String],
    timezone: Tz,
) -> EventReport {
    let requested: HashSet<&str> = warehouse_ids.iter().map(|id| id.trim()).collect();
    let mut seen: HashSet<&str> = HashSet::new();
    let mut minutes: BTreeMap<EventKey, EventAcc> = BTreeMap::new();
    let mut skipped = 0usize;

    for event in events {
        if !requested.contains(event.warehouse_id.as_str()) {
            skipped += 1;
            continue;
        }
        seen.insert(event.warehouse_id.as_str());

        let local = event.event_time.with_timezone(&timezone);
        let acc = minutes
            .entry((
                local.date_naive(),
                local.hour(),
                local.minute(),
                event.warehouse_id.clone(),
            ))
            .or_default();
        acc.events += 1;
        if let Some(event_type) = &event.event_type {
            acc.types.insert(event_type.clone());
        }
        acc.max_clusters = acc.max_clusters.max(event.cluster_count);
    }

    if skipped > 0 {
        tracing::debug!(skipped, "Events for other warehouses ignored");
    }
    for id in warehouse_ids {
        if !seen.contains(id.trim()) {
            tracing::warn!(warehouse_id = %id, "No warehouse events for requested warehouse");
        }
    }

    let buckets = minutes
        .into_iter()
        .map(|((start_date, start_hour, start_minute, warehouse_id), acc)| EventBucket {
            start_date,
            start_hour,
            start_minute,
            warehouse_id,
            event_count: acc.events,
            event_types: acc.types.into_iter().collect(),
            max_cluster_count: acc.max_clusters,
        })
        .collect();

    EventReport {
        buckets,
        skipped_other_warehouses: skipped,
    }
}
