//! Warehouse-events export loader (CSV or JSON array)

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use crate::domain::WarehouseEvent;
use crate::utils::time::{millis_to_datetime, parse_timestamp};

pub const WAREHOUSE_ID_COLUMN: &str = "warehouse_id";
pub const EVENT_TIME_COLUMN: &str = "event_time";
pub const EVENT_TYPE_COLUMN: &str = "event_type";
pub const CLUSTER_COUNT_COLUMN: &str = "cluster_count";

#[derive(Error, Debug)]
pub enum EventsError {
    #[error("Failed to open warehouse events {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to read warehouse events {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("Failed to parse warehouse events {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Warehouse events {path} have no '{column}' column")]
    MissingColumn { path: PathBuf, column: &'static str },

    #[error("Warehouse events {path} row {row}: empty {field}")]
    MissingField {
        path: PathBuf,
        row: u64,
        field: &'static str,
    },

    #[error("Warehouse events {path} row {row}: invalid {field} '{value}'")]
    InvalidValue {
        path: PathBuf,
        row: u64,
        field: &'static str,
        value: String,
    },
}

/// One event as read from the file, before validation
#[derive(Debug, Deserialize)]
struct RawEvent {
    #[serde(default)]
    warehouse_id: Option<String>,
    #[serde(default)]
    event_type: Option<String>,
    #[serde(default)]
    cluster_count: Option<serde_json::Value>,
    #[serde(default)]
    event_time: Option<serde_json::Value>,
}

/// Load a warehouse-events export.
///
/// Files ending in `.json` hold a JSON array of objects; anything else is
/// read as CSV with a header row. `warehouse_id` and `event_time` are
/// required; `event_type` and `cluster_count` are optional. Other fields are
/// ignored.
pub fn load_warehouse_events(path: &Path) -> Result<Vec<WarehouseEvent>, EventsError> {
    let file = File::open(path).map_err(|source| EventsError::Open {
        path: path.to_path_buf(),
        source,
    })?;
    let is_json = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));

    let raw = if is_json {
        read_json(BufReader::new(file), path)?
    } else {
        read_csv(file, path)?
    };

    let events = raw
        .into_iter()
        .map(|(row, raw)| to_event(raw, row, path))
        .collect::<Result<Vec<_>, _>>()?;

    tracing::debug!(events = events.len(), path = %path.display(), "Warehouse events loaded");
    Ok(events)
}

fn read_json<R: Read>(input: R, path: &Path) -> Result<Vec<(u64, RawEvent)>, EventsError> {
    let rows: Vec<RawEvent> = serde_json::from_reader(input).map_err(|source| EventsError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    Ok((1..).zip(rows).collect())
}

fn read_csv<R: Read>(input: R, path: &Path) -> Result<Vec<(u64, RawEvent)>, EventsError> {
    let csv_err = |source| EventsError::Csv {
        path: path.to_path_buf(),
        source,
    };

    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(input);

    let headers = reader.headers().map_err(csv_err)?.clone();
    let position = |name: &str| headers.iter().position(|h| h == name);
    let required = |name: &'static str| {
        position(name).ok_or_else(|| EventsError::MissingColumn {
            path: path.to_path_buf(),
            column: name,
        })
    };
    let id_idx = required(WAREHOUSE_ID_COLUMN)?;
    let time_idx = required(EVENT_TIME_COLUMN)?;
    let type_idx = position(EVENT_TYPE_COLUMN);
    let clusters_idx = position(CLUSTER_COUNT_COLUMN);

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(csv_err)?;
        let line = record.position().map(|p| p.line()).unwrap_or_default();
        let field = |idx: Option<usize>| {
            idx.and_then(|i| record.get(i))
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        };
        rows.push((
            line,
            RawEvent {
                warehouse_id: field(Some(id_idx)),
                event_type: field(type_idx),
                cluster_count: field(clusters_idx).map(serde_json::Value::String),
                event_time: field(Some(time_idx)).map(serde_json::Value::String),
            },
        ));
    }
    Ok(rows)
}

fn to_event(raw: RawEvent, row: u64, path: &Path) -> Result<WarehouseEvent, EventsError> {
    let invalid = |field: &'static str, value: &serde_json::Value| EventsError::InvalidValue {
        path: path.to_path_buf(),
        row,
        field,
        value: match value {
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        },
    };
    let missing = |field: &'static str| EventsError::MissingField {
        path: path.to_path_buf(),
        row,
        field,
    };

    let warehouse_id = raw
        .warehouse_id
        .map(|id| id.trim().to_string())
        .filter(|id| !id.is_empty())
        .ok_or_else(|| missing(WAREHOUSE_ID_COLUMN))?;

    let time_value = raw.event_time.ok_or_else(|| missing(EVENT_TIME_COLUMN))?;
    let event_time = match &time_value {
        serde_json::Value::String(s) => parse_timestamp(s),
        serde_json::Value::Number(n) => n.as_i64().and_then(millis_to_datetime),
        _ => None,
    }
    .ok_or_else(|| invalid(EVENT_TIME_COLUMN, &time_value))?;

    let cluster_count = match raw.cluster_count {
        None | Some(serde_json::Value::Null) => None,
        Some(value) => {
            let parsed = match &value {
                serde_json::Value::String(s) => s.trim().parse::<i64>().ok(),
                serde_json::Value::Number(n) => n.as_i64(),
                _ => None,
            };
            Some(parsed.ok_or_else(|| invalid(CLUSTER_COUNT_COLUMN, &value))?)
        }
    };

    let event_type = raw
        .event_type
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty());

    Ok(WarehouseEvent {
        warehouse_id,
        event_type,
        cluster_count,
        event_time,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const T0: i64 = 1_700_000_000_000;

    fn parse_csv(csv: &str) -> Result<Vec<WarehouseEvent>, EventsError> {
        let path = Path::new("events.csv");
        read_csv(csv.as_bytes(), path)?
            .into_iter()
            .map(|(row, raw)| to_event(raw, row, path))
            .collect()
    }

    fn parse_json(json: &str) -> Result<Vec<WarehouseEvent>, EventsError> {
        let path = Path::new("events.json");
        read_json(json.as_bytes(), path)?
            .into_iter()
            .map(|(row, raw)| to_event(raw, row, path))
            .collect()
    }

    #[test]
    fn test_csv_export_with_extra_columns() {
        let events = parse_csv(
            "account_id,warehouse_id,event_type,cluster_count,event_time\n\
             acc,wh1,SCALED_UP,2,2023-11-14 22:13:20\n\
             acc, wh2 ,,,2023-11-14T22:13:20Z\n",
        )
        .unwrap();

        assert_eq!(events.len(), 2);
        assert_eq!(events[0].warehouse_id, "wh1");
        assert_eq!(events[0].event_type.as_deref(), Some("SCALED_UP"));
        assert_eq!(events[0].cluster_count, Some(2));
        assert_eq!(events[0].event_time.timestamp_millis(), T0);
        assert_eq!(events[1].warehouse_id, "wh2");
        assert_eq!(events[1].event_type, None);
        assert_eq!(events[1].cluster_count, None);
    }

    #[test]
    fn test_csv_missing_required_column() {
        let err = parse_csv("warehouse_id,event_type\nwh1,RUNNING\n").unwrap_err();
        assert!(matches!(err, EventsError::MissingColumn { column: "event_time", .. }));
    }

    #[test]
    fn test_csv_blank_time_rejected_with_line() {
        let err = parse_csv("warehouse_id,event_time\nwh1,1700000000000\nwh1,\n").unwrap_err();
        assert!(matches!(
            err,
            EventsError::MissingField { row: 3, field: "event_time", .. }
        ));
    }

    #[test]
    fn test_csv_bad_cluster_count() {
        let err = parse_csv("warehouse_id,event_time,cluster_count\nwh1,1700000000000,many\n")
            .unwrap_err();
        assert!(matches!(
            err,
            EventsError::InvalidValue { field: "cluster_count", ref value, .. } if value == "many"
        ));
    }

    #[test]
    fn test_json_array_with_numeric_time() {
        let events = parse_json(
            r#"[
                {"warehouse_id": "wh1", "event_type": "RUNNING", "cluster_count": 1, "event_time": 1700000000000},
                {"warehouse_id": "wh1", "event_time": "2023-11-14T22:14:20Z", "workspace_id": 42}
            ]"#,
        )
        .unwrap();

        assert_eq!(events.len(), 2);
        assert_eq!(events[0].event_time.timestamp_millis(), T0);
        assert_eq!(events[0].cluster_count, Some(1));
        assert_eq!(events[1].event_time.timestamp_millis(), T0 + 60_000);
    }

    #[test]
    fn test_json_unparseable_time() {
        let err = parse_json(r#"[{"warehouse_id": "wh1", "event_time": "soon"}]"#).unwrap_err();
        assert!(matches!(
            err,
            EventsError::InvalidValue { row: 1, field: "event_time", .. }
        ));
    }

    #[test]
    fn test_json_missing_warehouse_id() {
        let err = parse_json(r#"[{"event_time": 1700000000000}]"#).unwrap_err();
        assert!(matches!(
            err,
            EventsError::MissingField { field: "warehouse_id", .. }
        ));
    }

    #[test]
    fn test_load_picks_format_from_extension() {
        let dir = tempfile::tempdir().unwrap();

        let json = dir.path().join("events.json");
        std::fs::write(&json, r#"[{"warehouse_id": "wh1", "event_time": 1700000000000}]"#)
            .unwrap();
        assert_eq!(load_warehouse_events(&json).unwrap().len(), 1);

        let csv = dir.path().join("events.csv");
        let mut file = File::create(&csv).unwrap();
        writeln!(file, "warehouse_id,event_time").unwrap();
        writeln!(file, "wh1,1700000000000").unwrap();
        writeln!(file, "wh2,1700000060000").unwrap();
        drop(file);
        assert_eq!(load_warehouse_events(&csv).unwrap().len(), 2);
    }

    #[test]
    fn test_missing_file() {
        let err = load_warehouse_events(Path::new("/nonexistent/events.csv")).unwrap_err();
        assert!(matches!(err, EventsError::Open { .. }));
    }
}
