//! Report writer: one CSV or JSON file per table

use std::fmt;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::{
    AttributedRecord, AttributionSummary, BillableQuery, ChargebackReport, ConcurrencyBucket,
    EventBucket, QueryRecord,
};
use crate::utils::time::millis_to_iso;

pub const TABLE_QUERIES: &str = "queries";
pub const TABLE_BILLABLE: &str = "billable_queries";
pub const TABLE_CONCURRENCY: &str = "concurrency";
pub const TABLE_ATTRIBUTION: &str = "attribution";
pub const TABLE_ATTRIBUTION_SUMMARY: &str = "attribution_summary";
pub const TABLE_WAREHOUSE_EVENTS: &str = "warehouse_events";

/// Every table a run may write; files of these tables left by earlier runs
/// are removed when a new report is published
const ALL_TABLES: &[&str] = &[
    TABLE_QUERIES,
    TABLE_BILLABLE,
    TABLE_CONCURRENCY,
    TABLE_ATTRIBUTION,
    TABLE_ATTRIBUTION_SUMMARY,
    TABLE_WAREHOUSE_EVENTS,
];

/// Output file format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportFormat {
    #[default]
    Csv,
    Json,
}

impl ReportFormat {
    pub const ALL: [ReportFormat; 2] = [ReportFormat::Csv, ReportFormat::Json];

    pub fn extension(&self) -> &'static str {
        match self {
            ReportFormat::Csv => "csv",
            ReportFormat::Json => "json",
        }
    }
}

impl fmt::Display for ReportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

#[derive(Error, Debug)]
pub enum ReportError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error writing {table}: {source}")]
    Csv {
        table: &'static str,
        #[source]
        source: csv::Error,
    },

    #[error("JSON error writing {table}: {source}")]
    Json {
        table: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

impl ReportError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

// =============================================================================
// Flattened rows, shared by both formats
// =============================================================================

/// Row type with a fixed header, written even when the table is empty
trait TableRow: Serialize {
    const HEADERS: &'static [&'static str];
}

#[derive(Serialize)]
struct QueryRow<'a> {
    query_id: &'a str,
    user_id: i64,
    user_name: &'a str,
    status: &'a str,
    start_time: Option<String>,
    start_time_ms: Option<i64>,
    end_time_ms: Option<i64>,
    duration_ms: Option<i64>,
    warehouse_id: Option<&'a str>,
    query_text: &'a str,
}

impl<'a> From<&'a QueryRecord> for QueryRow<'a> {
    fn from(r: &'a QueryRecord) -> Self {
        Self {
            query_id: &r.query_id,
            user_id: r.user_id,
            user_name: &r.user_name,
            status: r.status.as_str(),
            start_time: millis_to_iso(r.start_time_ms),
            start_time_ms: r.start_time_ms,
            end_time_ms: r.end_time_ms,
            duration_ms: r.duration_ms,
            warehouse_id: r.warehouse_id.as_deref(),
            query_text: &r.query_text,
        }
    }
}

impl TableRow for QueryRow<'_> {
    const HEADERS: &'static [&'static str] = &[
        "query_id",
        "user_id",
        "user_name",
        "status",
        "start_time",
        "start_time_ms",
        "end_time_ms",
        "duration_ms",
        "warehouse_id",
        "query_text",
    ];
}

#[derive(Serialize)]
struct BillableRow<'a> {
    query_id: &'a str,
    user_name: &'a str,
    status: &'a str,
    seconds: f64,
    start_time_ms: Option<i64>,
    end_time_ms: Option<i64>,
}

impl<'a> From<&'a BillableQuery> for BillableRow<'a> {
    fn from(b: &'a BillableQuery) -> Self {
        Self {
            query_id: &b.query_id,
            user_name: &b.user_name,
            status: b.status.as_str(),
            seconds: b.seconds,
            start_time_ms: b.start_time_ms,
            end_time_ms: b.end_time_ms,
        }
    }
}

impl TableRow for BillableRow<'_> {
    const HEADERS: &'static [&'static str] = &[
        "query_id",
        "user_name",
        "status",
        "seconds",
        "start_time_ms",
        "end_time_ms",
    ];
}

#[derive(Serialize)]
struct ConcurrencyRow {
    start_date: String,
    start_hour: u32,
    start_minute: u32,
    distinct_user_count: usize,
    query_count: usize,
}

impl From<&ConcurrencyBucket> for ConcurrencyRow {
    fn from(b: &ConcurrencyBucket) -> Self {
        Self {
            start_date: b.start_date.format("%Y-%m-%d").to_string(),
            start_hour: b.start_hour,
            start_minute: b.start_minute,
            distinct_user_count: b.distinct_user_count,
            query_count: b.query_count,
        }
    }
}

impl TableRow for ConcurrencyRow {
    const HEADERS: &'static [&'static str] = &[
        "start_date",
        "start_hour",
        "start_minute",
        "distinct_user_count",
        "query_count",
    ];
}

#[derive(Serialize)]
struct AttributionRow<'a> {
    query_id: &'a str,
    user_id: i64,
    user_name: &'a str,
    status: &'a str,
    start_time_ms: Option<i64>,
    duration_ms: Option<i64>,
    warehouse_id: Option<&'a str>,
    attribution: Option<&'a str>,
}

impl<'a> From<&'a AttributedRecord> for AttributionRow<'a> {
    fn from(a: &'a AttributedRecord) -> Self {
        let r = &a.record;
        Self {
            query_id: &r.query_id,
            user_id: r.user_id,
            user_name: &r.user_name,
            status: r.status.as_str(),
            start_time_ms: r.start_time_ms,
            duration_ms: r.duration_ms,
            warehouse_id: r.warehouse_id.as_deref(),
            attribution: a.attribution.as_deref(),
        }
    }
}

impl TableRow for AttributionRow<'_> {
    const HEADERS: &'static [&'static str] = &[
        "query_id",
        "user_id",
        "user_name",
        "status",
        "start_time_ms",
        "duration_ms",
        "warehouse_id",
        "attribution",
    ];
}

#[derive(Serialize)]
struct SummaryRow<'a> {
    target: Option<&'a str>,
    query_count: usize,
    distinct_users: usize,
    total_duration_ms: i64,
    unknown_duration_count: usize,
}

impl<'a> From<&'a AttributionSummary> for SummaryRow<'a> {
    fn from(s: &'a AttributionSummary) -> Self {
        Self {
            target: s.target.as_deref(),
            query_count: s.query_count,
            distinct_users: s.distinct_users,
            total_duration_ms: s.total_duration_ms,
            unknown_duration_count: s.unknown_duration_count,
        }
    }
}

impl TableRow for SummaryRow<'_> {
    const HEADERS: &'static [&'static str] = &[
        "target",
        "query_count",
        "distinct_users",
        "total_duration_ms",
        "unknown_duration_count",
    ];
}

#[derive(Serialize)]
struct EventRow<'a> {
    start_date: String,
    start_hour: u32,
    start_minute: u32,
    warehouse_id: &'a str,
    event_count: usize,
    /// `;`-separated
    event_types: String,
    max_cluster_count: Option<i64>,
}

impl<'a> From<&'a EventBucket> for EventRow<'a> {
    fn from(b: &'a EventBucket) -> Self {
        Self {
            start_date: b.start_date.format("%Y-%m-%d").to_string(),
            start_hour: b.start_hour,
            start_minute: b.start_minute,
            warehouse_id: &b.warehouse_id,
            event_count: b.event_count,
            event_types: b.event_types.join(";"),
            max_cluster_count: b.max_cluster_count,
        }
    }
}

impl TableRow for EventRow<'_> {
    const HEADERS: &'static [&'static str] = &[
        "start_date",
        "start_hour",
        "start_minute",
        "warehouse_id",
        "event_count",
        "event_types",
        "max_cluster_count",
    ];
}

// =============================================================================
// Writer
// =============================================================================

/// Files written by one report run, in table order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WrittenReport {
    pub files: Vec<PathBuf>,
}

pub struct ReportWriter {
    output_dir: PathBuf,
    format: ReportFormat,
}

impl ReportWriter {
    pub fn new(output_dir: impl Into<PathBuf>, format: ReportFormat) -> Self {
        Self {
            output_dir: output_dir.into(),
            format,
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Write every table into a staging directory, then move them into place.
    ///
    /// Nothing appears in the output directory unless all tables were
    /// written successfully. Table files from earlier runs that this run does
    /// not produce (another format, no roster) are removed, so the directory
    /// always holds a single report.
    pub fn write(&self, report: &ChargebackReport) -> Result<WrittenReport, ReportError> {
        fs::create_dir_all(&self.output_dir).map_err(|e| ReportError::io(&self.output_dir, e))?;

        let staging = self.output_dir.join(format!(
            ".staging-{}-{}",
            std::process::id(),
            report.generated_at.timestamp_millis()
        ));
        fs::create_dir_all(&staging).map_err(|e| ReportError::io(&staging, e))?;

        let result = self
            .write_tables(&staging, report)
            .and_then(|staged| self.publish(&staging, staged));
        let written = match result {
            Ok(written) => written,
            Err(e) => {
                if let Err(cleanup) = fs::remove_dir_all(&staging) {
                    tracing::warn!(
                        path = %staging.display(),
                        error = %cleanup,
                        "Failed to remove staging directory"
                    );
                }
                return Err(e);
            }
        };

        tracing::info!(
            files = written.files.len(),
            dir = %self.output_dir.display(),
            format = %self.format,
            "Report written"
        );
        Ok(written)
    }

    /// Drop stale tables, move staged files into the output directory and
    /// remove the then empty staging directory
    fn publish(&self, staging: &Path, staged: Vec<String>) -> Result<WrittenReport, ReportError> {
        for table in ALL_TABLES {
            for format in ReportFormat::ALL {
                let file_name = format!("{}.{}", table, format.extension());
                if staged.contains(&file_name) {
                    continue;
                }
                let stale = self.output_dir.join(&file_name);
                if stale.is_file() {
                    fs::remove_file(&stale).map_err(|e| ReportError::io(&stale, e))?;
                    tracing::debug!(path = %stale.display(), "Removed table from earlier report");
                }
            }
        }

        let mut written = WrittenReport::default();
        for file_name in staged {
            let from = staging.join(&file_name);
            let to = self.output_dir.join(&file_name);
            fs::rename(&from, &to).map_err(|e| ReportError::io(&to, e))?;
            written.files.push(to);
        }
        fs::remove_dir(staging).map_err(|e| ReportError::io(staging, e))?;
        Ok(written)
    }

    fn write_tables(
        &self,
        dir: &Path,
        report: &ChargebackReport,
    ) -> Result<Vec<String>, ReportError> {
        let mut files = vec![
            self.write_table(dir, TABLE_QUERIES, &report.queries, QueryRow::from)?,
            self.write_table(dir, TABLE_BILLABLE, &report.billable, BillableRow::from)?,
            self.write_table(
                dir,
                TABLE_CONCURRENCY,
                &report.concurrency,
                ConcurrencyRow::from,
            )?,
        ];

        if let Some(attribution) = &report.attribution {
            files.push(self.write_table(
                dir,
                TABLE_ATTRIBUTION,
                &attribution.records,
                AttributionRow::from,
            )?);
            files.push(self.write_table(
                dir,
                TABLE_ATTRIBUTION_SUMMARY,
                &attribution.summary,
                SummaryRow::from,
            )?);
        }

        if let Some(events) = &report.warehouse_events {
            files.push(self.write_table(dir, TABLE_WAREHOUSE_EVENTS, events, EventRow::from)?);
        }
        Ok(files)
    }

    fn write_table<'a, T, R>(
        &self,
        dir: &Path,
        table: &'static str,
        items: &'a [T],
        to_row: fn(&'a T) -> R,
    ) -> Result<String, ReportError>
    where
        R: TableRow,
    {
        let file_name = format!("{}.{}", table, self.format.extension());
        let path = dir.join(&file_name);
        let file = File::create(&path).map_err(|e| ReportError::io(&path, e))?;

        match self.format {
            ReportFormat::Csv => {
                let mut wtr = csv::WriterBuilder::new()
                    .has_headers(false)
                    .from_writer(BufWriter::new(file));
                wtr.write_record(R::HEADERS)
                    .map_err(|source| ReportError::Csv { table, source })?;
                for item in items {
                    wtr.serialize(to_row(item))
                        .map_err(|source| ReportError::Csv { table, source })?;
                }
                wtr.flush().map_err(|e| ReportError::io(&path, e))?;
            }
            ReportFormat::Json => {
                let rows: Vec<R> = items.iter().map(to_row).collect();
                let mut out = BufWriter::new(file);
                serde_json::to_writer_pretty(&mut out, &rows)
                    .map_err(|source| ReportError::Json { table, source })?;
                out.write_all(b"\n")
                    .and_then(|_| out.flush())
                    .map_err(|e| ReportError::io(&path, e))?;
            }
        }

        tracing::debug!(table, rows = items.len(), "Table written");
        Ok(file_name)
    }
}
