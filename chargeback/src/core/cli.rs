use clap::{Parser, Subcommand};

use std::path::PathBuf;

use super::constants::{
    ENV_CONFIG, ENV_DUPLICATES, ENV_EVENTS, ENV_FETCH_CONCURRENCY, ENV_FORMAT, ENV_JOIN, ENV_LOG_JSON,
    ENV_MAX_PAGES, ENV_OUTPUT_DIR, ENV_PAGE_SIZE, ENV_ROSTER, ENV_TARGET_COLUMN, ENV_TIMEOUT_SECS,
    ENV_TIMEZONE, ENV_TOKEN, ENV_TOKEN_FILE, ENV_WAREHOUSES, ENV_WORKSPACE_URL,
};
use crate::data::ReportFormat;
use crate::domain::{DuplicateRosterPolicy, JoinPolicy};

#[derive(Parser)]
#[command(name = "chargeback")]
#[command(
    version,
    about = "Per-user warehouse usage and cost-center chargeback report",
    long_about = None
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Path to config file
    #[arg(long, short = 'c', global = true, env = ENV_CONFIG)]
    pub config: Option<PathBuf>,

    /// Workspace base URL
    #[arg(long, global = true, env = ENV_WORKSPACE_URL)]
    pub workspace_url: Option<String>,

    /// API bearer token
    #[arg(long, global = true, env = ENV_TOKEN, hide_env_values = true)]
    pub token: Option<String>,

    /// File containing the API bearer token
    #[arg(long, global = true, env = ENV_TOKEN_FILE)]
    pub token_file: Option<String>,

    /// Warehouse id to report on (repeat or comma-separate)
    #[arg(
        long = "warehouse",
        short = 'w',
        global = true,
        env = ENV_WAREHOUSES,
        value_delimiter = ','
    )]
    pub warehouses: Vec<String>,

    // Fetch options
    /// Records requested per history page
    #[arg(long, global = true, env = ENV_PAGE_SIZE)]
    pub page_size: Option<u32>,

    /// Maximum pages fetched per warehouse group before giving up
    #[arg(long, global = true, env = ENV_MAX_PAGES)]
    pub max_pages: Option<u32>,

    /// Per-request HTTP timeout in seconds
    #[arg(long, global = true, env = ENV_TIMEOUT_SECS)]
    pub timeout_secs: Option<u64>,

    /// Warehouse groups fetched in parallel
    #[arg(long, global = true, env = ENV_FETCH_CONCURRENCY)]
    pub concurrency: Option<usize>,

    // Report options
    /// IANA timezone used for concurrency buckets (default UTC)
    #[arg(long, global = true, env = ENV_TIMEZONE)]
    pub timezone: Option<String>,

    /// Directory receiving the report tables
    #[arg(long, short = 'o', global = true, env = ENV_OUTPUT_DIR)]
    pub output_dir: Option<String>,

    /// Report file format (csv or json)
    #[arg(long, global = true, env = ENV_FORMAT, value_parser = parse_report_format)]
    pub format: Option<ReportFormat>,

    // Attribution options
    /// Roster CSV mapping user_name to a cost center
    #[arg(long, global = true, env = ENV_ROSTER)]
    pub roster: Option<String>,

    /// Roster column holding the attribution target
    #[arg(long, global = true, env = ENV_TARGET_COLUMN)]
    pub target_column: Option<String>,

    /// Join policy for users missing from the roster (inner or left)
    #[arg(long, global = true, env = ENV_JOIN, value_parser = parse_join_policy)]
    pub join: Option<JoinPolicy>,

    /// Policy for users listed with several targets (reject or first-match)
    #[arg(long, global = true, env = ENV_DUPLICATES, value_parser = parse_duplicate_policy)]
    pub duplicates: Option<DuplicateRosterPolicy>,

    /// Warehouse-events export (CSV, or JSON array when the file ends in .json)
    #[arg(long, global = true, env = ENV_EVENTS)]
    pub events: Option<String>,

    /// Emit logs as JSON lines
    #[arg(long, global = true, env = ENV_LOG_JSON)]
    pub log_json: bool,
}

/// Parse report format from CLI/env string
fn parse_report_format(s: &str) -> Result<ReportFormat, String> {
    match s.to_lowercase().as_str() {
        "csv" => Ok(ReportFormat::Csv),
        "json" => Ok(ReportFormat::Json),
        _ => Err(format!(
            "Invalid report format '{}'. Valid options: csv, json",
            s
        )),
    }
}

/// Parse join policy from CLI/env string
fn parse_join_policy(s: &str) -> Result<JoinPolicy, String> {
    match s.to_lowercase().as_str() {
        "inner" => Ok(JoinPolicy::Inner),
        "left" => Ok(JoinPolicy::Left),
        _ => Err(format!(
            "Invalid join policy '{}'. Valid options: inner, left",
            s
        )),
    }
}

/// Parse duplicate roster policy from CLI/env string
fn parse_duplicate_policy(s: &str) -> Result<DuplicateRosterPolicy, String> {
    match s.to_lowercase().as_str() {
        "reject" => Ok(DuplicateRosterPolicy::Reject),
        "first-match" | "first" => Ok(DuplicateRosterPolicy::FirstMatch),
        _ => Err(format!(
            "Invalid duplicates policy '{}'. Valid options: reject, first-match",
            s
        )),
    }
}

#[derive(Subcommand, Clone, Debug)]
pub enum Commands {
    /// Fetch history and write the chargeback report (default command)
    Run,
    /// Print warehouse descriptors as JSON
    Warehouse {
        /// Warehouse ids (defaults to the configured warehouses)
        ids: Vec<String>,
    },
}

/// Configuration derived from CLI arguments
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    pub config: Option<PathBuf>,
    pub workspace_url: Option<String>,
    pub token: Option<String>,
    pub token_file: Option<String>,
    pub warehouses: Vec<String>,
    pub page_size: Option<u32>,
    pub max_pages: Option<u32>,
    pub timeout_secs: Option<u64>,
    pub concurrency: Option<usize>,
    pub timezone: Option<String>,
    pub output_dir: Option<String>,
    pub format: Option<ReportFormat>,
    pub roster: Option<String>,
    pub target_column: Option<String>,
    pub join: Option<JoinPolicy>,
    pub duplicates: Option<DuplicateRosterPolicy>,
    pub events: Option<String>,
    pub log_json: bool,
}

impl From<Cli> for CliConfig {
    fn from(cli: Cli) -> Self {
        Self {
            config: cli.config,
            workspace_url: cli.workspace_url,
            token: cli.token,
            token_file: cli.token_file,
            warehouses: cli.warehouses,
            page_size: cli.page_size,
            max_pages: cli.max_pages,
            timeout_secs: cli.timeout_secs,
            concurrency: cli.concurrency,
            timezone: cli.timezone,
            output_dir: cli.output_dir,
            format: cli.format,
            roster: cli.roster,
            target_column: cli.target_column,
            join: cli.join,
            duplicates: cli.duplicates,
            events: cli.events,
            log_json: cli.log_json,
        }
    }
}

/// Parse CLI arguments and return config with command
pub fn parse() -> (CliConfig, Option<Commands>) {
    let mut cli = Cli::parse();
    let command = cli.command.take();
    (cli.into(), command)
}
