// =============================================================================
// Application Identity
// =============================================================================

/// Application name in title case (for display)
pub const APP_NAME: &str = "Chargeback";

/// Application name in lowercase (for paths and identifiers)
pub const APP_NAME_LOWER: &str = "chargeback";

/// Unix-style dotfile folder name
pub const APP_DOT_FOLDER: &str = ".chargeback";

// =============================================================================
// Configuration Files
// =============================================================================

/// Config file name
pub const CONFIG_FILE_NAME: &str = "chargeback.json";

/// Environment variable for config file path
pub const ENV_CONFIG: &str = "CHARGEBACK_CONFIG";

/// Environment variable for log level/filter
pub const ENV_LOG: &str = "CHARGEBACK_LOG";

/// Environment variable to switch log output to JSON lines
pub const ENV_LOG_JSON: &str = "CHARGEBACK_LOG_JSON";

// =============================================================================
// Environment Variables - Workspace
// =============================================================================

/// Workspace base URL (e.g. https://example.cloud.databricks.com)
pub const ENV_WORKSPACE_URL: &str = "CHARGEBACK_WORKSPACE_URL";

/// Bearer token for the workspace API
pub const ENV_TOKEN: &str = "CHARGEBACK_TOKEN";

/// File holding the bearer token
pub const ENV_TOKEN_FILE: &str = "CHARGEBACK_TOKEN_FILE";

/// Comma-separated warehouse ids
pub const ENV_WAREHOUSES: &str = "CHARGEBACK_WAREHOUSES";

// =============================================================================
// Environment Variables - Fetch
// =============================================================================

pub const ENV_PAGE_SIZE: &str = "CHARGEBACK_PAGE_SIZE";
pub const ENV_MAX_PAGES: &str = "CHARGEBACK_MAX_PAGES";
pub const ENV_TIMEOUT_SECS: &str = "CHARGEBACK_TIMEOUT_SECS";
pub const ENV_FETCH_CONCURRENCY: &str = "CHARGEBACK_FETCH_CONCURRENCY";

// =============================================================================
// Environment Variables - Report
// =============================================================================

pub const ENV_TIMEZONE: &str = "CHARGEBACK_TIMEZONE";
pub const ENV_OUTPUT_DIR: &str = "CHARGEBACK_OUTPUT_DIR";
pub const ENV_FORMAT: &str = "CHARGEBACK_FORMAT";
pub const ENV_EVENTS: &str = "CHARGEBACK_EVENTS";

// =============================================================================
// Environment Variables - Attribution
// =============================================================================

pub const ENV_ROSTER: &str = "CHARGEBACK_ROSTER";
pub const ENV_TARGET_COLUMN: &str = "CHARGEBACK_TARGET_COLUMN";
pub const ENV_JOIN: &str = "CHARGEBACK_JOIN";
pub const ENV_DUPLICATES: &str = "CHARGEBACK_DUPLICATES";

// =============================================================================
// Defaults
// =============================================================================

/// Per-request HTTP timeout
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Upper bound accepted for `fetch.page_size`
pub const MAX_PAGE_SIZE: u32 = 1000;

/// Upper bound accepted for `fetch.concurrency`
pub const MAX_FETCH_CONCURRENCY: usize = 16;

/// Reporting timezone
pub const DEFAULT_TIMEZONE: &str = "UTC";

/// Report output directory
pub const DEFAULT_OUTPUT_DIR: &str = "./chargeback-report";
