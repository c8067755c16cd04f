use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use chrono_tz::Tz;
use serde::Deserialize;

use crate::data::ReportFormat;
use crate::data::roster::DEFAULT_TARGET_COLUMN;
use crate::domain::history::fetcher::{DEFAULT_MAX_PAGES, DEFAULT_PAGE_SIZE};
use crate::domain::{DuplicateRosterPolicy, FetchOptions, JoinPolicy};
use crate::utils::file::{expand_path, read_trimmed};
use crate::utils::retry::{DEFAULT_BASE_DELAY_MS, DEFAULT_MAX_ATTEMPTS, RetryPolicy};
use crate::utils::string::parse_list;
use crate::utils::time::parse_timezone;

use super::cli::CliConfig;
use super::constants::{
    APP_DOT_FOLDER, CONFIG_FILE_NAME, DEFAULT_OUTPUT_DIR, DEFAULT_TIMEOUT_SECS, DEFAULT_TIMEZONE,
    MAX_FETCH_CONCURRENCY, MAX_PAGE_SIZE,
};
use super::secret::Secret;

// =============================================================================
// File Config Sections
// =============================================================================

/// Workspace connection section
#[derive(Debug, Default, Clone, Deserialize)]
pub struct WorkspaceFileConfig {
    pub url: Option<String>,
    pub token_file: Option<String>,
    pub timeout_secs: Option<u64>,
}

/// History fetch section
#[derive(Debug, Default, Clone, Deserialize)]
pub struct FetchFileConfig {
    pub page_size: Option<u32>,
    pub max_pages: Option<u32>,
    pub max_attempts: Option<u32>,
    pub base_delay_ms: Option<u64>,
    pub group_size: Option<usize>,
    pub concurrency: Option<usize>,
}

/// Report output section
#[derive(Debug, Default, Clone, Deserialize)]
pub struct ReportFileConfig {
    pub timezone: Option<String>,
    pub output_dir: Option<String>,
    pub format: Option<ReportFormat>,
}

/// Roster attribution section
#[derive(Debug, Default, Clone, Deserialize)]
pub struct AttributionFileConfig {
    pub roster: Option<String>,
    pub target_column: Option<String>,
    pub join: Option<JoinPolicy>,
    pub duplicates: Option<DuplicateRosterPolicy>,
}

/// Warehouse-events export section
#[derive(Debug, Default, Clone, Deserialize)]
pub struct EventsFileConfig {
    pub path: Option<String>,
}

/// File-based configuration (JSON)
#[derive(Debug, Default, Deserialize)]
pub struct FileConfig {
    pub workspace: Option<WorkspaceFileConfig>,
    pub warehouses: Option<Vec<String>>,
    pub fetch: Option<FetchFileConfig>,
    pub report: Option<ReportFileConfig>,
    pub attribution: Option<AttributionFileConfig>,
    pub events: Option<EventsFileConfig>,
    #[serde(flatten)]
    pub extra: serde_json::Value,
}

impl FileConfig {
    /// Load configuration from a JSON file
    fn load_from_file(path: &Path) -> Result<Self> {
        tracing::debug!(path = %path.display(), "Loading config file");
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        tracing::trace!(config = ?config, "Parsed config file");
        Ok(config)
    }

    /// Warn about unknown fields in the config
    fn warn_unknown_fields(&self) {
        if let serde_json::Value::Object(map) = &self.extra
            && !map.is_empty()
        {
            let keys_str: String = map
                .keys()
                .map(|k| k.as_str())
                .collect::<Vec<_>>()
                .join(", ");
            tracing::warn!(
                fields = %keys_str,
                "Unknown fields in config file (possible typos)"
            );
        }
    }

    /// Merge another FileConfig into this one (other takes precedence)
    fn merge(&mut self, other: FileConfig) {
        // Workspace
        if let Some(workspace) = other.workspace {
            let current = self
                .workspace
                .get_or_insert_with(WorkspaceFileConfig::default);
            if workspace.url.is_some() {
                tracing::trace!(url = ?workspace.url, "Merging workspace.url");
                current.url = workspace.url;
            }
            if workspace.token_file.is_some() {
                tracing::trace!(token_file = "***", "Merging workspace.token_file");
                current.token_file = workspace.token_file;
            }
            if workspace.timeout_secs.is_some() {
                tracing::trace!(timeout_secs = ?workspace.timeout_secs, "Merging workspace.timeout_secs");
                current.timeout_secs = workspace.timeout_secs;
            }
        }

        // Warehouses replace, never append
        if other.warehouses.is_some() {
            tracing::trace!(warehouses = ?other.warehouses, "Merging warehouses");
            self.warehouses = other.warehouses;
        }

        // Fetch
        if let Some(fetch) = other.fetch {
            let current = self.fetch.get_or_insert_with(FetchFileConfig::default);
            if fetch.page_size.is_some() {
                tracing::trace!(page_size = ?fetch.page_size, "Merging fetch.page_size");
                current.page_size = fetch.page_size;
            }
            if fetch.max_pages.is_some() {
                tracing::trace!(max_pages = ?fetch.max_pages, "Merging fetch.max_pages");
                current.max_pages = fetch.max_pages;
            }
            if fetch.max_attempts.is_some() {
                tracing::trace!(max_attempts = ?fetch.max_attempts, "Merging fetch.max_attempts");
                current.max_attempts = fetch.max_attempts;
            }
            if fetch.base_delay_ms.is_some() {
                tracing::trace!(base_delay_ms = ?fetch.base_delay_ms, "Merging fetch.base_delay_ms");
                current.base_delay_ms = fetch.base_delay_ms;
            }
            if fetch.group_size.is_some() {
                tracing::trace!(group_size = ?fetch.group_size, "Merging fetch.group_size");
                current.group_size = fetch.group_size;
            }
            if fetch.concurrency.is_some() {
                tracing::trace!(concurrency = ?fetch.concurrency, "Merging fetch.concurrency");
                current.concurrency = fetch.concurrency;
            }
        }

        // Report
        if let Some(report) = other.report {
            let current = self.report.get_or_insert_with(ReportFileConfig::default);
            if report.timezone.is_some() {
                tracing::trace!(timezone = ?report.timezone, "Merging report.timezone");
                current.timezone = report.timezone;
            }
            if report.output_dir.is_some() {
                tracing::trace!(output_dir = ?report.output_dir, "Merging report.output_dir");
                current.output_dir = report.output_dir;
            }
            if report.format.is_some() {
                tracing::trace!(format = ?report.format, "Merging report.format");
                current.format = report.format;
            }
        }

        // Attribution
        if let Some(attribution) = other.attribution {
            let current = self
                .attribution
                .get_or_insert_with(AttributionFileConfig::default);
            if attribution.roster.is_some() {
                tracing::trace!(roster = ?attribution.roster, "Merging attribution.roster");
                current.roster = attribution.roster;
            }
            if attribution.target_column.is_some() {
                tracing::trace!(target_column = ?attribution.target_column, "Merging attribution.target_column");
                current.target_column = attribution.target_column;
            }
            if attribution.join.is_some() {
                tracing::trace!(join = ?attribution.join, "Merging attribution.join");
                current.join = attribution.join;
            }
            if attribution.duplicates.is_some() {
                tracing::trace!(duplicates = ?attribution.duplicates, "Merging attribution.duplicates");
                current.duplicates = attribution.duplicates;
            }
        }

        // Events
        if let Some(events) = other.events
            && events.path.is_some()
        {
            tracing::trace!(path = ?events.path, "Merging events.path");
            self.events = Some(events);
        }
    }
}

// =============================================================================
// Resolved Config
// =============================================================================

/// Workspace API connection
#[derive(Debug, Clone)]
pub struct WorkspaceConfig {
    pub url: String,
    pub token: Secret,
    pub timeout: Duration,
}

/// Report output settings
#[derive(Debug, Clone)]
pub struct ReportConfig {
    pub timezone: Tz,
    pub output_dir: PathBuf,
    pub format: ReportFormat,
}

/// Roster attribution settings (present only when a roster is configured)
#[derive(Debug, Clone)]
pub struct AttributionConfig {
    pub roster: PathBuf,
    pub target_column: String,
    /// No default: must be chosen explicitly
    pub join: Option<JoinPolicy>,
    pub duplicates: DuplicateRosterPolicy,
}

/// Final merged application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub workspace: WorkspaceConfig,
    pub warehouses: Vec<String>,
    pub fetch: FetchOptions,
    pub report: ReportConfig,
    pub attribution: Option<AttributionConfig>,
    /// Warehouse-events export (CSV or JSON), bucketed next to concurrency
    pub events: Option<PathBuf>,
}

impl AppConfig {
    /// Load configuration from all sources
    ///
    /// Priority (lowest to highest):
    /// 1. Defaults
    /// 2. Profile directory config (~/.chargeback/chargeback.json)
    /// 3. Local directory config OR CLI-specified config path
    /// 4. CLI arguments (which include env var fallbacks via clap)
    pub fn load(cli: &CliConfig) -> Result<Self> {
        tracing::debug!("Loading application configuration");
        tracing::trace!(cli = ?cli, "CLI config");

        let mut file_config = FileConfig::default();
        let mut found_configs: Vec<String> = Vec::new();

        // 1. Load from profile dir (~/.chargeback/chargeback.json) - skip if not exists
        if let Some(profile_path) = get_profile_config_path()
            && profile_path.exists()
        {
            let profile_config = FileConfig::load_from_file(&profile_path)?;
            profile_config.warn_unknown_fields();
            file_config.merge(profile_config);
            found_configs.push(profile_path.display().to_string());
        }

        // 2. Load from CLI-specified path OR local directory
        let overlay_path = if let Some(ref path) = cli.config {
            let expanded = expand_path(&path.to_string_lossy());
            if !expanded.exists() {
                anyhow::bail!("Config file not found: {}", expanded.display());
            }
            Some(expanded)
        } else {
            let local = PathBuf::from(CONFIG_FILE_NAME);
            if local.exists() { Some(local) } else { None }
        };

        if let Some(path) = overlay_path {
            let overlay_config = FileConfig::load_from_file(&path)?;
            overlay_config.warn_unknown_fields();
            file_config.merge(overlay_config);
            found_configs.push(path.display().to_string());
        }

        tracing::debug!(configs = ?found_configs, "Config files loaded");

        Self::from_sources(cli, file_config)
    }

    /// Layer CLI/env values over merged file config and defaults
    fn from_sources(cli: &CliConfig, file_config: FileConfig) -> Result<Self> {
        let file_workspace = file_config.workspace.unwrap_or_default();
        let file_fetch = file_config.fetch.unwrap_or_default();
        let file_report = file_config.report.unwrap_or_default();
        let file_attribution = file_config.attribution.unwrap_or_default();

        // workspace: CLI/env overrides file config
        let url = cli
            .workspace_url
            .clone()
            .or(file_workspace.url)
            .unwrap_or_default();

        // token: explicit value wins over token file
        let token = match cli.token.clone() {
            Some(token) => Secret::new(token.trim()),
            None => match cli.token_file.clone().or(file_workspace.token_file) {
                Some(path) => {
                    let path = expand_path(&path);
                    let token = read_trimmed(&path).with_context(|| {
                        format!("Failed to read token file: {}", path.display())
                    })?;
                    Secret::new(token)
                }
                None => Secret::new(""),
            },
        };

        let timeout_secs = cli
            .timeout_secs
            .or(file_workspace.timeout_secs)
            .unwrap_or(DEFAULT_TIMEOUT_SECS);

        let warehouses = if !cli.warehouses.is_empty() {
            cli.warehouses.clone()
        } else {
            file_config.warehouses.unwrap_or_default()
        };
        let warehouses: Vec<String> = warehouses.iter().flat_map(|w| parse_list(w)).collect();

        // fetch
        let fetch = FetchOptions {
            page_size: cli
                .page_size
                .or(file_fetch.page_size)
                .unwrap_or(DEFAULT_PAGE_SIZE),
            max_pages: cli
                .max_pages
                .or(file_fetch.max_pages)
                .unwrap_or(DEFAULT_MAX_PAGES),
            retry: RetryPolicy {
                max_attempts: file_fetch.max_attempts.unwrap_or(DEFAULT_MAX_ATTEMPTS),
                base_delay_ms: file_fetch.base_delay_ms.unwrap_or(DEFAULT_BASE_DELAY_MS),
            },
            group_size: file_fetch.group_size.unwrap_or(0),
            concurrency: cli
                .concurrency
                .or(file_fetch.concurrency)
                .unwrap_or(1),
        };

        // report
        let timezone_name = cli
            .timezone
            .clone()
            .or(file_report.timezone)
            .unwrap_or_else(|| DEFAULT_TIMEZONE.to_string());
        let timezone = parse_timezone(&timezone_name)
            .map_err(|e| anyhow::anyhow!("Configuration error: report.timezone: {}", e))?;
        let output_dir = expand_path(
            &cli.output_dir
                .clone()
                .or(file_report.output_dir)
                .unwrap_or_else(|| DEFAULT_OUTPUT_DIR.to_string()),
        );
        let format = cli.format.or(file_report.format).unwrap_or_default();

        // attribution: only when a roster is configured
        let attribution = cli
            .roster
            .clone()
            .or(file_attribution.roster)
            .map(|roster| AttributionConfig {
                roster: expand_path(&roster),
                target_column: cli
                    .target_column
                    .clone()
                    .or(file_attribution.target_column)
                    .unwrap_or_else(|| DEFAULT_TARGET_COLUMN.to_string()),
                join: cli.join.or(file_attribution.join),
                duplicates: cli
                    .duplicates
                    .or(file_attribution.duplicates)
                    .unwrap_or_default(),
            });

        let events = cli
            .events
            .clone()
            .or(file_config.events.and_then(|e| e.path))
            .map(|path| expand_path(&path));

        let config = Self {
            workspace: WorkspaceConfig {
                url,
                token,
                timeout: Duration::from_secs(timeout_secs),
            },
            warehouses,
            fetch,
            report: ReportConfig {
                timezone,
                output_dir,
                format,
            },
            attribution,
            events,
        };

        config.validate()?;
        tracing::debug!(
            workspace = %config.workspace.url,
            warehouses = ?config.warehouses,
            timezone = %config.report.timezone,
            format = %config.report.format,
            roster = config.attribution.is_some(),
            events = config.events.is_some(),
            "Configuration loaded"
        );
        Ok(config)
    }

    /// Validate the configuration for consistency and correctness
    fn validate(&self) -> Result<()> {
        if self.workspace.url.trim().is_empty() {
            anyhow::bail!(
                "Configuration error: workspace.url is required \
                 (set --workspace-url, CHARGEBACK_WORKSPACE_URL or workspace.url)"
            );
        }

        if self.workspace.token.is_empty() {
            anyhow::bail!(
                "Configuration error: an API token is required \
                 (set --token, CHARGEBACK_TOKEN or workspace.token_file)"
            );
        }

        if self.workspace.timeout.is_zero() {
            anyhow::bail!("Configuration error: workspace.timeout_secs must be greater than 0");
        }

        if self.fetch.page_size == 0 || self.fetch.page_size > MAX_PAGE_SIZE {
            anyhow::bail!(
                "Configuration error: fetch.page_size must be between 1 and {}",
                MAX_PAGE_SIZE
            );
        }

        if self.fetch.max_pages == 0 {
            anyhow::bail!("Configuration error: fetch.max_pages must be greater than 0");
        }

        if self.fetch.retry.max_attempts == 0 {
            anyhow::bail!("Configuration error: fetch.max_attempts must be greater than 0");
        }

        if self.fetch.concurrency == 0 || self.fetch.concurrency > MAX_FETCH_CONCURRENCY {
            anyhow::bail!(
                "Configuration error: fetch.concurrency must be between 1 and {}",
                MAX_FETCH_CONCURRENCY
            );
        }

        if let Some(attribution) = &self.attribution {
            if attribution.join.is_none() {
                anyhow::bail!(
                    "Configuration error: attribution.join is required when a roster is set \
                     (inner drops unmatched users, left keeps them unattributed)"
                );
            }
            if attribution.target_column.trim().is_empty() {
                anyhow::bail!("Configuration error: attribution.target_column must not be empty");
            }
        }

        Ok(())
    }
}

/// Get the profile config path (~/.chargeback/chargeback.json)
fn get_profile_config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(APP_DOT_FOLDER).join(CONFIG_FILE_NAME))
}
