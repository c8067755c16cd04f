//! Core application

use std::sync::Arc;

use anyhow::{Context, Result};
use warehouse_sdk::{WarehouseClient, WarehouseInfo};

use crate::core::cli::{self, CliConfig, Commands};
use crate::core::config::AppConfig;
use crate::core::constants::{APP_NAME_LOWER, ENV_LOG};
use crate::core::summary;
use crate::data::{ReportWriter, WrittenReport, load_roster, load_warehouse_events};
use crate::domain::history::fetcher::validate_warehouse_ids;
use crate::domain::{
    AttributionJoiner, ChargebackError, ChargebackPipeline, ChargebackReport,
    ConcurrencyAggregator, HistoryFetcher,
};
use crate::utils::retry::retry_with_backoff_async;
use crate::utils::string::parse_list;

pub struct CoreApp {
    pub config: AppConfig,
    pub client: Arc<WarehouseClient>,
}

impl CoreApp {
    /// Run the application with CLI argument parsing
    pub async fn run() -> Result<()> {
        dotenvy::dotenv().ok();

        let (cli_config, command) = cli::parse();
        Self::init_logging(cli_config.log_json);

        tracing::debug!("Application starting");
        tracing::trace!(command = ?command, "Parsed command");

        let app = Self::init(&cli_config)?;
        match command {
            Some(Commands::Warehouse { ids }) => {
                let ids = if ids.is_empty() {
                    app.config.warehouses.clone()
                } else {
                    ids.iter().flat_map(|id| parse_list(id)).collect()
                };
                let infos = app.describe_warehouses(&ids).await?;
                println!("{}", serde_json::to_string_pretty(&infos)?);
                Ok(())
            }
            Some(Commands::Run) | None => {
                let (report, written) = app.generate_report().await?;
                summary::print_summary(&report, &written);
                Ok(())
            }
        }
    }

    pub fn init(cli: &CliConfig) -> Result<Self> {
        let config = AppConfig::load(cli)?;
        let workspace = &config.workspace;
        let client = WarehouseClient::new(&workspace.url, workspace.token.expose(), workspace.timeout)
            .context("Failed to create warehouse API client")?;

        tracing::debug!(base_url = %client.base_url(), "Warehouse API client ready");
        Ok(Self {
            config,
            client: Arc::new(client),
        })
    }

    fn init_logging(json: bool) {
        let default_filter = format!("info,{}=info", APP_NAME_LOWER);

        let filter = std::env::var(ENV_LOG)
            .or_else(|_| std::env::var("RUST_LOG"))
            .unwrap_or(default_filter);

        // stdout carries command output; logs go to stderr
        let builder = tracing_subscriber::fmt()
            .with_target(false)
            .with_thread_ids(false)
            .with_level(true)
            .with_writer(std::io::stderr)
            .with_env_filter(filter);

        if json {
            builder.json().init();
        } else {
            builder.with_ansi(true).compact().init();
        }
    }

    /// Fetch, aggregate, attribute and write the report.
    ///
    /// Roster and warehouse-events files are read before any API call.
    /// Nothing is written when any stage fails.
    pub async fn generate_report(&self) -> Result<(ChargebackReport, WrittenReport)> {
        let roster = match &self.config.attribution {
            Some(attribution) => Some(
                load_roster(&attribution.roster, &attribution.target_column)
                    .context("Failed to load roster")?,
            ),
            None => None,
        };
        let events = match &self.config.events {
            Some(path) => Some(
                load_warehouse_events(path).context("Failed to load warehouse events")?,
            ),
            None => None,
        };

        let report = self
            .pipeline()
            .run(&self.config.warehouses, roster.as_deref(), events.as_deref())
            .await
            .context("Failed to build chargeback report")?;

        let writer = ReportWriter::new(&self.config.report.output_dir, self.config.report.format);
        let written = writer.write(&report).with_context(|| {
            format!(
                "Failed to write report to {}",
                writer.output_dir().display()
            )
        })?;

        Ok((report, written))
    }

    fn pipeline(&self) -> ChargebackPipeline {
        let fetcher = HistoryFetcher::new(self.client.clone(), self.config.fetch);
        let aggregator = ConcurrencyAggregator::new(self.config.report.timezone);
        let joiner = self.config.attribution.as_ref().and_then(|attribution| {
            attribution
                .join
                .map(|join| AttributionJoiner::new(join, attribution.duplicates))
        });
        ChargebackPipeline::new(fetcher, aggregator, joiner)
    }

    /// Fetch descriptors for `ids`, in order
    pub async fn describe_warehouses(
        &self,
        ids: &[String],
    ) -> Result<Vec<WarehouseInfo>, ChargebackError> {
        let ids = validate_warehouse_ids(ids)?;
        let mut infos = Vec::with_capacity(ids.len());
        for id in &ids {
            let info = retry_with_backoff_async(
                self.config.fetch.retry,
                |e: &warehouse_sdk::ApiError| e.is_retryable(),
                || self.client.get_warehouse(id),
            )
            .await
            .map_err(|(e, attempts)| {
                tracing::warn!(warehouse_id = %id, error = %e, attempts, "Warehouse lookup failed");
                ChargebackError::from(e)
            })?;
            tracing::debug!(warehouse_id = %id, name = ?info.name, "Warehouse described");
            infos.push(info);
        }
        Ok(infos)
    }
}
