//! Core application infrastructure

pub mod cli;
pub mod config;
pub mod constants;
pub mod secret;
pub(crate) mod summary;

pub use crate::app::CoreApp;
pub use cli::{CliConfig, Commands};
pub use config::{AppConfig, AttributionConfig, ReportConfig, WorkspaceConfig};
pub use secret::Secret;
