//! Warehouse chargeback report.
//!
//! Pulls query history for a set of SQL warehouses, counts distinct users per
//! minute, and attributes usage to cost centers from an HR roster.

pub mod app;
pub mod core;
pub mod data;
pub mod domain;
pub mod utils;
