//! File inputs and outputs: roster CSV, warehouse events and report tables

pub mod events;
pub mod report;
pub mod roster;

pub use events::{EventsError, load_warehouse_events};
pub use report::{ReportError, ReportFormat, ReportWriter, WrittenReport};
pub use roster::{RosterError, load_roster};
