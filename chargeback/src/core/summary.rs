//! Terminal summary printed after a run

use super::constants::APP_NAME;
use crate::data::WrittenReport;
use crate::domain::ChargebackReport;

// Label width for alignment
const W: usize = 14;

/// Print the run summary with the files written
pub fn print_summary(report: &ChargebackReport, written: &WrittenReport) {
    println!();
    println!(
        "  \x1b[1m\x1b[36m{}\x1b[0m \x1b[90mv{}\x1b[0m",
        APP_NAME,
        env!("CARGO_PKG_VERSION")
    );
    println!();

    println!(
        "  \x1b[32m➜\x1b[0m  \x1b[1m{:<W$}\x1b[0m {}",
        "Warehouses:",
        report.warehouse_ids.join(", ")
    );

    if report.is_empty() {
        println!(
            "  \x1b[33m➜\x1b[0m  \x1b[1m{:<W$}\x1b[0m no data \x1b[90m(the API returned no queries)\x1b[0m",
            "Queries:"
        );
    } else {
        println!(
            "  \x1b[32m➜\x1b[0m  \x1b[1m{:<W$}\x1b[0m {} \x1b[90m({} billable, {} pages)\x1b[0m",
            "Queries:",
            report.queries.len(),
            report.billable.len(),
            report.stats.pages
        );

        let peak = report
            .concurrency
            .iter()
            .map(|b| b.distinct_user_count)
            .max()
            .unwrap_or(0);
        println!(
            "  \x1b[32m➜\x1b[0m  \x1b[1m{:<W$}\x1b[0m {} minutes \x1b[90m(peak {} users, {})\x1b[0m",
            "Concurrency:",
            report.concurrency.len(),
            peak,
            report.timezone
        );
    }

    if let Some(attribution) = &report.attribution {
        let unattributed = attribution
            .summary
            .iter()
            .find(|s| s.target.is_none())
            .map(|s| s.query_count)
            .unwrap_or(0);
        let targets = attribution
            .summary
            .iter()
            .filter(|s| s.target.is_some())
            .count();
        println!(
            "  \x1b[35m➜\x1b[0m  \x1b[1m{:<W$}\x1b[0m {} targets \x1b[90m({} unattributed queries)\x1b[0m",
            "Attribution:", targets, unattributed
        );
    }

    if let Some(events) = &report.warehouse_events {
        let total: usize = events.iter().map(|b| b.event_count).sum();
        println!(
            "  \x1b[32m➜\x1b[0m  \x1b[1m{:<W$}\x1b[0m {} events \x1b[90m(in {} warehouse-minutes)\x1b[0m",
            "Events:",
            total,
            events.len()
        );
    }

    let stats = &report.stats;
    if stats.unknown_start > 0 || stats.duration_mismatches > 0 || stats.duplicates_dropped > 0 {
        println!(
            "  \x1b[90m➜  {:<W$} {} unknown start, {} duration mismatch, {} duplicate\x1b[0m",
            "Data quality:", stats.unknown_start, stats.duration_mismatches, stats.duplicates_dropped
        );
    }

    for file in &written.files {
        println!("  \x1b[90m➜  {:<W$} {}\x1b[0m", "Wrote:", file.display());
    }

    println!();
}
