pub mod table;
pub mod json;

use chrono::{DateTime, Utc};

use crate::reconcile::ScanReport;
use crate::store::ClientStatus;

pub fn print_statuses(statuses: &[ClientStatus], now: DateTime<Utc>) {
    print!("{}", table::render(statuses, now));
}

pub fn print_scan_info(report: &ScanReport, verbose: bool) {
    let duration_sec = report.duration_ms as f64 / 1000.0;
    println!("\nscan completed in {duration_sec:.2}s");

    if !report.ignored.is_empty() {
        if verbose {
            println!("ignored clients: {}", report.ignored.join(", "));
        } else {
            println!("ignored clients: {}", report.ignored.len());
        }
    }

    print_failures(report);
}

fn print_failures(report: &ScanReport) {
    if report.failures.is_empty() {
        return;
    }

    println!();
    println!("Failures:");
    println!("{}", "-".repeat(40));
    for failure in &report.failures {
        println!("  {} [{}]: {}", failure.client_id, failure.stage, failure.message);
    }
}
