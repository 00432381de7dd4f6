//! Terminal table rendering for client statuses.
//!
//! Formats output as a fixed-width table:
//! - One row per client, in the order given
//! - Marks clients without a current backup
//! - Footer with current/stale totals

use crate::store::ClientStatus;
use crate::util::{format_age, format_timestamp};
use chrono::{DateTime, Utc};

pub fn render(statuses: &[ClientStatus], now: DateTime<Utc>) -> String {
    if statuses.is_empty() {
        return String::from("No client backups recorded.\n");
    }

    let mut output = String::new();

    output.push_str(&format!(
        "{:<2} {:<20} {:<32} {:<9} {:<20} {:>8}\n",
        "", "Client", "File", "Kind", "Uploaded", "Age"
    ));
    output.push_str(&"-".repeat(96));
    output.push('\n');

    for status in statuses {
        let marker = if status.is_current { "  " } else { "! " };
        let uploaded = status
            .uploaded_at
            .map(format_timestamp)
            .unwrap_or_else(|| "-".to_string());
        let age = status
            .uploaded_at
            .map(|t| format_age(now - t))
            .unwrap_or_else(|| "-".to_string());

        output.push_str(&format!(
            "{marker}{:<20} {:<32} {:<9} {:<20} {:>8}\n",
            truncate(&status.client_id, 20),
            truncate(&status.file_name, 32),
            status.kind.as_str(),
            uploaded,
            age
        ));
    }

    let stale = statuses.iter().filter(|s| !s.is_current).count();
    output.push_str(&format!(
        "\n{} clients, {} current, {} stale\n",
        statuses.len(),
        statuses.len() - stale,
        stale
    ));

    output
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max_len - 3).collect();
        format!("{truncated}...")
    }
}
