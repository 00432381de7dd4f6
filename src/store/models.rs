use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::classify::ArtifactKind;

/// File name recorded for a client folder that holds no files.
pub const NO_BACKUPS_FOUND: &str = "no backups found";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Client {
    pub id: String,
    pub name: String,
    pub ignored: bool,
    /// Overrides the configured freshness window when set.
    pub freshness_window_days: Option<u32>,
    pub emails: Vec<String>,
    pub notes: Option<String>,
}

impl Client {
    /// A client as first seen on the drive: named after its folder, no overrides.
    pub fn discovered(id: &str) -> Self {
        Client {
            id: id.to_string(),
            name: id.to_string(),
            ignored: false,
            freshness_window_days: None,
            emails: Vec::new(),
            notes: None,
        }
    }
}

/// Partial update for a client. `None` leaves the field untouched.
#[derive(Debug, Clone, Default)]
pub struct ClientUpdate {
    pub name: Option<String>,
    pub ignored: Option<bool>,
    /// `Some(None)` clears the override.
    pub freshness_window_days: Option<Option<u32>>,
    pub emails: Option<Vec<String>>,
    pub notes: Option<String>,
}

impl ClientUpdate {
    pub fn apply(&self, client: &mut Client) {
        if let Some(name) = &self.name {
            client.name = name.clone();
        }
        if let Some(ignored) = self.ignored {
            client.ignored = ignored;
        }
        if let Some(window) = self.freshness_window_days {
            client.freshness_window_days = window;
        }
        if let Some(emails) = &self.emails {
            client.emails = emails.clone();
        }
        if let Some(notes) = &self.notes {
            client.notes = Some(notes.clone());
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BackupStatus {
    pub client_id: String,
    pub file_name: String,
    /// Absent for the "no backups found" sentinel.
    pub uploaded_at: Option<DateTime<Utc>>,
    pub kind: ArtifactKind,
    pub is_current: bool,
}

impl BackupStatus {
    pub fn missing(client_id: &str) -> Self {
        BackupStatus {
            client_id: client_id.to_string(),
            file_name: NO_BACKUPS_FOUND.to_string(),
            uploaded_at: None,
            kind: ArtifactKind::None,
            is_current: false,
        }
    }
}

/// A status row joined with its client, as shown in reports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClientStatus {
    pub client_id: String,
    pub name: String,
    pub file_name: String,
    pub uploaded_at: Option<DateTime<Utc>>,
    pub kind: ArtifactKind,
    pub is_current: bool,
}

/// Summary of one completed scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScanRecord {
    pub id: i64,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub clients_seen: u32,
    pub ignored: u32,
    pub stale: u32,
    pub failures: u32,
}

pub(crate) fn join_emails(emails: &[String]) -> Option<String> {
    if emails.is_empty() {
        None
    } else {
        Some(emails.join(","))
    }
}

pub(crate) fn split_emails(raw: Option<String>) -> Vec<String> {
    raw.map(|s| {
        s.split(',')
            .map(str::trim)
            .filter(|e| !e.is_empty())
            .map(str::to_string)
            .collect()
    })
    .unwrap_or_default()
}
