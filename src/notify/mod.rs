//! Stale-client notification.
//!
//! Builds the alert message from the stale-client report and hands it to a
//! transport. Actual mail delivery lives outside this crate; the bundled
//! transport drops each message into an outbox directory for a mailer to
//! pick up.

pub mod html;

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tracing::info;

use crate::config::NotifySettings;
use crate::error::{Error, Result};
use crate::reconcile::StaleEntry;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub recipients: Vec<String>,
    pub subject: String,
    pub html: String,
}

pub trait Notifier {
    fn send(&self, message: &Notification) -> Result<()>;
}

pub fn build(settings: &NotifySettings, entries: &[StaleEntry]) -> Result<Notification> {
    if settings.recipients.is_empty() {
        return Err(Error::Notify("no notification recipients configured".into()));
    }

    Ok(Notification {
        recipients: settings.recipients.clone(),
        subject: settings.subject.clone(),
        html: html::render(entries),
    })
}

/// Sends the stale-client alert. Returns `false` without sending when there
/// is nothing to report.
pub fn notify_stale(
    notifier: &dyn Notifier,
    settings: &NotifySettings,
    entries: &[StaleEntry],
) -> Result<bool> {
    if entries.is_empty() {
        info!("no stale backups to notify");
        return Ok(false);
    }

    let message = build(settings, entries)?;
    notifier.send(&message)?;
    info!(clients = entries.len(), recipients = message.recipients.len(), "stale backup notification sent");
    Ok(true)
}

/// Writes each message as an `.html` file into a spool directory.
pub struct OutboxNotifier {
    dir: PathBuf,
}

impl OutboxNotifier {
    pub fn new(dir: &Path) -> Self {
        OutboxNotifier { dir: dir.to_path_buf() }
    }

    fn message_path(&self, now: DateTime<Utc>) -> PathBuf {
        let stamp = now.format("%Y%m%dT%H%M%S%.6fZ");
        self.dir.join(format!("{stamp}-stale-backups.html"))
    }
}

impl Notifier for OutboxNotifier {
    fn send(&self, message: &Notification) -> Result<()> {
        std::fs::create_dir_all(&self.dir)?;

        let path = self.message_path(Utc::now());
        let body = format!(
            "<!--\nTo: {}\nSubject: {}\n-->\n{}",
            message.recipients.join(", "),
            message.subject.replace("--", "- -"),
            message.html
        );
        std::fs::write(&path, body)?;

        info!(path = %path.display(), "queued notification in outbox");
        Ok(())
    }
}
