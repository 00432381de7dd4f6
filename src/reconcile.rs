//! Backup freshness reconciliation.
//!
//! One pass walks every client folder in the backups container, works out the
//! client's latest artifact and whether it is current, and overwrites the
//! client's status row. A failure on one client is recorded and the pass moves
//! on; losing the drive or the database ends the pass.

use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Instant;

use chrono::{DateTime, Duration, SubsecRound, Utc};
use serde::Serialize;
use tracing::{error, info, warn};

use crate::classify::{classify, is_fresh, pick_most_recent};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::lock::ScanLock;
use crate::remote::{client_folders, list_all_files, Folder, RemoteFile, RemoteTree};
use crate::store::{BackupStatus, ClientStatus, Store};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ScanState {
    NotStarted,
    Listing,
    PerClientLoop,
    Done,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ClientOutcome {
    Current,
    Stale,
    /// The folder held no files.
    Missing,
}

#[derive(Debug, Clone, Serialize)]
pub struct ClientResult {
    pub status: BackupStatus,
    pub outcome: ClientOutcome,
}

#[derive(Debug, Clone, Serialize)]
pub struct ClientFailure {
    pub client_id: String,
    pub stage: &'static str,
    pub message: String,
}

/// One line of the stale-client report handed to the notifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StaleEntry {
    pub client_id: String,
    pub file_name: String,
    pub uploaded_at: Option<DateTime<Utc>>,
}

impl From<&ClientStatus> for StaleEntry {
    fn from(status: &ClientStatus) -> Self {
        StaleEntry {
            client_id: status.client_id.clone(),
            file_name: status.file_name.clone(),
            uploaded_at: status.uploaded_at,
        }
    }
}

impl From<&BackupStatus> for StaleEntry {
    fn from(status: &BackupStatus) -> Self {
        StaleEntry {
            client_id: status.client_id.clone(),
            file_name: status.file_name.clone(),
            uploaded_at: status.uploaded_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ScanReport {
    pub scanned_at: DateTime<Utc>,
    pub state: ScanState,
    pub results: Vec<ClientResult>,
    pub ignored: Vec<String>,
    pub failures: Vec<ClientFailure>,
    pub stale: Vec<StaleEntry>,
    pub duration_ms: u128,
}

impl ScanReport {
    fn new(scanned_at: DateTime<Utc>) -> Self {
        ScanReport {
            scanned_at,
            state: ScanState::NotStarted,
            results: Vec::new(),
            ignored: Vec::new(),
            failures: Vec::new(),
            stale: Vec::new(),
            duration_ms: 0,
        }
    }

    fn push(&mut self, result: ClientResult) {
        if result.outcome != ClientOutcome::Current {
            self.stale.push(StaleEntry::from(&result.status));
        }
        self.results.push(result);
    }
}

#[derive(Debug, Clone)]
pub struct ScanSettings {
    pub container: String,
    pub default_window: Duration,
    pub lock_path: Option<PathBuf>,
}

impl ScanSettings {
    pub fn new(container: &str, default_window: std::time::Duration) -> Result<Self> {
        let default_window = Duration::from_std(default_window)
            .map_err(|_| Error::Config("freshness window is too large".into()))?;

        Ok(ScanSettings {
            container: container.to_string(),
            default_window,
            lock_path: None,
        })
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        let mut settings = Self::new(&config.container, config.freshness_window)?;
        settings.lock_path = Some(config.lock_path());
        Ok(settings)
    }

    pub fn with_lock_path(mut self, path: PathBuf) -> Self {
        self.lock_path = Some(path);
        self
    }
}

/// Derives a client's status from the files found under its folder.
///
/// Pure in its inputs: the same files, scan time and window always give the
/// same row.
pub fn evaluate(
    client_id: &str,
    files: &[RemoteFile],
    now: DateTime<Utc>,
    window: Duration,
) -> BackupStatus {
    let Some(latest) = pick_most_recent(files) else {
        return BackupStatus::missing(client_id);
    };

    // the store keeps whole seconds
    let uploaded_at = latest.modified.trunc_subsecs(0);
    let kind = classify(&latest.name);

    BackupStatus {
        client_id: client_id.to_string(),
        file_name: latest.name.clone(),
        uploaded_at: Some(uploaded_at),
        kind,
        is_current: is_fresh(kind, uploaded_at, now, window),
    }
}

/// Drives scans against one drive session and one store.
///
/// Holding the store mutably keeps two scans in this process from
/// interleaving; the optional lock file does the same across processes.
pub struct Reconciler<'a> {
    remote: &'a dyn RemoteTree,
    store: &'a mut Store,
    settings: ScanSettings,
    state: ScanState,
}

impl<'a> Reconciler<'a> {
    pub fn new(remote: &'a dyn RemoteTree, store: &'a mut Store, settings: ScanSettings) -> Self {
        Reconciler {
            remote,
            store,
            settings,
            state: ScanState::NotStarted,
        }
    }

    pub fn state(&self) -> ScanState {
        self.state
    }

    pub fn run(&mut self) -> Result<ScanReport> {
        // file times are compared at whole-second precision
        self.run_at(Utc::now().trunc_subsecs(0))
    }

    /// Runs a full pass as of `now`.
    pub fn run_at(&mut self, now: DateTime<Utc>) -> Result<ScanReport> {
        let start = Instant::now();
        let lock = match self.settings.lock_path.clone() {
            Some(path) => match ScanLock::acquire(&path) {
                Ok(lock) => Some(lock),
                Err(e) => return Err(self.fail(e)),
            },
            None => None,
        };

        let mut report = ScanReport::new(now);
        self.state = ScanState::Listing;
        info!(container = %self.settings.container, "starting backup scan");

        let (ignored, folders) = match self.list_candidates() {
            Ok(found) => found,
            Err(e) => return Err(self.fail(e)),
        };

        self.state = ScanState::PerClientLoop;
        for folder in &folders {
            if ignored.contains(&folder.name) {
                info!(client = %folder.name, "skipping ignored client");
                report.ignored.push(folder.name.clone());
                continue;
            }

            let processed = self.process_client(folder, now);
            if let Some(lock) = &lock {
                lock.refresh();
            }

            match processed {
                Ok(result) => report.push(result),
                Err(e) if e.is_scan_fatal() => return Err(self.fail(e)),
                Err(e) => {
                    let stage = match &e {
                        Error::ClientProcessing { stage, .. } => *stage,
                        _ => "process",
                    };
                    warn!(client = %folder.name, stage, error = %e, "client skipped");
                    report.failures.push(ClientFailure {
                        client_id: folder.name.clone(),
                        stage,
                        message: e.to_string(),
                    });
                }
            }
        }

        self.state = ScanState::Done;
        report.state = ScanState::Done;
        report.duration_ms = start.elapsed().as_millis();

        let elapsed = Duration::milliseconds(report.duration_ms.min(i64::MAX as u128) as i64);
        let finished_at = now + elapsed;
        if let Err(e) = self.store.record_scan(
            now,
            finished_at,
            (report.results.len() + report.failures.len()) as u32,
            report.ignored.len() as u32,
            report.stale.len() as u32,
            report.failures.len() as u32,
        ) {
            warn!(error = %e, "failed to record scan summary");
        }

        info!(
            clients = report.results.len(),
            stale = report.stale.len(),
            ignored = report.ignored.len(),
            failures = report.failures.len(),
            duration_ms = report.duration_ms as u64,
            "backup scan complete"
        );

        Ok(report)
    }

    fn list_candidates(&self) -> Result<(HashSet<String>, Vec<Folder>)> {
        let ignored = self.store.ignored_client_ids()?;
        let container = self.remote.root_container(&self.settings.container)?;
        let folders = client_folders(self.remote, &container)?;
        info!(candidates = folders.len(), ignored = ignored.len(), "listed client folders");
        Ok((ignored, folders))
    }

    /// Lists, evaluates and stores one client. Registering the client comes
    /// before the status write so the row always has a parent; both steps
    /// are idempotent and the status write is a single statement.
    fn process_client(&self, folder: &Folder, now: DateTime<Utc>) -> Result<ClientResult> {
        let id = folder.name.as_str();
        info!(client = %id, "analysing client");

        let files = list_all_files(self.remote, folder).map_err(|e| Error::client(id, "list", e))?;

        let client = self
            .store
            .ensure_client(id)
            .map_err(|e| Error::client(id, "register", e))?;

        let window = client
            .freshness_window_days
            .map(|days| Duration::days(days as i64))
            .unwrap_or(self.settings.default_window);

        let status = evaluate(id, &files, now, window);

        self.store
            .upsert_status(&status)
            .map_err(|e| Error::client(id, "store", e))?;

        let outcome = if files.is_empty() {
            ClientOutcome::Missing
        } else if status.is_current {
            ClientOutcome::Current
        } else {
            ClientOutcome::Stale
        };

        match outcome {
            ClientOutcome::Current => info!(client = %id, file = %status.file_name, "backup is current"),
            ClientOutcome::Stale => warn!(
                client = %id,
                file = %status.file_name,
                kind = %status.kind,
                "no recent backup"
            ),
            ClientOutcome::Missing => warn!(client = %id, "client folder has no files"),
        }

        Ok(ClientResult { status, outcome })
    }

    fn fail(&mut self, e: Error) -> Error {
        self.state = ScanState::Failed;
        error!(error = %e, "backup scan aborted");
        e
    }
}

/// Non-ignored clients whose latest backup is not current.
pub fn get_outdated(store: &Store) -> Result<Vec<ClientStatus>> {
    store.outdated_statuses()
}

/// Every non-ignored client with its status, most recent upload first.
pub fn get_all(store: &Store) -> Result<Vec<ClientStatus>> {
    store.all_statuses()
}
