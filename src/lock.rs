use std::fs::OpenOptions;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::platform;

/// Locks older than this belong to a scan that died without cleaning up.
const STALE_LOCK_HOURS: i64 = 6;

#[derive(Debug, PartialEq, Serialize, Deserialize)]
struct LockEntry {
    hostname: String,
    pid: u32,
    time: DateTime<Utc>,
}

/// Exclusive claim on the scan entry point, released on drop.
#[derive(Debug)]
pub struct ScanLock {
    path: PathBuf,
}

impl ScanLock {
    pub fn acquire(path: &Path) -> Result<Self> {
        Self::acquire_at(path, Utc::now())
    }

    fn acquire_at(path: &Path, now: DateTime<Utc>) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let entry = LockEntry {
            hostname: platform::hostname(),
            pid: std::process::id(),
            time: now,
        };
        let data = serde_json::to_vec(&entry)?;

        match create_exclusive(path, &data) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                let holder = read_holder(path);
                match &holder {
                    Some(h) if now - h.time > Duration::hours(STALE_LOCK_HOURS) => {
                        warn!(
                            lock = %path.display(),
                            holder = %h.hostname,
                            pid = h.pid,
                            since = %h.time,
                            "removing stale scan lock"
                        );
                        take_over(path, h)?;
                        create_exclusive(path, &data).map_err(|e| lock_error(path, e))?;
                    }
                    Some(h) => {
                        return Err(Error::ScanInProgress(format!(
                            "{} held by {} pid {} since {}",
                            path.display(),
                            h.hostname,
                            h.pid,
                            h.time
                        )))
                    }
                    None => {
                        return Err(Error::ScanInProgress(path.display().to_string()));
                    }
                }
            }
            Err(e) => return Err(e.into()),
        }

        debug!(lock = %path.display(), "acquired scan lock");
        Ok(ScanLock { path: path.to_path_buf() })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Bumps the lock time so a long scan is not mistaken for a dead one.
    /// Best-effort.
    pub fn refresh(&self) {
        self.refresh_at(Utc::now());
    }

    fn refresh_at(&self, now: DateTime<Utc>) {
        let entry = LockEntry {
            hostname: platform::hostname(),
            pid: std::process::id(),
            time: now,
        };
        match replace_entry(&self.path, &entry) {
            Ok(()) => debug!(lock = %self.path.display(), "refreshed scan lock"),
            Err(e) => warn!(lock = %self.path.display(), error = %e, "failed to refresh scan lock"),
        }
    }
}

impl Drop for ScanLock {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => debug!(lock = %self.path.display(), "released scan lock"),
            Err(e) => warn!(lock = %self.path.display(), error = %e, "failed to release scan lock"),
        }
    }
}

fn create_exclusive(path: &Path, data: &[u8]) -> std::io::Result<()> {
    let mut file = OpenOptions::new().write(true).create_new(true).open(path)?;
    file.write_all(data)?;
    file.sync_all()
}

fn replace_entry(path: &Path, entry: &LockEntry) -> Result<()> {
    let tmp = path.with_extension("refresh");
    std::fs::write(&tmp, serde_json::to_vec(entry)?)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}

/// Moves a stale lock out of the way. The rename is atomic, so of several
/// processes racing for the same stale lock only one gets it; if what was
/// moved is no longer the entry we judged stale, it is put back.
fn take_over(path: &Path, seen: &LockEntry) -> Result<()> {
    let aside = path.with_extension(format!("stale-{}", std::process::id()));
    match std::fs::rename(path, &aside) {
        Ok(()) => {}
        // another process moved it first; create_new decides who wins
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(e.into()),
    }

    if read_holder(&aside).as_ref() == Some(seen) {
        std::fs::remove_file(&aside)?;
        return Ok(());
    }

    // hard_link never overwrites a lock created in the meantime
    if let Err(e) = std::fs::hard_link(&aside, path) {
        warn!(lock = %path.display(), error = %e, "failed to restore scan lock");
    }
    let _ = std::fs::remove_file(&aside);
    Err(Error::ScanInProgress(path.display().to_string()))
}

fn read_holder(path: &Path) -> Option<LockEntry> {
    let raw = std::fs::read(path).ok()?;
    serde_json::from_slice(&raw).ok()
}

fn lock_error(path: &Path, e: std::io::Error) -> Error {
    if e.kind() == ErrorKind::AlreadyExists {
        Error::ScanInProgress(path.display().to_string())
    } else {
        e.into()
    }
}
