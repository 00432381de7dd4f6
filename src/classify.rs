//! Backup artifact classification.
//!
//! Decides what a client's latest file is and whether it counts as a
//! current backup:
//! - Maps file names to an artifact kind by extension
//! - Picks the most recent file out of a client folder
//! - Computes the freshness verdict against a window

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::remote::RemoteFile;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ArtifactKind {
    Zip,
    Rar,
    Gzip,
    Firebird,
    Numbered,
    Unknown,
    /// The client folder held no files at all.
    None,
}

impl ArtifactKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ArtifactKind::Zip => "ZIP",
            ArtifactKind::Rar => "RAR",
            ArtifactKind::Gzip => "GZIP",
            ArtifactKind::Firebird => "FIREBIRD",
            ArtifactKind::Numbered => "NUMBERED",
            ArtifactKind::Unknown => "UNKNOWN",
            ArtifactKind::None => "NONE",
        }
    }

    pub fn parse(s: &str) -> ArtifactKind {
        match s {
            "ZIP" => ArtifactKind::Zip,
            "RAR" => ArtifactKind::Rar,
            "GZIP" => ArtifactKind::Gzip,
            "FIREBIRD" => ArtifactKind::Firebird,
            "NUMBERED" => ArtifactKind::Numbered,
            "NONE" => ArtifactKind::None,
            _ => ArtifactKind::Unknown,
        }
    }

    /// True for kinds that count as an actual backup archive.
    pub fn is_backup(&self) -> bool {
        !matches!(self, ArtifactKind::Unknown | ArtifactKind::None)
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub fn classify(file_name: &str) -> ArtifactKind {
    let Some((_, ext)) = file_name.rsplit_once('.') else {
        return ArtifactKind::Unknown;
    };

    // split volumes: archive.001, archive.002, ...
    if !ext.is_empty() && ext.bytes().all(|b| b.is_ascii_digit()) {
        return ArtifactKind::Numbered;
    }

    match ext.to_ascii_lowercase().as_str() {
        "zip" => ArtifactKind::Zip,
        "rar" => ArtifactKind::Rar,
        "gz" => ArtifactKind::Gzip,
        "fbk" => ArtifactKind::Firebird,
        _ => ArtifactKind::Unknown,
    }
}

/// Returns the file with the latest modification time.
///
/// Files sharing the latest time are ordered by name, then by full path, and
/// the smallest wins, so the result never depends on listing order.
pub fn pick_most_recent<'a, I>(files: I) -> Option<&'a RemoteFile>
where
    I: IntoIterator<Item = &'a RemoteFile>,
{
    files.into_iter().fold(None, |best, candidate| match best {
        None => Some(candidate),
        Some(current) => {
            let newer = candidate.modified > current.modified;
            let tie_wins = candidate.modified == current.modified
                && (candidate.name.as_str(), candidate.path.as_str())
                    < (current.name.as_str(), current.path.as_str());

            if newer || tie_wins {
                Some(candidate)
            } else {
                Some(current)
            }
        }
    })
}

pub fn is_fresh(
    kind: ArtifactKind,
    timestamp: DateTime<Utc>,
    now: DateTime<Utc>,
    window: Duration,
) -> bool {
    if !kind.is_backup() {
        return false;
    }
    // a window reaching past the earliest representable date covers everything
    match now.checked_sub_signed(window) {
        Some(cutoff) => timestamp >= cutoff,
        None => true,
    }
}
