use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use tracing::debug;

use crate::cli::Cli;
use crate::error::{Error, Result};
use crate::platform;

pub const DEFAULT_CONTAINER: &str = "Backups";
pub const DEFAULT_FRESHNESS_WINDOW: Duration = Duration::from_secs(30 * 24 * 60 * 60);
const DEFAULT_SUBJECT: &str = "Stale client backups";

/// On-disk layout of config.toml. Every key is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct FileConfig {
    database: Option<PathBuf>,
    log_dir: Option<PathBuf>,
    freshness_window: Option<String>,
    drive: DriveSection,
    notify: NotifySection,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct DriveSection {
    root: Option<PathBuf>,
    container: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct NotifySection {
    recipients: Vec<String>,
    subject: Option<String>,
    outbox: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct NotifySettings {
    pub recipients: Vec<String>,
    pub subject: String,
    pub outbox: PathBuf,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database: PathBuf,
    pub log_dir: Option<PathBuf>,
    pub drive_root: Option<PathBuf>,
    pub container: String,
    pub freshness_window: Duration,
    pub notify: NotifySettings,
}

impl Config {
    /// Loads the config file named on the command line, or the default one
    /// if it exists, then applies command line overrides.
    pub fn load(cli: &Cli) -> Result<Self> {
        let file = match &cli.config {
            Some(path) => read_file(path)?,
            None => match platform::default_config_path() {
                Some(path) if path.exists() => read_file(&path)?,
                _ => FileConfig::default(),
            },
        };

        let mut config = Self::resolve(file, &platform::data_dir()?)?;

        if let Some(db) = &cli.db {
            config.database = db.clone();
        }

        Ok(config)
    }

    pub fn from_toml(content: &str, data_dir: &Path) -> Result<Self> {
        let file: FileConfig =
            toml::from_str(content).map_err(|e| Error::Config(e.to_string()))?;
        Self::resolve(file, data_dir)
    }

    fn resolve(file: FileConfig, data_dir: &Path) -> Result<Self> {
        let freshness_window = match file.freshness_window.as_deref() {
            Some(raw) => parse_window(raw)?,
            None => DEFAULT_FRESHNESS_WINDOW,
        };

        Ok(Config {
            database: file
                .database
                .unwrap_or_else(|| data_dir.join("staleguard.db")),
            log_dir: file.log_dir,
            drive_root: file.drive.root,
            container: file
                .drive
                .container
                .unwrap_or_else(|| DEFAULT_CONTAINER.to_string()),
            freshness_window,
            notify: NotifySettings {
                recipients: file.notify.recipients,
                subject: file
                    .notify
                    .subject
                    .unwrap_or_else(|| DEFAULT_SUBJECT.to_string()),
                outbox: file.notify.outbox.unwrap_or_else(|| data_dir.join("outbox")),
            },
        })
    }

    /// Lock file guarding the scan entry point, next to the database.
    pub fn lock_path(&self) -> PathBuf {
        let mut path = self.database.clone().into_os_string();
        path.push(".scan.lock");
        PathBuf::from(path)
    }
}

fn read_file(path: &Path) -> Result<FileConfig> {
    debug!(path = %path.display(), "reading config");
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("cannot read {}: {e}", path.display())))?;
    toml::from_str(&content).map_err(|e| Error::Config(format!("{}: {e}", path.display())))
}

pub fn parse_window(raw: &str) -> Result<Duration> {
    let window = humantime::parse_duration(raw.trim())
        .map_err(|e| Error::Config(format!("invalid freshness window '{raw}': {e}")))?;

    if window.is_zero() {
        return Err(Error::Config("freshness window must be greater than zero".into()));
    }
    Ok(window)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_uses_defaults() {
        let config = Config::from_toml("", Path::new("/data")).unwrap();

        assert_eq!(config.database, PathBuf::from("/data/staleguard.db"));
        assert_eq!(config.container, "Backups");
        assert_eq!(config.freshness_window, DEFAULT_FRESHNESS_WINDOW);
        assert_eq!(config.notify.outbox, PathBuf::from("/data/outbox"));
        assert!(config.notify.recipients.is_empty());
        assert!(config.drive_root.is_none());
    }

    #[test]
    fn full_file_is_read() {
        let toml = r#"
            database = "/srv/status.db"
            log_dir = "/var/log/staleguard"
            freshness_window = "2w"

            [drive]
            root = "/mnt/cloud"
            container = "Respaldos"

            [notify]
            recipients = ["ops@example.com", "boss@example.com"]
            subject = "Backups atrasados"
            outbox = "/var/spool/staleguard"
        "#;
        let config = Config::from_toml(toml, Path::new("/data")).unwrap();

        assert_eq!(config.database, PathBuf::from("/srv/status.db"));
        assert_eq!(config.freshness_window, Duration::from_secs(14 * 24 * 60 * 60));
        assert_eq!(config.drive_root, Some(PathBuf::from("/mnt/cloud")));
        assert_eq!(config.container, "Respaldos");
        assert_eq!(config.notify.recipients.len(), 2);
        assert_eq!(config.notify.subject, "Backups atrasados");
        assert_eq!(config.lock_path(), PathBuf::from("/srv/status.db.scan.lock"));
    }

    #[test]
    fn bad_window_is_config_error() {
        let err = Config::from_toml(r#"freshness_window = "soon""#, Path::new("/data"));
        assert!(matches!(err, Err(Error::Config(_))));

        assert!(matches!(parse_window("0s"), Err(Error::Config(_))));
        assert_eq!(parse_window("30d").unwrap(), DEFAULT_FRESHNESS_WINDOW);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let err = Config::from_toml("databse = \"/x\"", Path::new("/data"));
        assert!(matches!(err, Err(Error::Config(_))));
    }
}
