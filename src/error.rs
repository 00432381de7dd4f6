use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("remote session unavailable: {0}")]
    Connection(String),

    #[error("remote authentication failed: {0}")]
    Auth(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("client '{client}' failed during {stage}: {source}")]
    ClientProcessing {
        client: String,
        stage: &'static str,
        #[source]
        source: Box<Error>,
    },

    #[error("store error: {0}")]
    Store(#[from] rusqlite::Error),

    #[error("a scan is already running (lock: {0})")]
    ScanInProgress(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("notification error: {0}")]
    Notify(String),
}

impl Error {
    pub fn client(client: &str, stage: &'static str, source: Error) -> Self {
        Error::ClientProcessing {
            client: client.to_string(),
            stage,
            source: Box::new(source),
        }
    }

    /// Errors that end the whole pass instead of just the current client.
    pub fn is_scan_fatal(&self) -> bool {
        match self {
            Error::Connection(_) | Error::Auth(_) | Error::NotFound(_) => true,
            Error::Store(e) => store_connection_lost(e),
            Error::ClientProcessing { source, .. } => source.ends_session(),
            _ => false,
        }
    }

    /// Whether a failure seen while working on one client means the drive or
    /// the store is gone. A missing path below the container only affects
    /// that client.
    fn ends_session(&self) -> bool {
        match self {
            Error::Connection(_) | Error::Auth(_) => true,
            Error::Store(e) => store_connection_lost(e),
            Error::ClientProcessing { source, .. } => source.ends_session(),
            _ => false,
        }
    }
}

fn store_connection_lost(err: &rusqlite::Error) -> bool {
    use rusqlite::ErrorCode;

    match err.sqlite_error_code() {
        Some(code) => matches!(
            code,
            ErrorCode::CannotOpen
                | ErrorCode::NotADatabase
                | ErrorCode::DatabaseCorrupt
                | ErrorCode::SystemIoFailure
        ),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remote_errors_are_fatal() {
        assert!(Error::Connection("gone".into()).is_scan_fatal());
        assert!(Error::NotFound("Backups".into()).is_scan_fatal());
        assert!(Error::Auth("denied".into()).is_scan_fatal());
    }

    #[test]
    fn client_error_inherits_fatality_from_source() {
        let transient = Error::client("ACME", "list", Error::Io(std::io::Error::other("flaky")));
        assert!(!transient.is_scan_fatal());

        let lost = Error::client("ACME", "list", Error::Connection("drive unmounted".into()));
        assert!(lost.is_scan_fatal());
    }

    #[test]
    fn missing_client_folder_is_not_fatal() {
        let gone = Error::client("ACME", "list", Error::NotFound("folder 'Backups/ACME'".into()));
        assert!(!gone.is_scan_fatal());

        let denied = Error::client("ACME", "list", Error::Auth("token revoked".into()));
        assert!(denied.is_scan_fatal());
    }

    #[test]
    fn constraint_violation_is_not_fatal() {
        let err = rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_CONSTRAINT),
            None,
        );
        assert!(!Error::Store(err).is_scan_fatal());

        let err = rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_CANTOPEN),
            None,
        );
        assert!(Error::Store(err).is_scan_fatal());
    }

    #[test]
    fn client_error_message_names_client_and_stage() {
        let err = Error::client("ACME", "classify", Error::NotFound("x".into()));
        let msg = err.to_string();
        assert!(msg.contains("ACME"));
        assert!(msg.contains("classify"));
    }
}
