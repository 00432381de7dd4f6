//! SQLite backup status storage.
//!
//! Persists reconciliation results to a local SQLite database with three tables:
//! - clients: id, display name, ignore flag, freshness override, contact emails
//! - backup_status: at most one row per client, overwritten on every scan
//! - scans: one summary row per completed scan
//!
//! Supports:
//! - Idempotent "ensure client" and per-client status upsert
//! - Ignore list, outdated and full status queries
//! - Client management with status cleanup on delete

pub mod models;

use std::collections::HashSet;
use std::path::Path;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use tracing::{debug, info};

use crate::classify::ArtifactKind;
use crate::error::Result;
pub use models::{BackupStatus, Client, ClientStatus, ClientUpdate, ScanRecord, NO_BACKUPS_FOUND};
use models::{join_emails, split_emails};

fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS clients (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            ignore_flag INTEGER NOT NULL DEFAULT 0,
            freshness_window_days INTEGER,
            emails TEXT,
            notes TEXT,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS backup_status (
            client_id TEXT PRIMARY KEY NOT NULL,
            file_name TEXT NOT NULL,
            uploaded_at INTEGER,
            kind TEXT NOT NULL,
            is_current INTEGER NOT NULL DEFAULT 0,
            FOREIGN KEY(client_id) REFERENCES clients(id)
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS scans (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            started_at INTEGER NOT NULL,
            finished_at INTEGER NOT NULL,
            clients_seen INTEGER NOT NULL,
            ignored INTEGER NOT NULL,
            stale INTEGER NOT NULL,
            failures INTEGER NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_clients_ignore_flag ON clients(ignore_flag)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_backup_status_is_current ON backup_status(is_current)",
        [],
    )?;

    Ok(())
}

fn to_unix(ts: DateTime<Utc>) -> i64 {
    ts.timestamp()
}

fn from_unix(secs: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(secs, 0).unwrap_or_default()
}

const CLIENT_COLUMNS: &str = "id, name, ignore_flag, freshness_window_days, emails, notes";

fn client_from_row(row: &rusqlite::Row) -> rusqlite::Result<Client> {
    Ok(Client {
        id: row.get(0)?,
        name: row.get(1)?,
        ignored: row.get::<_, i64>(2)? != 0,
        freshness_window_days: row.get::<_, Option<i64>>(3)?.map(|d| d.clamp(0, u32::MAX as i64) as u32),
        emails: split_emails(row.get(4)?),
        notes: row.get(5)?,
    })
}

fn client_status_from_row(row: &rusqlite::Row) -> rusqlite::Result<ClientStatus> {
    Ok(ClientStatus {
        client_id: row.get(0)?,
        name: row.get(1)?,
        file_name: row.get(2)?,
        uploaded_at: row.get::<_, Option<i64>>(3)?.map(from_unix),
        kind: ArtifactKind::parse(&row.get::<_, String>(4)?),
        is_current: row.get::<_, i64>(5)? != 0,
    })
}

fn scan_from_row(row: &rusqlite::Row) -> rusqlite::Result<ScanRecord> {
    Ok(ScanRecord {
        id: row.get(0)?,
        started_at: from_unix(row.get(1)?),
        finished_at: from_unix(row.get(2)?),
        clients_seen: row.get::<_, i64>(3)?.max(0) as u32,
        ignored: row.get::<_, i64>(4)?.max(0) as u32,
        stale: row.get::<_, i64>(5)?.max(0) as u32,
        failures: row.get::<_, i64>(6)?.max(0) as u32,
    })
}

const STATUS_QUERY: &str = "SELECT c.id, c.name, s.file_name, s.uploaded_at, s.kind, s.is_current
     FROM backup_status s
     JOIN clients c ON s.client_id = c.id
     WHERE c.ignore_flag = 0";

const STATUS_ORDER: &str = "ORDER BY s.uploaded_at DESC NULLS LAST, c.id ASC";

/// Database handle. Open once per process, reuse across all operations.
pub struct Store {
    conn: Connection,
}

impl Store {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        debug!(path = %path.display(), "opening status store");
        let conn = Connection::open(path)?;
        Self::with_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        init_schema(&conn)?;
        Ok(Store { conn })
    }

    /// Ids of every client flagged as ignored.
    pub fn ignored_client_ids(&self) -> Result<HashSet<String>> {
        let mut stmt = self.conn.prepare("SELECT id FROM clients WHERE ignore_flag = 1")?;
        let ids = stmt
            .query_map([], |row| row.get(0))?
            .collect::<rusqlite::Result<HashSet<String>>>()?;
        Ok(ids)
    }

    /// Returns the client, creating it with discovery defaults if absent.
    /// Calling it again for the same id changes nothing.
    pub fn ensure_client(&self, id: &str) -> Result<Client> {
        let now = to_unix(Utc::now());
        let inserted = self.conn.execute(
            "INSERT OR IGNORE INTO clients (id, name, ignore_flag, created_at, updated_at)
             VALUES (?1, ?1, 0, ?2, ?2)",
            params![id, now],
        )?;

        if inserted > 0 {
            info!(client = %id, "registered new client");
        }

        match self.get_client(id)? {
            Some(client) => Ok(client),
            None => Err(rusqlite::Error::QueryReturnedNoRows.into()),
        }
    }

    /// Writes the client's status, replacing any previous row in one statement.
    pub fn upsert_status(&self, status: &BackupStatus) -> Result<()> {
        self.conn.execute(
            "INSERT INTO backup_status (client_id, file_name, uploaded_at, kind, is_current)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(client_id) DO UPDATE SET
                file_name = excluded.file_name,
                uploaded_at = excluded.uploaded_at,
                kind = excluded.kind,
                is_current = excluded.is_current",
            params![
                status.client_id,
                status.file_name,
                status.uploaded_at.map(to_unix),
                status.kind.as_str(),
                status.is_current as i64,
            ],
        )?;
        Ok(())
    }

    pub fn get_status(&self, client_id: &str) -> Result<Option<BackupStatus>> {
        let status = self
            .conn
            .query_row(
                "SELECT client_id, file_name, uploaded_at, kind, is_current
                 FROM backup_status WHERE client_id = ?1",
                params![client_id],
                |row| {
                    Ok(BackupStatus {
                        client_id: row.get(0)?,
                        file_name: row.get(1)?,
                        uploaded_at: row.get::<_, Option<i64>>(2)?.map(from_unix),
                        kind: ArtifactKind::parse(&row.get::<_, String>(3)?),
                        is_current: row.get::<_, i64>(4)? != 0,
                    })
                },
            )
            .optional()?;
        Ok(status)
    }

    pub fn status_count(&self) -> Result<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM backup_status", [], |row| row.get(0))?;
        Ok(count.max(0) as usize)
    }

    /// Statuses of all non-ignored clients, most recent upload first.
    pub fn all_statuses(&self) -> Result<Vec<ClientStatus>> {
        let sql = format!("{STATUS_QUERY} {STATUS_ORDER}");
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt
            .query_map([], client_status_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    /// Statuses of non-ignored clients whose backup is not current.
    pub fn outdated_statuses(&self) -> Result<Vec<ClientStatus>> {
        let sql = format!("{STATUS_QUERY} AND s.is_current = 0 {STATUS_ORDER}");
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt
            .query_map([], client_status_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    pub fn create_client(&self, client: &Client) -> Result<()> {
        let now = to_unix(Utc::now());
        self.conn.execute(
            "INSERT INTO clients (id, name, ignore_flag, freshness_window_days, emails, notes, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)",
            params![
                client.id,
                client.name,
                client.ignored as i64,
                client.freshness_window_days,
                join_emails(&client.emails),
                client.notes,
                now,
            ],
        )?;
        Ok(())
    }

    /// Applies `update` to an existing client. Returns the updated client,
    /// or `None` when no client has that id.
    pub fn update_client(&self, id: &str, update: &ClientUpdate) -> Result<Option<Client>> {
        let Some(mut client) = self.get_client(id)? else {
            return Ok(None);
        };
        update.apply(&mut client);

        self.conn.execute(
            "UPDATE clients SET
                name = ?2,
                ignore_flag = ?3,
                freshness_window_days = ?4,
                emails = ?5,
                notes = ?6,
                updated_at = ?7
             WHERE id = ?1",
            params![
                client.id,
                client.name,
                client.ignored as i64,
                client.freshness_window_days,
                join_emails(&client.emails),
                client.notes,
                to_unix(Utc::now()),
            ],
        )?;

        Ok(Some(client))
    }

    pub fn set_ignored(&self, id: &str, ignored: bool) -> Result<bool> {
        let changed = self.conn.execute(
            "UPDATE clients SET ignore_flag = ?2, updated_at = ?3 WHERE id = ?1",
            params![id, ignored as i64, to_unix(Utc::now())],
        )?;
        Ok(changed > 0)
    }

    /// Removes the client's status row, then the client, in one transaction.
    /// Returns whether the client existed.
    pub fn delete_client(&mut self, id: &str) -> Result<bool> {
        let tx = self.conn.transaction()?;
        tx.execute("DELETE FROM backup_status WHERE client_id = ?1", params![id])?;
        let removed = tx.execute("DELETE FROM clients WHERE id = ?1", params![id])?;
        tx.commit()?;

        if removed > 0 {
            info!(client = %id, "deleted client");
        }
        Ok(removed > 0)
    }

    pub fn get_client(&self, id: &str) -> Result<Option<Client>> {
        let sql = format!("SELECT {CLIENT_COLUMNS} FROM clients WHERE id = ?1");
        let client = self
            .conn
            .query_row(&sql, params![id], client_from_row)
            .optional()?;
        Ok(client)
    }

    pub fn list_clients(&self) -> Result<Vec<Client>> {
        let sql = format!("SELECT {CLIENT_COLUMNS} FROM clients ORDER BY name, id");
        let mut stmt = self.conn.prepare(&sql)?;
        let clients = stmt
            .query_map([], client_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(clients)
    }

    pub fn record_scan(
        &self,
        started_at: DateTime<Utc>,
        finished_at: DateTime<Utc>,
        clients_seen: u32,
        ignored: u32,
        stale: u32,
        failures: u32,
    ) -> Result<i64> {
        self.conn.execute(
            "INSERT INTO scans (started_at, finished_at, clients_seen, ignored, stale, failures)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                to_unix(started_at),
                to_unix(finished_at),
                clients_seen,
                ignored,
                stale,
                failures
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn latest_scan(&self) -> Result<Option<ScanRecord>> {
        let scan = self
            .conn
            .query_row(
                "SELECT id, started_at, finished_at, clients_seen, ignored, stale, failures
                 FROM scans
                 ORDER BY id DESC
                 LIMIT 1",
                [],
                scan_from_row,
            )
            .optional()?;
        Ok(scan)
    }
}
