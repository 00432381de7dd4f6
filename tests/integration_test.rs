use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, TimeZone, Utc};

use staleguard::classify::ArtifactKind;
use staleguard::reconcile::{self, ClientOutcome, Reconciler, ScanSettings};
use staleguard::remote::{Folder, LocalDrive, MemoryDrive, Node, RemoteTree};
use staleguard::store::{BackupStatus, Client, Store, NO_BACKUPS_FOUND};
use staleguard::Error;

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
}

fn days_ago(days: i64) -> DateTime<Utc> {
    now() - Duration::days(days)
}

fn settings() -> ScanSettings {
    ScanSettings::new("Backups", StdDuration::from_secs(30 * 24 * 60 * 60)).unwrap()
}

fn scan(drive: &MemoryDrive, store: &mut Store) -> reconcile::ScanReport {
    Reconciler::new(drive, store, settings()).run_at(now()).unwrap()
}

fn sample_drive() -> MemoryDrive {
    MemoryDrive::new()
        .file("Backups/ACME/backup_2024.zip", days_ago(10))
        .file("Backups/ACME/notes.txt", days_ago(1))
        .file("Backups/GLOBEX/2024/05/db.fbk", days_ago(3))
        .file("Backups/GLOBEX/2023/db.fbk", days_ago(300))
        .file("Backups/INITECH/archive.001", days_ago(45))
        .folder("Backups/EMPTY")
}

#[test]
fn recent_unknown_file_does_not_count_as_backup() {
    let drive = sample_drive();
    let mut store = Store::open_in_memory().unwrap();

    scan(&drive, &mut store);

    let status = store.get_status("ACME").unwrap().unwrap();
    assert_eq!(status.file_name, "notes.txt");
    assert_eq!(status.kind, ArtifactKind::Unknown);
    assert!(!status.is_current);
}

#[test]
fn nested_recent_archive_is_current() {
    let drive = sample_drive();
    let mut store = Store::open_in_memory().unwrap();

    scan(&drive, &mut store);

    let status = store.get_status("GLOBEX").unwrap().unwrap();
    assert_eq!(status.file_name, "db.fbk");
    assert_eq!(status.kind, ArtifactKind::Firebird);
    assert_eq!(status.uploaded_at, Some(days_ago(3)));
    assert!(status.is_current);

    let old = store.get_status("INITECH").unwrap().unwrap();
    assert_eq!(old.kind, ArtifactKind::Numbered);
    assert!(!old.is_current);
}

#[test]
fn empty_folder_records_missing_status() {
    let drive = sample_drive();
    let mut store = Store::open_in_memory().unwrap();

    let report = scan(&drive, &mut store);

    let status = store.get_status("EMPTY").unwrap().unwrap();
    assert_eq!(status.file_name, NO_BACKUPS_FOUND);
    assert_eq!(status.kind, ArtifactKind::None);
    assert!(!status.is_current);
    assert!(report.failures.is_empty());

    let empty = report
        .results
        .iter()
        .find(|r| r.status.client_id == "EMPTY")
        .unwrap();
    assert_eq!(empty.outcome, ClientOutcome::Missing);
}

#[test]
fn discovered_clients_are_registered() {
    let drive = sample_drive();
    let mut store = Store::open_in_memory().unwrap();

    scan(&drive, &mut store);

    let client = store.get_client("GLOBEX").unwrap().unwrap();
    assert_eq!(client.name, "GLOBEX");
    assert!(!client.ignored);
    assert_eq!(store.list_clients().unwrap().len(), 4);
}

#[test]
fn rescanning_unchanged_drive_is_idempotent() {
    let drive = sample_drive();
    let mut store = Store::open_in_memory().unwrap();

    scan(&drive, &mut store);
    let first: Vec<BackupStatus> = ["ACME", "GLOBEX", "INITECH", "EMPTY"]
        .iter()
        .map(|id| store.get_status(id).unwrap().unwrap())
        .collect();

    scan(&drive, &mut store);
    let second: Vec<BackupStatus> = ["ACME", "GLOBEX", "INITECH", "EMPTY"]
        .iter()
        .map(|id| store.get_status(id).unwrap().unwrap())
        .collect();

    assert_eq!(first, second);
    assert_eq!(store.status_count().unwrap(), 4);
    assert_eq!(store.list_clients().unwrap().len(), 4);
}

#[test]
fn ignored_client_is_skipped_entirely() {
    let drive = sample_drive();
    let mut store = Store::open_in_memory().unwrap();
    let mut acme = Client::discovered("ACME");
    acme.ignored = true;
    store.create_client(&acme).unwrap();

    let report = scan(&drive, &mut store);

    assert_eq!(report.ignored, vec!["ACME"]);
    assert!(store.get_status("ACME").unwrap().is_none());

    let outdated = reconcile::get_outdated(&store).unwrap();
    assert!(outdated.iter().all(|s| s.client_id != "ACME"));
    let all = reconcile::get_all(&store).unwrap();
    assert!(all.iter().all(|s| s.client_id != "ACME"));
}

#[test]
fn ignoring_after_a_scan_hides_existing_status() {
    let drive = sample_drive();
    let mut store = Store::open_in_memory().unwrap();

    scan(&drive, &mut store);
    store.set_ignored("INITECH", true).unwrap();

    let all = reconcile::get_all(&store).unwrap();
    assert!(all.iter().all(|s| s.client_id != "INITECH"));
}

#[test]
fn stale_report_matches_outdated_query() {
    let drive = sample_drive();
    let mut store = Store::open_in_memory().unwrap();

    let report = scan(&drive, &mut store);

    let mut from_report: Vec<_> = report.stale.iter().map(|e| e.client_id.clone()).collect();
    let mut from_store: Vec<_> = reconcile::get_outdated(&store)
        .unwrap()
        .into_iter()
        .map(|s| s.client_id)
        .collect();
    from_report.sort();
    from_store.sort();

    assert_eq!(from_report, vec!["ACME", "EMPTY", "INITECH"]);
    assert_eq!(from_report, from_store);
}

#[test]
fn get_all_orders_by_most_recent_upload() {
    let drive = sample_drive();
    let mut store = Store::open_in_memory().unwrap();

    scan(&drive, &mut store);

    let order: Vec<_> = reconcile::get_all(&store)
        .unwrap()
        .into_iter()
        .map(|s| s.client_id)
        .collect();
    assert_eq!(order, vec!["ACME", "GLOBEX", "INITECH", "EMPTY"]);
}

#[test]
fn one_failing_client_does_not_stop_the_scan() {
    let drive = sample_drive();
    drive.fail_listing("Backups/GLOBEX/2024");
    let mut store = Store::open_in_memory().unwrap();

    let report = scan(&drive, &mut store);

    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].client_id, "GLOBEX");
    assert_eq!(report.failures[0].stage, "list");
    assert!(store.get_status("GLOBEX").unwrap().is_none());
    assert!(store.get_status("ACME").unwrap().is_some());
    assert!(store.get_status("INITECH").unwrap().is_some());
}

/// Drive whose listing of one client folder reports it as gone.
struct VanishingFolder {
    inner: MemoryDrive,
    gone: &'static str,
}

impl RemoteTree for VanishingFolder {
    fn root_container(&self, name: &str) -> staleguard::Result<Folder> {
        self.inner.root_container(name)
    }

    fn children(&self, folder: &Folder) -> staleguard::Result<Vec<Node>> {
        if folder.key == self.gone {
            return Err(Error::NotFound(format!("folder '{}'", folder.key)));
        }
        self.inner.children(folder)
    }
}

#[test]
fn vanished_client_folder_is_skipped() {
    let drive = VanishingFolder {
        inner: MemoryDrive::new()
            .file("Backups/AAA/a.zip", days_ago(1))
            .file("Backups/GONE/a.zip", days_ago(1))
            .file("Backups/ZZZ/a.zip", days_ago(1)),
        gone: "Backups/GONE",
    };
    let mut store = Store::open_in_memory().unwrap();

    let report = Reconciler::new(&drive, &mut store, settings())
        .run_at(now())
        .unwrap();

    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].client_id, "GONE");
    assert!(store.get_status("GONE").unwrap().is_none());
    assert!(store.get_status("AAA").unwrap().is_some());
    assert!(store.get_status("ZZZ").unwrap().is_some());
}

#[test]
fn failed_client_keeps_previous_status() {
    let drive = sample_drive();
    let mut store = Store::open_in_memory().unwrap();
    scan(&drive, &mut store);
    let before = store.get_status("GLOBEX").unwrap().unwrap();

    drive.fail_listing("Backups/GLOBEX");
    scan(&drive, &mut store);

    assert_eq!(store.get_status("GLOBEX").unwrap().unwrap(), before);
}

#[test]
fn lost_session_aborts_the_scan() {
    let drive = sample_drive();
    drive.disconnect();
    let mut store = Store::open_in_memory().unwrap();

    let result = Reconciler::new(&drive, &mut store, settings()).run_at(now());

    assert!(matches!(result, Err(Error::Connection(_))));
    assert_eq!(store.status_count().unwrap(), 0);
    assert!(store.latest_scan().unwrap().is_none());
}

#[test]
fn deleting_client_leaves_no_orphan_status() {
    let drive = sample_drive();
    let mut store = Store::open_in_memory().unwrap();
    scan(&drive, &mut store);

    assert!(store.delete_client("ACME").unwrap());

    assert!(store.get_status("ACME").unwrap().is_none());
    assert_eq!(store.status_count().unwrap(), 3);
}

#[test]
fn local_drive_end_to_end() {
    let dir = tempfile::TempDir::new().unwrap();
    let client_dir = dir.path().join("Backups").join("ACME").join("nightly");
    std::fs::create_dir_all(&client_dir).unwrap();
    std::fs::write(client_dir.join("db.ZIP"), b"data").unwrap();
    std::fs::create_dir_all(dir.path().join("Backups").join("EMPTY")).unwrap();

    let drive = LocalDrive::connect(dir.path()).unwrap();
    let mut store = Store::open(&dir.path().join("state").join("status.db")).unwrap();
    let lock = dir.path().join("state").join("scan.lock");

    let report = Reconciler::new(&drive, &mut store, settings().with_lock_path(lock.clone()))
        .run()
        .unwrap();

    assert_eq!(report.results.len(), 2);
    assert!(!lock.exists());

    let acme = store.get_status("ACME").unwrap().unwrap();
    assert_eq!(acme.kind, ArtifactKind::Zip);
    assert!(acme.is_current);
    assert!(!store.get_status("EMPTY").unwrap().unwrap().is_current);
}
