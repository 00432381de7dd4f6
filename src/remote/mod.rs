//! Read-only view of the remote backup drive.
//!
//! Providers expose a folder tree one level at a time; `list_all_files`
//! flattens a client folder without recursing on the call stack.

pub mod local;
pub mod memory;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};

pub use local::LocalDrive;
pub use memory::MemoryDrive;

/// A folder handle. `key` is opaque to everything but the provider that made it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Folder {
    pub name: String,
    pub key: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RemoteFile {
    pub name: String,
    /// Slash separated path from the client folder, including its name.
    pub path: String,
    pub modified: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Folder(Folder),
    File { name: String, modified: DateTime<Utc> },
}

pub trait RemoteTree {
    /// Finds the well-known container among the drive root's children.
    fn root_container(&self, name: &str) -> Result<Folder>;

    /// Immediate children of a folder, in a stable order.
    fn children(&self, folder: &Folder) -> Result<Vec<Node>>;
}

/// Collects every file below `folder`, depth first, in listing order.
pub fn list_all_files(tree: &dyn RemoteTree, folder: &Folder) -> Result<Vec<RemoteFile>> {
    let mut files = Vec::new();
    let mut pending = vec![(folder.clone(), folder.name.clone())];

    while let Some((current, path)) = pending.pop() {
        debug!(path = %path, "listing folder");
        let children = tree.children(&current)?;

        if children.is_empty() {
            debug!(path = %path, "folder is empty");
            continue;
        }

        let mut subfolders = Vec::new();
        for child in children {
            match child {
                Node::Folder(sub) => {
                    let sub_path = format!("{path}/{}", sub.name);
                    subfolders.push((sub, sub_path));
                }
                Node::File { name, modified } => {
                    let file_path = format!("{path}/{name}");
                    debug!(path = %file_path, modified = %modified, "found file");
                    files.push(RemoteFile { name, path: file_path, modified });
                }
            }
        }

        // reversed so the first listed subfolder is visited first
        pending.extend(subfolders.into_iter().rev());
    }

    if files.is_empty() {
        warn!(folder = %folder.name, "no files found");
    } else {
        info!(folder = %folder.name, count = files.len(), "listed files");
    }

    Ok(files)
}

/// Top-level folders of the container, one per client. Loose files are ignored.
pub fn client_folders(tree: &dyn RemoteTree, container: &Folder) -> Result<Vec<Folder>> {
    let folders = tree
        .children(container)?
        .into_iter()
        .filter_map(|node| match node {
            Node::Folder(f) => Some(f),
            Node::File { name, .. } => {
                debug!(file = %name, "ignoring loose file in backups container");
                None
            }
        })
        .collect();

    Ok(folders)
}

pub(crate) fn container_not_found(name: &str) -> Error {
    Error::NotFound(format!("backups container '{name}' not present in drive root"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    #[test]
    fn lists_nested_files_with_paths() {
        let drive = MemoryDrive::new()
            .file("Backups/ACME/top.zip", ts(10))
            .file("Backups/ACME/2024/jan/a.rar", ts(20))
            .file("Backups/ACME/2024/b.gz", ts(30));

        let container = drive.root_container("Backups").unwrap();
        let client = &client_folders(&drive, &container).unwrap()[0];
        let files = list_all_files(&drive, client).unwrap();

        let paths: Vec<_> = files.iter().map(|f| f.path.as_str()).collect();
        assert_eq!(paths, vec!["ACME/top.zip", "ACME/2024/b.gz", "ACME/2024/jan/a.rar"]);
    }

    #[test]
    fn empty_folder_yields_no_files() {
        let drive = MemoryDrive::new().folder("Backups/EMPTY/nested/deeper");
        let container = drive.root_container("Backups").unwrap();
        let client = &client_folders(&drive, &container).unwrap()[0];

        assert!(list_all_files(&drive, client).unwrap().is_empty());
    }

    #[test]
    fn deep_trees_do_not_recurse() {
        let mut path = String::from("Backups/DEEP");
        for i in 0..1_000 {
            path.push_str(&format!("/d{i}"));
        }
        path.push_str("/leaf.zip");
        let drive = MemoryDrive::new().file(&path, ts(1));

        let container = drive.root_container("Backups").unwrap();
        let client = &client_folders(&drive, &container).unwrap()[0];
        let files = list_all_files(&drive, client).unwrap();

        assert_eq!(files.len(), 1);
        assert_eq!(files[0].name, "leaf.zip");
    }

    #[test]
    fn loose_files_in_container_are_not_clients() {
        let drive = MemoryDrive::new()
            .file("Backups/readme.txt", ts(1))
            .folder("Backups/ACME");

        let container = drive.root_container("Backups").unwrap();
        let clients = client_folders(&drive, &container).unwrap();

        assert_eq!(clients.len(), 1);
        assert_eq!(clients[0].name, "ACME");
    }

    #[test]
    fn missing_container_is_not_found() {
        let drive = MemoryDrive::new().folder("Other");
        assert!(matches!(drive.root_container("Backups"), Err(Error::NotFound(_))));
    }
}
