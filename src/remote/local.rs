//! Drive provider over a locally mounted or synced copy of the cloud drive.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tracing::{debug, info};
use walkdir::WalkDir;

use super::{container_not_found, Folder, Node, RemoteTree};
use crate::error::{Error, Result};

/// Session on a drive directory. Folder keys are absolute paths.
#[derive(Debug)]
pub struct LocalDrive {
    root: PathBuf,
}

impl LocalDrive {
    pub fn connect(root: &Path) -> Result<Self> {
        info!(root = %root.display(), "connecting to drive");

        match std::fs::metadata(root) {
            Ok(meta) if meta.is_dir() => {}
            Ok(_) => {
                return Err(Error::Connection(format!(
                    "drive root {} is not a directory",
                    root.display()
                )))
            }
            Err(e) if e.kind() == ErrorKind::PermissionDenied => {
                return Err(Error::Auth(format!("access to {} denied", root.display())))
            }
            Err(e) => {
                return Err(Error::Connection(format!(
                    "drive root {} unavailable: {e}",
                    root.display()
                )))
            }
        }

        // listing the root is what actually proves we can read the drive
        std::fs::read_dir(root).map_err(|e| match e.kind() {
            ErrorKind::PermissionDenied => {
                Error::Auth(format!("access to {} denied", root.display()))
            }
            _ => Error::Connection(format!("cannot list drive root {}: {e}", root.display())),
        })?;

        Ok(LocalDrive { root: root.to_path_buf() })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn ensure_mounted(&self) -> Result<()> {
        if self.root.is_dir() {
            Ok(())
        } else {
            Err(Error::Connection(format!(
                "drive root {} is no longer reachable",
                self.root.display()
            )))
        }
    }

    fn list(&self, dir: &Path) -> Result<Vec<Node>> {
        let mut nodes = Vec::new();

        let walker = WalkDir::new(dir)
            .min_depth(1)
            .max_depth(1)
            .follow_links(false)
            .sort_by_file_name();

        for entry in walker {
            let entry = entry.map_err(std::io::Error::from)?;

            let Some(name) = entry.file_name().to_str().map(str::to_string) else {
                debug!(path = %entry.path().display(), "skipping entry with non-utf8 name");
                continue;
            };

            if entry.file_type().is_dir() {
                nodes.push(Node::Folder(Folder {
                    name,
                    key: entry.path().to_string_lossy().into_owned(),
                }));
            } else if entry.file_type().is_file() {
                let modified = entry.metadata().map_err(std::io::Error::from)?.modified()?;

                nodes.push(Node::File {
                    name,
                    modified: DateTime::<Utc>::from(modified),
                });
            }
        }

        Ok(nodes)
    }
}

impl RemoteTree for LocalDrive {
    fn root_container(&self, name: &str) -> Result<Folder> {
        self.ensure_mounted()?;

        self.list(&self.root)?
            .into_iter()
            .find_map(|node| match node {
                Node::Folder(f) if f.name == name => Some(f),
                _ => None,
            })
            .ok_or_else(|| container_not_found(name))
    }

    fn children(&self, folder: &Folder) -> Result<Vec<Node>> {
        self.ensure_mounted()?;
        self.list(Path::new(&folder.key))
    }
}
