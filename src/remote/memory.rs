//! In-memory drive used by tests and benchmarks.

use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, HashSet};

use chrono::{DateTime, Utc};

use super::{container_not_found, Folder, Node, RemoteTree};
use crate::error::{Error, Result};

#[derive(Debug, Default)]
struct Dir {
    dirs: BTreeMap<String, Dir>,
    files: BTreeMap<String, DateTime<Utc>>,
}

/// A drive built from slash separated paths.
///
/// Folder keys are their full path from the drive root.
#[derive(Debug, Default)]
pub struct MemoryDrive {
    root: Dir,
    failing: RefCell<HashSet<String>>,
    disconnected: Cell<bool>,
}

impl MemoryDrive {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a folder, creating any missing parents.
    pub fn folder(mut self, path: &str) -> Self {
        let mut dir = &mut self.root;
        for part in path.split('/').filter(|p| !p.is_empty()) {
            dir = dir.dirs.entry(part.to_string()).or_default();
        }
        self
    }

    /// Adds a file, creating any missing parent folders.
    pub fn file(mut self, path: &str, modified: DateTime<Utc>) -> Self {
        let mut parts: Vec<&str> = path.split('/').filter(|p| !p.is_empty()).collect();
        let Some(name) = parts.pop() else {
            return self;
        };

        let mut dir = &mut self.root;
        for part in parts {
            dir = dir.dirs.entry(part.to_string()).or_default();
        }
        dir.files.insert(name.to_string(), modified);
        self
    }

    /// Makes every listing of the folder at `path` fail with an I/O error.
    pub fn fail_listing(&self, path: &str) {
        self.failing.borrow_mut().insert(path.trim_matches('/').to_string());
    }

    /// Drops the session; every later call fails with a connection error.
    pub fn disconnect(&self) {
        self.disconnected.set(true);
    }

    fn check_session(&self) -> Result<()> {
        if self.disconnected.get() {
            return Err(Error::Connection("no active drive session".into()));
        }
        Ok(())
    }

    fn lookup(&self, key: &str) -> Option<&Dir> {
        key.split('/')
            .filter(|p| !p.is_empty())
            .try_fold(&self.root, |dir, part| dir.dirs.get(part))
    }
}

impl RemoteTree for MemoryDrive {
    fn root_container(&self, name: &str) -> Result<Folder> {
        self.check_session()?;

        if self.root.dirs.contains_key(name) {
            Ok(Folder { name: name.to_string(), key: name.to_string() })
        } else {
            Err(container_not_found(name))
        }
    }

    fn children(&self, folder: &Folder) -> Result<Vec<Node>> {
        self.check_session()?;

        if self.failing.borrow().contains(&folder.key) {
            return Err(Error::Io(std::io::Error::other(format!(
                "listing {} failed",
                folder.key
            ))));
        }

        let dir = self
            .lookup(&folder.key)
            .ok_or_else(|| Error::NotFound(format!("folder '{}'", folder.key)))?;

        let mut nodes: Vec<Node> = dir
            .dirs
            .keys()
            .map(|name| {
                Node::Folder(Folder {
                    name: name.clone(),
                    key: format!("{}/{name}", folder.key),
                })
            })
            .collect();

        nodes.extend(dir.files.iter().map(|(name, modified)| Node::File {
            name: name.clone(),
            modified: *modified,
        }));

        Ok(nodes)
    }
}
