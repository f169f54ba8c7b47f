use std::{
    fs,
    path::{Path, PathBuf},
};

use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::{error::StoreError, workspace::Workspace};

/// The persisted, ordered collection of workspaces.
///
/// Reads always go back to disk so external edits are picked up. Mutations
/// run inside [`WorkspaceStore::transact`], which holds the writer lock
/// across re-read, mutate and rewrite.
pub struct WorkspaceStore {
    path: PathBuf,
    writer: Mutex<()>,
}

impl WorkspaceStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            writer: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads the document. Missing or unreadable documents yield no workspaces.
    pub fn load(&self) -> Vec<Workspace> {
        match self.try_load() {
            Ok(list) => list,
            Err(err) => {
                warn!(path = %self.path.display(), error = %err, "workspace document unusable, starting empty");
                Vec::new()
            }
        }
    }

    fn try_load(&self) -> Result<Vec<Workspace>, StoreError> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => {
                return Err(StoreError::Io {
                    path: self.path.clone(),
                    source,
                });
            }
        };
        if content.trim().is_empty() {
            return Ok(Vec::new());
        }
        let mut list: Vec<Workspace> = serde_json::from_str(&content)?;
        for ws in &mut list {
            ws.shortcut_key = ws.shortcut_key.map(|key| key.to_ascii_lowercase());
        }
        Ok(list)
    }

    pub fn find(&self, name: &str) -> Option<Workspace> {
        self.load().into_iter().find(|w| w.name == name)
    }

    /// Re-reads the document, applies `f`, and writes the whole collection
    /// back when `f` succeeds. Nothing is written when `f` fails.
    pub fn transact<F, R, E>(&self, f: F) -> Result<R, E>
    where
        F: FnOnce(&mut Vec<Workspace>) -> Result<R, E>,
        E: From<StoreError>,
    {
        with_lock!(self.writer, |_guard| {
            let mut list = self.load();
            let result = f(&mut list)?;
            self.write(&list)?;
            Ok(result)
        })
    }

    fn write(&self, list: &[Workspace]) -> Result<(), StoreError> {
        let io_err = |source| StoreError::Io {
            path: self.path.clone(),
            source,
        };
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
        let content = serde_json::to_string_pretty(list)?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, content).map_err(io_err)?;
        fs::rename(&tmp, &self.path).map_err(io_err)?;
        debug!(path = %self.path.display(), count = list.len(), "workspaces written");
        Ok(())
    }
}
