//! Status file persistence.
//!
//! Loading never fails: a missing or unreadable file starts an empty store.
//! Saving writes a sibling temporary file, syncs it and renames it over the
//! target, so readers see either the old or the new document.

use std::io::Write;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info, warn};

use nwp_common::StatusStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Failed to serialize status: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Failed to write status file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub struct StateStore {
    path: PathBuf,
}

impl StateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self.path.as_os_str().to_owned();
        name.push(".tmp");
        PathBuf::from(name)
    }

    /// Read the store. Missing or corrupt files yield an empty store.
    pub fn load(&self) -> StatusStore {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!(path = %self.path.display(), "No status file yet, starting empty");
                return StatusStore::new();
            }
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Unreadable status file, starting empty");
                return StatusStore::new();
            }
        };

        let mut store: StatusStore = match serde_json::from_str(&content) {
            Ok(store) => store,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Corrupt status file, starting empty");
                return StatusStore::new();
            }
        };

        for record in store.values_mut().flatten() {
            record.normalize();
        }
        debug!(models = store.len(), "Loaded status file");
        store
    }

    /// Atomically replace the status file.
    pub fn save(&self, store: &StatusStore) -> Result<(), StoreError> {
        let json = serde_json::to_vec_pretty(store)?;
        let tmp = self.tmp_path();

        if let Err(e) = self.write_and_rename(&tmp, &json) {
            let _ = std::fs::remove_file(&tmp);
            return Err(e);
        }

        info!(path = %self.path.display(), models = store.len(), "Saved status file");
        Ok(())
    }

    fn write_and_rename(&self, tmp: &Path, json: &[u8]) -> Result<(), StoreError> {
        let io_err = |path: &Path| {
            let path = path.to_path_buf();
            move |source: std::io::Error| StoreError::Io { path, source }
        };

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(io_err(parent))?;
        }

        let mut file = std::fs::File::create(tmp).map_err(io_err(tmp))?;
        file.write_all(json).map_err(io_err(tmp))?;
        file.write_all(b"\n").map_err(io_err(tmp))?;
        file.sync_all().map_err(io_err(tmp))?;
        drop(file);

        std::fs::rename(tmp, &self.path).map_err(io_err(&self.path))
    }
}
