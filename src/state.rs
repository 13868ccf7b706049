use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

#[derive(Debug, Default, Serialize, Deserialize)]
struct StateFile {
    #[serde(default)]
    processed_pages: HashMap<String, bool>,
}

/// Durable record of which pages have completed migration. The set only
/// grows during a run; `clear` is the one way to shrink it. Access is
/// mutex-guarded so the tracker stays safe if a concurrent caller ever
/// shows up, even though the orchestrator is strictly sequential.
pub struct State {
    path: PathBuf,
    processed: Mutex<HashMap<String, bool>>,
}

impl State {
    /// Load from `path`; a missing file is an empty set, not an error.
    pub fn load(path: &Path) -> Result<Self> {
        let processed = if path.exists() {
            let data = std::fs::read_to_string(path)
                .map_err(|e| Error::StateIo(format!("failed to read {}: {e}", path.display())))?;
            let file: StateFile = serde_json::from_str(&data)
                .map_err(|e| Error::StateIo(format!("failed to parse {}: {e}", path.display())))?;
            file.processed_pages
        } else {
            HashMap::new()
        };

        Ok(Self {
            path: path.to_path_buf(),
            processed: Mutex::new(processed),
        })
    }

    pub fn is_processed(&self, page_id: &str) -> bool {
        self.processed
            .lock()
            .expect("state mutex poisoned")
            .get(page_id)
            .copied()
            .unwrap_or(false)
    }

    pub fn mark_processed(&self, page_id: &str) {
        self.processed
            .lock()
            .expect("state mutex poisoned")
            .insert(page_id.to_string(), true);
    }

    /// Persist the full set: serialize, write a sibling temp file, rename
    /// over the target. Called after every `mark_processed` so a crash
    /// between pages loses at most the page in flight.
    pub fn save(&self) -> Result<()> {
        let file = StateFile {
            processed_pages: self.processed.lock().expect("state mutex poisoned").clone(),
        };
        let data = serde_json::to_string_pretty(&file)
            .map_err(|e| Error::StateIo(format!("failed to serialize state: {e}")))?;

        if let Some(dir) = self.path.parent() {
            std::fs::create_dir_all(dir)
                .map_err(|e| Error::StateIo(format!("failed to create {}: {e}", dir.display())))?;
        }

        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, data)
            .map_err(|e| Error::StateIo(format!("failed to write {}: {e}", tmp.display())))?;
        std::fs::rename(&tmp, &self.path)
            .map_err(|e| Error::StateIo(format!("failed to replace {}: {e}", self.path.display())))?;
        Ok(())
    }

    /// Empty the in-memory set and remove the durable record. Idempotent:
    /// a missing file is fine.
    pub fn clear(&self) -> Result<()> {
        self.processed.lock().expect("state mutex poisoned").clear();
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::StateIo(format!(
                "failed to remove {}: {e}",
                self.path.display()
            ))),
        }
    }
}
