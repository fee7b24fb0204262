// ============================================
// Model Persistence
// ============================================
//
// The whole ModelState is one bincode blob. Writes go to a sibling temporary
// file that is renamed over the target; readers never see a partial model.

use super::model_state::ModelState;
use crate::error::Result;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

pub fn save(state: &ModelState, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let bytes = bincode::serialize(state)?;
    let tmp = temp_path(path);
    fs::write(&tmp, &bytes)?;
    fs::rename(&tmp, path)?;

    info!(
        path = %path.display(),
        bytes = bytes.len(),
        "Saved model state"
    );
    Ok(())
}

/// Restore a saved snapshot. A missing or unreadable file is treated as
/// "no model" and only logged.
pub fn load(path: &Path) -> Option<ModelState> {
    let data = match fs::read(path) {
        Ok(data) => data,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "No saved model state");
            return None;
        }
    };

    match bincode::deserialize::<ModelState>(&data) {
        Ok(state) => {
            info!(
                path = %path.display(),
                books = state.stats.total_books,
                ready = state.is_ready(),
                "Loaded model state"
            );
            Some(state)
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Saved model state is corrupt, ignoring");
            None
        }
    }
}
