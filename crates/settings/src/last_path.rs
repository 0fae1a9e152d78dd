//! Persistence of the last opened project directory.
//!
//! Stored as a single line in `~/.config/pdesk/last_path.txt`.

use anyhow::{Context as _, Result};
use std::path::{Path, PathBuf};

/// Read the last project path. `None` when unset, unreadable, or gone.
pub fn load_last_path() -> Option<PathBuf> {
    load_last_path_from(&pdesk_paths::last_path_file())
}

pub fn load_last_path_from(file: &Path) -> Option<PathBuf> {
    let content = match std::fs::read_to_string(file) {
        Ok(content) => content,
        Err(e) => {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!("Failed to read last path: {}", e);
            }
            return None;
        }
    };

    let trimmed = content.trim();
    if trimmed.is_empty() {
        return None;
    }

    let path = PathBuf::from(trimmed);
    if !path.is_dir() {
        tracing::debug!("Last path {:?} no longer exists", path);
        return None;
    }
    Some(path)
}

/// Remember `project` as the last opened directory.
pub fn save_last_path(project: &Path) -> Result<()> {
    save_last_path_to(&pdesk_paths::last_path_file(), project)
}

pub fn save_last_path_to(file: &Path, project: &Path) -> Result<()> {
    if let Some(parent) = file.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating {}", parent.display()))?;
    }
    std::fs::write(file, project.to_string_lossy().as_bytes())
        .with_context(|| format!("writing {}", file.display()))?;
    tracing::debug!("Saved last path {:?}", project);
    Ok(())
}
