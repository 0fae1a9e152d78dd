//! Project folder access used by sidebar actions.

use anyhow::{Context as _, Result};
use std::path::{Path, PathBuf};

/// One entry of a directory listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub name: String,
    pub is_directory: bool,
    pub is_file: bool,
}

/// File operations on the open project.
#[cfg_attr(test, mockall::automock)]
pub trait ProjectFiles: Send + Sync {
    fn read_directory(&self, dir: &Path) -> Result<Vec<DirEntry>>;
    fn read_file(&self, path: &Path) -> Result<String>;
    fn write_file(&self, path: &Path, content: &str) -> Result<()>;
    fn delete_file(&self, path: &Path) -> Result<()>;
    fn delete_folder(&self, path: &Path) -> Result<()>;

    /// Folder the terminals start in: the last used one if it still exists.
    fn default_project_path(&self) -> PathBuf;

    /// Remember `dir` for the next launch.
    fn save_current_path(&self, dir: &Path) -> Result<()>;
}

/// [`ProjectFiles`] on the local filesystem.
#[derive(Debug, Clone)]
pub struct LocalProject {
    last_path_file: PathBuf,
    fallback: PathBuf,
}

impl LocalProject {
    /// `fallback` is used when no usable last path was saved.
    pub fn new(last_path_file: impl Into<PathBuf>, fallback: impl Into<PathBuf>) -> Self {
        Self {
            last_path_file: last_path_file.into(),
            fallback: fallback.into(),
        }
    }

    /// Project store backed by the per-user last-path file.
    pub fn for_user(fallback: impl Into<PathBuf>) -> Self {
        Self::new(pdesk_paths::last_path_file(), fallback)
    }
}

impl ProjectFiles for LocalProject {
    fn read_directory(&self, dir: &Path) -> Result<Vec<DirEntry>> {
        let reader =
            std::fs::read_dir(dir).with_context(|| format!("Failed to list {}", dir.display()))?;
        let mut entries = Vec::new();
        for entry in reader {
            let entry = entry.with_context(|| format!("Failed to list {}", dir.display()))?;
            let file_type = entry.file_type()?;
            entries.push(DirEntry {
                name: entry.file_name().to_string_lossy().into_owned(),
                is_directory: file_type.is_dir(),
                is_file: file_type.is_file(),
            });
        }
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    fn read_file(&self, path: &Path) -> Result<String> {
        std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))
    }

    fn write_file(&self, path: &Path, content: &str) -> Result<()> {
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        tracing::debug!(path = %path.display(), bytes = content.len(), "Wrote file");
        Ok(())
    }

    fn delete_file(&self, path: &Path) -> Result<()> {
        std::fs::remove_file(path)
            .with_context(|| format!("Failed to delete {}", path.display()))?;
        tracing::info!(path = %path.display(), "Deleted file");
        Ok(())
    }

    fn delete_folder(&self, path: &Path) -> Result<()> {
        std::fs::remove_dir_all(path)
            .with_context(|| format!("Failed to delete {}", path.display()))?;
        tracing::info!(path = %path.display(), "Deleted folder");
        Ok(())
    }

    fn default_project_path(&self) -> PathBuf {
        settings::load_last_path_from(&self.last_path_file).unwrap_or_else(|| self.fallback.clone())
    }

    fn save_current_path(&self, dir: &Path) -> Result<()> {
        settings::save_last_path_to(&self.last_path_file, dir)
    }
}
