//! Where pdesk keeps its files.
//!
//! Everything lives in one config directory, resolved on first use. Pass
//! `--config-dir` to move it; the override only works before anything reads
//! the directory.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

const APP_DIR: &str = "pdesk";

static CONFIG_DIR: OnceLock<PathBuf> = OnceLock::new();

fn default_config_dir() -> PathBuf {
    dirs::config_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
}

/// `~/.config/pdesk` on Linux, the platform config folder elsewhere.
pub fn config_dir() -> &'static Path {
    CONFIG_DIR.get_or_init(default_config_dir)
}

/// Redirect the config directory. Returns false once it has been read.
pub fn set_config_dir(path: PathBuf) -> bool {
    CONFIG_DIR.set(path).is_ok()
}

pub fn config_file() -> PathBuf {
    config_dir().join("config.toml")
}

/// Holds the project folder opened last.
pub fn last_path_file() -> PathBuf {
    config_dir().join("last_path.txt")
}
