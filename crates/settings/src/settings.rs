//! Configuration system for pdesk.
//!
//! Provides compile-time constants, TOML config file support and the
//! last-used project folder store.

pub mod constants;
pub mod file;
pub mod last_path;

pub use file::{config_path, ensure_config_file, load_config, load_config_from, Config, TimingConfig};
pub use last_path::{load_last_path, load_last_path_from, save_last_path, save_last_path_to};
