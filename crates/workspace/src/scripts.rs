//! npm scripts of the open project.

use anyhow::{anyhow, Context as _, Result};
use collections::IndexMap;
use parking_lot::Mutex;
use serde_json::{json, Map, Value};
use std::path::{Path, PathBuf};

const PACKAGE_JSON: &str = "package.json";

/// Outcome of [`ScriptCatalog::ensure_package_json`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackageJsonStatus {
    Created,
    Existing,
}

/// Scripts runnable in the exec session.
#[cfg_attr(test, mockall::automock)]
pub trait ScriptCatalog: Send + Sync {
    /// Script name to command, in file order.
    fn list_scripts(&self) -> Result<IndexMap<String, String>>;
    fn delete_script(&self, name: &str) -> Result<()>;
    /// Write a default manifest when the project has none.
    fn ensure_package_json(&self) -> Result<PackageJsonStatus>;
    /// Switch to another project folder.
    fn open_project(&self, dir: &Path);
}

/// [`ScriptCatalog`] reading `<project>/package.json`.
#[derive(Debug)]
pub struct PackageJsonScripts {
    project: Mutex<PathBuf>,
}

impl PackageJsonScripts {
    pub fn new(project: impl Into<PathBuf>) -> Self {
        Self {
            project: Mutex::new(project.into()),
        }
    }

    pub fn project(&self) -> PathBuf {
        self.project.lock().clone()
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.project.lock().join(PACKAGE_JSON)
    }

    fn read_manifest(&self) -> Result<Map<String, Value>> {
        let path = self.manifest_path();
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        match serde_json::from_str(&content)
            .with_context(|| format!("Invalid JSON in {}", path.display()))?
        {
            Value::Object(manifest) => Ok(manifest),
            _ => Err(anyhow!("{} is not a JSON object", path.display())),
        }
    }

    fn write_manifest(&self, manifest: &Map<String, Value>) -> Result<()> {
        let path = self.manifest_path();
        let content = serde_json::to_string_pretty(manifest)?;
        std::fs::write(&path, content).with_context(|| format!("Failed to write {}", path.display()))
    }
}

/// Package name npm accepts, derived from the folder name.
fn package_name(project: &Path) -> String {
    let folder = project
        .file_name()
        .map(|name| name.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    let name: String = folder
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '-' })
        .collect();
    if name.is_empty() {
        "project".to_string()
    } else {
        name
    }
}

impl ScriptCatalog for PackageJsonScripts {
    fn list_scripts(&self) -> Result<IndexMap<String, String>> {
        let path = self.manifest_path();
        if !path.exists() {
            return Ok(collections::index_map());
        }
        let manifest = self.read_manifest()?;
        let mut scripts = collections::index_map();
        if let Some(Value::Object(entries)) = manifest.get("scripts") {
            for (name, command) in entries {
                match command.as_str() {
                    Some(command) => {
                        scripts.insert(name.clone(), command.to_string());
                    }
                    None => tracing::debug!(script = %name, "Skipping non-string script"),
                }
            }
        }
        Ok(scripts)
    }

    fn delete_script(&self, name: &str) -> Result<()> {
        let mut manifest = self.read_manifest()?;
        let removed = manifest
            .get_mut("scripts")
            .and_then(Value::as_object_mut)
            .and_then(|scripts| scripts.shift_remove(name));
        if removed.is_none() {
            return Err(anyhow!("Script {name:?} not found"));
        }
        self.write_manifest(&manifest)?;
        tracing::info!(script = %name, "Deleted npm script");
        Ok(())
    }

    fn ensure_package_json(&self) -> Result<PackageJsonStatus> {
        if self.manifest_path().exists() {
            return Ok(PackageJsonStatus::Existing);
        }
        let project = self.project();
        let manifest = json!({
            "name": package_name(&project),
            "version": "1.0.0",
            "description": "",
            "main": "index.js",
            "scripts": {
                "test": "echo \"Error: no test specified\" && exit 1"
            },
            "keywords": [],
            "author": "",
            "license": "ISC"
        });
        if let Value::Object(manifest) = manifest {
            self.write_manifest(&manifest)?;
        }
        tracing::info!(project = %project.display(), "Created package.json");
        Ok(PackageJsonStatus::Created)
    }

    fn open_project(&self, dir: &Path) {
        *self.project.lock() = dir.to_path_buf();
    }
}
