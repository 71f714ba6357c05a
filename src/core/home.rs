//! Per-user home layout.
//!
//! ```text
//! ~/.selefra/
//!   credentials.json          {"token": "..."}
//!   .path/config.json         {"modules/<name>": "<installed version>", ...}
//!   download/modules/<name>/  unpacked package contents
//! ```
//!
//! The version manifest is shared with other tooling (provider binaries are
//! recorded in the same file), so updates preserve unrelated keys.

use std::fs;
use std::path::{Path, PathBuf};

use serde_json::{Map, Value};
use tracing::debug;

use crate::core::errors::{IoResultExt, ModuleError, Result};

const MANIFEST_DIR: &str = ".path";
const MANIFEST_FILE: &str = "config.json";
const CREDENTIALS_FILE: &str = "credentials.json";

/// Handle on the home directory and its package cache
#[derive(Debug, Clone)]
pub struct SelefraHome {
    root: PathBuf,
}

impl SelefraHome {
    /// Open the home directory, creating the expected layout if missing
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let home = Self { root: root.into() };

        let modules_dir = home.modules_dir();
        fs::create_dir_all(&modules_dir)
            .io_context(|| format!("Failed to create {}", modules_dir.display()))?;

        let manifest_dir = home.root.join(MANIFEST_DIR);
        fs::create_dir_all(&manifest_dir)
            .io_context(|| format!("Failed to create {}", manifest_dir.display()))?;

        let manifest = home.manifest_path();
        if !manifest.exists() {
            fs::write(&manifest, "{}")
                .io_context(|| format!("Failed to initialise {}", manifest.display()))?;
        }

        Ok(home)
    }

    /// Home root directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding unpacked packages
    pub fn modules_dir(&self) -> PathBuf {
        self.root.join("download").join("modules")
    }

    /// Cache directory of one package
    pub fn package_dir(&self, name: &str) -> PathBuf {
        self.modules_dir().join(name)
    }

    /// Path of the installed-version manifest
    pub fn manifest_path(&self) -> PathBuf {
        self.root.join(MANIFEST_DIR).join(MANIFEST_FILE)
    }

    /// Path of the credentials file
    pub fn credentials_path(&self) -> PathBuf {
        self.root.join(CREDENTIALS_FILE)
    }

    /// Version recorded for a cached public package
    pub fn recorded_version(&self, name: &str) -> Result<Option<String>> {
        let manifest = self.read_json(&self.manifest_path())?;
        Ok(manifest
            .get(&manifest_key(name))
            .and_then(Value::as_str)
            .map(str::to_string))
    }

    /// Record the installed version of a public package
    pub fn record_version(&self, name: &str, version: &str) -> Result<()> {
        let path = self.manifest_path();
        let mut manifest = self.read_json(&path)?;
        manifest.insert(manifest_key(name), Value::String(version.to_string()));

        let content = serde_json::to_string(&manifest)?;
        fs::write(&path, content).io_context(|| format!("Failed to write {}", path.display()))?;
        debug!("Recorded {} = {}", manifest_key(name), version);
        Ok(())
    }

    /// Remove a cached package directory if present
    pub fn evict_package(&self, name: &str) -> Result<()> {
        let dir = self.package_dir(name);
        if dir.exists() {
            debug!("Evicting cached package {}", dir.display());
            fs::remove_dir_all(&dir).io_context(|| format!("Failed to remove {}", dir.display()))?;
        }
        Ok(())
    }

    /// Login token stored by a previous `login`
    pub fn credentials_token(&self) -> Result<Option<String>> {
        let path = self.credentials_path();
        if !path.exists() {
            return Ok(None);
        }
        let credentials = self.read_json(&path)?;
        Ok(credentials
            .get("token")
            .and_then(Value::as_str)
            .filter(|token| !token.is_empty())
            .map(str::to_string))
    }

    fn read_json(&self, path: &Path) -> Result<Map<String, Value>> {
        let content =
            fs::read_to_string(path).io_context(|| format!("Failed to read {}", path.display()))?;
        if content.trim().is_empty() {
            return Ok(Map::new());
        }
        match serde_json::from_str::<Value>(&content)? {
            Value::Object(map) => Ok(map),
            _ => Err(ModuleError::config(format!(
                "{} must contain a JSON object",
                path.display()
            ))),
        }
    }
}

fn manifest_key(name: &str) -> String {
    format!("modules/{name}")
}
