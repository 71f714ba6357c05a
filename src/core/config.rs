//! Configuration types for the module resolver.
//!
//! A single YAML file can pin the workspace, the home directory holding the
//! package cache, and the registry endpoints. Every field has a default so an
//! empty file (or no file at all) is a valid configuration.

use std::path::{Path, PathBuf};

use globset::{Glob, GlobSet, GlobSetBuilder};
use serde::{Deserialize, Serialize};

use crate::core::errors::{IoResultExt, ModuleError, Result};

/// Top-level section key marking a file as a module document.
pub const MODULES_SECTION: &str = "modules";

/// Prefix of public registry packages (`selefra/<name>`).
pub const HOME_PACKAGE_PREFIX: &str = "selefra";

/// Main configuration for a resolution run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    /// Workspace root scanned for module documents
    pub workspace: PathBuf,

    /// Home directory holding the package cache and credentials.
    /// Defaults to `~/.selefra`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub home: Option<PathBuf>,

    /// File extension of configuration documents (without the dot)
    pub extension: String,

    /// Glob patterns excluded from the workspace scan
    pub exclude_patterns: Vec<String>,

    /// Remote registry settings
    pub registry: RegistryConfig,

    /// Login token for organization packages
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            workspace: PathBuf::from("."),
            home: None,
            extension: "yaml".to_string(),
            exclude_patterns: vec!["**/.git/**".to_string()],
            registry: RegistryConfig::default(),
            token: None,
        }
    }
}

impl ResolverConfig {
    /// Create a configuration rooted at the given workspace
    pub fn for_workspace(workspace: impl Into<PathBuf>) -> Self {
        Self {
            workspace: workspace.into(),
            ..Self::default()
        }
    }

    /// Set an explicit home directory
    pub fn with_home(mut self, home: impl Into<PathBuf>) -> Self {
        self.home = Some(home.into());
        self
    }

    /// Set the login token
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Load configuration from a YAML file
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .io_context(|| format!("Failed to read config file: {}", path.display()))?;

        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(&content).map_err(Into::into)
    }

    /// Save configuration to a YAML file
    pub fn to_yaml_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let content = serde_yaml::to_string(self)?;
        std::fs::write(path, content)
            .io_context(|| format!("Failed to write config file: {}", path.display()))
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.extension.is_empty() || self.extension.starts_with('.') {
            return Err(ModuleError::config_field(
                "extension must be a bare extension such as 'yaml'",
                "extension",
            ));
        }

        self.exclude_globset()?;
        self.registry.validate()
    }

    /// Resolve the home directory, falling back to `~/.selefra`
    pub fn home_dir(&self) -> Result<PathBuf> {
        if let Some(home) = &self.home {
            return Ok(home.clone());
        }
        dirs::home_dir()
            .map(|home| home.join(".selefra"))
            .ok_or_else(|| ModuleError::config_field("cannot determine user home directory", "home"))
    }

    /// Compile the exclude patterns into a glob set
    pub fn exclude_globset(&self) -> Result<GlobSet> {
        let mut builder = GlobSetBuilder::new();
        for pattern in &self.exclude_patterns {
            let glob = Glob::new(pattern).map_err(|err| {
                ModuleError::config_field(
                    format!("invalid exclude pattern '{pattern}': {err}"),
                    "exclude_patterns",
                )
            })?;
            builder.add(glob);
        }
        builder.build().map_err(|err| {
            ModuleError::config_field(format!("invalid exclude patterns: {err}"), "exclude_patterns")
        })
    }
}

/// Remote registry endpoints
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Base URL of the public registry metadata repository
    pub metadata_url: String,

    /// Host prefix identifying organization package references
    pub org_host: String,

    /// Cloud API host serving organization package archives
    pub cloud_host: String,

    /// HTTP timeout for registry calls
    pub timeout_secs: u64,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            metadata_url: "https://raw.githubusercontent.com/selefra/registry".to_string(),
            org_host: "app.selefra.io".to_string(),
            cloud_host: "main-api.selefra.io".to_string(),
            timeout_secs: 60,
        }
    }
}

impl RegistryConfig {
    /// Validate registry settings
    pub fn validate(&self) -> Result<()> {
        if !self.metadata_url.starts_with("http://") && !self.metadata_url.starts_with("https://") {
            return Err(ModuleError::config_field(
                "metadata_url must be an http(s) URL",
                "registry.metadata_url",
            ));
        }

        if self.org_host.is_empty() || self.org_host.contains('/') {
            return Err(ModuleError::config_field(
                "org_host must be a bare host name",
                "registry.org_host",
            ));
        }

        if self.org_host == HOME_PACKAGE_PREFIX {
            return Err(ModuleError::config_field(
                "org_host must differ from the public package prefix",
                "registry.org_host",
            ));
        }

        if self.cloud_host.is_empty() {
            return Err(ModuleError::config_field(
                "cloud_host must not be empty",
                "registry.cloud_host",
            ));
        }

        if self.timeout_secs == 0 {
            return Err(ModuleError::config_field(
                "timeout_secs must be greater than 0",
                "registry.timeout_secs",
            ));
        }

        Ok(())
    }
}
