//! Reference resolution.
//!
//! Turns a classified [`Reference`] into an existing filesystem location.
//! Local paths resolve against the declaring document's directory. Package
//! references resolve into the home cache, calling the fetch collaborator
//! according to two policies:
//!
//! * public packages are fetched only when the cache is missing or records a
//!   different version than the one wanted (the pinned version, or the latest
//!   registry version looked up at most once per package per run);
//! * organization packages are always evicted and re-fetched, once per run,
//!   and require a login token.
//!
//! The cache holds one directory per package name, so a fetch for one
//! organization invalidates what the run fetched for another under the
//! same name.
//!
//! A resolver instance is scoped to one resolution run, so the latest-version
//! memo never outlives it.

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info};

use crate::core::errors::{ModuleError, Result};
use crate::core::home::SelefraHome;
use crate::modules::document::document_dir;
use crate::modules::reference::{PackageOrigin, PackageSpec, Reference, LATEST_VERSION};
use crate::registry::{FetchRequest, PackageFetcher, VersionRegistry};

/// Where a reference points after resolution
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResolvedTarget {
    /// Canonical filesystem path
    pub path: PathBuf,
    /// Whether the path is a directory
    pub is_dir: bool,
}

/// Run-scoped reference resolver
pub struct ReferenceResolver {
    home: SelefraHome,
    token: Option<String>,
    fetcher: Arc<dyn PackageFetcher>,
    registry: Arc<dyn VersionRegistry>,
    latest_versions: HashMap<String, String>,
    /// Cache directory name -> (package id, directory) fetched this run
    refreshed_org_packages: HashMap<String, (String, PathBuf)>,
}

impl ReferenceResolver {
    /// Create a resolver for one resolution run
    pub fn new(
        home: SelefraHome,
        token: Option<String>,
        fetcher: Arc<dyn PackageFetcher>,
        registry: Arc<dyn VersionRegistry>,
    ) -> Self {
        Self {
            home,
            token,
            fetcher,
            registry,
            latest_versions: HashMap::new(),
            refreshed_org_packages: HashMap::new(),
        }
    }

    /// Resolve `reference`, declared in `document`, to an existing path
    pub async fn resolve(&mut self, reference: &Reference, document: &Path) -> Result<ResolvedTarget> {
        let location = match reference {
            Reference::Local { path, .. } => {
                if path.is_absolute() {
                    path.clone()
                } else {
                    document_dir(document).join(path)
                }
            }
            Reference::Package { spec, .. } => {
                let root = match &spec.origin {
                    PackageOrigin::Home => self.ensure_public_package(spec).await?,
                    PackageOrigin::Org { .. } => {
                        self.refresh_org_package(spec, reference, document).await?
                    }
                };
                root.join(&spec.subpath)
            }
        };

        let target = canonical_target(&location).map_err(|err| {
            if err.kind() == io::ErrorKind::NotFound {
                ModuleError::NotFound {
                    reference: reference.raw().to_string(),
                    document: document.to_path_buf(),
                    path: location.clone(),
                }
            } else {
                ModuleError::io(format!("Failed to resolve '{reference}' in {}", document.display()), err)
            }
        })?;

        debug!("Resolved '{}' -> {}", reference, target.path.display());
        Ok(target)
    }

    async fn ensure_public_package(&mut self, spec: &PackageSpec) -> Result<PathBuf> {
        let cache_dir = self.home.package_dir(&spec.name);
        let wanted = match &spec.version {
            Some(version) => version.clone(),
            None => self.latest_version(&spec.name).await?,
        };

        let recorded = self.home.recorded_version(&spec.name)?;
        if cache_dir.is_dir() && recorded.as_deref() == Some(wanted.as_str()) {
            debug!("Using cached {} {}", spec.id(), wanted);
            return Ok(cache_dir);
        }

        info!(
            "Fetching {} {} (cached: {})",
            spec.id(),
            wanted,
            recorded.as_deref().unwrap_or("none")
        );
        self.home.evict_package(&spec.name)?;
        self.refreshed_org_packages.remove(&spec.name);
        let request = FetchRequest {
            origin: PackageOrigin::Home,
            name: spec.name.clone(),
            version: wanted.clone(),
            token: self.token.clone(),
            modules_dir: self.home.modules_dir(),
        };
        let dir = self.fetcher.fetch(&request).await?;
        self.home.record_version(&spec.name, &wanted)?;
        Ok(dir)
    }

    async fn refresh_org_package(
        &mut self,
        spec: &PackageSpec,
        reference: &Reference,
        document: &Path,
    ) -> Result<PathBuf> {
        let Some(token) = self.token.clone() else {
            return Err(ModuleError::Unauthenticated {
                reference: reference.raw().to_string(),
                document: document.to_path_buf(),
            });
        };

        let id = spec.id();
        if let Some((fetched, dir)) = self.refreshed_org_packages.get(&spec.name) {
            if *fetched == id {
                return Ok(dir.clone());
            }
            debug!("{} replaces {} in the package cache", id, fetched);
        }

        info!("Fetching {} (organization packages are always refreshed)", id);
        self.home.evict_package(&spec.name)?;
        let request = FetchRequest {
            origin: spec.origin.clone(),
            name: spec.name.clone(),
            version: spec
                .version
                .clone()
                .unwrap_or_else(|| LATEST_VERSION.to_string()),
            token: Some(token),
            modules_dir: self.home.modules_dir(),
        };
        let dir = self.fetcher.fetch(&request).await?;
        self.refreshed_org_packages
            .insert(spec.name.clone(), (id, dir.clone()));
        Ok(dir)
    }

    async fn latest_version(&mut self, package: &str) -> Result<String> {
        if let Some(version) = self.latest_versions.get(package) {
            return Ok(version.clone());
        }
        let version = self.registry.latest_version(package).await?;
        debug!("Latest version of {} is {}", package, version);
        self.latest_versions
            .insert(package.to_string(), version.clone());
        Ok(version)
    }
}

fn canonical_target(location: &Path) -> io::Result<ResolvedTarget> {
    let path = std::fs::canonicalize(location)?;
    let is_dir = std::fs::metadata(&path)?.is_dir();
    Ok(ResolvedTarget { path, is_dir })
}
