//! Remote package collaborators.
//!
//! The resolver never talks to the network directly. It asks a
//! [`VersionRegistry`] for the latest published version of a public package
//! and a [`PackageFetcher`] to download and unpack a package into the home
//! cache. [`http`] provides the production implementations; tests plug in
//! in-memory fakes.

pub mod http;

use std::path::PathBuf;

use async_trait::async_trait;

use crate::core::errors::Result;
use crate::modules::reference::PackageOrigin;

pub use http::{HttpPackageFetcher, HttpVersionRegistry};

/// Everything a fetcher needs to install one package
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    /// Registry the package comes from
    pub origin: PackageOrigin,
    /// Package name
    pub name: String,
    /// Concrete version to install (`latest` for unpinned org packages)
    pub version: String,
    /// Login token, required for organization packages
    pub token: Option<String>,
    /// Cache directory holding all unpacked packages
    pub modules_dir: PathBuf,
}

impl FetchRequest {
    /// Directory the package is expected to occupy once unpacked
    pub fn package_dir(&self) -> PathBuf {
        self.modules_dir.join(&self.name)
    }

    /// Identifier used in logs and errors
    pub fn package_id(&self) -> String {
        self.origin.package_id(&self.name)
    }
}

/// Downloads and unpacks packages into the home cache
#[async_trait]
pub trait PackageFetcher: Send + Sync {
    /// Install the requested package and return its local directory
    async fn fetch(&self, request: &FetchRequest) -> Result<PathBuf>;
}

/// Registry metadata lookups
#[async_trait]
pub trait VersionRegistry: Send + Sync {
    /// Latest published version of a public package
    async fn latest_version(&self, package: &str) -> Result<String>;
}
