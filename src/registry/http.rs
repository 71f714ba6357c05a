//! HTTP implementations of the registry collaborators.
//!
//! Public packages are described by two YAML files in the registry
//! repository:
//!
//! ```text
//! <metadata_url>/main/module/<name>/metadata.yaml              latest-version, versions
//! <metadata_url>/main/module/<name>/<version>/supplement.yaml  source, checksums
//! ```
//!
//! The archive itself lives at `<source>/releases/download/<version>/<name>.zip`
//! and carries its own `<name>/` root. Organization packages are served by
//! the cloud API as a flat archive unpacked into `<modules_dir>/<name>`.

use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, info};

use crate::core::config::RegistryConfig;
use crate::core::errors::{IoResultExt, ModuleError, Result};
use crate::modules::reference::PackageOrigin;
use crate::registry::{FetchRequest, PackageFetcher, VersionRegistry};

/// `metadata.yaml` of a public package
#[derive(Debug, Clone, Deserialize)]
pub struct ModuleMetadata {
    /// Package name
    #[serde(default)]
    pub name: String,
    /// Most recent release
    #[serde(rename = "latest-version")]
    pub latest_version: String,
    /// Release date of the most recent version
    #[serde(rename = "latest-update", default)]
    pub latest_update: String,
    /// Short description
    #[serde(default)]
    pub introduction: String,
    /// All published versions
    #[serde(default)]
    pub versions: Vec<String>,
}

/// `supplement.yaml` of one public package release
#[derive(Debug, Clone, Deserialize)]
pub struct ModuleSupplement {
    /// Archive name
    #[serde(rename = "package-name", default)]
    pub package_name: String,
    /// Repository URL hosting the release archives
    pub source: String,
    /// Archive checksums
    #[serde(default)]
    pub checksums: String,
}

fn build_client(config: &RegistryConfig) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs))
        .build()
        .map_err(|err| ModuleError::config(format!("Failed to build HTTP client: {err}")))
}

fn metadata_url(base: &str, package: &str) -> String {
    format!("{}/main/module/{package}/metadata.yaml", base.trim_end_matches('/'))
}

fn supplement_url(base: &str, package: &str, version: &str) -> String {
    format!(
        "{}/main/module/{package}/{version}/supplement.yaml",
        base.trim_end_matches('/')
    )
}

fn release_archive_url(source: &str, package: &str, version: &str) -> String {
    format!(
        "{}/releases/download/{version}/{package}.zip",
        source.trim_end_matches('/')
    )
}

fn org_archive_url(cloud_host: &str, org: &str, token: &str, package: &str) -> String {
    format!("https://{cloud_host}/cli/download/{org}/{token}/{package}.zip")
}

async fn download(client: &reqwest::Client, url: &str, package: &str) -> Result<Vec<u8>> {
    let response = client
        .get(url)
        .send()
        .await
        .map_err(|err| ModuleError::fetch_with_source(package, err))?;

    if !response.status().is_success() {
        return Err(ModuleError::fetch(
            package,
            format!("registry responded with {}", response.status()),
        ));
    }

    let bytes = response
        .bytes()
        .await
        .map_err(|err| ModuleError::fetch_with_source(package, err))?;
    Ok(bytes.to_vec())
}

async fn get_yaml<T: DeserializeOwned>(client: &reqwest::Client, url: &str, package: &str) -> Result<T> {
    let body = download(client, url, package).await?;
    serde_yaml::from_slice(&body).map_err(|err| ModuleError::fetch_with_source(package, err))
}

/// Unpack a zip archive into `destination`
pub fn extract_archive(bytes: &[u8], destination: &Path, package: &str) -> Result<()> {
    std::fs::create_dir_all(destination)
        .io_context(|| format!("Failed to create {}", destination.display()))?;
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes))
        .map_err(|err| ModuleError::fetch_with_source(package, err))?;
    debug!(
        "Extracting {} entries of {} into {}",
        archive.len(),
        package,
        destination.display()
    );
    archive
        .extract(destination)
        .map_err(|err| ModuleError::fetch_with_source(package, err))
}

/// Looks up latest versions in the public registry repository
#[derive(Debug, Clone)]
pub struct HttpVersionRegistry {
    client: reqwest::Client,
    metadata_url: String,
}

impl HttpVersionRegistry {
    /// Create a registry client from configuration
    pub fn new(config: &RegistryConfig) -> Result<Self> {
        Ok(Self {
            client: build_client(config)?,
            metadata_url: config.metadata_url.clone(),
        })
    }

    /// Fetch the full metadata document of a package
    pub async fn metadata(&self, package: &str) -> Result<ModuleMetadata> {
        get_yaml(&self.client, &metadata_url(&self.metadata_url, package), package).await
    }
}

#[async_trait]
impl VersionRegistry for HttpVersionRegistry {
    async fn latest_version(&self, package: &str) -> Result<String> {
        let metadata = self.metadata(package).await?;
        if metadata.latest_version.is_empty() {
            return Err(ModuleError::fetch(package, "registry metadata has no latest-version"));
        }
        Ok(metadata.latest_version)
    }
}

/// Downloads package archives over HTTP and unpacks them into the cache
#[derive(Debug, Clone)]
pub struct HttpPackageFetcher {
    client: reqwest::Client,
    metadata_url: String,
    cloud_host: String,
}

impl HttpPackageFetcher {
    /// Create a fetcher from configuration
    pub fn new(config: &RegistryConfig) -> Result<Self> {
        Ok(Self {
            client: build_client(config)?,
            metadata_url: config.metadata_url.clone(),
            cloud_host: config.cloud_host.clone(),
        })
    }
}

#[async_trait]
impl PackageFetcher for HttpPackageFetcher {
    async fn fetch(&self, request: &FetchRequest) -> Result<PathBuf> {
        let package = request.package_id();

        match &request.origin {
            PackageOrigin::Home => {
                let supplement: ModuleSupplement = get_yaml(
                    &self.client,
                    &supplement_url(&self.metadata_url, &request.name, &request.version),
                    &package,
                )
                .await?;
                let url = release_archive_url(&supplement.source, &request.name, &request.version);
                info!("Downloading {} {} from {}", package, request.version, url);
                let bytes = download(&self.client, &url, &package).await?;
                extract_archive(&bytes, &request.modules_dir, &package)?;
            }
            PackageOrigin::Org { org } => {
                let token = request
                    .token
                    .as_deref()
                    .ok_or_else(|| ModuleError::fetch(&package, "organization packages require a token"))?;
                // The URL embeds the token, so it is never logged
                info!("Downloading {} from {}", package, self.cloud_host);
                let url = org_archive_url(&self.cloud_host, org, token, &request.name);
                let bytes = download(&self.client, &url, &package).await?;
                extract_archive(&bytes, &request.package_dir(), &package)?;
            }
        }

        let dir = request.package_dir();
        if !dir.is_dir() {
            return Err(ModuleError::fetch(
                package,
                format!("archive did not unpack into {}", dir.display()),
            ));
        }
        Ok(dir)
    }
}
