//! Reference classification.
//!
//! Each raw `uses` string is classified exactly once, when its document is
//! loaded, into a [`Reference`]. Later stages match on the variant instead of
//! re-inspecting string prefixes.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::core::config::HOME_PACKAGE_PREFIX;
use crate::core::errors::{ModuleError, Result};

/// Version tag meaning "whatever the registry currently publishes".
pub const LATEST_VERSION: &str = "latest";

/// The three reference grammars
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferenceKind {
    /// Relative or absolute filesystem path
    Local,
    /// Public registry package, `selefra/<name>[@version]`
    HomePackage,
    /// Organization package, `<host>/<org>/<name>[@version]`
    OrgPackage,
}

/// Where a remote package comes from
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PackageOrigin {
    /// Public registry
    Home,
    /// Organization-scoped cloud registry
    Org {
        /// Organization name
        org: String,
    },
}

impl PackageOrigin {
    /// `<registry>/<name>` identifier used in logs and errors
    pub fn package_id(&self, name: &str) -> String {
        match self {
            Self::Home => format!("{HOME_PACKAGE_PREFIX}/{name}"),
            Self::Org { org } => format!("{org}/{name}"),
        }
    }
}

/// A remote package named by a reference
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PackageSpec {
    /// Registry the package is fetched from
    pub origin: PackageOrigin,
    /// Package name, also the cache directory name
    pub name: String,
    /// Pinned version; `None` tracks the latest release
    pub version: Option<String>,
    /// Path inside the package the reference points at
    pub subpath: PathBuf,
}

impl PackageSpec {
    /// Identifier used in logs and errors
    pub fn id(&self) -> String {
        self.origin.package_id(&self.name)
    }
}

/// A classified `uses` entry
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Reference {
    /// Filesystem path, relative to the declaring document unless absolute
    Local {
        /// Raw reference string
        raw: String,
        /// Path as written
        path: PathBuf,
    },
    /// Remote package resolved through the package cache
    Package {
        /// Raw reference string
        raw: String,
        /// Parsed package coordinates
        spec: PackageSpec,
    },
}

impl Reference {
    /// Classify a raw reference declared in `document`.
    ///
    /// `org_host` is the host prefix that marks organization packages.
    pub fn parse(raw: &str, org_host: &str, document: &Path) -> Result<Self> {
        let malformed = |reason: &str| ModuleError::reference_malformed(raw, document, reason);

        if raw.trim().is_empty() {
            return Err(malformed("reference is empty"));
        }

        let segments: Vec<&str> = raw.split('/').collect();
        match segments[0] {
            HOME_PACKAGE_PREFIX => {
                let (name, version) = split_name_version(segments.get(1).copied())
                    .map_err(|reason| malformed(reason))?;
                Ok(Self::Package {
                    raw: raw.to_string(),
                    spec: PackageSpec {
                        origin: PackageOrigin::Home,
                        name,
                        version,
                        subpath: join_segments(&segments[2..]),
                    },
                })
            }
            host if host == org_host => {
                let org = segments
                    .get(1)
                    .filter(|org| !org.is_empty())
                    .ok_or_else(|| malformed("missing organization name"))?;
                let (name, version) = split_name_version(segments.get(2).copied())
                    .map_err(|reason| malformed(reason))?;
                Ok(Self::Package {
                    raw: raw.to_string(),
                    spec: PackageSpec {
                        origin: PackageOrigin::Org {
                            org: (*org).to_string(),
                        },
                        name,
                        version,
                        subpath: join_segments(&segments[3..]),
                    },
                })
            }
            _ => Ok(Self::Local {
                raw: raw.to_string(),
                path: PathBuf::from(raw),
            }),
        }
    }

    /// The raw reference string as written in the document
    pub fn raw(&self) -> &str {
        match self {
            Self::Local { raw, .. } | Self::Package { raw, .. } => raw,
        }
    }

    /// Grammar this reference was written in
    pub fn kind(&self) -> ReferenceKind {
        match self {
            Self::Local { .. } => ReferenceKind::Local,
            Self::Package { spec, .. } => match spec.origin {
                PackageOrigin::Home => ReferenceKind::HomePackage,
                PackageOrigin::Org { .. } => ReferenceKind::OrgPackage,
            },
        }
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.raw())
    }
}

fn split_name_version(
    segment: Option<&str>,
) -> std::result::Result<(String, Option<String>), &'static str> {
    let segment = segment.unwrap_or_default();
    let (name, version) = match segment.split_once('@') {
        Some((name, version)) => (name, Some(version)),
        None => (segment, None),
    };

    if name.is_empty() {
        return Err("missing package name");
    }

    let version = match version {
        Some("") => return Err("empty version after '@'"),
        Some(LATEST_VERSION) | None => None,
        Some(version) => Some(version.to_string()),
    };

    Ok((name.to_string(), version))
}

fn join_segments(segments: &[&str]) -> PathBuf {
    segments
        .iter()
        .filter(|segment| !segment.is_empty())
        .collect()
}
