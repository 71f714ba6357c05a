//! Workspace scanner.
//!
//! Walks the workspace and returns every file that carries a `modules`
//! section. A file that cannot be read or parsed is logged and skipped; the
//! scan never aborts because of one bad file. Results follow the walk order
//! (entries sorted by file name) so repeated runs see the same sequence.

use std::path::{Path, PathBuf};

use globset::GlobSet;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::core::config::ResolverConfig;
use crate::core::errors::{IoResultExt, ModuleError, Result};
use crate::modules::document::{ModuleDocument, RawModuleDocument};

/// Recursively discovers module documents under a workspace root
#[derive(Debug, Clone)]
pub struct WorkspaceScanner {
    extension: String,
    org_host: String,
    exclude: GlobSet,
}

impl WorkspaceScanner {
    /// Create a scanner from the resolver configuration
    pub fn new(config: &ResolverConfig) -> Result<Self> {
        Ok(Self {
            extension: config.extension.clone(),
            org_host: config.registry.org_host.clone(),
            exclude: config.exclude_globset()?,
        })
    }

    /// Scan `root` and return its module documents in walk order
    pub fn scan(&self, root: &Path) -> Result<Vec<ModuleDocument>> {
        let root = std::fs::canonicalize(root)
            .io_context(|| format!("Workspace does not exist: {}", root.display()))?;
        if !root.is_dir() {
            return Err(ModuleError::config_field(
                format!("workspace is not a directory: {}", root.display()),
                "workspace",
            ));
        }

        let mut documents = Vec::new();
        for path in self.candidate_files(&root) {
            let raw = match RawModuleDocument::read(&path) {
                Ok(Some(raw)) => raw,
                Ok(None) => {
                    debug!("No modules section in {}", path.display());
                    continue;
                }
                Err(err) => {
                    warn!("Skipping {}: {}", path.display(), err);
                    continue;
                }
            };
            documents.push(raw.classify(&self.org_host)?);
        }

        info!(
            "Workspace scan found {} module documents under {}",
            documents.len(),
            root.display()
        );
        Ok(documents)
    }

    /// Whether a path carries the configured document extension
    pub fn has_document_extension(&self, path: &Path) -> bool {
        has_extension(path, &self.extension)
    }

    fn candidate_files(&self, root: &Path) -> Vec<PathBuf> {
        let walker = WalkDir::new(root)
            .follow_links(true)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| !self.is_excluded(root, entry.path()));

        let mut files = Vec::new();
        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    warn!("Failed to walk workspace: {err}");
                    continue;
                }
            };

            if entry.file_type().is_file() && self.has_document_extension(entry.path()) {
                let path = std::fs::canonicalize(entry.path())
                    .unwrap_or_else(|_| entry.path().to_path_buf());
                files.push(path);
            }
        }
        files
    }

    fn is_excluded(&self, root: &Path, path: &Path) -> bool {
        let relative = path.strip_prefix(root).unwrap_or(path);
        if relative.as_os_str().is_empty() {
            return false;
        }
        // Match directories with a trailing separator so `dir/**` patterns prune them
        self.exclude.is_match(relative) || self.exclude.is_match(relative.join(""))
    }
}

/// Whether `path` ends in `.<extension>`
pub fn has_extension(path: &Path, extension: &str) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext == extension)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn scanner() -> WorkspaceScanner {
        WorkspaceScanner::new(&ResolverConfig::default()).unwrap()
    }

    fn names(documents: &[ModuleDocument], root: &Path) -> Vec<String> {
        documents
            .iter()
            .map(|doc| {
                doc.path
                    .strip_prefix(root)
                    .unwrap()
                    .to_string_lossy()
                    .into_owned()
            })
            .collect()
    }

    #[test]
    fn test_scan_recurses_and_filters() {
        let temp = TempDir::new().unwrap();
        let root = fs::canonicalize(temp.path()).unwrap();
        fs::create_dir_all(root.join("nested/deeper")).unwrap();
        fs::write(root.join("b.yaml"), "modules:\n  - name: b\n").unwrap();
        fs::write(root.join("a.yaml"), "modules:\n  - name: a\n").unwrap();
        fs::write(root.join("rules.yaml"), "rules:\n  - name: r\n").unwrap();
        fs::write(root.join("notes.txt"), "modules:\n  - name: ignored\n").unwrap();
        fs::write(root.join("nested/deeper/c.yaml"), "modules:\n  - name: c\n").unwrap();

        let documents = scanner().scan(&root).unwrap();
        assert_eq!(
            names(&documents, &root),
            vec!["a.yaml", "b.yaml", "nested/deeper/c.yaml"]
        );
    }

    #[test]
    fn test_scan_skips_unparseable_files() {
        let temp = TempDir::new().unwrap();
        let root = fs::canonicalize(temp.path()).unwrap();
        fs::write(root.join("broken.yaml"), "modules: [unclosed").unwrap();
        fs::write(root.join("shape.yaml"), "modules:\n  - uses: [x]\n").unwrap();
        fs::write(root.join("good.yaml"), "modules:\n  - name: good\n").unwrap();

        let documents = scanner().scan(&root).unwrap();
        assert_eq!(names(&documents, &root), vec!["good.yaml"]);
    }

    #[test]
    fn test_scan_aborts_on_malformed_reference() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("m.yaml"), "modules:\n  - name: m\n    uses: ['selefra/']\n").unwrap();

        let err = scanner().scan(temp.path()).unwrap_err();
        assert!(matches!(err, ModuleError::ReferenceMalformed { .. }));
    }

    #[test]
    fn test_scan_respects_excludes() {
        let temp = TempDir::new().unwrap();
        let root = fs::canonicalize(temp.path()).unwrap();
        fs::create_dir_all(root.join(".git")).unwrap();
        fs::create_dir_all(root.join("vendor")).unwrap();
        fs::write(root.join(".git/m.yaml"), "modules:\n  - name: git\n").unwrap();
        fs::write(root.join("vendor/m.yaml"), "modules:\n  - name: vendor\n").unwrap();
        fs::write(root.join("m.yaml"), "modules:\n  - name: m\n").unwrap();

        let mut config = ResolverConfig::default();
        config.exclude_patterns.push("vendor/**".to_string());
        let documents = WorkspaceScanner::new(&config).unwrap().scan(&root).unwrap();
        assert_eq!(names(&documents, &root), vec!["m.yaml"]);
    }

    #[test]
    fn test_scan_missing_workspace() {
        let temp = TempDir::new().unwrap();
        let err = scanner().scan(&temp.path().join("missing")).unwrap_err();
        assert!(matches!(err, ModuleError::Io { .. }));
    }
}
