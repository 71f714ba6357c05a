//! Directory expansion.
//!
//! A declaration whose only reference resolves to a directory stands for
//! every document file directly inside that directory. It is replaced by one
//! clone per file, each clone using exactly that file. Subdirectories are not
//! descended into. Declarations with zero or several references are left
//! alone.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::core::errors::{IoResultExt, Result};
use crate::modules::graph::{ResolvedDeclaration, ResolvedUse};
use crate::modules::scanner::has_extension;

/// Expands directory references into per-file declarations
#[derive(Debug, Clone)]
pub struct DirectoryExpander {
    extension: String,
}

impl DirectoryExpander {
    /// Create an expander recognising files with `extension`
    pub fn new(extension: impl Into<String>) -> Self {
        Self {
            extension: extension.into(),
        }
    }

    /// Expand `declaration`, declared in `document`
    pub fn expand(
        &self,
        declaration: ResolvedDeclaration,
        document: &Path,
    ) -> Result<Vec<ResolvedDeclaration>> {
        let directory = match declaration.uses.as_slice() {
            [single] if single.is_dir => single.target.clone(),
            _ => return Ok(vec![declaration]),
        };

        let files = self.list_documents(&directory, document)?;
        if files.is_empty() {
            warn!(
                "Module '{}' in {} uses {} which holds no .{} files",
                declaration.name,
                document.display(),
                directory.display(),
                self.extension
            );
            return Ok(vec![declaration]);
        }

        debug!(
            "Expanding module '{}' over {} files in {}",
            declaration.name,
            files.len(),
            directory.display()
        );
        Ok(files
            .into_iter()
            .map(|file| ResolvedDeclaration {
                name: declaration.name.clone(),
                uses: vec![ResolvedUse {
                    raw: file.display().to_string(),
                    target: file,
                    is_dir: false,
                }],
                input: declaration.input.clone(),
                source_index: declaration.source_index,
            })
            .collect())
    }

    /// Document files directly inside `directory`, sorted by file name,
    /// excluding `document` itself
    pub fn list_documents(&self, directory: &Path, document: &Path) -> Result<Vec<PathBuf>> {
        let entries = fs::read_dir(directory)
            .io_context(|| format!("Failed to list {}", directory.display()))?;

        let mut files = Vec::new();
        for entry in entries {
            let entry = entry.io_context(|| format!("Failed to list {}", directory.display()))?;
            let path = entry.path();
            if path.is_file() && has_extension(&path, &self.extension) && path != document {
                files.push(path);
            }
        }
        files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
        Ok(files)
    }
}
