//! The resolved document graph.
//!
//! Produced by discovery: every in-scope document keyed by canonical path, in
//! discovery order, with each reference replaced by the concrete location it
//! resolved to. Document A has an edge to document B iff some declaration in
//! A uses B.

use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde_yaml::Value;

/// A reference after resolution (and, for directories, expansion)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResolvedUse {
    /// Reference string as written, or the concrete file for expanded entries
    pub raw: String,
    /// Canonical target path
    pub target: PathBuf,
    /// Whether the target is a directory
    pub is_dir: bool,
}

impl ResolvedUse {
    /// Target rendered for the flattened output
    pub fn rendered(&self) -> String {
        self.target.display().to_string()
    }
}

/// A declaration whose references have all been resolved
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedDeclaration {
    /// Name, unique within the owning document
    pub name: String,
    /// Resolved references in declaration order
    pub uses: Vec<ResolvedUse>,
    /// Rule inputs, passed through untouched
    pub input: Option<Value>,
    /// Position of the source declaration in its document; shared by all
    /// clones produced by directory expansion
    pub source_index: usize,
}

/// A document whose declarations have all been resolved
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedDocument {
    /// Canonical document path
    pub path: PathBuf,
    /// Declarations in document order, directory references expanded
    pub declarations: Vec<ResolvedDeclaration>,
}

/// All in-scope documents, in discovery order
#[derive(Debug, Clone, Default)]
pub struct ResolvedGraph {
    documents: IndexMap<PathBuf, ResolvedDocument>,
}

impl ResolvedGraph {
    /// Create an empty graph
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a document; a path already present is replaced in place
    pub fn insert(&mut self, document: ResolvedDocument) {
        self.documents.insert(document.path.clone(), document);
    }

    /// Whether a path is a known document
    pub fn contains(&self, path: &Path) -> bool {
        self.documents.contains_key(path)
    }

    /// Look up a document by path
    pub fn get(&self, path: &Path) -> Option<&ResolvedDocument> {
        self.documents.get(path)
    }

    /// Documents in discovery order
    pub fn documents(&self) -> impl Iterator<Item = &ResolvedDocument> {
        self.documents.values()
    }

    /// Position of a document in discovery order
    pub fn index_of(&self, path: &Path) -> Option<usize> {
        self.documents.get_index_of(path)
    }

    /// Number of documents
    pub fn len(&self) -> usize {
        self.documents.len()
    }

    /// Whether the graph holds no documents
    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// Documents referenced by `path`, first-use order, without duplicates.
    ///
    /// Targets that are not themselves documents (rule files, directories)
    /// are not edges.
    pub fn dependencies(&self, path: &Path) -> Vec<&Path> {
        let mut targets: Vec<&Path> = Vec::new();
        let Some(document) = self.documents.get(path) else {
            return targets;
        };

        for declaration in &document.declarations {
            for resolved in &declaration.uses {
                let target = resolved.target.as_path();
                if !resolved.is_dir && self.contains(target) && !targets.contains(&target) {
                    targets.push(target);
                }
            }
        }
        targets
    }
}
