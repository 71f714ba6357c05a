//! Graph discovery.
//!
//! Computes the transitive closure of the workspace documents: every popped
//! document has its references resolved and expanded, and every concrete
//! file it reaches is loaded and queued unless it was already seen. The
//! visited set makes the walk terminate on reference cycles; reporting them
//! is left to the cycle detector.

use std::collections::{HashSet, VecDeque};
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::core::errors::Result;
use crate::modules::document::{ModuleDocument, RawModuleDocument};
use crate::modules::expander::DirectoryExpander;
use crate::modules::graph::{ResolvedDeclaration, ResolvedDocument, ResolvedGraph, ResolvedUse};
use crate::modules::resolver::ReferenceResolver;
use crate::modules::scanner::has_extension;

/// Run-scoped discovery driver
pub struct GraphDiscovery {
    resolver: ReferenceResolver,
    expander: DirectoryExpander,
    extension: String,
    org_host: String,
}

impl GraphDiscovery {
    /// Create a discovery run around a fresh resolver
    pub fn new(
        resolver: ReferenceResolver,
        extension: impl Into<String>,
        org_host: impl Into<String>,
    ) -> Self {
        let extension = extension.into();
        Self {
            resolver,
            expander: DirectoryExpander::new(extension.clone()),
            extension,
            org_host: org_host.into(),
        }
    }

    /// Follow references from `seeds` until no new document turns up
    pub async fn discover(mut self, seeds: Vec<ModuleDocument>) -> Result<ResolvedGraph> {
        let mut visited: HashSet<PathBuf> = seeds.iter().map(|doc| doc.path.clone()).collect();
        let mut queue: VecDeque<ModuleDocument> = seeds.into();
        let mut graph = ResolvedGraph::new();

        while let Some(document) = queue.pop_front() {
            debug!("Discovering references of {}", document.path.display());
            let mut declarations = Vec::with_capacity(document.declarations.len());

            for (source_index, declaration) in document.declarations.into_iter().enumerate() {
                let mut uses = Vec::with_capacity(declaration.references.len());
                for reference in &declaration.references {
                    let target = self.resolver.resolve(reference, &document.path).await?;
                    uses.push(ResolvedUse {
                        raw: reference.raw().to_string(),
                        target: target.path,
                        is_dir: target.is_dir,
                    });
                }

                let resolved = ResolvedDeclaration {
                    name: declaration.name,
                    uses,
                    input: declaration.input,
                    source_index,
                };
                for expanded in self.expander.expand(resolved, &document.path)? {
                    for resolved_use in &expanded.uses {
                        if resolved_use.is_dir || !visited.insert(resolved_use.target.clone()) {
                            continue;
                        }
                        if let Some(child) = self.load(&resolved_use.target)? {
                            queue.push_back(child);
                        }
                    }
                    declarations.push(expanded);
                }
            }

            graph.insert(ResolvedDocument {
                path: document.path,
                declarations,
            });
        }

        info!("Discovered {} module documents", graph.len());
        Ok(graph)
    }

    /// Load a referenced file; `None` when it is not a module document.
    ///
    /// Unlike the workspace scan, a referenced module document that fails to
    /// parse aborts the run.
    fn load(&self, path: &Path) -> Result<Option<ModuleDocument>> {
        if !has_extension(path, &self.extension) {
            debug!("{} is not a module document", path.display());
            return Ok(None);
        }
        match RawModuleDocument::read(path)? {
            Some(raw) => Ok(Some(raw.classify(&self.org_host)?)),
            None => {
                debug!("{} has no modules section", path.display());
                Ok(None)
            }
        }
    }
}
