//! Graph flattening.
//!
//! Documents referenced by another document are children; every other
//! document is a root. Each root declaration is emitted together with the
//! declarations of the children it uses, recursively, under dot-qualified
//! names (`root.mid.leaf`). A reference that was inlined disappears from the
//! parent's `uses`; anything else (rule files, directories with no documents)
//! stays for the rule loader to follow.
//!
//! The result is built fresh from the read-only graph. A child inlined under
//! two roots yields two independent copies. The graph must be acyclic.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_yaml::Value;
use tracing::debug;

use crate::core::errors::{ModuleError, Result};
use crate::modules::graph::{ResolvedDeclaration, ResolvedDocument, ResolvedGraph};

/// One entry of the flattened output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergedModule {
    /// Fully qualified name
    pub name: String,
    /// References that were not inlined, as resolved paths
    #[serde(default)]
    pub uses: Vec<String>,
    /// Rule inputs, passed through untouched
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input: Option<Value>,
}

/// The `modules:` document handed to the rule loader
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModuleManifest {
    /// Flattened modules in output order
    pub modules: Vec<MergedModule>,
}

impl ModuleManifest {
    /// Render as YAML
    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }
}

/// Flatten an acyclic graph into the ordered output list
pub fn flatten(graph: &ResolvedGraph) -> Result<Vec<MergedModule>> {
    let children = child_documents(graph);
    let mut flattener = Flattener {
        graph,
        children: &children,
        output: Vec::new(),
        names: HashMap::new(),
    };

    for document in graph.documents() {
        if children.contains(document.path.as_path()) {
            continue;
        }
        for declaration in &document.declarations {
            flattener.inline(document, declaration, declaration.name.clone())?;
        }
    }

    debug!(
        "Flattened {} documents ({} children) into {} modules",
        graph.len(),
        children.len(),
        flattener.output.len()
    );
    Ok(flattener.output)
}

/// Documents referenced by at least one document in the graph
pub fn child_documents(graph: &ResolvedGraph) -> HashSet<&Path> {
    graph
        .documents()
        .flat_map(|document| graph.dependencies(&document.path))
        .collect()
}

/// Identifies the source declaration an output entry came from
type Origin = (PathBuf, usize);

struct Flattener<'g> {
    graph: &'g ResolvedGraph,
    children: &'g HashSet<&'g Path>,
    output: Vec<MergedModule>,
    names: HashMap<String, (Origin, usize)>,
}

impl<'g> Flattener<'g> {
    fn inline(
        &mut self,
        document: &'g ResolvedDocument,
        declaration: &'g ResolvedDeclaration,
        qualified: String,
    ) -> Result<()> {
        let graph = self.graph;
        let mut remaining = Vec::new();
        let mut inlined: Vec<&'g ResolvedDocument> = Vec::new();

        for resolved in &declaration.uses {
            let child = if resolved.is_dir || !self.children.contains(resolved.target.as_path()) {
                None
            } else {
                graph.get(&resolved.target)
            };
            match child {
                Some(child) => {
                    if !inlined.iter().any(|seen| seen.path == child.path) {
                        inlined.push(child);
                    }
                }
                None => remaining.push(resolved.rendered()),
            }
        }

        for child in inlined {
            for child_declaration in &child.declarations {
                let name = format!("{qualified}.{}", child_declaration.name);
                self.inline(child, child_declaration, name)?;
            }
        }

        self.push(
            MergedModule {
                name: qualified,
                uses: remaining,
                input: declaration.input.clone(),
            },
            (document.path.clone(), declaration.source_index),
        )
    }

    /// Append an entry. Clones of one expanded declaration share an origin
    /// and merge their `uses`; any other name collision is an error.
    ///
    /// A merged entry moves to the end so it still follows the children
    /// inlined by every clone.
    fn push(&mut self, module: MergedModule, origin: Origin) -> Result<()> {
        if let Some((existing_origin, index)) = self.names.get(&module.name) {
            if *existing_origin != origin {
                return Err(ModuleError::DuplicateModuleName {
                    name: module.name,
                    document: origin.0,
                });
            }
            let index = *index;
            let mut merged = self.output.remove(index);
            for resolved in module.uses {
                if !merged.uses.contains(&resolved) {
                    merged.uses.push(resolved);
                }
            }
            for (_, position) in self.names.values_mut() {
                if *position > index {
                    *position -= 1;
                }
            }
            self.names
                .insert(merged.name.clone(), (origin, self.output.len()));
            self.output.push(merged);
            return Ok(());
        }

        self.names
            .insert(module.name.clone(), (origin, self.output.len()));
        self.output.push(module);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::graph::ResolvedUse;

    struct Builder {
        graph: ResolvedGraph,
    }

    impl Builder {
        fn new() -> Self {
            Self {
                graph: ResolvedGraph::new(),
            }
        }

        /// `declarations` are (name, uses) pairs; each gets its own source index
        fn document(mut self, path: &str, declarations: &[(&str, &[&str])]) -> Self {
            let declarations = declarations
                .iter()
                .enumerate()
                .map(|(index, (name, uses))| declaration(name, uses, index))
                .collect();
            self.graph.insert(ResolvedDocument {
                path: PathBuf::from(path),
                declarations,
            });
            self
        }

        fn raw_document(mut self, path: &str, declarations: Vec<ResolvedDeclaration>) -> Self {
            self.graph.insert(ResolvedDocument {
                path: PathBuf::from(path),
                declarations,
            });
            self
        }

        fn flatten(&self) -> Result<Vec<MergedModule>> {
            flatten(&self.graph)
        }
    }

    fn declaration(name: &str, uses: &[&str], source_index: usize) -> ResolvedDeclaration {
        ResolvedDeclaration {
            name: name.to_string(),
            uses: uses
                .iter()
                .map(|target| ResolvedUse {
                    raw: target.to_string(),
                    target: PathBuf::from(target),
                    is_dir: false,
                })
                .collect(),
            input: None,
            source_index,
        }
    }

    fn names(modules: &[MergedModule]) -> Vec<&str> {
        modules.iter().map(|m| m.name.as_str()).collect()
    }

    #[test]
    fn test_root_child_partition() {
        let modules = Builder::new()
            .document("/ws/root.yaml", &[("root", &["/ws/child.yaml"])])
            .document("/ws/child.yaml", &[("child", &[])])
            .flatten()
            .unwrap();

        assert_eq!(names(&modules), vec!["root.child", "root"]);
        assert!(modules[1].uses.is_empty());
    }

    #[test]
    fn test_qualification_depth() {
        let modules = Builder::new()
            .document("/ws/root.yaml", &[("root", &["/ws/mid.yaml"])])
            .document("/ws/mid.yaml", &[("mid", &["/ws/leaf.yaml"])])
            .document("/ws/leaf.yaml", &[("leaf", &["/ws/rules/s3.yaml"])])
            .flatten()
            .unwrap();

        assert_eq!(names(&modules), vec!["root.mid.leaf", "root.mid", "root"]);
        assert_eq!(modules[0].uses, vec!["/ws/rules/s3.yaml"]);
    }

    #[test]
    fn test_inlined_references_are_pruned() {
        let modules = Builder::new()
            .document(
                "/ws/root.yaml",
                &[("root", &["/ws/rules/ec2.yaml", "/ws/child.yaml", "/ws/rules/s3.yaml"])],
            )
            .document("/ws/child.yaml", &[("child", &[])])
            .flatten()
            .unwrap();

        let root = modules.iter().find(|m| m.name == "root").unwrap();
        assert_eq!(root.uses, vec!["/ws/rules/ec2.yaml", "/ws/rules/s3.yaml"]);
    }

    #[test]
    fn test_shared_child_is_copied_under_each_root() {
        let modules = Builder::new()
            .document("/ws/a.yaml", &[("a", &["/ws/shared.yaml"])])
            .document("/ws/b.yaml", &[("b", &["/ws/shared.yaml"])])
            .document("/ws/shared.yaml", &[("s", &["/ws/rules.yaml"])])
            .flatten()
            .unwrap();

        assert_eq!(names(&modules), vec!["a.s", "a", "b.s", "b"]);
        assert_eq!(modules[0].uses, modules[2].uses);
    }

    #[test]
    fn test_sibling_names_collide() {
        let err = Builder::new()
            .document("/ws/root.yaml", &[("root", &["/ws/c1.yaml", "/ws/c2.yaml"])])
            .document("/ws/c1.yaml", &[("x", &[])])
            .document("/ws/c2.yaml", &[("x", &[])])
            .flatten()
            .unwrap_err();

        match err {
            ModuleError::DuplicateModuleName { name, document } => {
                assert_eq!(name, "root.x");
                assert_eq!(document, PathBuf::from("/ws/c2.yaml"));
            }
            other => panic!("Expected DuplicateModuleName, got {other:?}"),
        }
    }

    #[test]
    fn test_root_names_collide_across_documents() {
        let err = Builder::new()
            .document("/ws/a.yaml", &[("aws", &[])])
            .document("/ws/b.yaml", &[("aws", &[])])
            .flatten()
            .unwrap_err();
        assert!(matches!(err, ModuleError::DuplicateModuleName { ref name, .. } if name == "aws"));
    }

    #[test]
    fn test_expanded_clones_merge() {
        let modules = Builder::new()
            .raw_document(
                "/ws/root.yaml",
                vec![
                    declaration("aws", &["/ws/aws/a.yaml"], 0),
                    declaration("aws", &["/ws/aws/b.yaml"], 0),
                    declaration("gcp", &["/ws/gcp.yaml"], 1),
                ],
            )
            .flatten()
            .unwrap();

        assert_eq!(names(&modules), vec!["aws", "gcp"]);
        assert_eq!(modules[0].uses, vec!["/ws/aws/a.yaml", "/ws/aws/b.yaml"]);
    }

    #[test]
    fn test_merged_parent_follows_children_of_every_clone() {
        let modules = Builder::new()
            .raw_document(
                "/ws/root.yaml",
                vec![
                    declaration("aws", &["/ws/aws/a.yaml"], 0),
                    declaration("aws", &["/ws/aws/b.yaml"], 0),
                    declaration("aws", &["/ws/aws/rules.yaml"], 0),
                    declaration("gcp", &["/ws/gcp.yaml"], 1),
                ],
            )
            .document("/ws/aws/a.yaml", &[("x", &[])])
            .document("/ws/aws/b.yaml", &[("y", &["/ws/aws/y.rules.yaml"])])
            .flatten()
            .unwrap();

        assert_eq!(names(&modules), vec!["aws.x", "aws.y", "aws", "gcp"]);
        assert_eq!(modules[1].uses, vec!["/ws/aws/y.rules.yaml"]);
        assert_eq!(modules[2].uses, vec!["/ws/aws/rules.yaml"]);
    }

    #[test]
    fn test_merged_parent_keeps_later_names_unique() {
        let err = Builder::new()
            .raw_document(
                "/ws/root.yaml",
                vec![
                    declaration("aws", &["/ws/aws/a.yaml"], 0),
                    declaration("aws", &["/ws/aws/b.yaml"], 0),
                    declaration("aws.y", &[], 1),
                ],
            )
            .document("/ws/aws/a.yaml", &[("x", &[])])
            .document("/ws/aws/b.yaml", &[("y", &[])])
            .flatten()
            .unwrap_err();

        assert!(matches!(err, ModuleError::DuplicateModuleName { ref name, .. } if name == "aws.y"));
    }

    #[test]
    fn test_input_and_yaml_shape() {
        let mut decl = declaration("root", &["/ws/rules.yaml"], 0);
        decl.input = Some(serde_yaml::from_str("region: us-east-1").unwrap());
        let modules = Builder::new()
            .raw_document("/ws/root.yaml", vec![decl])
            .flatten()
            .unwrap();

        let yaml = ModuleManifest { modules }.to_yaml().unwrap();
        let parsed: ModuleManifest = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(parsed.modules[0].name, "root");
        assert_eq!(parsed.modules[0].uses, vec!["/ws/rules.yaml"]);
        assert_eq!(
            parsed.modules[0].input.as_ref().unwrap()["region"],
            Value::from("us-east-1")
        );
    }
}
