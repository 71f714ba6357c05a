//! Cycle detection over the discovered document graph.
//!
//! Only edges between known documents count; references to rule files or
//! directories are not edges. Flattening recurses along the same edges, so
//! it must not run until this check passes.

use std::collections::HashSet;
use std::path::PathBuf;

use petgraph::algo::is_cyclic_directed;
use petgraph::graph::{DiGraph, NodeIndex};
use tracing::debug;

use crate::core::errors::{ModuleError, Result};
use crate::modules::graph::ResolvedGraph;

/// Document dependency graph; node indices follow discovery order
pub type DocumentGraph = DiGraph<PathBuf, ()>;

/// Build the document-to-document dependency graph
pub fn build_document_graph(graph: &ResolvedGraph) -> DocumentGraph {
    let mut dependencies = DocumentGraph::with_capacity(graph.len(), graph.len());
    for document in graph.documents() {
        dependencies.add_node(document.path.clone());
    }

    for (index, document) in graph.documents().enumerate() {
        for target in graph.dependencies(&document.path) {
            if let Some(target_index) = graph.index_of(target) {
                dependencies.add_edge(NodeIndex::new(index), NodeIndex::new(target_index), ());
            }
        }
    }
    dependencies
}

/// Fail with [`ModuleError::CircularReference`] on the first cycle found.
///
/// Starts are tried in discovery order and the reported chain begins and
/// ends with the same document.
pub fn check_acyclic(graph: &ResolvedGraph) -> Result<()> {
    let dependencies = build_document_graph(graph);
    if !is_cyclic_directed(&dependencies) {
        debug!("Module graph of {} documents is acyclic", dependencies.node_count());
        return Ok(());
    }

    for start in dependencies.node_indices() {
        let mut chain = vec![start];
        let mut seen = HashSet::from([start]);
        if find_cycle(&dependencies, start, start, &mut chain, &mut seen) {
            return Err(ModuleError::CircularReference {
                chain: chain
                    .into_iter()
                    .map(|node| dependencies[node].clone())
                    .collect(),
            });
        }
    }

    // is_cyclic_directed and the walk above agree; this is unreachable in practice
    Ok(())
}

fn find_cycle(
    graph: &DocumentGraph,
    start: NodeIndex,
    current: NodeIndex,
    chain: &mut Vec<NodeIndex>,
    seen: &mut HashSet<NodeIndex>,
) -> bool {
    // petgraph yields neighbors newest edge first
    let mut neighbors: Vec<NodeIndex> = graph.neighbors(current).collect();
    neighbors.reverse();

    for next in neighbors {
        if next == start {
            chain.push(next);
            return true;
        }
        if seen.insert(next) {
            chain.push(next);
            if find_cycle(graph, start, next, chain, seen) {
                return true;
            }
            chain.pop();
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::graph::{ResolvedDeclaration, ResolvedDocument, ResolvedUse};
    use std::path::Path;

    fn graph(edges: &[(&str, &[&str])]) -> ResolvedGraph {
        let mut graph = ResolvedGraph::new();
        for (path, uses) in edges {
            graph.insert(ResolvedDocument {
                path: PathBuf::from(path),
                declarations: vec![ResolvedDeclaration {
                    name: "m".to_string(),
                    uses: uses
                        .iter()
                        .map(|target| ResolvedUse {
                            raw: target.to_string(),
                            target: PathBuf::from(target),
                            is_dir: false,
                        })
                        .collect(),
                    input: None,
                    source_index: 0,
                }],
            });
        }
        graph
    }

    fn chain_of(err: ModuleError) -> Vec<PathBuf> {
        match err {
            ModuleError::CircularReference { chain } => chain,
            other => panic!("Expected CircularReference, got {other:?}"),
        }
    }

    #[test]
    fn test_three_document_cycle_reports_full_chain() {
        let g = graph(&[
            ("/a.yaml", &["/b.yaml"]),
            ("/b.yaml", &["/c.yaml"]),
            ("/c.yaml", &["/a.yaml"]),
        ]);

        let err = check_acyclic(&g).unwrap_err();
        assert_eq!(
            err.to_string(),
            "modules have circular references: /a.yaml -> /b.yaml -> /c.yaml -> /a.yaml"
        );
        assert_eq!(
            chain_of(err),
            vec![
                PathBuf::from("/a.yaml"),
                PathBuf::from("/b.yaml"),
                PathBuf::from("/c.yaml"),
                PathBuf::from("/a.yaml"),
            ]
        );
    }

    #[test]
    fn test_self_reference() {
        let g = graph(&[("/a.yaml", &["/a.yaml"])]);
        assert_eq!(
            chain_of(check_acyclic(&g).unwrap_err()),
            vec![PathBuf::from("/a.yaml"), PathBuf::from("/a.yaml")]
        );
    }

    #[test]
    fn test_cycle_not_through_first_document() {
        let g = graph(&[
            ("/root.yaml", &["/x.yaml"]),
            ("/x.yaml", &["/y.yaml"]),
            ("/y.yaml", &["/x.yaml"]),
        ]);
        assert_eq!(
            chain_of(check_acyclic(&g).unwrap_err()),
            vec![
                PathBuf::from("/x.yaml"),
                PathBuf::from("/y.yaml"),
                PathBuf::from("/x.yaml"),
            ]
        );
    }

    #[test]
    fn test_diamond_is_acyclic() {
        let g = graph(&[
            ("/a.yaml", &["/b.yaml", "/c.yaml", "/rules.yaml"]),
            ("/b.yaml", &["/d.yaml"]),
            ("/c.yaml", &["/d.yaml"]),
            ("/d.yaml", &[]),
        ]);
        assert!(check_acyclic(&g).is_ok());

        let dependencies = build_document_graph(&g);
        assert_eq!(dependencies.node_count(), 4);
        assert_eq!(dependencies.edge_count(), 4);
        assert_eq!(dependencies[NodeIndex::new(0)], Path::new("/a.yaml"));
    }
}
