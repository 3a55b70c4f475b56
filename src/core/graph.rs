//! DependencyGraph - the resolved dependency set of one module.
//!
//! A graph is built once during resolution and never modified afterwards.
//! Filtering and external merges produce new graphs, so the resolved
//! original stays available for reuse.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::path::{Path, PathBuf};

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::Dfs;

use crate::core::package::{ModuleReference, Package};

/// The full resolved dependency set for one module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyGraph {
    owner: String,
    source_path: PathBuf,
    packages: Vec<Package>,
    references: Vec<ModuleReference>,
}

impl DependencyGraph {
    /// Create a graph from its parts.
    ///
    /// Nodes with a key that is already present are dropped, so keys are
    /// unique across packages and references.
    pub fn from_parts(
        owner: impl Into<String>,
        source_path: impl Into<PathBuf>,
        packages: Vec<Package>,
        references: Vec<ModuleReference>,
    ) -> Self {
        let mut seen = HashSet::new();

        let packages = packages
            .into_iter()
            .filter(|pkg| seen.insert(pkg.key()))
            .collect();
        let references = references
            .into_iter()
            .filter(|r| seen.insert(r.key()))
            .collect();

        DependencyGraph {
            owner: owner.into(),
            source_path: source_path.into(),
            packages,
            references,
        }
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn source_path(&self) -> &Path {
        &self.source_path
    }

    pub fn packages(&self) -> &[Package] {
        &self.packages
    }

    pub fn references(&self) -> &[ModuleReference] {
        &self.references
    }

    /// Find a package by key.
    pub fn package(&self, key: &str) -> Option<&Package> {
        self.packages.iter().find(|p| p.key() == key)
    }

    /// Find a module reference by key.
    pub fn reference(&self, key: &str) -> Option<&ModuleReference> {
        self.references.iter().find(|r| r.key() == key)
    }

    /// Keys of every node in the graph.
    pub fn keys(&self) -> BTreeSet<String> {
        self.packages
            .iter()
            .map(Package::key)
            .chain(self.references.iter().map(ModuleReference::key))
            .collect()
    }

    /// Keys the owner depends on directly: direct packages and every
    /// module reference.
    pub fn roots(&self) -> BTreeSet<String> {
        self.packages
            .iter()
            .filter(|p| p.is_direct)
            .map(Package::key)
            .chain(self.references.iter().map(ModuleReference::key))
            .collect()
    }

    /// Outgoing edges of a node.
    pub fn dependencies_of(&self, key: &str) -> Option<&BTreeSet<String>> {
        self.package(key)
            .map(|p| &p.depends_on)
            .or_else(|| self.reference(key).map(|r| &r.depends_on))
    }

    /// Keys reachable from the roots, roots included.
    ///
    /// Edges to keys that are not nodes of this graph are ignored.
    pub fn reachable_from_roots(&self) -> HashSet<String> {
        let (graph, index) = self.to_petgraph();
        let mut reachable = HashSet::new();

        for root in self.roots() {
            let Some(&start) = index.get(root.as_str()) else {
                continue;
            };
            let mut dfs = Dfs::new(&graph, start);
            while let Some(node) = dfs.next(&graph) {
                reachable.insert(graph[node].to_string());
            }
        }

        reachable
    }

    fn to_petgraph(&self) -> (DiGraph<String, ()>, HashMap<String, NodeIndex>) {
        let mut graph = DiGraph::new();
        let mut index = HashMap::new();

        for key in self.keys() {
            let node = graph.add_node(key.clone());
            index.insert(key, node);
        }

        let edges = self
            .packages
            .iter()
            .map(|p| (p.key(), &p.depends_on))
            .chain(self.references.iter().map(|r| (r.key(), &r.depends_on)));

        for (from, targets) in edges {
            let from = index[&from];
            for to in targets {
                if let Some(&to) = index.get(to) {
                    graph.update_edge(from, to, ());
                }
            }
        }

        (graph, index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chain_graph() -> DependencyGraph {
        // A (direct) -> B -> C, plus orphan D
        DependencyGraph::from_parts(
            "App",
            "/src/App/App.csproj",
            vec![
                Package::new("A", "1.0.0")
                    .direct()
                    .with_dependency("pkg:nuget/B@1.0.0"),
                Package::new("B", "1.0.0").with_dependency("pkg:nuget/C@1.0.0"),
                Package::new("C", "1.0.0"),
                Package::new("D", "1.0.0"),
            ],
            vec![],
        )
    }

    #[test]
    fn test_from_parts_drops_duplicate_keys() {
        let graph = DependencyGraph::from_parts(
            "App",
            "/src/App/App.csproj",
            vec![Package::new("A", "1.0.0").direct(), Package::new("A", "1.0.0")],
            vec![],
        );

        assert_eq!(graph.packages().len(), 1);
        assert!(graph.packages()[0].is_direct);
    }

    #[test]
    fn test_roots_include_references() {
        let graph = DependencyGraph::from_parts(
            "App",
            "/src/App/App.csproj",
            vec![Package::new("A", "1.0.0").direct(), Package::new("B", "1.0.0")],
            vec![ModuleReference::new("LibB", Some("2.0.0"))],
        );

        let roots: Vec<_> = graph.roots().into_iter().collect();
        assert_eq!(roots, vec!["pkg:nuget/A@1.0.0", "pkg:nuget/LibB@2.0.0"]);
    }

    #[test]
    fn test_reachable_from_roots() {
        let graph = chain_graph();
        let reachable = graph.reachable_from_roots();

        assert!(reachable.contains("pkg:nuget/A@1.0.0"));
        assert!(reachable.contains("pkg:nuget/B@1.0.0"));
        assert!(reachable.contains("pkg:nuget/C@1.0.0"));
        assert!(!reachable.contains("pkg:nuget/D@1.0.0"));
    }

    #[test]
    fn test_dependencies_of() {
        let graph = chain_graph();
        let deps = graph.dependencies_of("pkg:nuget/A@1.0.0").unwrap();
        assert!(deps.contains("pkg:nuget/B@1.0.0"));
        assert!(graph.dependencies_of("pkg:nuget/Missing@1.0.0").is_none());
    }
}
