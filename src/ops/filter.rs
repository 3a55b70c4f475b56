//! Exclusion filtering.
//!
//! Removes excluded packages and module references from a graph. Edges to
//! removed nodes are dropped, never rewired, and whatever hung only below a
//! removed node goes with it.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::core::graph::DependencyGraph;
use crate::core::package::{ModuleReference, Package};

static TEST_MODULE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(Tests|\.Test|\.Specs)$").unwrap());

/// Whether a module name looks like a test project.
///
/// Matches names ending in `Tests` (which covers `.Tests`, `.UnitTests`
/// and `.IntegrationTests`), `.Test` or `.Specs`.
pub fn is_test_module(name: &str) -> bool {
    TEST_MODULE.is_match(name)
}

/// Exclusion rules for one module.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExclusionRules {
    /// Exact package identifiers
    pub ids: Vec<String>,
    /// Package identifier prefixes
    pub prefixes: Vec<String>,
    /// Module reference names
    pub modules: Vec<String>,
    /// Drop module references that look like test projects
    pub auto_exclude_tests: Option<bool>,
}

impl ExclusionRules {
    /// Merge another rule set into this one.
    ///
    /// Lists are unioned; the flag is overridden when `other` sets it.
    pub fn merge(&mut self, other: &ExclusionRules) {
        union_into(&mut self.ids, &other.ids);
        union_into(&mut self.prefixes, &other.prefixes);
        union_into(&mut self.modules, &other.modules);
        if other.auto_exclude_tests.is_some() {
            self.auto_exclude_tests = other.auto_exclude_tests;
        }
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
            && self.prefixes.is_empty()
            && self.modules.is_empty()
            && !self.excludes_tests()
    }

    pub fn excludes_tests(&self) -> bool {
        self.auto_exclude_tests.unwrap_or(false)
    }

    /// Whether a package identifier is excluded (ASCII case-insensitive).
    pub fn excludes_package(&self, id: &str) -> bool {
        let lower = id.to_ascii_lowercase();
        self.ids.iter().any(|x| x.eq_ignore_ascii_case(id))
            || self
                .prefixes
                .iter()
                .any(|prefix| lower.starts_with(&prefix.to_ascii_lowercase()))
    }

    /// Whether a module reference is excluded.
    pub fn excludes_module(&self, name: &str) -> bool {
        self.modules.iter().any(|m| m.eq_ignore_ascii_case(name))
            || (self.excludes_tests() && is_test_module(name))
    }
}

fn union_into(target: &mut Vec<String>, extra: &[String]) {
    for item in extra {
        if !target.contains(item) {
            target.push(item.clone());
        }
    }
}

/// Apply `rules` to `graph`, returning the filtered copy.
///
/// A node that was reachable from the roots before filtering and is not
/// afterwards is dropped as well; nodes that were never reachable stay.
pub fn filter_graph(graph: &DependencyGraph, rules: &ExclusionRules) -> DependencyGraph {
    if rules.is_empty() {
        return graph.clone();
    }

    let packages: Vec<Package> = graph
        .packages()
        .iter()
        .filter(|p| {
            let excluded = rules.excludes_package(&p.id);
            if excluded {
                tracing::debug!("{}: excluding package {}", graph.owner(), p.key());
            }
            !excluded
        })
        .cloned()
        .collect();

    let references: Vec<ModuleReference> = graph
        .references()
        .iter()
        .filter(|r| {
            let excluded = rules.excludes_module(&r.name);
            if excluded {
                tracing::debug!("{}: excluding module reference {}", graph.owner(), r.name);
            }
            !excluded
        })
        .cloned()
        .collect();

    let pruned = rebuild(graph, packages, references);

    let reachable_before = graph.reachable_from_roots();
    let reachable_after = pruned.reachable_from_roots();
    let keep = |key: &str| !reachable_before.contains(key) || reachable_after.contains(key);

    let packages: Vec<Package> = pruned
        .packages()
        .iter()
        .filter(|p| {
            let kept = keep(&p.key());
            if !kept {
                tracing::debug!("{}: dropping orphaned package {}", graph.owner(), p.key());
            }
            kept
        })
        .cloned()
        .collect();

    let references: Vec<ModuleReference> = pruned
        .references()
        .iter()
        .filter(|r| keep(&r.key()))
        .cloned()
        .collect();

    rebuild(graph, packages, references)
}

/// New graph with the same owner whose edges only point at surviving nodes.
fn rebuild(
    original: &DependencyGraph,
    mut packages: Vec<Package>,
    mut references: Vec<ModuleReference>,
) -> DependencyGraph {
    let survivors: HashSet<String> = packages
        .iter()
        .map(Package::key)
        .chain(references.iter().map(ModuleReference::key))
        .collect();

    for package in &mut packages {
        package.depends_on.retain(|key| survivors.contains(key));
    }
    for reference in &mut references {
        reference.depends_on.retain(|key| survivors.contains(key));
    }

    DependencyGraph::from_parts(
        original.owner(),
        original.source_path(),
        packages,
        references,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chain() -> DependencyGraph {
        DependencyGraph::from_parts(
            "App",
            "/src/App/App.csproj",
            vec![
                Package::new("A", "1.0.0")
                    .direct()
                    .with_dependency("pkg:nuget/B@1.0.0"),
                Package::new("B", "1.0.0").with_dependency("pkg:nuget/C@1.0.0"),
                Package::new("C", "1.0.0"),
            ],
            vec![],
        )
    }

    fn ids(rules: &[&str]) -> ExclusionRules {
        ExclusionRules {
            ids: rules.iter().map(|s| s.to_string()).collect(),
            ..Default::default()
        }
    }

    #[test]
    fn test_prefix_keeps_independent_dependent() {
        let graph = DependencyGraph::from_parts(
            "App",
            "/src/App/App.csproj",
            vec![
                Package::new("Foo.Bar", "1.0.0").direct(),
                Package::new("Baz", "1.0.0").with_dependency("pkg:nuget/Foo.Bar@1.0.0"),
            ],
            vec![],
        );
        let rules = ExclusionRules {
            prefixes: vec!["Foo".to_string()],
            ..Default::default()
        };

        let filtered = filter_graph(&graph, &rules);

        assert!(filtered.package("pkg:nuget/Foo.Bar@1.0.0").is_none());
        let baz = filtered.package("pkg:nuget/Baz@1.0.0").unwrap();
        assert!(baz.depends_on.is_empty());
    }

    #[test]
    fn test_exclude_drops_subtree() {
        let filtered = filter_graph(&chain(), &ids(&["B"]));

        let a = filtered.package("pkg:nuget/A@1.0.0").unwrap();
        assert!(a.depends_on.is_empty());
        assert!(filtered.package("pkg:nuget/B@1.0.0").is_none());
        assert!(filtered.package("pkg:nuget/C@1.0.0").is_none());
    }

    #[test]
    fn test_shared_descendant_survives() {
        // A -> B -> C and D -> C; excluding B keeps C through D
        let graph = DependencyGraph::from_parts(
            "App",
            "/src/App/App.csproj",
            vec![
                Package::new("A", "1.0.0")
                    .direct()
                    .with_dependency("pkg:nuget/B@1.0.0"),
                Package::new("B", "1.0.0").with_dependency("pkg:nuget/C@1.0.0"),
                Package::new("C", "1.0.0"),
                Package::new("D", "1.0.0")
                    .direct()
                    .with_dependency("pkg:nuget/C@1.0.0"),
            ],
            vec![],
        );

        let filtered = filter_graph(&graph, &ids(&["b"]));

        assert!(filtered.package("pkg:nuget/C@1.0.0").is_some());
        assert!(filtered
            .package("pkg:nuget/D@1.0.0")
            .unwrap()
            .depends_on
            .contains("pkg:nuget/C@1.0.0"));
    }

    #[test]
    fn test_filter_does_not_mutate_input() {
        let graph = chain();
        let before = graph.clone();
        let _ = filter_graph(&graph, &ids(&["B"]));
        assert_eq!(graph, before);
    }

    #[test]
    fn test_module_exclusion_and_test_heuristic() {
        let graph = DependencyGraph::from_parts(
            "App",
            "/src/App/App.csproj",
            vec![],
            vec![
                ModuleReference::new("LibB", Some("1.0.0")),
                ModuleReference::new("LibC", Some("1.0.0")),
                ModuleReference::new("App.UnitTests", Some("1.0.0")),
            ],
        );

        let rules = ExclusionRules {
            modules: vec!["libc".to_string()],
            auto_exclude_tests: Some(true),
            ..Default::default()
        };
        let filtered = filter_graph(&graph, &rules);

        let names: Vec<_> = filtered.references().iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["LibB"]);
    }

    #[test]
    fn test_is_test_module() {
        assert!(is_test_module("App.Tests"));
        assert!(is_test_module("AppTests"));
        assert!(is_test_module("App.IntegrationTests"));
        assert!(is_test_module("App.Test"));
        assert!(is_test_module("App.Specs"));
        assert!(!is_test_module("App.Testing"));
        assert!(!is_test_module("Contest"));
    }

    #[test]
    fn test_merge_unions_lists() {
        let mut base = ExclusionRules {
            ids: vec!["A".to_string()],
            auto_exclude_tests: Some(true),
            ..Default::default()
        };
        let overlay = ExclusionRules {
            ids: vec!["A".to_string(), "B".to_string()],
            prefixes: vec!["Microsoft.".to_string()],
            ..Default::default()
        };

        base.merge(&overlay);

        assert_eq!(base.ids, vec!["A", "B"]);
        assert_eq!(base.prefixes, vec!["Microsoft."]);
        assert_eq!(base.auto_exclude_tests, Some(true));
    }
}
