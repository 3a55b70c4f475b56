//! `lockbom tree` command

use std::collections::HashSet;

use anyhow::{Context, Result};

use crate::cli::TreeArgs;
use lockbom::ops::filter::{filter_graph, ExclusionRules};
use lockbom::resolver::{AssetsManifest, GraphBuilder};
use lockbom::util::GlobalContext;
use lockbom::DependencyGraph;

pub fn execute(args: TreeArgs) -> Result<()> {
    let ctx = GlobalContext::new()?;
    let assets_path = ctx.cwd().join(&args.assets);

    let manifest = AssetsManifest::load(&assets_path)?;

    let owner = manifest
        .project
        .name
        .clone()
        .unwrap_or_else(|| "(project)".to_string());
    let source_path = manifest
        .project
        .path
        .clone()
        .unwrap_or_else(|| assets_path.clone());

    let graph = GraphBuilder::new(&owner, source_path)
        .framework(args.framework.as_deref())
        .build(&manifest)
        .with_context(|| format!("failed to read {}", assets_path.display()))?;

    let rules = ExclusionRules {
        prefixes: args.exclude_prefixes.clone(),
        ..Default::default()
    };
    let graph = filter_graph(&graph, &rules);

    match &manifest.project.version {
        Some(version) => println!("{} v{}", owner, version),
        None => println!("{}", owner),
    }

    let max_depth = args.depth.unwrap_or(usize::MAX);
    for line in render_tree(&graph, max_depth, args.duplicates) {
        println!("{}", line);
    }

    Ok(())
}

/// Render every root and its subtree, one line per node.
fn render_tree(graph: &DependencyGraph, max_depth: usize, show_duplicates: bool) -> Vec<String> {
    let mut lines = Vec::new();
    let mut seen = HashSet::new();
    let mut path = Vec::new();
    for root in graph.roots() {
        render_node(
            graph,
            &root,
            1,
            max_depth,
            &mut seen,
            &mut path,
            show_duplicates,
            &mut lines,
        );
    }
    lines
}

#[allow(clippy::too_many_arguments)]
fn render_node(
    graph: &DependencyGraph,
    key: &str,
    depth: usize,
    max_depth: usize,
    seen: &mut HashSet<String>,
    path: &mut Vec<String>,
    show_duplicates: bool,
    lines: &mut Vec<String>,
) {
    if depth > max_depth {
        return;
    }

    let is_duplicate = !seen.insert(key.to_string());
    // A node already on the current path is never expanded again
    let is_cycle = path.iter().any(|k| k == key);

    let prefix = format!("{}├── ", "│   ".repeat(depth - 1));

    let marker = if is_cycle || (is_duplicate && !show_duplicates) {
        " (*)"
    } else {
        ""
    };

    lines.push(format!("{}{}{}", prefix, describe(graph, key), marker));

    if is_cycle || (is_duplicate && !show_duplicates) {
        return;
    }

    if let Some(deps) = graph.dependencies_of(key) {
        path.push(key.to_string());
        for dep in deps {
            render_node(graph, dep, depth + 1, max_depth, seen, path, show_duplicates, lines);
        }
        path.pop();
    }
}

fn describe(graph: &DependencyGraph, key: &str) -> String {
    if let Some(package) = graph.package(key) {
        return format!("{} v{}", package.id, package.version);
    }
    match graph.reference(key) {
        Some(reference) => match &reference.version {
            Some(version) => format!("{} v{} (project)", reference.name, version),
            None => format!("{} (project)", reference.name),
        },
        None => key.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lockbom::Package;

    fn cyclic_graph() -> DependencyGraph {
        DependencyGraph::from_parts(
            "App",
            "/src/App/App.csproj",
            vec![
                Package::new("A", "1.0.0").direct().with_dependency("pkg:nuget/B@1.0.0"),
                Package::new("B", "1.0.0").with_dependency("pkg:nuget/A@1.0.0"),
            ],
            vec![],
        )
    }

    #[test]
    fn test_cycle_is_not_expanded_with_duplicates() {
        let lines = render_tree(&cyclic_graph(), usize::MAX, true);

        assert_eq!(
            lines,
            vec![
                "├── A v1.0.0".to_string(),
                "│   ├── B v1.0.0".to_string(),
                "│   │   ├── A v1.0.0 (*)".to_string(),
            ]
        );
    }

    #[test]
    fn test_repeated_subtree_is_marked() {
        let graph = DependencyGraph::from_parts(
            "App",
            "/src/App/App.csproj",
            vec![
                Package::new("A", "1.0.0").direct().with_dependency("pkg:nuget/C@1.0.0"),
                Package::new("B", "1.0.0").direct().with_dependency("pkg:nuget/C@1.0.0"),
                Package::new("C", "1.0.0"),
            ],
            vec![],
        );

        let lines = render_tree(&graph, usize::MAX, false);
        assert_eq!(lines.last().unwrap(), "│   ├── C v1.0.0 (*)");
    }
}
