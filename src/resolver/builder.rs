//! Graph builder - turns parsed manifests into a `DependencyGraph`.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use crate::core::error::Result;
use crate::core::graph::DependencyGraph;
use crate::core::package::{ContentHash, ModuleReference, Package};
use crate::core::purl::{Purl, NUGET};
use crate::resolver::assets::{AssetsManifest, LibraryKind};
use crate::resolver::version::{compare_versions, is_higher};
use crate::util::fs::absolutize;

/// Builds the dependency graph of one module.
#[derive(Debug, Clone)]
pub struct GraphBuilder {
    owner: String,
    source_path: PathBuf,
    framework: Option<String>,
}

/// A library entry after target selection, before edges are resolved.
#[derive(Debug, Clone)]
struct Resolved {
    name: String,
    version: String,
    node: NodeKind,
    is_direct: bool,
    /// Lowercased names of children
    children: BTreeSet<String>,
}

#[derive(Debug, Clone)]
enum NodeKind {
    Package { hash: Option<ContentHash> },
    Reference { path: Option<PathBuf> },
}

impl Resolved {
    fn key(&self) -> String {
        match self.node {
            NodeKind::Package { .. } => Purl::nuget(&self.name, &self.version).to_string(),
            NodeKind::Reference { .. } => {
                Purl::new(NUGET, &self.name, Some(&self.version)).to_string()
            }
        }
    }
}

impl GraphBuilder {
    /// `source_path` is the module's project file; relative paths in the
    /// manifest are resolved against its directory.
    pub fn new(owner: impl Into<String>, source_path: impl Into<PathBuf>) -> Self {
        GraphBuilder {
            owner: owner.into(),
            source_path: source_path.into(),
            framework: None,
        }
    }

    /// Prefer a target framework instead of the first non-runtime target.
    pub fn framework(mut self, framework: Option<&str>) -> Self {
        self.framework = framework.map(str::to_string);
        self
    }

    /// Build the graph of a single manifest.
    pub fn build(&self, manifest: &AssetsManifest) -> Result<DependencyGraph> {
        self.build_merged(std::slice::from_ref(manifest))
    }

    /// Build one graph from several contributing manifests.
    ///
    /// Packages are merged by name, keeping the strictly higher version.
    /// Edges are resolved against the merged table, so an edge to a
    /// superseded version ends up at the surviving one.
    pub fn build_merged(&self, manifests: &[AssetsManifest]) -> Result<DependencyGraph> {
        let base_dir = self
            .source_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();

        let mut table: BTreeMap<String, Resolved> = BTreeMap::new();

        for manifest in manifests {
            let target = manifest.select_target(self.framework.as_deref())?;
            let direct = manifest.direct_names(target);
            tracing::debug!(
                "{}: using target {} ({} entries, {} direct)",
                self.owner,
                target.name,
                target.entries.len(),
                direct.len()
            );

            for entry in &target.entries {
                let info = manifest.library(entry);
                let node = match &entry.kind {
                    LibraryKind::Package => NodeKind::Package {
                        hash: info.and_then(|i| i.sha512.as_deref()).and_then(|value| {
                            let hash = ContentHash::from_nuget_sha512(value);
                            if hash.is_none() {
                                tracing::warn!("{}: ignoring malformed sha512 for {}", self.owner, entry.name);
                            }
                            hash
                        }),
                    },
                    LibraryKind::Project => NodeKind::Reference {
                        path: info
                            .and_then(|i| i.path.as_deref())
                            .map(|p| absolutize(&base_dir, p)),
                    },
                    LibraryKind::Other(kind) => {
                        tracing::debug!("skipping {} ({})", entry.name, kind);
                        continue;
                    }
                };

                let name_key = entry.name.to_ascii_lowercase();
                let candidate = Resolved {
                    name: entry.name.clone(),
                    version: entry.version.clone(),
                    is_direct: matches!(node, NodeKind::Reference { .. })
                        || direct.contains(&name_key),
                    node,
                    children: entry
                        .dependencies
                        .iter()
                        .map(|(child, _)| child.to_ascii_lowercase())
                        .collect(),
                };

                merge_entry(&mut table, name_key, candidate);
            }
        }

        let keys: BTreeMap<&str, String> = table
            .iter()
            .map(|(name, resolved)| (name.as_str(), resolved.key()))
            .collect();

        let mut packages = Vec::new();
        let mut references = Vec::new();

        for resolved in table.values() {
            let depends_on: BTreeSet<String> = resolved
                .children
                .iter()
                .filter_map(|child| {
                    let key = keys.get(child.as_str()).cloned();
                    if key.is_none() {
                        tracing::debug!(
                            "{}: dependency {} of {} is not in the target",
                            self.owner,
                            child,
                            resolved.name
                        );
                    }
                    key
                })
                .collect();

            match &resolved.node {
                NodeKind::Package { hash } => {
                    let mut package = Package::new(&resolved.name, &resolved.version);
                    package.hash = hash.clone();
                    package.is_direct = resolved.is_direct;
                    package.depends_on = depends_on;
                    packages.push(package);
                }
                NodeKind::Reference { path } => {
                    let mut reference = ModuleReference::new(&resolved.name, Some(&resolved.version));
                    reference.path = path.clone();
                    reference.depends_on = depends_on;
                    references.push(reference);
                }
            }
        }

        tracing::debug!(
            "{}: {} packages, {} module references",
            self.owner,
            packages.len(),
            references.len()
        );

        Ok(DependencyGraph::from_parts(
            self.owner.clone(),
            self.source_path.clone(),
            packages,
            references,
        ))
    }
}

fn merge_entry(table: &mut BTreeMap<String, Resolved>, name_key: String, candidate: Resolved) {
    let Some(existing) = table.get_mut(&name_key) else {
        table.insert(name_key, candidate);
        return;
    };

    let is_direct = existing.is_direct || candidate.is_direct;

    match (&existing.node, &candidate.node) {
        (NodeKind::Package { .. }, NodeKind::Package { .. }) => {
            if is_higher(&candidate.version, &existing.version) {
                tracing::debug!(
                    "{}: {} supersedes {}",
                    candidate.name,
                    candidate.version,
                    existing.version
                );
                *existing = candidate;
            } else if compare_versions(&candidate.version, &existing.version).is_eq() {
                existing.children.extend(candidate.children);
            }
        }
        // The same name as a project and a package: the project wins.
        (NodeKind::Package { .. }, NodeKind::Reference { .. }) => {
            *existing = candidate;
        }
        (NodeKind::Reference { .. }, NodeKind::Reference { .. }) => {
            existing.children.extend(candidate.children);
        }
        (NodeKind::Reference { .. }, NodeKind::Package { .. }) => {}
    }

    existing.is_direct = is_direct;
}
