//! Resolved manifest reader.
//!
//! Reads the `project.assets.json` lock artifact written by a NuGet restore
//! into typed per-target library records. Only the sections that describe
//! the resolved graph are modelled; compile/runtime asset lists are ignored.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::core::error::{BomError, Result};
use crate::util::fs::from_manifest_path;

/// Manifest format version this reader understands.
pub const ASSETS_VERSION: u32 = 3;

/// Default manifest location relative to a project directory.
pub const ASSETS_RELATIVE_PATH: &str = "obj/project.assets.json";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawAssets {
    version: u32,
    #[serde(default)]
    targets: serde_json::Map<String, serde_json::Value>,
    #[serde(default)]
    libraries: HashMap<String, RawLibrary>,
    #[serde(default)]
    project_file_dependency_groups: serde_json::Map<String, serde_json::Value>,
    #[serde(default)]
    project: RawProject,
}

#[derive(Debug, Deserialize)]
struct RawTargetEntry {
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(default)]
    dependencies: BTreeMap<String, String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawLibrary {
    #[serde(rename = "type", default)]
    kind: String,
    sha512: Option<String>,
    path: Option<String>,
    msbuild_project: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct RawProject {
    version: Option<String>,
    #[serde(default)]
    restore: RawRestore,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawRestore {
    project_name: Option<String>,
    project_path: Option<String>,
}

/// Kind of a library entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LibraryKind {
    /// Resolved from a package feed
    Package,
    /// Another project of the same build
    Project,
    /// Anything else the package manager may emit
    Other(String),
}

impl LibraryKind {
    fn parse(kind: &str) -> Self {
        match kind {
            "package" => LibraryKind::Package,
            "project" => LibraryKind::Project,
            other => LibraryKind::Other(other.to_string()),
        }
    }
}

/// One resolved library within a target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LibraryEntry {
    pub name: String,
    pub version: String,
    pub kind: LibraryKind,
    /// (child name, version range) pairs
    pub dependencies: Vec<(String, String)>,
}

/// Resolved set of libraries for one framework (and optional runtime).
#[derive(Debug, Clone)]
pub struct Target {
    /// Target key, e.g. `net8.0` or `net8.0/linux-x64`
    pub name: String,
    pub entries: Vec<LibraryEntry>,
}

impl Target {
    /// Framework part of the key.
    pub fn framework(&self) -> &str {
        self.name.split('/').next().unwrap_or(&self.name)
    }

    /// Whether the key names a runtime identifier as well.
    pub fn is_runtime_specific(&self) -> bool {
        self.name.contains('/')
    }
}

/// Library-level details shared across targets.
#[derive(Debug, Clone, Default)]
pub struct LibraryInfo {
    pub sha512: Option<String>,
    /// Package folder, or the project file path for projects
    pub path: Option<PathBuf>,
}

/// Project facts recorded by the restore.
#[derive(Debug, Clone, Default)]
pub struct ProjectInfo {
    pub name: Option<String>,
    pub version: Option<String>,
    pub path: Option<PathBuf>,
}

/// A parsed resolved manifest.
#[derive(Debug, Clone)]
pub struct AssetsManifest {
    pub version: u32,
    pub targets: Vec<Target>,
    /// Keyed by `Name/Version`
    pub libraries: HashMap<String, LibraryInfo>,
    /// Declared dependencies per target key, in document order
    pub dependency_groups: Vec<(String, Vec<String>)>,
    pub project: ProjectInfo,
}

impl AssetsManifest {
    /// Load a manifest from disk.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(BomError::config_at("manifest not found", path));
        }

        let contents = std::fs::read_to_string(path)
            .map_err(|e| BomError::config_at(format!("failed to read manifest ({})", e), path))?;

        Self::parse(&contents).map_err(|err| match err {
            BomError::Parse { message, .. } => {
                BomError::parse(format!("manifest {}", path.display()), message)
            }
            other => other,
        })
    }

    /// Parse manifest JSON.
    pub fn parse(json: &str) -> Result<Self> {
        let raw: RawAssets = serde_json::from_str(json).map_err(|e| BomError::parse("manifest", e))?;

        if raw.version != ASSETS_VERSION {
            return Err(BomError::parse(
                "manifest",
                format!("unsupported version {} (expected {})", raw.version, ASSETS_VERSION),
            ));
        }

        let mut targets = Vec::with_capacity(raw.targets.len());
        for (name, value) in raw.targets {
            let raw_entries: BTreeMap<String, RawTargetEntry> = serde_json::from_value(value)
                .map_err(|e| BomError::parse(format!("target `{}`", name), e))?;

            let mut entries = Vec::with_capacity(raw_entries.len());
            for (key, entry) in raw_entries {
                let (lib_name, version) = split_library_key(&key)?;
                entries.push(LibraryEntry {
                    name: lib_name.to_string(),
                    version: version.to_string(),
                    kind: LibraryKind::parse(&entry.kind),
                    dependencies: entry.dependencies.into_iter().collect(),
                });
            }

            targets.push(Target { name, entries });
        }

        let libraries = raw
            .libraries
            .into_iter()
            .map(|(key, lib)| {
                let path = match LibraryKind::parse(&lib.kind) {
                    LibraryKind::Project => lib.msbuild_project.or(lib.path),
                    _ => lib.path,
                };
                let info = LibraryInfo {
                    sha512: lib.sha512,
                    path: path.as_deref().map(from_manifest_path),
                };
                (key, info)
            })
            .collect();

        let mut dependency_groups = Vec::new();
        for (name, value) in raw.project_file_dependency_groups {
            let entries: Vec<String> = serde_json::from_value(value)
                .map_err(|e| BomError::parse(format!("dependency group `{}`", name), e))?;
            dependency_groups.push((name, entries));
        }

        let project = ProjectInfo {
            name: raw.project.restore.project_name,
            version: raw.project.version,
            path: raw
                .project
                .restore
                .project_path
                .as_deref()
                .map(from_manifest_path),
        };

        Ok(AssetsManifest {
            version: raw.version,
            targets,
            libraries,
            dependency_groups,
            project,
        })
    }

    /// Names of every target, in document order.
    pub fn target_names(&self) -> Vec<String> {
        self.targets.iter().map(|t| t.name.clone()).collect()
    }

    /// Pick the target to build a graph from.
    ///
    /// An explicit framework matches a target key or its framework part.
    /// Without one, the first target that is not runtime-specific wins.
    pub fn select_target(&self, framework: Option<&str>) -> Result<&Target> {
        if self.targets.is_empty() {
            return Err(BomError::Resolution {
                message: "manifest has no resolved targets".to_string(),
                available: Vec::new(),
            });
        }

        match framework {
            Some(wanted) => self
                .targets
                .iter()
                .find(|t| t.name.eq_ignore_ascii_case(wanted))
                .or_else(|| {
                    self.targets
                        .iter()
                        .find(|t| !t.is_runtime_specific() && t.framework().eq_ignore_ascii_case(wanted))
                })
                .or_else(|| {
                    self.targets
                        .iter()
                        .find(|t| t.framework().eq_ignore_ascii_case(wanted))
                })
                .ok_or_else(|| BomError::Resolution {
                    message: format!("target framework `{}` not found in manifest", wanted),
                    available: self.target_names(),
                }),
            None => Ok(self
                .targets
                .iter()
                .find(|t| !t.is_runtime_specific())
                .unwrap_or(&self.targets[0])),
        }
    }

    /// Lowercased names the project declares itself for `target`.
    ///
    /// Group keys may be spelled differently from target keys (older
    /// restores use `.NETCoreApp,Version=v8.0`); when no group matches,
    /// the union of all groups is used.
    pub fn direct_names(&self, target: &Target) -> HashSet<String> {
        let matching: Vec<&Vec<String>> = self
            .dependency_groups
            .iter()
            .filter(|(key, _)| {
                key.eq_ignore_ascii_case(&target.name) || key.eq_ignore_ascii_case(target.framework())
            })
            .map(|(_, entries)| entries)
            .collect();

        let groups: Vec<&Vec<String>> = if matching.is_empty() {
            self.dependency_groups.iter().map(|(_, entries)| entries).collect()
        } else {
            matching
        };

        groups
            .into_iter()
            .flatten()
            .filter_map(|decl| decl.split_whitespace().next())
            .map(str::to_ascii_lowercase)
            .collect()
    }

    /// Library details for an entry.
    pub fn library(&self, entry: &LibraryEntry) -> Option<&LibraryInfo> {
        self.libraries
            .get(&format!("{}/{}", entry.name, entry.version))
            .or_else(|| {
                // Keys are case-preserving but lookups from targets may differ
                self.libraries.iter().find_map(|(key, info)| {
                    let (name, version) = key.split_once('/')?;
                    (name.eq_ignore_ascii_case(&entry.name) && version == entry.version).then_some(info)
                })
            })
    }
}

fn split_library_key(key: &str) -> Result<(&str, &str)> {
    key.split_once('/')
        .filter(|(name, version)| !name.is_empty() && !version.is_empty())
        .ok_or_else(|| BomError::parse("manifest", format!("malformed library key `{}`", key)))
}
