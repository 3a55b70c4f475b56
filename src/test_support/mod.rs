//! Test fixtures for lockbom unit tests.
//!
//! `AssetsFixture` writes resolved manifests in the shape a NuGet restore
//! produces, so tests can describe a dependency graph in a few lines.
//!
//! # Example
//!
//! ```rust,ignore
//! let json = AssetsFixture::new("LibA", "1.0.0")
//!     .package("Foo", "1.0.0", &[("Bar", "2.0.0")])
//!     .package("Bar", "2.0.0", &[])
//!     .declare("Foo >= 1.0.0")
//!     .to_json();
//! ```

use std::path::{Path, PathBuf};

use serde_json::{json, Map, Value};

use crate::core::component::ComponentRecord;
use crate::core::document::{Component, DependencyEntry, OutputDocument};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use crate::util::hash::sha256_bytes;

#[derive(Debug, Clone)]
struct FixtureEntry {
    name: String,
    version: String,
    kind: &'static str,
    dependencies: Vec<(String, String)>,
    path: String,
}

/// Builder for `project.assets.json` contents.
#[derive(Debug, Clone)]
pub struct AssetsFixture {
    name: String,
    version: String,
    project_path: Option<String>,
    targets: Vec<String>,
    entries: Vec<FixtureEntry>,
    declared: Vec<String>,
}

impl AssetsFixture {
    pub fn new(name: &str, version: &str) -> Self {
        AssetsFixture {
            name: name.to_string(),
            version: version.to_string(),
            project_path: None,
            targets: Vec::new(),
            entries: Vec::new(),
            declared: Vec::new(),
        }
    }

    /// Add a target key. Every entry appears in every target.
    /// Defaults to `net8.0` when none is added.
    pub fn target(mut self, name: &str) -> Self {
        self.targets.push(name.to_string());
        self
    }

    pub fn package(mut self, name: &str, version: &str, deps: &[(&str, &str)]) -> Self {
        self.entries.push(FixtureEntry {
            name: name.to_string(),
            version: version.to_string(),
            kind: "package",
            dependencies: deps
                .iter()
                .map(|(n, v)| (n.to_string(), v.to_string()))
                .collect(),
            path: format!("{}/{}", name.to_ascii_lowercase(), version),
        });
        self
    }

    /// Add a project reference; `path` is relative to the owning project.
    pub fn project(mut self, name: &str, version: &str, path: &str) -> Self {
        self.entries.push(FixtureEntry {
            name: name.to_string(),
            version: version.to_string(),
            kind: "project",
            dependencies: Vec::new(),
            path: path.to_string(),
        });
        self
    }

    /// Add a `projectFileDependencyGroups` declaration like `Foo >= 1.0.0`.
    pub fn declare(mut self, declaration: &str) -> Self {
        self.declared.push(declaration.to_string());
        self
    }

    pub fn project_path(mut self, path: &str) -> Self {
        self.project_path = Some(path.to_string());
        self
    }

    pub fn to_value(&self) -> Value {
        let targets = if self.targets.is_empty() {
            vec!["net8.0".to_string()]
        } else {
            self.targets.clone()
        };

        let mut target_entries = Map::new();
        let mut libraries = Map::new();
        for entry in &self.entries {
            let key = format!("{}/{}", entry.name, entry.version);
            let deps: Map<String, Value> = entry
                .dependencies
                .iter()
                .map(|(n, v)| (n.clone(), Value::String(v.clone())))
                .collect();

            target_entries.insert(key.clone(), json!({ "type": entry.kind, "dependencies": deps }));

            let library = if entry.kind == "project" {
                json!({ "type": "project", "path": entry.path, "msbuildProject": entry.path })
            } else {
                json!({ "type": "package", "sha512": STANDARD.encode(sha256_bytes(key.as_bytes())), "path": entry.path })
            };
            libraries.insert(key, library);
        }

        let mut target_map = Map::new();
        let mut groups = Map::new();
        for target in &targets {
            target_map.insert(target.clone(), Value::Object(target_entries.clone()));
            if !target.contains('/') {
                groups.insert(target.clone(), json!(self.declared));
            }
        }

        let project_path = self
            .project_path
            .clone()
            .unwrap_or_else(|| format!("/src/{0}/{0}.csproj", self.name));

        json!({
            "version": 3,
            "targets": target_map,
            "libraries": libraries,
            "projectFileDependencyGroups": groups,
            "project": {
                "version": self.version,
                "restore": {
                    "projectName": self.name,
                    "projectPath": project_path
                }
            }
        })
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(&self.to_value()).unwrap()
    }

    /// Write to `<dir>/obj/project.assets.json`, returning the file path.
    pub fn write(&self, dir: &Path) -> PathBuf {
        let path = dir.join("obj").join("project.assets.json");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, self.to_json()).unwrap();
        path
    }
}

/// A foreign document with `subject` and NuGet package components.
///
/// `edges` are (from, to) pairs of identifiers.
pub fn foreign_document(
    subject: &str,
    packages: &[(&str, &str)],
    edges: &[(&str, &str)],
) -> OutputDocument {
    let subject_purl: crate::core::purl::Purl = subject.parse().unwrap();
    let record = ComponentRecord::new(subject, subject_purl.name(), subject_purl.version());

    let components = packages
        .iter()
        .map(|(name, version)| {
            let id = format!("pkg:nuget/{}@{}", name, version);
            Component::from_record(&ComponentRecord::new(id, *name, Some(version)), None)
        })
        .collect();

    let mut dependencies: Vec<DependencyEntry> = Vec::new();
    for (from, to) in edges {
        match dependencies.iter_mut().find(|d| d.reference == *from) {
            Some(entry) => entry.depends_on.push(to.to_string()),
            None => dependencies.push(DependencyEntry {
                reference: from.to_string(),
                depends_on: vec![to.to_string()],
            }),
        }
    }

    OutputDocument::new(&record, components, dependencies)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_fixture_shape() {
        let value = AssetsFixture::new("LibA", "1.0.0")
            .package("Foo", "1.0.0", &[("Bar", "2.0.0")])
            .declare("Foo >= 1.0.0")
            .to_value();

        assert_eq!(value["version"], 3);
        assert_eq!(value["targets"]["net8.0"]["Foo/1.0.0"]["type"], "package");
        assert_eq!(value["projectFileDependencyGroups"]["net8.0"][0], "Foo >= 1.0.0");
        assert_eq!(value["project"]["restore"]["projectName"], "LibA");
    }

    #[test]
    fn test_fixture_write() {
        let tmp = TempDir::new().unwrap();
        let path = AssetsFixture::new("LibA", "1.0.0").write(tmp.path());
        assert!(path.ends_with("obj/project.assets.json"));
        assert!(path.exists());
    }

    #[test]
    fn test_foreign_document() {
        let doc = foreign_document(
            "pkg:nuget/Widget@2.0.0",
            &[("Gear", "1.0.0")],
            &[("pkg:nuget/Widget@2.0.0", "pkg:nuget/Gear@1.0.0")],
        );

        assert_eq!(doc.subject().unwrap().identifier(), "pkg:nuget/Widget@2.0.0");
        assert_eq!(
            doc.dependencies_of("pkg:nuget/Widget@2.0.0"),
            &["pkg:nuget/Gear@1.0.0".to_string()]
        );
    }
}
