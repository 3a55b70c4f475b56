//! Graph nodes - external packages and references to internal modules.

use std::collections::BTreeSet;
use std::path::PathBuf;

use crate::core::purl::{Purl, NUGET};
use crate::util::hash::base64_to_hex;

/// Resolved content hash of a package archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentHash {
    /// CycloneDX algorithm name (e.g. "SHA-512")
    pub algorithm: String,
    pub value: String,
}

impl ContentHash {
    /// SHA-512 from a hex digest.
    pub fn sha512(value: impl Into<String>) -> Self {
        ContentHash {
            algorithm: "SHA-512".to_string(),
            value: value.into(),
        }
    }

    /// SHA-512 from a manifest `sha512` value, which is base64.
    pub fn from_nuget_sha512(value: &str) -> Option<Self> {
        base64_to_hex(value).map(ContentHash::sha512)
    }
}

/// An external dependency resolved by the package manager.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Package {
    /// Ecosystem-qualified name (e.g. "Newtonsoft.Json")
    pub id: String,
    pub version: String,
    pub hash: Option<ContentHash>,
    /// License expression
    pub license: Option<String>,
    pub description: Option<String>,
    /// Declared by the owning module itself
    pub is_direct: bool,
    /// Keys of the nodes this package depends on
    pub depends_on: BTreeSet<String>,
}

impl Package {
    pub fn new(id: impl Into<String>, version: impl Into<String>) -> Self {
        Package {
            id: id.into(),
            version: version.into(),
            hash: None,
            license: None,
            description: None,
            is_direct: false,
            depends_on: BTreeSet::new(),
        }
    }

    pub fn direct(mut self) -> Self {
        self.is_direct = true;
        self
    }

    pub fn with_dependency(mut self, key: impl Into<String>) -> Self {
        self.depends_on.insert(key.into());
        self
    }

    /// Graph key; also the bom-ref of the emitted component.
    pub fn key(&self) -> String {
        Purl::nuget(&self.id, &self.version).to_string()
    }
}

/// A reference to another internally built module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleReference {
    pub name: String,
    /// Filled from the referenced module's registered record when available
    pub version: Option<String>,
    /// Absolute path of the referenced module's project file
    pub path: Option<PathBuf>,
    /// Identity carried over from a foreign document
    pub identifier: Option<String>,
    pub depends_on: BTreeSet<String>,
}

impl ModuleReference {
    pub fn new(name: impl Into<String>, version: Option<&str>) -> Self {
        ModuleReference {
            name: name.into(),
            version: version.map(str::to_string),
            path: None,
            identifier: None,
            depends_on: BTreeSet::new(),
        }
    }

    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn with_identifier(mut self, identifier: impl Into<String>) -> Self {
        self.identifier = Some(identifier.into());
        self
    }

    pub fn with_dependency(mut self, key: impl Into<String>) -> Self {
        self.depends_on.insert(key.into());
        self
    }

    /// Graph key: the carried identifier, or one derived from name and version.
    pub fn key(&self) -> String {
        match &self.identifier {
            Some(id) => id.clone(),
            None => Purl::new(NUGET, &self.name, self.version.as_deref()).to_string(),
        }
    }
}
