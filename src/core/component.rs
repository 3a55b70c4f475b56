//! Component metadata - WHO a module is when it appears in a document.
//!
//! `ComponentMetadata` is the partial, user-facing form (every field
//! optional) that configuration layers merge field by field.
//! `ComponentRecord` is the resolved form stored in the registry and
//! adopted verbatim by every document that mentions the component.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::core::purl::Purl;

/// Version assigned to modules that declare none.
pub const DEFAULT_VERSION: &str = "1.0.0";

/// Kind of component, as named by CycloneDX.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ComponentType {
    Application,
    Framework,
    #[default]
    Library,
    Container,
    Platform,
    OperatingSystem,
    Device,
    DeviceDriver,
    Firmware,
    File,
    MachineLearningModel,
    Data,
}

impl ComponentType {
    const ALL: [ComponentType; 12] = [
        ComponentType::Application,
        ComponentType::Framework,
        ComponentType::Library,
        ComponentType::Container,
        ComponentType::Platform,
        ComponentType::OperatingSystem,
        ComponentType::Device,
        ComponentType::DeviceDriver,
        ComponentType::Firmware,
        ComponentType::File,
        ComponentType::MachineLearningModel,
        ComponentType::Data,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ComponentType::Application => "application",
            ComponentType::Framework => "framework",
            ComponentType::Library => "library",
            ComponentType::Container => "container",
            ComponentType::Platform => "platform",
            ComponentType::OperatingSystem => "operating-system",
            ComponentType::Device => "device",
            ComponentType::DeviceDriver => "device-driver",
            ComponentType::Firmware => "firmware",
            ComponentType::File => "file",
            ComponentType::MachineLearningModel => "machine-learning-model",
            ComponentType::Data => "data",
        }
    }
}

impl fmt::Display for ComponentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ComponentType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ComponentType::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown component type '{}'", s))
    }
}

/// How a component is needed by the subject of a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    #[default]
    Required,
    Optional,
    Excluded,
}

/// Partial component metadata from configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ComponentMetadata {
    /// Explicit identifier; derived from name and version when unset
    pub identifier: Option<String>,
    pub name: Option<String>,
    pub version: Option<String>,
    pub description: Option<String>,
    pub publisher: Option<String>,
    pub supplier: Option<String>,
    pub license: Option<String>,
    pub copyright: Option<String>,
    #[serde(rename = "type")]
    pub component_type: Option<ComponentType>,
}

impl ComponentMetadata {
    /// Merge another layer into this one (other takes precedence).
    pub fn merge(&mut self, other: &ComponentMetadata) {
        if other.identifier.is_some() {
            self.identifier = other.identifier.clone();
        }
        if other.name.is_some() {
            self.name = other.name.clone();
        }
        if other.version.is_some() {
            self.version = other.version.clone();
        }
        if other.description.is_some() {
            self.description = other.description.clone();
        }
        if other.publisher.is_some() {
            self.publisher = other.publisher.clone();
        }
        if other.supplier.is_some() {
            self.supplier = other.supplier.clone();
        }
        if other.license.is_some() {
            self.license = other.license.clone();
        }
        if other.copyright.is_some() {
            self.copyright = other.copyright.clone();
        }
        if other.component_type.is_some() {
            self.component_type = other.component_type;
        }
    }

    /// Resolve into a record; `name` and `version` are used when unset.
    pub fn resolve(&self, name: &str, version: Option<&str>) -> ComponentRecord {
        let name = self.name.clone().unwrap_or_else(|| name.to_string());
        let version = self
            .version
            .clone()
            .or_else(|| version.map(str::to_string))
            .unwrap_or_else(|| DEFAULT_VERSION.to_string());
        let bom_ref = self
            .identifier
            .clone()
            .unwrap_or_else(|| Purl::nuget(&name, &version).to_string());

        ComponentRecord {
            bom_ref,
            name,
            version: Some(version),
            description: self.description.clone(),
            publisher: self.publisher.clone(),
            supplier: self.supplier.clone(),
            license: self.license.clone(),
            copyright: self.copyright.clone(),
            component_type: self.component_type.unwrap_or_default(),
        }
    }
}

/// Fully resolved component identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComponentRecord {
    /// Identifier string; doubles as purl and dependency key
    pub bom_ref: String,
    pub name: String,
    pub version: Option<String>,
    pub description: Option<String>,
    pub publisher: Option<String>,
    pub supplier: Option<String>,
    pub license: Option<String>,
    pub copyright: Option<String>,
    pub component_type: ComponentType,
}

impl ComponentRecord {
    /// A bare record with only identity fields.
    pub fn new(bom_ref: impl Into<String>, name: impl Into<String>, version: Option<&str>) -> Self {
        ComponentRecord {
            bom_ref: bom_ref.into(),
            name: name.into(),
            version: version.map(str::to_string),
            description: None,
            publisher: None,
            supplier: None,
            license: None,
            copyright: None,
            component_type: ComponentType::Library,
        }
    }

    /// Inherit organisation-wide metadata for fields that are unset.
    pub fn inherit(&mut self, defaults: &ComponentMetadata) {
        if self.copyright.is_none() {
            self.copyright = defaults.copyright.clone();
        }
        if self.publisher.is_none() {
            self.publisher = defaults.publisher.clone();
        }
        if self.license.is_none() {
            self.license = defaults.license.clone();
        }
        if self.supplier.is_none() {
            self.supplier = defaults.supplier.clone();
        }
    }

    /// Display string like "LibA v1.0.0".
    pub fn display_name(&self) -> String {
        match &self.version {
            Some(v) => format!("{} v{}", self.name, v),
            None => self.name.clone(),
        }
    }
}
