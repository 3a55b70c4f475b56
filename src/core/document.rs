//! Output documents in the CycloneDX 1.5 JSON shape.
//!
//! The same types parse foreign documents that are merged into a build,
//! so everything a foreign producer may omit is optional on input.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::core::component::{ComponentRecord, ComponentType, Scope};
use crate::core::error::{BomError, Result};
use crate::core::package::{ContentHash, Package};
use crate::util::hash::serial_number;

pub const BOM_FORMAT: &str = "CycloneDX";
pub const SPEC_VERSION: &str = "1.5";

/// A bill of materials for one module or synthetic component.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutputDocument {
    pub bom_format: String,
    pub spec_version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub serial_number: Option<String>,
    #[serde(default = "default_bom_version")]
    pub version: u32,
    #[serde(default)]
    pub metadata: Metadata,
    #[serde(default)]
    pub components: Vec<Component>,
    #[serde(default)]
    pub dependencies: Vec<DependencyEntry>,
}

fn default_bom_version() -> u32 {
    1
}

/// Document metadata.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<Tool>,
    /// The subject
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub component: Option<Component>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub supplier: Option<OrganizationalEntity>,
}

/// Tool that produced the document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tool {
    #[serde(default)]
    pub vendor: String,
    pub name: String,
    #[serde(default)]
    pub version: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrganizationalEntity {
    pub name: String,
}

/// A component entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Component {
    #[serde(rename = "type", default)]
    pub component_type: ComponentType,
    #[serde(rename = "bom-ref", default, skip_serializing_if = "Option::is_none")]
    pub bom_ref: Option<String>,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publisher: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub supplier: Option<OrganizationalEntity>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub copyright: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub purl: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<Scope>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub hashes: Vec<Hash>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub licenses: Vec<LicenseChoice>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hash {
    pub alg: String,
    pub content: String,
}

/// Either a single license or an SPDX expression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LicenseChoice {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub license: Option<License>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expression: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct License {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl LicenseChoice {
    /// A bare SPDX id becomes a license entry, anything else an expression.
    pub fn from_expression(expr: &str) -> Self {
        if expr.contains(char::is_whitespace) {
            LicenseChoice {
                license: None,
                expression: Some(expr.to_string()),
            }
        } else {
            LicenseChoice {
                license: Some(License {
                    id: Some(expr.to_string()),
                    name: None,
                }),
                expression: None,
            }
        }
    }

    fn as_expression(&self) -> Option<String> {
        self.expression.clone().or_else(|| {
            self.license
                .as_ref()
                .and_then(|l| l.id.clone().or_else(|| l.name.clone()))
        })
    }
}

/// Adjacency entry: `reference` depends on every id in `depends_on`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DependencyEntry {
    #[serde(rename = "ref")]
    pub reference: String,
    #[serde(rename = "dependsOn", default)]
    pub depends_on: Vec<String>,
}

impl Component {
    /// Component entry for a registered record.
    pub fn from_record(record: &ComponentRecord, scope: Option<Scope>) -> Self {
        Component {
            component_type: record.component_type,
            bom_ref: Some(record.bom_ref.clone()),
            name: record.name.clone(),
            version: record.version.clone(),
            description: record.description.clone(),
            publisher: record.publisher.clone(),
            supplier: record
                .supplier
                .as_ref()
                .map(|name| OrganizationalEntity { name: name.clone() }),
            copyright: record.copyright.clone(),
            purl: Some(record.bom_ref.clone()),
            scope,
            hashes: Vec::new(),
            licenses: record
                .license
                .as_deref()
                .map(LicenseChoice::from_expression)
                .into_iter()
                .collect(),
        }
    }

    /// Component entry for an external package.
    pub fn from_package(package: &Package) -> Self {
        let key = package.key();
        let scope = if package.is_direct {
            Scope::Required
        } else {
            Scope::Optional
        };

        Component {
            component_type: ComponentType::Library,
            bom_ref: Some(key.clone()),
            name: package.id.clone(),
            version: Some(package.version.clone()),
            description: package.description.clone(),
            publisher: None,
            supplier: None,
            copyright: None,
            purl: Some(key),
            scope: Some(scope),
            hashes: package
                .hash
                .iter()
                .map(|h: &ContentHash| Hash {
                    alg: h.algorithm.clone(),
                    content: h.value.clone(),
                })
                .collect(),
            licenses: package
                .license
                .as_deref()
                .map(LicenseChoice::from_expression)
                .into_iter()
                .collect(),
        }
    }

    /// Identifier of this entry: bom-ref, else purl, else name.
    pub fn identifier(&self) -> &str {
        self.bom_ref
            .as_deref()
            .or(self.purl.as_deref())
            .unwrap_or(&self.name)
    }

    /// License expression, joining multiple entries with `AND`.
    pub fn license_expression(&self) -> Option<String> {
        let parts: Vec<String> = self
            .licenses
            .iter()
            .filter_map(LicenseChoice::as_expression)
            .collect();

        if parts.is_empty() {
            None
        } else {
            Some(parts.join(" AND "))
        }
    }

    /// Record view of this entry, used when adopting foreign subjects.
    pub fn to_record(&self) -> ComponentRecord {
        ComponentRecord {
            bom_ref: self.identifier().to_string(),
            name: self.name.clone(),
            version: self.version.clone(),
            description: self.description.clone(),
            publisher: self.publisher.clone(),
            supplier: self.supplier.as_ref().map(|s| s.name.clone()),
            license: self.license_expression(),
            copyright: self.copyright.clone(),
            component_type: self.component_type,
        }
    }
}

impl OutputDocument {
    /// Assemble a document around `subject`.
    pub fn new(
        subject: &ComponentRecord,
        components: Vec<Component>,
        dependencies: Vec<DependencyEntry>,
    ) -> Self {
        OutputDocument {
            bom_format: BOM_FORMAT.to_string(),
            spec_version: SPEC_VERSION.to_string(),
            serial_number: Some(serial_number(&subject.bom_ref)),
            version: 1,
            metadata: Metadata {
                tools: vec![Tool {
                    vendor: "lockbom".to_string(),
                    name: "lockbom".to_string(),
                    version: env!("CARGO_PKG_VERSION").to_string(),
                }],
                component: Some(Component::from_record(subject, None)),
                supplier: subject
                    .supplier
                    .as_ref()
                    .map(|name| OrganizationalEntity { name: name.clone() }),
            },
            components,
            dependencies,
        }
    }

    /// The subject component.
    pub fn subject(&self) -> Option<&Component> {
        self.metadata.component.as_ref()
    }

    /// Find a component entry by identifier.
    pub fn component(&self, identifier: &str) -> Option<&Component> {
        self.components.iter().find(|c| c.identifier() == identifier)
    }

    /// Outgoing edges of `reference`, empty when it has no entry.
    pub fn dependencies_of(&self, reference: &str) -> &[String] {
        self.dependencies
            .iter()
            .find(|d| d.reference == reference)
            .map(|d| d.depends_on.as_slice())
            .unwrap_or(&[])
    }

    /// Parse a document from JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| BomError::parse("BOM document", e))
    }

    /// Load a document from a file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|_| BomError::config_at("failed to read BOM document", path))?;

        Self::from_json(&contents).map_err(|err| match err {
            BomError::Parse { message, .. } => {
                BomError::parse(format!("BOM document {}", path.display()), message)
            }
            other => other,
        })
    }

    /// Serialize as pretty-printed JSON.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| BomError::parse("BOM document", e))
    }

    /// Write the document, creating parent directories as needed.
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        let json = self.to_json()?;
        crate::util::fs::write_string(path, &json)
    }
}
