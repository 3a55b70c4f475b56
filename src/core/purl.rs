//! Component identifiers - `scheme:ecosystem/[namespace/]name@version`.
//!
//! The rendered string is used everywhere as identity: it is the purl shown
//! in output documents, the bom-ref that dependency edges point at, and the
//! key of every graph and registry map.

use std::fmt;
use std::str::FromStr;

use crate::core::error::BomError;

/// Scheme of every identifier this tool emits.
pub const SCHEME: &str = "pkg";

/// Ecosystem of packages read from NuGet manifests.
pub const NUGET: &str = "nuget";

/// Namespace inserted into an identifier that collides on external merge.
pub const EXTERNAL_NAMESPACE: &str = "external";

/// A parsed package URL.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Purl {
    ecosystem: String,
    namespace: Option<String>,
    name: String,
    version: Option<String>,
}

impl Purl {
    /// Create an identifier without namespace.
    pub fn new(ecosystem: impl Into<String>, name: impl Into<String>, version: Option<&str>) -> Self {
        Purl {
            ecosystem: ecosystem.into(),
            namespace: None,
            name: name.into(),
            version: version.map(str::to_string),
        }
    }

    /// Identifier of a NuGet package or module.
    pub fn nuget(name: &str, version: &str) -> Self {
        Purl::new(NUGET, name, Some(version))
    }

    pub fn ecosystem(&self) -> &str {
        &self.ecosystem
    }

    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    /// Whether this identifier follows the external-package convention
    /// (a NuGet purl without namespace).
    pub fn is_nuget_package(&self) -> bool {
        self.ecosystem == NUGET && self.namespace.is_none()
    }

    /// Copy of this identifier with `namespace` prepended to its path.
    pub fn with_namespace(&self, namespace: &str) -> Self {
        let namespace = match &self.namespace {
            Some(existing) => format!("{}/{}", namespace, existing),
            None => namespace.to_string(),
        };

        Purl {
            namespace: Some(namespace),
            ..self.clone()
        }
    }
}

impl fmt::Display for Purl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}/", SCHEME, self.ecosystem)?;
        if let Some(ns) = &self.namespace {
            write!(f, "{}/", ns)?;
        }
        write!(f, "{}", self.name)?;
        if let Some(version) = &self.version {
            write!(f, "@{}", version)?;
        }
        Ok(())
    }
}

impl FromStr for Purl {
    type Err = BomError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: &str| BomError::parse(format!("identifier `{}`", s), reason);

        let rest = s
            .strip_prefix(SCHEME)
            .and_then(|r| r.strip_prefix(':'))
            .ok_or_else(|| invalid("expected `pkg:` scheme"))?;

        // Qualifiers and subpaths are not part of identity.
        let rest = rest.split(['?', '#']).next().unwrap_or(rest);

        let (path, version) = match rest.rsplit_once('@') {
            // `@` inside a namespace such as `@scope/name`
            Some((_, version)) if version.contains('/') => (rest, None),
            Some((_, "")) => return Err(invalid("empty version")),
            Some((path, version)) => (path, Some(version.to_string())),
            None => (rest, None),
        };

        let mut segments: Vec<&str> = path.split('/').collect();
        if segments.len() < 2 || segments.iter().any(|seg| seg.is_empty()) {
            return Err(invalid("expected `pkg:<ecosystem>/<name>`"));
        }

        let ecosystem = segments.remove(0).to_string();
        let name = segments.pop().unwrap_or_default().to_string();
        let namespace = if segments.is_empty() {
            None
        } else {
            Some(segments.join("/"))
        };

        Ok(Purl {
            ecosystem,
            namespace,
            name,
            version,
        })
    }
}

/// Qualified form of a colliding identifier.
///
/// Purls get the external namespace inserted; other strings are prefixed.
pub fn qualify_identifier(identifier: &str) -> String {
    match identifier.parse::<Purl>() {
        Ok(purl) => purl.with_namespace(EXTERNAL_NAMESPACE).to_string(),
        Err(_) => format!("{}:{}", EXTERNAL_NAMESPACE, identifier),
    }
}
