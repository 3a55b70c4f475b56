//! External document merging.
//!
//! Foreign BOM documents are adopted during the registration pass: their
//! subject is registered, and renamed into the external namespace when the
//! identifier is already taken. Merging into a module graph happens later
//! and only reads the adopted copy.

use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};

use crate::core::document::{Component, OutputDocument};
use crate::core::error::{BomError, Result};
use crate::core::graph::DependencyGraph;
use crate::core::package::{ContentHash, ModuleReference, Package};
use crate::core::purl::{qualify_identifier, Purl};
use crate::core::registry::ComponentRegistry;

/// A foreign document and where it was loaded from.
#[derive(Debug, Clone, PartialEq)]
pub struct ForeignDocument {
    pub path: PathBuf,
    pub document: OutputDocument,
}

impl ForeignDocument {
    pub fn new(path: impl Into<PathBuf>, document: OutputDocument) -> Self {
        ForeignDocument {
            path: path.into(),
            document,
        }
    }

    /// Load and parse a foreign document.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(BomError::config_at("external document not found", path));
        }
        Ok(ForeignDocument::new(path, OutputDocument::load(path)?))
    }

    /// The subject component; a document without one cannot be merged.
    pub fn subject(&self) -> Result<&Component> {
        self.document.subject().ok_or_else(|| {
            BomError::parse(
                format!("BOM document {}", self.path.display()),
                "document has no subject component (metadata.component)",
            )
        })
    }

    pub fn identifier(&self) -> Result<&str> {
        Ok(self.subject()?.identifier())
    }
}

/// Rewrite every use of `old` in `document` to `new`.
///
/// Covers the subject, the component list and both sides of every
/// dependency edge. The input is left untouched.
pub fn rewrite_identifier(document: &OutputDocument, old: &str, new: &str) -> OutputDocument {
    let mut rewritten = document.clone();

    let rename = |value: &mut Option<String>| {
        if value.as_deref() == Some(old) {
            *value = Some(new.to_string());
        }
    };

    if let Some(subject) = rewritten.metadata.component.as_mut() {
        rename(&mut subject.bom_ref);
        rename(&mut subject.purl);
    }

    for component in &mut rewritten.components {
        rename(&mut component.bom_ref);
        rename(&mut component.purl);
    }

    for entry in &mut rewritten.dependencies {
        if entry.reference == old {
            entry.reference = new.to_string();
        }
        for target in &mut entry.depends_on {
            if target == old {
                *target = new.to_string();
            }
        }
    }

    rewritten
}

/// Register a foreign document's subject.
///
/// Returns the document to merge: unchanged when its identifier was free,
/// or a rewritten copy under the qualified identifier on collision. A
/// second collision on the qualified identifier is an error.
pub fn adopt_foreign(registry: &ComponentRegistry, foreign: &ForeignDocument) -> Result<ForeignDocument> {
    let subject = foreign.subject()?;
    let identifier = subject.identifier().to_string();

    if registry.register_component(subject.to_record())? {
        tracing::debug!("adopted external document {} as {}", foreign.path.display(), identifier);
        return Ok(foreign.clone());
    }

    let qualified = qualify_identifier(&identifier);
    if registry.contains(&qualified) {
        return Err(BomError::Collision {
            identifier,
            qualified,
        });
    }

    tracing::warn!(
        "external document {}: identifier {} is already registered, renaming to {}",
        foreign.path.display(),
        identifier,
        qualified
    );

    let document = rewrite_identifier(&foreign.document, &identifier, &qualified);
    let renamed = ForeignDocument::new(&foreign.path, document);

    let mut record = renamed.subject()?.to_record();
    record.bom_ref = qualified.clone();
    if !registry.register_component(record)? {
        return Err(BomError::Collision {
            identifier,
            qualified,
        });
    }

    Ok(renamed)
}

/// Merge an adopted foreign document into `graph`.
///
/// The subject becomes a module reference carrying its identifier. With
/// `include_transitive`, every other component not already in the graph
/// (by name and version) is imported together with its edges: NuGet
/// package identifiers become packages, anything else a module reference.
pub fn merge_foreign(
    graph: &DependencyGraph,
    foreign: &ForeignDocument,
    include_transitive: bool,
) -> Result<DependencyGraph> {
    let subject = foreign.subject()?;
    let subject_id = subject.identifier().to_string();
    let document = &foreign.document;

    let mut packages = graph.packages().to_vec();
    let mut references = graph.references().to_vec();

    // Foreign identifier -> key in the merged graph
    let mut keys: HashMap<String, String> = HashMap::new();
    keys.insert(subject_id.clone(), subject_id.clone());

    let mut imported: Vec<(String, Node)> = Vec::new();

    if include_transitive {
        for component in &document.components {
            let foreign_id = component.identifier().to_string();
            if foreign_id == subject_id || keys.contains_key(&foreign_id) {
                continue;
            }

            if let Some(existing) = find_by_name_version(graph, &imported, component) {
                tracing::debug!(
                    "{}: {} from {} already present",
                    graph.owner(),
                    foreign_id,
                    foreign.path.display()
                );
                keys.insert(foreign_id, existing);
                continue;
            }

            let node = classify(component);
            keys.insert(foreign_id.clone(), node.key());
            imported.push((foreign_id, node));
        }
    }

    let translate = |foreign_id: &str| -> BTreeSet<String> {
        document
            .dependencies_of(foreign_id)
            .iter()
            .filter_map(|target| keys.get(target).cloned())
            .collect()
    };

    let mut subject_ref = ModuleReference::new(&subject.name, subject.version.as_deref())
        .with_identifier(&subject_id);
    if include_transitive {
        subject_ref.depends_on = translate(&subject_id);
    }
    references.push(subject_ref);

    for (foreign_id, node) in imported {
        let depends_on = translate(&foreign_id);
        match node {
            Node::Package(mut package) => {
                package.depends_on = depends_on;
                packages.push(package);
            }
            Node::Reference(mut reference) => {
                reference.depends_on = depends_on;
                references.push(reference);
            }
        }
    }

    tracing::debug!(
        "{}: merged external document {} ({})",
        graph.owner(),
        foreign.path.display(),
        if include_transitive { "with transitive components" } else { "subject only" }
    );

    Ok(DependencyGraph::from_parts(
        graph.owner(),
        graph.source_path(),
        packages,
        references,
    ))
}

enum Node {
    Package(Package),
    Reference(ModuleReference),
}

impl Node {
    fn key(&self) -> String {
        match self {
            Node::Package(p) => p.key(),
            Node::Reference(r) => r.key(),
        }
    }

    fn matches(&self, name: &str, version: Option<&str>) -> bool {
        match self {
            Node::Package(p) => p.id.eq_ignore_ascii_case(name) && Some(p.version.as_str()) == version,
            Node::Reference(r) => r.name.eq_ignore_ascii_case(name) && r.version.as_deref() == version,
        }
    }
}

/// Classify a foreign component by its identifier.
fn classify(component: &Component) -> Node {
    let identifier = component.identifier();
    let purl = identifier.parse::<Purl>().ok();

    match (purl, component.version.as_deref()) {
        (Some(purl), Some(version)) if purl.is_nuget_package() => {
            let mut package = Package::new(&component.name, version);
            package.hash = component
                .hashes
                .first()
                .map(|h| ContentHash {
                    algorithm: h.alg.clone(),
                    value: h.content.clone(),
                });
            package.license = component.license_expression();
            package.description = component.description.clone();
            Node::Package(package)
        }
        _ => Node::Reference(
            ModuleReference::new(&component.name, component.version.as_deref())
                .with_identifier(identifier),
        ),
    }
}

fn find_by_name_version(
    graph: &DependencyGraph,
    imported: &[(String, Node)],
    component: &Component,
) -> Option<String> {
    let version = component.version.as_deref();

    graph
        .packages()
        .iter()
        .find(|p| p.id.eq_ignore_ascii_case(&component.name) && Some(p.version.as_str()) == version)
        .map(Package::key)
        .or_else(|| {
            graph
                .references()
                .iter()
                .find(|r| r.name.eq_ignore_ascii_case(&component.name) && r.version.as_deref() == version)
                .map(ModuleReference::key)
        })
        .or_else(|| {
            imported
                .iter()
                .find(|(_, node)| node.matches(&component.name, version))
                .map(|(_, node)| node.key())
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::component::ComponentRecord;
    use crate::test_support::foreign_document;

    fn widget() -> ForeignDocument {
        ForeignDocument::new(
            "/vendor/widget.cdx.json",
            foreign_document(
                "pkg:nuget/B@2.0.0",
                &[("Gear", "1.0.0"), ("Spring", "3.0.0")],
                &[
                    ("pkg:nuget/B@2.0.0", "pkg:nuget/Gear@1.0.0"),
                    ("pkg:nuget/Gear@1.0.0", "pkg:nuget/Spring@3.0.0"),
                ],
            ),
        )
    }

    fn app_graph() -> DependencyGraph {
        DependencyGraph::from_parts(
            "App",
            "/src/App/App.csproj",
            vec![Package::new("Spring", "3.0.0").direct()],
            vec![],
        )
    }

    fn all_identifiers(doc: &OutputDocument) -> Vec<String> {
        let mut ids = Vec::new();
        if let Some(subject) = doc.subject() {
            ids.extend(subject.bom_ref.clone());
            ids.extend(subject.purl.clone());
        }
        for c in &doc.components {
            ids.extend(c.bom_ref.clone());
            ids.extend(c.purl.clone());
        }
        for d in &doc.dependencies {
            ids.push(d.reference.clone());
            ids.extend(d.depends_on.iter().cloned());
        }
        ids
    }

    #[test]
    fn test_adopt_registers_free_identifier() {
        let registry = ComponentRegistry::new();
        let adopted = adopt_foreign(&registry, &widget()).unwrap();

        assert_eq!(adopted, widget());
        assert!(registry.contains("pkg:nuget/B@2.0.0"));
    }

    #[test]
    fn test_adopt_renames_on_collision() {
        let registry = ComponentRegistry::new();
        registry
            .register_module(
                Path::new("/src/B/B.csproj"),
                ComponentRecord::new("pkg:nuget/B@2.0.0", "B", Some("2.0.0")),
            )
            .unwrap();

        let original = widget();
        let adopted = adopt_foreign(&registry, &original).unwrap();

        assert_eq!(adopted.identifier().unwrap(), "pkg:nuget/external/B@2.0.0");
        assert!(!all_identifiers(&adopted.document).contains(&"pkg:nuget/B@2.0.0".to_string()));
        assert_eq!(
            adopted.document.dependencies_of("pkg:nuget/external/B@2.0.0"),
            &["pkg:nuget/Gear@1.0.0".to_string()]
        );

        // The rename is a copy
        assert_eq!(original.identifier().unwrap(), "pkg:nuget/B@2.0.0");

        let record = registry.lookup("pkg:nuget/external/B@2.0.0").unwrap();
        assert_eq!(record.name, "B");
    }

    #[test]
    fn test_adopt_second_collision_fails() {
        let registry = ComponentRegistry::new();
        registry
            .register_component(ComponentRecord::new("pkg:nuget/B@2.0.0", "B", Some("2.0.0")))
            .unwrap();
        registry
            .register_component(ComponentRecord::new(
                "pkg:nuget/external/B@2.0.0",
                "B-ext",
                Some("2.0.0"),
            ))
            .unwrap();

        let err = adopt_foreign(&registry, &widget()).unwrap_err();
        assert!(matches!(err, BomError::Collision { .. }));
    }

    #[test]
    fn test_adopt_without_subject() {
        let registry = ComponentRegistry::new();
        let mut doc = widget();
        doc.document.metadata.component = None;

        let err = adopt_foreign(&registry, &doc).unwrap_err();
        assert!(matches!(err, BomError::Parse { .. }));
    }

    #[test]
    fn test_rewrite_identifier_leaves_others() {
        let doc = widget().document;
        let rewritten = rewrite_identifier(&doc, "pkg:nuget/Gear@1.0.0", "pkg:nuget/external/Gear@1.0.0");

        assert!(rewritten.component("pkg:nuget/external/Gear@1.0.0").is_some());
        assert!(rewritten.component("pkg:nuget/Spring@3.0.0").is_some());
        assert_eq!(
            rewritten.dependencies_of("pkg:nuget/B@2.0.0"),
            &["pkg:nuget/external/Gear@1.0.0".to_string()]
        );
        assert_eq!(doc, widget().document);
    }

    #[test]
    fn test_merge_subject_only() {
        let merged = merge_foreign(&app_graph(), &widget(), false).unwrap();

        assert_eq!(merged.packages().len(), 1);
        let subject = merged.reference("pkg:nuget/B@2.0.0").unwrap();
        assert!(subject.depends_on.is_empty());
        assert_eq!(subject.identifier.as_deref(), Some("pkg:nuget/B@2.0.0"));
    }

    #[test]
    fn test_merge_transitive_dedupes_by_name_version() {
        let graph = app_graph();
        let merged = merge_foreign(&graph, &widget(), true).unwrap();

        // Spring 3.0.0 was already present; only Gear is imported
        assert_eq!(merged.packages().len(), 2);
        let gear = merged.package("pkg:nuget/Gear@1.0.0").unwrap();
        assert!(!gear.is_direct);
        assert!(gear.depends_on.contains("pkg:nuget/Spring@3.0.0"));

        let subject = merged.reference("pkg:nuget/B@2.0.0").unwrap();
        assert!(subject.depends_on.contains("pkg:nuget/Gear@1.0.0"));

        // Input graph is unchanged
        assert_eq!(graph.packages().len(), 1);
        assert!(graph.references().is_empty());
    }

    #[test]
    fn test_merge_classifies_non_nuget_as_reference() {
        let doc = ForeignDocument::new(
            "/vendor/ui.cdx.json",
            foreign_document("pkg:npm/ui-kit@4.0.0", &[], &[]),
        );
        let mut with_npm = doc.clone();
        with_npm.document.components.push(Component::from_record(
            &ComponentRecord::new("pkg:npm/left-pad@1.3.0", "left-pad", Some("1.3.0")),
            None,
        ));

        let merged = merge_foreign(&app_graph(), &with_npm, true).unwrap();

        let left_pad = merged.reference("pkg:npm/left-pad@1.3.0").unwrap();
        assert_eq!(left_pad.name, "left-pad");
        assert!(merged.reference("pkg:npm/ui-kit@4.0.0").is_some());
    }
}
