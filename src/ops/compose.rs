//! Document composition.
//!
//! Turns a filtered dependency graph into an output document. Identity of
//! every internal module comes from the registry, so all documents that
//! mention a module describe it the same way.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use crate::core::component::{ComponentMetadata, ComponentRecord, Scope};
use crate::core::document::{Component, DependencyEntry, OutputDocument};
use crate::core::error::{BomError, Result};
use crate::core::graph::DependencyGraph;
use crate::core::package::ModuleReference;
use crate::core::registry::ComponentRegistry;

/// A synthetic component attached to a document.
#[derive(Debug, Clone, PartialEq)]
pub struct SyntheticComponent {
    /// Identifier (or name) the component is registered under
    pub identifier: String,
    pub scope: Scope,
    /// Identifiers (or names) of registered components it depends on
    pub depends_on: Vec<String>,
}

impl SyntheticComponent {
    pub fn new(identifier: impl Into<String>) -> Self {
        SyntheticComponent {
            identifier: identifier.into(),
            scope: Scope::Required,
            depends_on: Vec::new(),
        }
    }
}

/// Options for composing one module's document.
#[derive(Debug, Clone, Default)]
pub struct ComposeOptions {
    /// Root defaults, used for the subject fallback and for inheritance
    pub defaults: ComponentMetadata,
    /// Let unresolved module references inherit copyright, publisher,
    /// license and supplier from `defaults`
    pub inherit_defaults: bool,
    pub components: Vec<SyntheticComponent>,
}

/// Accumulates components and edges keyed by bom-ref.
struct DocumentBuilder {
    subject: String,
    components: Vec<Component>,
    edges: BTreeMap<String, BTreeSet<String>>,
}

impl DocumentBuilder {
    fn new(subject: &ComponentRecord) -> Self {
        let mut edges = BTreeMap::new();
        edges.insert(subject.bom_ref.clone(), BTreeSet::new());
        DocumentBuilder {
            subject: subject.bom_ref.clone(),
            components: Vec::new(),
            edges,
        }
    }

    /// Add a component unless its bom-ref is already present.
    fn push(&mut self, component: Component) -> String {
        let bom_ref = component.identifier().to_string();
        if !self.edges.contains_key(&bom_ref) {
            self.edges.insert(bom_ref.clone(), BTreeSet::new());
            self.components.push(component);
        }
        bom_ref
    }

    fn contains(&self, bom_ref: &str) -> bool {
        self.edges.contains_key(bom_ref)
    }

    fn edge(&mut self, from: &str, to: &str) {
        if from == to || !self.contains(to) {
            return;
        }
        if let Some(targets) = self.edges.get_mut(from) {
            targets.insert(to.to_string());
        }
    }

    fn finish(mut self, subject: &ComponentRecord) -> OutputDocument {
        let mut dependencies = Vec::with_capacity(self.edges.len());
        if let Some(targets) = self.edges.remove(&self.subject) {
            dependencies.push(DependencyEntry {
                reference: self.subject.clone(),
                depends_on: targets.into_iter().collect(),
            });
        }
        dependencies.extend(self.edges.into_iter().map(|(reference, targets)| DependencyEntry {
            reference,
            depends_on: targets.into_iter().collect(),
        }));

        OutputDocument::new(subject, self.components, dependencies)
    }
}

/// Compose the output document for `graph`.
pub fn compose(
    graph: &DependencyGraph,
    options: &ComposeOptions,
    registry: &ComponentRegistry,
) -> Result<OutputDocument> {
    let subject = subject_record(graph, options, registry);
    let mut builder = DocumentBuilder::new(&subject);

    // Graph key -> bom-ref in this document
    let mut refs: HashMap<String, String> = HashMap::new();

    let mut packages: Vec<_> = graph.packages().iter().collect();
    packages.sort_by_key(|p| p.key());
    for package in &packages {
        let component = Component::from_package(package);
        if component.identifier() == subject.bom_ref {
            continue;
        }
        let bom_ref = builder.push(component);
        refs.insert(package.key(), bom_ref);
    }

    let mut references: Vec<(&ModuleReference, ComponentRecord)> = graph
        .references()
        .iter()
        .map(|r| (r, reference_record(r, options, registry)))
        .collect();
    references.sort_by(|a, b| a.1.bom_ref.cmp(&b.1.bom_ref));
    for (reference, record) in &references {
        if record.bom_ref == subject.bom_ref {
            tracing::debug!("{}: ignoring reference to itself", graph.owner());
            continue;
        }
        let bom_ref = builder.push(Component::from_record(record, Some(Scope::Required)));
        refs.insert(reference.key(), bom_ref);
    }

    // Subject edges
    for key in graph.roots() {
        if let Some(bom_ref) = refs.get(&key) {
            builder.edge(&subject.bom_ref, bom_ref);
        }
    }

    // Node edges; keys that are not in the document are omitted
    let edges = graph
        .packages()
        .iter()
        .map(|p| (p.key(), &p.depends_on))
        .chain(graph.references().iter().map(|r| (r.key(), &r.depends_on)));
    for (key, targets) in edges {
        let Some(from) = refs.get(&key) else {
            continue;
        };
        for target in targets {
            if let Some(to) = refs.get(target) {
                builder.edge(from, to);
            }
        }
    }

    attach_synthetic(&mut builder, &subject, &options.components, registry)?;

    tracing::debug!(
        "{}: composed {} components",
        subject.display_name(),
        builder.components.len()
    );

    Ok(builder.finish(&subject))
}

/// Compose the stand-alone document of a synthetic component.
pub fn compose_component(
    component: &SyntheticComponent,
    registry: &ComponentRegistry,
) -> Result<OutputDocument> {
    let subject = registry
        .lookup(&component.identifier)
        .ok_or_else(|| BomError::Consistency {
            referrer: component.identifier.clone(),
            identifier: component.identifier.clone(),
        })?;
    let mut builder = DocumentBuilder::new(&subject);

    for dependency in &component.depends_on {
        let record = lookup_dependency(registry, &subject.bom_ref, dependency)?;
        let bom_ref = builder.push(Component::from_record(&record, Some(Scope::Required)));
        builder.edge(&subject.bom_ref, &bom_ref);
    }

    Ok(builder.finish(&subject))
}

fn subject_record(
    graph: &DependencyGraph,
    options: &ComposeOptions,
    registry: &ComponentRegistry,
) -> ComponentRecord {
    match registry.resolve_reference(Some(graph.source_path()), graph.owner(), None) {
        Some(record) => (*record).clone(),
        None => {
            tracing::warn!(
                "{} is not registered, deriving its identity from the defaults",
                graph.owner()
            );
            options.defaults.resolve(graph.owner(), None)
        }
    }
}

fn reference_record(
    reference: &ModuleReference,
    options: &ComposeOptions,
    registry: &ComponentRegistry,
) -> ComponentRecord {
    let found = registry.resolve_reference(
        reference.path.as_deref(),
        &reference.name,
        reference.identifier.as_deref(),
    );

    match found {
        Some(record) => (*record).clone(),
        None => {
            tracing::debug!("{} is not registered, using its own metadata", reference.name);
            let mut record =
                ComponentRecord::new(reference.key(), &reference.name, reference.version.as_deref());
            if options.inherit_defaults {
                record.inherit(&options.defaults);
            }
            record
        }
    }
}

fn attach_synthetic(
    builder: &mut DocumentBuilder,
    subject: &ComponentRecord,
    components: &[SyntheticComponent],
    registry: &ComponentRegistry,
) -> Result<()> {
    let mut attached = Vec::with_capacity(components.len());

    for synthetic in components {
        let record = lookup_dependency(registry, &subject.bom_ref, &synthetic.identifier)?;
        if record.bom_ref == subject.bom_ref {
            continue;
        }
        let bom_ref = builder.push(Component::from_record(&record, Some(synthetic.scope)));
        if synthetic.scope != Scope::Excluded {
            builder.edge(&subject.bom_ref, &bom_ref);
        }
        attached.push((bom_ref, synthetic));
    }

    // Declared dependencies are checked even when the target is not in this
    // document; the edge is only added when it is.
    for (bom_ref, synthetic) in attached {
        for dependency in &synthetic.depends_on {
            let target = lookup_dependency(registry, &bom_ref, dependency)?;
            builder.edge(&bom_ref, &target.bom_ref);
        }
    }

    Ok(())
}

fn lookup_dependency(
    registry: &ComponentRegistry,
    referrer: &str,
    identifier: &str,
) -> Result<Arc<ComponentRecord>> {
    registry
        .lookup(identifier)
        .or_else(|| registry.lookup_name(identifier))
        .ok_or_else(|| BomError::Consistency {
            referrer: referrer.to_string(),
            identifier: identifier.to_string(),
        })
}
