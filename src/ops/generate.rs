//! Document generation - the two-pass driver.
//!
//! Pass 1 reads every manifest, builds every graph and registers every
//! module, synthetic component and foreign document subject. Pass 2 only
//! starts once the registry is frozen: it filters, merges, composes and
//! writes one document per module.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use rayon::prelude::*;

use crate::core::component::{ComponentRecord, DEFAULT_VERSION};
use crate::core::document::OutputDocument;
use crate::core::error::BomError;
use crate::core::graph::DependencyGraph;
use crate::core::purl::Purl;
use crate::core::registry::ComponentRegistry;
use crate::ops::compose::{compose, compose_component, ComposeOptions, SyntheticComponent};
use crate::ops::filter::filter_graph;
use crate::ops::merge::{adopt_foreign, merge_foreign, ForeignDocument};
use crate::resolver::assets::AssetsManifest;
use crate::resolver::builder::GraphBuilder;
use crate::util::config::{ComponentConfig, Config, ModuleConfig};
use crate::util::fs::expand_pattern;

/// Extension of every written document.
pub const DOCUMENT_EXTENSION: &str = "cdx.json";

/// Options for `generate`.
#[derive(Debug, Clone, Default)]
pub struct GenerateOptions {
    /// Overrides `[output] directory`
    pub output_dir: Option<PathBuf>,
}

/// One written document.
#[derive(Debug, Clone)]
pub struct WrittenDocument {
    /// Subject identifier
    pub subject: String,
    pub name: String,
    pub path: PathBuf,
    pub components: usize,
}

/// Result of a generation run.
#[derive(Debug, Clone, Default)]
pub struct GenerateReport {
    pub documents: Vec<WrittenDocument>,
}

/// A module after pass 1.
struct ResolvedModule<'a> {
    config: &'a ModuleConfig,
    record: ComponentRecord,
    graph: DependencyGraph,
}

/// Generate documents for every configured module and for every synthetic
/// component that asks for one.
///
/// `base_dir` is where documents go when no output directory is configured.
pub fn generate(config: &Config, base_dir: &Path, options: &GenerateOptions) -> Result<GenerateReport> {
    if config.modules.is_empty() && config.components.is_empty() {
        bail!("no modules or components configured");
    }

    let registry = ComponentRegistry::new();

    // Pass 1: resolution and registration
    let mut modules = resolve_modules(config)?;

    for module in &mut modules {
        let canonical = registry.register_module(&module.config.path, module.record.clone())?;
        module.record = (*canonical).clone();
    }

    let synthetic = register_components(&config.components, &registry)?;
    let foreign = adopt_external_documents(&config.modules, &registry)?;

    registry.freeze();
    tracing::debug!("registry frozen with {} keys", registry.len());

    // Pass 2: composition
    let output_dir = options
        .output_dir
        .clone()
        .or_else(|| config.output.directory.clone())
        .unwrap_or_else(|| base_dir.to_path_buf());

    let mut report = GenerateReport::default();

    for module in &modules {
        let document = compose_module(config, module, &foreign, &registry)
            .with_context(|| format!("failed to compose document for {}", module.record.name))?;

        let file_name = module
            .config
            .output
            .clone()
            .unwrap_or_else(|| default_file_name(&module.record.name));
        report
            .documents
            .push(write_document(&document, &module.record, &output_dir.join(file_name))?);
    }

    for (component_config, component) in &synthetic {
        if !component_config.document {
            continue;
        }

        let document = compose_component(component, &registry)
            .with_context(|| format!("failed to compose document for {}", component.identifier))?;
        let record = registry
            .lookup(&component.identifier)
            .ok_or_else(|| BomError::Consistency {
                referrer: "generate".to_string(),
                identifier: component.identifier.clone(),
            })?;

        let file_name = component_config
            .output
            .clone()
            .unwrap_or_else(|| default_file_name(&record.name));
        report
            .documents
            .push(write_document(&document, &record, &output_dir.join(file_name))?);
    }

    Ok(report)
}

/// Default output file name for a subject.
///
/// Characters that are not portable in file names become `_`.
pub fn default_file_name(name: &str) -> PathBuf {
    let stem: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c => c,
        })
        .collect();
    PathBuf::from(format!("{}.{}", stem, DOCUMENT_EXTENSION))
}

/// Read manifests and build graphs for all modules in parallel.
fn resolve_modules(config: &Config) -> Result<Vec<ResolvedModule<'_>>> {
    config
        .modules
        .par_iter()
        .map(|module| {
            resolve_module(module, config)
                .with_context(|| format!("failed to resolve module {}", module.path.display()))
        })
        .collect()
}

fn resolve_module<'a>(module: &'a ModuleConfig, config: &Config) -> Result<ResolvedModule<'a>> {
    let module_dir = module.directory();

    let mut manifests = Vec::new();
    for pattern in &module.assets {
        for path in expand_pattern(&module_dir, pattern)? {
            manifests.push(AssetsManifest::load(&path)?);
        }
    }
    if manifests.is_empty() {
        return Err(BomError::config(format!(
            "no manifests matched {}",
            module.assets.join(", ")
        ))
        .into());
    }

    let metadata = module.effective_metadata(&config.defaults);
    let primary = &manifests[0].project;

    let name = metadata
        .name
        .clone()
        .or_else(|| primary.name.clone())
        .or_else(|| {
            module
                .path
                .file_stem()
                .map(|stem| stem.to_string_lossy().into_owned())
        })
        .ok_or_else(|| BomError::config_at("module has no name", &module.path))?;
    let version = metadata
        .version
        .clone()
        .or_else(|| primary.version.clone())
        .unwrap_or_else(|| DEFAULT_VERSION.to_string());

    let record = metadata.resolve(&name, Some(&version));

    let graph = GraphBuilder::new(&name, &module.path)
        .framework(module.effective_framework(&config.defaults))
        .build_merged(&manifests)?;

    tracing::info!(
        "Resolved {} ({} packages, {} module references)",
        record.display_name(),
        graph.packages().len(),
        graph.references().len()
    );

    Ok(ResolvedModule {
        config: module,
        record,
        graph,
    })
}

/// Register declared synthetic components in declaration order.
fn register_components<'a>(
    components: &'a [ComponentConfig],
    registry: &ComponentRegistry,
) -> Result<Vec<(&'a ComponentConfig, SyntheticComponent)>> {
    let mut registered = Vec::with_capacity(components.len());

    for component in components {
        // A purl identifier supplies the name and version left unset
        let identity = component
            .metadata
            .identifier
            .as_deref()
            .and_then(|id| id.parse::<Purl>().ok());

        let name = component
            .metadata
            .name
            .clone()
            .or_else(|| identity.as_ref().map(|purl| purl.name().to_string()))
            .or_else(|| component.metadata.identifier.clone())
            .ok_or_else(|| BomError::config("component needs a name or identifier"))?;

        let record = component
            .metadata
            .resolve(&name, identity.as_ref().and_then(Purl::version));
        let identifier = record.bom_ref.clone();

        if !registry.register_component(record)? {
            tracing::warn!("component {} is already registered, keeping the first", identifier);
        }

        registered.push((
            component,
            SyntheticComponent {
                identifier,
                scope: component.scope,
                depends_on: component.depends_on.clone(),
            },
        ));
    }

    Ok(registered)
}

/// Load and adopt every referenced foreign document once.
fn adopt_external_documents(
    modules: &[ModuleConfig],
    registry: &ComponentRegistry,
) -> Result<HashMap<PathBuf, ForeignDocument>> {
    let mut adopted = HashMap::new();

    for external in modules.iter().flat_map(|m| &m.external) {
        if adopted.contains_key(&external.path) {
            continue;
        }

        let foreign = ForeignDocument::load(&external.path)?;
        let foreign = adopt_foreign(registry, &foreign)
            .with_context(|| format!("failed to adopt {}", external.path.display()))?;
        adopted.insert(external.path.clone(), foreign);
    }

    Ok(adopted)
}

fn compose_module(
    config: &Config,
    module: &ResolvedModule<'_>,
    foreign: &HashMap<PathBuf, ForeignDocument>,
    registry: &ComponentRegistry,
) -> Result<OutputDocument> {
    let rules = module.config.effective_exclusions(&config.defaults);
    let mut graph = filter_graph(&module.graph, &rules);

    for external in &module.config.external {
        let document = foreign.get(&external.path).ok_or_else(|| {
            BomError::config_at("external document was not adopted", &external.path)
        })?;
        let include_transitive = external
            .include_transitive
            .unwrap_or_else(|| config.defaults.includes_transitive());
        graph = merge_foreign(&graph, document, include_transitive)?;
    }

    let components = module
        .config
        .effective_components(&config.defaults)
        .into_iter()
        .map(|id| synthetic_for(config, &id))
        .collect();

    let options = ComposeOptions {
        defaults: config.defaults.metadata.clone(),
        inherit_defaults: config.defaults.inherits(),
        components,
    };

    Ok(compose(&graph, &options, registry)?)
}

/// Attachment settings for a component listed by a module.
///
/// Components that were never declared keep their identifier, so
/// composition reports them as unregistered.
fn synthetic_for(config: &Config, id: &str) -> SyntheticComponent {
    match config.component(id) {
        Some(declared) => SyntheticComponent {
            identifier: id.to_string(),
            scope: declared.scope,
            depends_on: declared.depends_on.clone(),
        },
        None => SyntheticComponent::new(id),
    }
}

fn write_document(
    document: &OutputDocument,
    subject: &ComponentRecord,
    path: &Path,
) -> Result<WrittenDocument> {
    document
        .save(path)
        .with_context(|| format!("failed to write document for {}", subject.name))?;

    tracing::info!("Wrote {} to {}", subject.display_name(), path.display());

    Ok(WrittenDocument {
        subject: subject.bom_ref.clone(),
        name: subject.name.clone(),
        path: path.to_path_buf(),
        components: document.components.len(),
    })
}
