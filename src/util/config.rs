//! Configuration file support for lockbom.
//!
//! lockbom reads two configuration files:
//! - Global: `~/.lockbom/config.toml` - organisation-wide defaults
//! - Project: `lockbom.toml` - modules, components and overrides
//!
//! Project config takes precedence over global config, field by field.
//! Per-module settings in turn override `[defaults]`.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::core::component::{ComponentMetadata, Scope};
use crate::core::error::{BomError, Result};
use crate::ops::filter::ExclusionRules;
use crate::util::fs::absolutize;

/// Name of the project configuration file.
pub const CONFIG_FILE_NAME: &str = "lockbom.toml";

/// lockbom configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Settings every module starts from
    pub defaults: Defaults,

    /// Output settings
    pub output: OutputConfig,

    /// Modules to produce documents for, in declaration order
    #[serde(rename = "module")]
    pub modules: Vec<ModuleConfig>,

    /// Synthetic components
    #[serde(rename = "component")]
    pub components: Vec<ComponentConfig>,
}

/// Defaults shared by all modules.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Defaults {
    /// Publisher, supplier, license, copyright, type
    #[serde(flatten)]
    pub metadata: ComponentMetadata,

    /// Let unresolved module references inherit the default metadata
    pub inherit_defaults: Option<bool>,

    /// Import everything below an external document's subject
    pub include_transitive: Option<bool>,

    /// Target framework preference
    pub framework: Option<String>,

    pub exclude: ExclusionRules,

    /// Synthetic component identifiers attached to every module
    pub components: Vec<String>,
}

impl Defaults {
    pub fn inherits(&self) -> bool {
        self.inherit_defaults.unwrap_or(false)
    }

    pub fn includes_transitive(&self) -> bool {
        self.include_transitive.unwrap_or(true)
    }
}

/// Output-related configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Directory documents are written to (default: the config directory)
    pub directory: Option<PathBuf>,
}

/// One module, i.e. one project that gets its own document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleConfig {
    /// Project file of the module
    pub path: PathBuf,

    /// Manifests contributing to this module (glob patterns allowed).
    /// Default: `<dir>/obj/project.assets.json`
    #[serde(default)]
    pub assets: Vec<String>,

    /// Name, version, identifier and metadata overrides
    #[serde(flatten)]
    pub metadata: ComponentMetadata,

    #[serde(default)]
    pub framework: Option<String>,

    /// Output file name, relative to the output directory
    #[serde(default)]
    pub output: Option<PathBuf>,

    /// Synthetic component identifiers attached to this module
    #[serde(default)]
    pub components: Vec<String>,

    #[serde(default)]
    pub exclude: ExclusionRules,

    /// Foreign documents merged into this module
    #[serde(default)]
    pub external: Vec<ExternalConfig>,
}

impl ModuleConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        ModuleConfig {
            path: path.into(),
            assets: Vec::new(),
            metadata: ComponentMetadata::default(),
            framework: None,
            output: None,
            components: Vec::new(),
            exclude: ExclusionRules::default(),
            external: Vec::new(),
        }
    }

    /// Metadata after applying this module's overrides to the defaults.
    pub fn effective_metadata(&self, defaults: &Defaults) -> ComponentMetadata {
        let mut metadata = defaults.metadata.clone();
        // Identity never comes from the defaults
        metadata.identifier = None;
        metadata.name = None;
        metadata.version = None;
        metadata.merge(&self.metadata);
        metadata
    }

    /// Exclusion rules: defaults unioned with this module's.
    pub fn effective_exclusions(&self, defaults: &Defaults) -> ExclusionRules {
        let mut rules = defaults.exclude.clone();
        rules.merge(&self.exclude);
        rules
    }

    pub fn effective_framework<'a>(&'a self, defaults: &'a Defaults) -> Option<&'a str> {
        self.framework.as_deref().or(defaults.framework.as_deref())
    }

    /// Synthetic components: defaults first, then this module's.
    pub fn effective_components(&self, defaults: &Defaults) -> Vec<String> {
        let mut components = defaults.components.clone();
        for id in &self.components {
            if !components.contains(id) {
                components.push(id.clone());
            }
        }
        components
    }

    /// Directory containing the project file.
    pub fn directory(&self) -> PathBuf {
        self.path.parent().map(Path::to_path_buf).unwrap_or_default()
    }
}

/// A foreign BOM document merged into a module.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExternalConfig {
    pub path: PathBuf,
    #[serde(default)]
    pub include_transitive: Option<bool>,
}

/// A synthetic component declared in configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ComponentConfig {
    #[serde(flatten)]
    pub metadata: ComponentMetadata,

    /// Scope in the documents it is attached to
    pub scope: Scope,

    /// Identifiers (or names) of registered components this one depends on
    pub depends_on: Vec<String>,

    /// Write a stand-alone document for this component
    pub document: bool,

    /// Output file name for the stand-alone document
    pub output: Option<PathBuf>,
}

impl Config {
    /// Load configuration from a file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| BomError::config_at(format!("failed to read config ({})", e), path))?;

        toml::from_str(&contents)
            .map_err(|e| BomError::config_at(format!("failed to parse config ({})", e.message()), path))
    }

    /// Load configuration with fallback to defaults if the file is unreadable.
    pub fn load_or_default(path: &Path) -> Self {
        if path.exists() {
            Self::load(path).unwrap_or_else(|e| {
                tracing::warn!("Failed to load config from {}: {}", path.display(), e);
                Self::default()
            })
        } else {
            Self::default()
        }
    }

    /// Merge another config into this one (other takes precedence).
    pub fn merge(&mut self, other: Config) {
        self.defaults.metadata.merge(&other.defaults.metadata);
        if other.defaults.inherit_defaults.is_some() {
            self.defaults.inherit_defaults = other.defaults.inherit_defaults;
        }
        if other.defaults.include_transitive.is_some() {
            self.defaults.include_transitive = other.defaults.include_transitive;
        }
        if other.defaults.framework.is_some() {
            self.defaults.framework = other.defaults.framework;
        }
        self.defaults.exclude.merge(&other.defaults.exclude);
        for id in other.defaults.components {
            if !self.defaults.components.contains(&id) {
                self.defaults.components.push(id);
            }
        }

        if other.output.directory.is_some() {
            self.output.directory = other.output.directory;
        }

        self.modules.extend(other.modules);
        self.components.extend(other.components);
    }

    /// Resolve every relative path against `base`.
    pub fn resolve_paths(&mut self, base: &Path) {
        if let Some(dir) = &self.output.directory {
            self.output.directory = Some(absolutize(base, dir));
        }

        for module in &mut self.modules {
            module.path = absolutize(base, &module.path);
            let module_dir = module.directory();

            module.assets = if module.assets.is_empty() {
                vec![module_dir
                    .join(crate::resolver::assets::ASSETS_RELATIVE_PATH)
                    .to_string_lossy()
                    .into_owned()]
            } else {
                module
                    .assets
                    .iter()
                    .map(|pattern| base.join(pattern).to_string_lossy().into_owned())
                    .collect()
            };

            for external in &mut module.external {
                external.path = absolutize(base, &external.path);
            }
        }
    }

    /// Find a declared component by identifier or name.
    pub fn component(&self, key: &str) -> Option<&ComponentConfig> {
        self.components.iter().find(|c| {
            c.metadata.identifier.as_deref() == Some(key) || c.metadata.name.as_deref() == Some(key)
        })
    }
}

/// Load merged configuration from global and project locations.
///
/// Order of precedence (highest to lowest):
/// 1. Project config (lockbom.toml)
/// 2. Global config (~/.lockbom/config.toml)
/// 3. Defaults
///
/// The project file must exist and parse; the global file is optional.
/// Relative paths are resolved against the project file's directory.
pub fn load_config(global_path: Option<&Path>, project_path: &Path) -> Result<Config> {
    let mut config = Config::default();

    if let Some(global) = global_path {
        if global.exists() {
            tracing::debug!("loading global config from {}", global.display());
            config.merge(Config::load_or_default(global));
        }
    }

    if !project_path.exists() {
        return Err(BomError::config_at("config file not found", project_path));
    }
    config.merge(Config::load(project_path)?);

    let base = project_path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_default();
    config.resolve_paths(&base);

    Ok(config)
}

/// Get the global lockbom config directory (~/.lockbom).
pub fn global_config_dir() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|b| b.home_dir().join(".lockbom"))
}

/// Get the global config path (~/.lockbom/config.toml).
pub fn global_config_path() -> Option<PathBuf> {
    global_config_dir().map(|dir| dir.join("config.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::component::ComponentType;
    use tempfile::TempDir;

    const PROJECT: &str = r#"
[defaults]
publisher = "Acme"
license = "MIT"
inherit_defaults = true
framework = "net8.0"

[defaults.exclude]
prefixes = ["Microsoft.SourceLink"]

[output]
directory = "sbom"

[[module]]
path = "src/LibA/LibA.csproj"
name = "LibA"
version = "1.0.0"
type = "application"
components = ["pkg:generic/runtime@8.0"]

[module.exclude]
ids = ["Foo"]

[[module.external]]
path = "vendor/widget.cdx.json"
include_transitive = false

[[module]]
path = "src/LibB/LibB.csproj"
assets = ["build/*/project.assets.json"]

[[component]]
name = "runtime"
version = "8.0"
identifier = "pkg:generic/runtime@8.0"
type = "platform"
depends_on = ["LibB"]
document = true
"#;

    #[test]
    fn test_parse_project_config() {
        let config: Config = toml::from_str(PROJECT).unwrap();

        assert_eq!(config.defaults.metadata.publisher.as_deref(), Some("Acme"));
        assert!(config.defaults.inherits());
        assert_eq!(config.modules.len(), 2);

        let lib_a = &config.modules[0];
        assert_eq!(lib_a.metadata.name.as_deref(), Some("LibA"));
        assert_eq!(lib_a.metadata.component_type, Some(ComponentType::Application));
        assert_eq!(lib_a.exclude.ids, vec!["Foo"]);
        assert_eq!(lib_a.external[0].include_transitive, Some(false));

        let runtime = &config.components[0];
        assert_eq!(runtime.scope, Scope::Required);
        assert!(runtime.document);
        assert_eq!(runtime.depends_on, vec!["LibB"]);
    }

    #[test]
    fn test_module_overrides_defaults() {
        let config: Config = toml::from_str(PROJECT).unwrap();
        let lib_a = &config.modules[0];

        let metadata = lib_a.effective_metadata(&config.defaults);
        assert_eq!(metadata.publisher.as_deref(), Some("Acme"));
        assert_eq!(metadata.component_type, Some(ComponentType::Application));

        let rules = lib_a.effective_exclusions(&config.defaults);
        assert_eq!(rules.ids, vec!["Foo"]);
        assert_eq!(rules.prefixes, vec!["Microsoft.SourceLink"]);

        assert_eq!(lib_a.effective_framework(&config.defaults), Some("net8.0"));
    }

    #[test]
    fn test_merge_project_over_global() {
        let mut global: Config = toml::from_str(
            r#"
[defaults]
publisher = "Global Corp"
copyright = "(c) Global Corp"
include_transitive = false

[defaults.exclude]
ids = ["Internal.Tooling"]
"#,
        )
        .unwrap();
        let project: Config = toml::from_str(PROJECT).unwrap();

        global.merge(project);

        assert_eq!(global.defaults.metadata.publisher.as_deref(), Some("Acme"));
        assert_eq!(
            global.defaults.metadata.copyright.as_deref(),
            Some("(c) Global Corp")
        );
        assert!(!global.defaults.includes_transitive());
        assert_eq!(global.defaults.exclude.ids, vec!["Internal.Tooling"]);
        assert_eq!(global.modules.len(), 2);
    }

    #[test]
    fn test_load_config_resolves_paths() {
        let tmp = TempDir::new().unwrap();
        let project = tmp.path().join(CONFIG_FILE_NAME);
        std::fs::write(&project, PROJECT).unwrap();

        let config = load_config(None, &project).unwrap();

        assert_eq!(config.output.directory, Some(tmp.path().join("sbom")));

        let lib_a = &config.modules[0];
        assert_eq!(lib_a.path, tmp.path().join("src/LibA/LibA.csproj"));
        assert_eq!(
            lib_a.assets,
            vec![tmp
                .path()
                .join("src/LibA/obj/project.assets.json")
                .to_string_lossy()
                .into_owned()]
        );
        assert_eq!(lib_a.external[0].path, tmp.path().join("vendor/widget.cdx.json"));

        let lib_b = &config.modules[1];
        assert!(lib_b.assets[0].ends_with("build/*/project.assets.json"));
    }

    #[test]
    fn test_load_config_missing_project() {
        let tmp = TempDir::new().unwrap();
        let err = load_config(None, &tmp.path().join(CONFIG_FILE_NAME)).unwrap_err();
        assert!(matches!(err, BomError::Configuration { .. }));
    }

    #[test]
    fn test_load_rejects_invalid_toml() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, "[[module]]\nname = \"NoPath\"\n").unwrap();

        let err = Config::load(&path).unwrap_err();
        assert!(err.to_string().contains("failed to parse config"));
    }

    #[test]
    fn test_component_lookup_by_identifier_or_name() {
        let config: Config = toml::from_str(PROJECT).unwrap();
        assert!(config.component("pkg:generic/runtime@8.0").is_some());
        assert!(config.component("runtime").is_some());
        assert!(config.component("missing").is_none());
    }
}
