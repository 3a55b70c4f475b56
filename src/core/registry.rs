//! Component registry - the run-wide identity store.
//!
//! Every module, synthetic component and adopted foreign document is
//! registered here during the first pass. The second pass only reads, so
//! any two documents that mention the same module describe it with the
//! same record.

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use crate::core::component::ComponentRecord;
use crate::core::error::{BomError, Result};

/// Write-once map from identity key to component record.
///
/// Keys are absolute source paths, module names (ASCII lowercased) and
/// identifier strings. Once a key is registered it is never overwritten.
#[derive(Debug, Default)]
pub struct ComponentRegistry {
    records: RwLock<HashMap<String, Arc<ComponentRecord>>>,
    frozen: AtomicBool,
}

impl ComponentRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `record` under `key` unless the key is taken.
    ///
    /// Returns whether the record was inserted.
    pub fn register(&self, key: impl Into<String>, record: Arc<ComponentRecord>) -> Result<bool> {
        let key = key.into();
        self.ensure_writable(&key)?;

        // Fast path: already registered
        {
            let records = self.records.read().unwrap_or_else(|e| e.into_inner());
            if records.contains_key(&key) {
                tracing::debug!("registry key `{}` already taken", key);
                return Ok(false);
            }
        }

        let mut records = self.records.write().unwrap_or_else(|e| e.into_inner());
        let inserted = match records.entry(key) {
            std::collections::hash_map::Entry::Occupied(_) => false,
            std::collections::hash_map::Entry::Vacant(slot) => {
                slot.insert(record);
                true
            }
        };

        Ok(inserted)
    }

    /// Register a module by its source path, name and identifier.
    pub fn register_module(&self, path: &Path, record: ComponentRecord) -> Result<Arc<ComponentRecord>> {
        let record = Arc::new(record);
        let path_key = path_key(path);

        if !self.register(path_key.clone(), Arc::clone(&record))? {
            // First registration by path wins; hand back the canonical record.
            return self.lookup(&path_key).ok_or_else(|| BomError::Consistency {
                referrer: record.name.clone(),
                identifier: path_key,
            });
        }

        self.register(name_key(&record.name), Arc::clone(&record))?;
        self.register(record.bom_ref.clone(), Arc::clone(&record))?;

        tracing::debug!("registered module {} at {}", record.display_name(), path.display());
        Ok(record)
    }

    /// Register a component that has no source path by identifier and name.
    ///
    /// Returns false when the identifier is already taken.
    pub fn register_component(&self, record: ComponentRecord) -> Result<bool> {
        let record = Arc::new(record);

        if !self.register(record.bom_ref.clone(), Arc::clone(&record))? {
            return Ok(false);
        }
        self.register(name_key(&record.name), Arc::clone(&record))?;

        tracing::debug!("registered component {}", record.bom_ref);
        Ok(true)
    }

    /// Look up a record by any of its keys.
    pub fn lookup(&self, key: &str) -> Option<Arc<ComponentRecord>> {
        let records = self.records.read().unwrap_or_else(|e| e.into_inner());
        records.get(key).cloned()
    }

    /// Look up a record by module or component name, ignoring ASCII case.
    pub fn lookup_name(&self, name: &str) -> Option<Arc<ComponentRecord>> {
        self.lookup(&name_key(name))
    }

    /// Whether a key is registered.
    pub fn contains(&self, key: &str) -> bool {
        let records = self.records.read().unwrap_or_else(|e| e.into_inner());
        records.contains_key(key)
    }

    /// Canonical record for a module reference.
    ///
    /// Lookup order is path, then name. A reference that carries its own
    /// identifier (taken from a foreign document) is looked up by that
    /// identifier first, so a same-named internal module cannot shadow it.
    pub fn resolve_reference(
        &self,
        path: Option<&Path>,
        name: &str,
        identifier: Option<&str>,
    ) -> Option<Arc<ComponentRecord>> {
        if let Some(id) = identifier {
            if let Some(record) = self.lookup(id) {
                return Some(record);
            }
        }

        path.and_then(|p| self.lookup(&path_key(p)))
            .or_else(|| self.lookup_name(name))
    }

    /// End the registration pass. Later writes are rejected.
    pub fn freeze(&self) {
        self.frozen.store(true, Ordering::Release);
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen.load(Ordering::Acquire)
    }

    /// Number of distinct keys.
    pub fn len(&self) -> usize {
        let records = self.records.read().unwrap_or_else(|e| e.into_inner());
        records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn ensure_writable(&self, key: &str) -> Result<()> {
        if self.is_frozen() {
            return Err(BomError::Consistency {
                referrer: "registry".to_string(),
                identifier: format!("{} (registered after composition started)", key),
            });
        }
        Ok(())
    }
}

/// Registry key for a source path.
fn path_key(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

fn name_key(name: &str) -> String {
    name.to_ascii_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn record(name: &str, version: &str) -> ComponentRecord {
        ComponentRecord::new(format!("pkg:nuget/{}@{}", name, version), name, Some(version))
    }

    #[test]
    fn test_first_write_wins() {
        let registry = ComponentRegistry::new();

        assert!(registry.register("LibB", Arc::new(record("LibB", "1.0.0"))).unwrap());
        assert!(!registry.register("LibB", Arc::new(record("LibB", "9.9.9"))).unwrap());

        let found = registry.lookup("LibB").unwrap();
        assert_eq!(found.version.as_deref(), Some("1.0.0"));
    }

    #[test]
    fn test_module_aliases_share_record() {
        let registry = ComponentRegistry::new();
        let path = PathBuf::from("/src/LibB/LibB.csproj");

        registry.register_module(&path, record("LibB", "2.0.0")).unwrap();

        let by_path = registry.lookup("/src/LibB/LibB.csproj").unwrap();
        let by_name = registry.lookup_name("LibB").unwrap();
        let by_id = registry.lookup("pkg:nuget/LibB@2.0.0").unwrap();

        assert!(Arc::ptr_eq(&by_path, &by_name));
        assert!(Arc::ptr_eq(&by_path, &by_id));
    }

    #[test]
    fn test_register_module_twice_returns_first() {
        let registry = ComponentRegistry::new();
        let path = PathBuf::from("/src/LibB/LibB.csproj");

        registry.register_module(&path, record("LibB", "2.0.0")).unwrap();
        let second = registry.register_module(&path, record("LibB", "3.0.0")).unwrap();

        assert_eq!(second.version.as_deref(), Some("2.0.0"));
    }

    #[test]
    fn test_resolve_reference_order() {
        let registry = ComponentRegistry::new();
        registry
            .register_module(Path::new("/src/LibB/LibB.csproj"), record("LibB", "2.0.0"))
            .unwrap();
        registry.register_component(record("Widget", "1.0.0")).unwrap();

        // Path match
        let found = registry
            .resolve_reference(Some(Path::new("/src/LibB/LibB.csproj")), "Other", None)
            .unwrap();
        assert_eq!(found.name, "LibB");

        // Name fallback when the path is unknown
        let found = registry
            .resolve_reference(Some(Path::new("/elsewhere/LibB.csproj")), "LibB", None)
            .unwrap();
        assert_eq!(found.name, "LibB");

        // Identifier fallback
        let found = registry
            .resolve_reference(None, "unknown", Some("pkg:nuget/Widget@1.0.0"))
            .unwrap();
        assert_eq!(found.name, "Widget");

        assert!(registry.resolve_reference(None, "nothing", None).is_none());
    }

    #[test]
    fn test_name_lookup_ignores_case() {
        let registry = ComponentRegistry::new();
        registry
            .register_module(Path::new("/src/LibB/LibB.csproj"), record("LibB", "2.0.0"))
            .unwrap();

        assert_eq!(registry.lookup_name("libb").unwrap().name, "LibB");

        // Path misses, differently cased name still resolves
        let found = registry
            .resolve_reference(Some(Path::new("/other/libb.csproj")), "LIBB", None)
            .unwrap();
        assert_eq!(found.bom_ref, "pkg:nuget/LibB@2.0.0");
    }

    #[test]
    fn test_resolve_reference_prefers_carried_identifier() {
        let registry = ComponentRegistry::new();
        registry
            .register_module(Path::new("/src/B/B.csproj"), record("B", "2.0.0"))
            .unwrap();
        registry
            .register_component(ComponentRecord::new("pkg:nuget/external/B@2.0.0", "B", Some("2.0.0")))
            .unwrap();

        let found = registry
            .resolve_reference(None, "B", Some("pkg:nuget/external/B@2.0.0"))
            .unwrap();
        assert_eq!(found.bom_ref, "pkg:nuget/external/B@2.0.0");
    }

    #[test]
    fn test_frozen_registry_rejects_writes() {
        let registry = ComponentRegistry::new();
        registry.freeze();

        let err = registry
            .register("late", Arc::new(record("late", "1.0.0")))
            .unwrap_err();
        assert!(matches!(err, BomError::Consistency { .. }));
    }

    #[test]
    fn test_concurrent_registration_is_first_write_wins() {
        use rayon::prelude::*;

        let registry = ComponentRegistry::new();
        let inserted: usize = (0..64)
            .into_par_iter()
            .map(|i| {
                let rec = Arc::new(record("Shared", &format!("{}.0.0", i)));
                registry.register("Shared", rec).unwrap() as usize
            })
            .sum();

        assert_eq!(inserted, 1);
        assert_eq!(registry.len(), 1);
    }
}
