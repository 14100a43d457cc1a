//! The two module stores the compilation pipeline mediates between.
//!
//! The design-time [`ModuleRegistry`] is seeded once with the bundled
//! modules and only grows through [`ModuleRegistry::define`]; compilation
//! never mutates it. The [`RuntimeRegistry`] lives for one shader session:
//! it is cleared on every shader switch and repopulated with per-import
//! module copies whose options point at the namespaced uniform names, which
//! is how a driver maps a user-level option to the uniform it must upload.

use std::collections::BTreeMap;

use tracing::debug;

use crate::builtins;
use crate::error::SandboxError;
use crate::module::{Module, ModuleDefinition};
use crate::types::{ModuleOptions, OptionSet};

/// Module names the sandbox reserves for its bundled library.
pub fn is_reserved_module_name(name: &str) -> bool {
    name == "sandbox" || name.starts_with("sandbox/")
}

/// Keyed store of modules available to `#import` resolution.
#[derive(Debug, Default)]
pub struct ModuleRegistry {
    modules: BTreeMap<String, Module>,
}

impl ModuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry seeded with the bundled `sandbox` modules.
    pub fn with_builtins() -> Result<Self, SandboxError> {
        let mut registry = Self::new();
        builtins::install(&mut registry)?;
        Ok(registry)
    }

    pub fn has(&self, name: &str) -> bool {
        self.modules.contains_key(name)
    }

    /// Stores a module under its own name, replacing any previous entry.
    /// User-facing definitions go through [`Self::define`] instead, which
    /// refuses reserved and duplicate names.
    pub fn register(&mut self, module: Module) {
        self.modules.insert(module.name().to_string(), module);
    }

    /// Validates and registers a user module.
    pub fn define(
        &mut self,
        name: &str,
        source: impl Into<String>,
        options: ModuleOptions,
    ) -> Result<(), SandboxError> {
        if is_reserved_module_name(name) {
            return Err(SandboxError::ReservedModuleName(name.to_string()));
        }
        if self.has(name) {
            return Err(SandboxError::ModuleAlreadyDefined(name.to_string()));
        }
        let module = Module::new(name, source, options)?;
        debug!(module = name, "defined user module");
        self.register(module);
        Ok(())
    }

    pub fn resolve(&self, name: &str) -> Result<&Module, SandboxError> {
        self.modules
            .get(name)
            .ok_or_else(|| SandboxError::ModuleNotFound(name.to_string()))
    }

    pub fn remove(&mut self, name: &str) -> Option<Module> {
        self.modules.remove(name)
    }

    /// Bulk registration; later entries win on name collisions.
    pub fn load(&mut self, modules: impl IntoIterator<Item = Module>) {
        for module in modules {
            self.register(module);
        }
    }

    pub fn clear(&mut self) {
        self.modules.clear();
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.modules.keys().map(String::as_str)
    }

    /// Compiles a scratch copy of every module and lists its definition.
    /// Modules that fail to compile are skipped.
    pub fn available(&self) -> Vec<ModuleDefinition> {
        self.modules
            .values()
            .filter_map(|module| module.definition(self).ok())
            .collect()
    }
}

/// Session-scoped store of per-import module copies.
#[derive(Debug, Default)]
pub struct RuntimeRegistry {
    modules: BTreeMap<String, Module>,
}

impl RuntimeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has(&self, name: &str) -> bool {
        self.modules.contains_key(name)
    }

    pub fn register(&mut self, module: Module) {
        self.modules.insert(module.name().to_string(), module);
    }

    pub fn resolve(&self, name: &str) -> Result<&Module, SandboxError> {
        self.modules
            .get(name)
            .ok_or_else(|| SandboxError::ModuleNotFound(name.to_string()))
    }

    pub fn remove(&mut self, name: &str) -> Option<Module> {
        self.modules.remove(name)
    }

    /// Bulk registration; later entries win on name collisions.
    pub fn load(&mut self, modules: impl IntoIterator<Item = Module>) {
        for module in modules {
            self.register(module);
        }
    }

    pub fn clear(&mut self) {
        self.modules.clear();
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    /// Files an imported copy under the module key. The first copy owns the
    /// entry; a later alias of the same module only contributes the option
    /// entries the stored copy does not have yet.
    pub fn adopt(&mut self, name: &str, copy: Module) {
        match self.modules.get_mut(name) {
            None => {
                self.modules.insert(name.to_string(), copy);
            }
            Some(existing) => {
                for (key, set) in copy.into_options() {
                    existing.options_mut().entry(key).or_insert(set);
                }
            }
        }
    }

    /// The option set registered under a function name or import alias, for
    /// drivers translating user-level option writes into uniform uploads.
    pub fn resolve_options(&self, key: &str) -> Option<&OptionSet> {
        self.modules
            .values()
            .find_map(|module| module.options().get(key))
    }

    /// Every registered option set, keyed by function name or alias. Used by
    /// drivers to push option defaults after a shader switch.
    pub fn all_options(&self) -> impl Iterator<Item = (&str, &OptionSet)> {
        self.modules.values().flat_map(|module| {
            module
                .options()
                .iter()
                .map(|(key, set)| (key.as_str(), set))
        })
    }
}
