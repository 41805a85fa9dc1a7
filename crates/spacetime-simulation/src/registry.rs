//! Module registry
//!
//! Maps module names to the modules that answer them. The dispatcher routes
//! each effect by looking its target up here.

use crate::network::{NetworkConnectModule, NetworkListenModule};
use crate::random::RandomModule;
use spacetime_core::{Module, ModuleName, NetworkProvider, SharedLogSink, SimulationConfig};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Error type for registry operations
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    /// A module already answers this name
    #[error("Module '{0}' is already registered")]
    DuplicateModule(ModuleName),
}

/// Registry of modules by name
#[derive(Default, Clone)]
pub struct ModuleRegistry {
    modules: HashMap<ModuleName, Arc<dyn Module>>,
}

impl fmt::Debug for ModuleRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleRegistry")
            .field("modules", &self.names())
            .finish()
    }
}

impl ModuleRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding random, network-connect and network-listen
    pub fn builtin(
        provider: Arc<dyn NetworkProvider>,
        config: SimulationConfig,
        log: SharedLogSink,
    ) -> Self {
        let mut registry = Self::new();
        registry.insert(Arc::new(RandomModule::new()));
        registry.insert(Arc::new(NetworkConnectModule::new(
            Arc::clone(&provider),
            config.clone(),
            Arc::clone(&log),
        )));
        registry.insert(Arc::new(NetworkListenModule::new(provider, config, log)));
        registry
    }

    fn insert(&mut self, module: Arc<dyn Module>) {
        self.modules.insert(module.name(), module);
    }

    /// Register a module under its own name
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::DuplicateModule`] if the name is taken.
    pub fn register(&mut self, module: Arc<dyn Module>) -> Result<(), RegistryError> {
        let name = module.name();
        if self.modules.contains_key(&name) {
            return Err(RegistryError::DuplicateModule(name));
        }
        self.modules.insert(name, module);
        Ok(())
    }

    /// Register a module, replacing any module with the same name
    pub fn replace(&mut self, module: Arc<dyn Module>) -> Option<Arc<dyn Module>> {
        self.modules.insert(module.name(), module)
    }

    /// Remove the module registered under `name`
    pub fn unregister(&mut self, name: &ModuleName) -> Option<Arc<dyn Module>> {
        self.modules.remove(name)
    }

    /// Module registered under `name`
    pub fn get(&self, name: &ModuleName) -> Option<&Arc<dyn Module>> {
        self.modules.get(name)
    }

    /// Whether a module answers `name`
    pub fn is_registered(&self, name: &ModuleName) -> bool {
        self.modules.contains_key(name)
    }

    /// Registered names, sorted
    pub fn names(&self) -> Vec<ModuleName> {
        let mut names: Vec<_> = self.modules.keys().cloned().collect();
        names.sort();
        names
    }

    /// Number of registered modules
    pub fn len(&self) -> usize {
        self.modules.len()
    }

    /// Whether no module is registered
    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    /// Every registered module
    pub fn modules(&self) -> impl Iterator<Item = &Arc<dyn Module>> {
        self.modules.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use spacetime_core::TracingLogSink;
    use spacetime_transport::MemoryNetwork;

    #[test]
    fn builtin_registers_three_modules() {
        let registry = ModuleRegistry::builtin(
            Arc::new(MemoryNetwork::default()),
            SimulationConfig::default(),
            TracingLogSink::shared(),
        );
        assert_eq!(
            registry.names(),
            vec![
                ModuleName::NETWORK_CONNECT,
                ModuleName::NETWORK_LISTEN,
                ModuleName::RANDOM
            ]
        );
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let mut registry = ModuleRegistry::new();
        registry.register(Arc::new(RandomModule::new())).unwrap();
        assert_eq!(
            registry.register(Arc::new(RandomModule::seeded(3))),
            Err(RegistryError::DuplicateModule(ModuleName::RANDOM))
        );
        assert!(registry.replace(Arc::new(RandomModule::seeded(3))).is_some());
        assert!(registry.unregister(&ModuleName::RANDOM).is_some());
        assert!(registry.is_empty());
    }
}
