//! Plugin registry
//!
//! Append-only table of discovered plugin modules, keyed by the identifier
//! derived from each manifest's base name. Built once at startup and passed
//! by reference to whatever needs it.

use crate::discovery::{scan_directory, Blacklist, DiscoveryError};
use crate::loader::{LoaderError, ModuleLoader};
use bitrunner_plugin_api::PluginModule;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// A registered plugin module
#[derive(Debug, Clone)]
pub struct PluginDescriptor {
    /// Title-cased base name, e.g. `TestPlugin`
    pub identifier: String,

    /// Loaded module handle
    pub module: Arc<PluginModule>,

    /// Manifest the module was discovered through
    pub source: PathBuf,
}

/// Result of a discovery pass
#[derive(Debug, Default)]
pub struct DiscoveryReport {
    /// Identifiers registered by this pass
    pub registered: Vec<String>,

    /// Identifiers that were already present
    pub already_registered: Vec<String>,

    /// Base names skipped because of the blacklist
    pub blacklisted: Vec<String>,

    /// Candidates that failed to load
    pub failures: Vec<(PathBuf, LoaderError)>,
}

impl DiscoveryReport {
    /// Returns true if every candidate either loaded or was skipped on purpose
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    /// Total number of manifests found
    pub fn total_found(&self) -> usize {
        self.registered.len()
            + self.already_registered.len()
            + self.blacklisted.len()
            + self.failures.len()
    }
}

/// Registry of loaded plugin modules
pub struct PluginRegistry {
    loader: Box<dyn ModuleLoader>,
    /// Entries in discovery order
    entries: Vec<PluginDescriptor>,
    /// Identifier to position in `entries`
    index: HashMap<String, usize>,
}

impl PluginRegistry {
    /// Create an empty registry loading modules through `loader`
    pub fn new(loader: impl ModuleLoader + 'static) -> Self {
        Self {
            loader: Box::new(loader),
            entries: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Discover plugin manifests in `root` and register their modules.
    ///
    /// Blacklisted base names are skipped before any load attempt, and an
    /// identifier that is already registered is never loaded again. A
    /// candidate that fails to load is reported and does not stop the pass.
    pub fn discover(
        &mut self,
        root: impl AsRef<Path>,
        blacklist: &Blacklist,
    ) -> Result<DiscoveryReport, DiscoveryError> {
        let root = root.as_ref();
        let mut report = DiscoveryReport::default();

        for candidate in scan_directory(root)? {
            tracing::info!(plugin = %candidate.stem, "Initialize plugin candidate");

            if blacklist.contains(&candidate.stem) {
                tracing::warn!(plugin = %candidate.stem, "Plugin blacklisted");
                report.blacklisted.push(candidate.stem);
                continue;
            }

            let identifier = candidate.identifier();
            if self.contains(&identifier) {
                tracing::debug!(identifier = %identifier, "Plugin already registered");
                report.already_registered.push(identifier);
                continue;
            }

            match self.loader.load(&candidate) {
                Ok(module) => {
                    tracing::info!(
                        identifier = %identifier,
                        module = %module.name(),
                        path = %candidate.path.display(),
                        "Imported plugin module and added to registry"
                    );
                    self.register(PluginDescriptor {
                        identifier: identifier.clone(),
                        module,
                        source: candidate.path,
                    });
                    report.registered.push(identifier);
                }
                Err(e) => {
                    tracing::error!(
                        path = %candidate.path.display(),
                        error = %e,
                        "Plugin import failed"
                    );
                    report.failures.push((candidate.path, e));
                }
            }
        }

        Ok(report)
    }

    /// Register a descriptor. The first registration of an identifier wins;
    /// returns false when the identifier was already present.
    pub fn register(&mut self, descriptor: PluginDescriptor) -> bool {
        if self.index.contains_key(&descriptor.identifier) {
            return false;
        }
        self.index
            .insert(descriptor.identifier.clone(), self.entries.len());
        self.entries.push(descriptor);
        true
    }

    /// Current registry contents
    pub fn snapshot(&self) -> BTreeMap<String, Arc<PluginModule>> {
        self.entries
            .iter()
            .map(|d| (d.identifier.clone(), Arc::clone(&d.module)))
            .collect()
    }

    /// Descriptors in discovery order
    pub fn iter(&self) -> impl Iterator<Item = &PluginDescriptor> {
        self.entries.iter()
    }

    pub fn get(&self, identifier: &str) -> Option<&PluginDescriptor> {
        self.index.get(identifier).map(|&i| &self.entries[i])
    }

    /// Check if an identifier is registered
    pub fn contains(&self, identifier: &str) -> bool {
        self.index.contains_key(identifier)
    }

    /// Registered identifiers in discovery order
    pub fn identifiers(&self) -> Vec<&str> {
        self.entries.iter().map(|d| d.identifier.as_str()).collect()
    }

    /// Get the number of registered plugins
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the registry is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
