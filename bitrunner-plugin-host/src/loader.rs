//! Plugin loader backed by a catalog of linked modules
//!
//! A discovered manifest names the module it wants; loading resolves that
//! name against modules compiled into the binary, so nothing outside the
//! catalog can ever be executed.

use crate::discovery::Candidate;
use bitrunner_plugin_api::{PluginModule, API_VERSION};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

/// Errors that can occur during plugin loading
#[derive(Debug, Error)]
pub enum LoaderError {
    #[error("Failed to read manifest {path}: {source}")]
    ReadManifest {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse manifest {path}: {source}")]
    ParseManifest {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("API version mismatch: expected {expected}, got {actual}")]
    ApiVersionMismatch { expected: u32, actual: u32 },

    #[error("Plugin module '{0}' is disabled by its manifest")]
    Disabled(String),

    #[error("Module not found: {0}")]
    ModuleNotFound(String),
}

/// Contents of a `<name>_plugin.toml` manifest. An empty file is valid.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PluginManifest {
    /// Module to load; defaults to the manifest's file stem
    pub module: Option<String>,

    /// API version the plugin was built against
    pub api_version: u32,

    pub enabled: bool,
}

impl Default for PluginManifest {
    fn default() -> Self {
        Self {
            module: None,
            api_version: API_VERSION,
            enabled: true,
        }
    }
}

impl PluginManifest {
    /// Read and parse a manifest file
    pub fn read(path: &Path) -> Result<Self, LoaderError> {
        let content = std::fs::read_to_string(path).map_err(|e| LoaderError::ReadManifest {
            path: path.to_path_buf(),
            source: e,
        })?;

        toml::from_str(&content).map_err(|e| LoaderError::ParseManifest {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Module name this manifest resolves to
    pub fn module_name<'a>(&'a self, candidate: &'a Candidate) -> &'a str {
        self.module.as_deref().unwrap_or(&candidate.stem)
    }

    fn check(&self, module: &str) -> Result<(), LoaderError> {
        if self.api_version != API_VERSION {
            return Err(LoaderError::ApiVersionMismatch {
                expected: API_VERSION,
                actual: self.api_version,
            });
        }
        if !self.enabled {
            return Err(LoaderError::Disabled(module.to_string()));
        }
        Ok(())
    }
}

/// Turns a discovered candidate into a module handle
pub trait ModuleLoader {
    fn load(&self, candidate: &Candidate) -> Result<Arc<PluginModule>, LoaderError>;
}

/// Loader resolving manifests against modules linked into the binary
#[derive(Debug, Default, Clone)]
pub struct StaticLoader {
    modules: HashMap<String, Arc<PluginModule>>,
}

impl StaticLoader {
    /// Create an empty catalog
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a module to the catalog
    pub fn with_module(mut self, module: PluginModule) -> Self {
        self.add(module);
        self
    }

    pub fn add(&mut self, module: PluginModule) {
        self.modules
            .insert(module.name().to_string(), Arc::new(module));
    }

    pub fn module_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.modules.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl ModuleLoader for StaticLoader {
    fn load(&self, candidate: &Candidate) -> Result<Arc<PluginModule>, LoaderError> {
        let manifest = PluginManifest::read(&candidate.path)?;
        let module = manifest.module_name(candidate);
        manifest.check(module)?;

        let handle = self
            .modules
            .get(module)
            .cloned()
            .ok_or_else(|| LoaderError::ModuleNotFound(module.to_string()))?;

        tracing::debug!(
            module = %module,
            manifest = %candidate.path.display(),
            "Resolved plugin module"
        );
        Ok(handle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn candidate(dir: &TempDir, stem: &str, manifest: &str) -> Candidate {
        let path = dir.path().join(format!("{}.toml", stem));
        fs::write(&path, manifest).unwrap();
        Candidate {
            stem: stem.to_string(),
            path,
        }
    }

    #[test]
    fn test_empty_manifest_defaults_to_stem() {
        let temp = TempDir::new().unwrap();
        let loader = StaticLoader::new().with_module(PluginModule::new("echo_plugin"));

        let module = loader.load(&candidate(&temp, "echo_plugin", "")).unwrap();
        assert_eq!(module.name(), "echo_plugin");
    }

    #[test]
    fn test_manifest_can_name_module() {
        let temp = TempDir::new().unwrap();
        let loader = StaticLoader::new().with_module(PluginModule::new("shared"));

        let module = loader
            .load(&candidate(&temp, "alias_plugin", "module = \"shared\"\n"))
            .unwrap();
        assert_eq!(module.name(), "shared");
    }

    #[test]
    fn test_unknown_module() {
        let temp = TempDir::new().unwrap();
        let loader = StaticLoader::new();

        let err = loader.load(&candidate(&temp, "ghost_plugin", "")).unwrap_err();
        assert!(matches!(err, LoaderError::ModuleNotFound(name) if name == "ghost_plugin"));
    }

    #[test]
    fn test_manifest_rejections() {
        let temp = TempDir::new().unwrap();
        let loader = StaticLoader::new().with_module(PluginModule::new("echo_plugin"));

        let err = loader
            .load(&candidate(&temp, "echo_plugin", "api_version = 99\n"))
            .unwrap_err();
        assert!(matches!(
            err,
            LoaderError::ApiVersionMismatch { expected: API_VERSION, actual: 99 }
        ));

        let err = loader
            .load(&candidate(&temp, "echo_plugin", "enabled = false\n"))
            .unwrap_err();
        assert!(matches!(err, LoaderError::Disabled(_)));

        let err = loader
            .load(&candidate(&temp, "echo_plugin", "module = [\n"))
            .unwrap_err();
        assert!(matches!(err, LoaderError::ParseManifest { .. }));
    }
}
