//! bitrunner-plugin-host: Plugin discovery and registry for bitrunner
//!
//! This crate finds plugin manifests on disk, resolves them against the
//! modules linked into the binary, and translates plugin command
//! declarations into clap commands.

pub mod bridge;
pub mod discovery;
pub mod loader;
pub mod registry;

pub use bridge::{build_arg, build_command, merge_matches};
pub use discovery::{
    derive_identifier, scan_directory, Blacklist, Candidate, DiscoveryError, BLACKLIST_KEY,
    PLUGIN_SUFFIX,
};
pub use loader::{LoaderError, ModuleLoader, PluginManifest, StaticLoader};
pub use registry::{DiscoveryReport, PluginDescriptor, PluginRegistry};
