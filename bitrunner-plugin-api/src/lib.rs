//! bitrunner-plugin-api: Shared types for the bitrunner plugin system
//!
//! This crate defines the contract between the host and its plugins: the
//! capability traits every plugin implements, the command declarations a
//! plugin contributes, the option set handed to `execute`, and the values
//! `execute` returns.

pub mod options;
pub mod outcome;
pub mod spec;

pub use options::{OptionSet, OptionValue};
pub use outcome::{Abort, IntoOutcome, Outcome, FAILURE_STATUS};
pub use spec::{ArgAction, ArgSpec, CommandSpec};

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

/// API version for compatibility checking against plugin manifests
pub const API_VERSION: u32 = 1;

/// Extension of a plugin's private configuration file.
pub const CONFIG_EXTENSION: &str = "conf";

/// Environment handed to a plugin when it is instantiated.
#[derive(Debug, Clone)]
pub struct PluginContext {
    root: PathBuf,
}

impl PluginContext {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Directory used for discovery and configuration.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// `<root>/<name lowercased>.conf`
    pub fn config_path(&self, name: &str) -> PathBuf {
        self.root
            .join(format!("{}.{}", name.to_lowercase(), CONFIG_EXTENSION))
    }
}

/// Descriptive half of the plugin contract.
///
/// Usually derived with `#[derive(Describe)]` from the SDK.
pub trait Describe {
    /// Subcommand identifier shown on the command line
    fn name(&self) -> &str;

    /// Documentation for the subcommand
    fn help(&self) -> &str {
        ""
    }

    fn version(&self) -> Option<&str> {
        None
    }
}

/// Capability interface every plugin implements.
pub trait Plugin: Describe {
    /// Construct the plugin. Called once while the command surface is wired.
    fn create(ctx: &PluginContext) -> Result<Self, PluginError>
    where
        Self: Sized;

    /// Path of the optional private configuration file. The file may not exist.
    fn config_file(&self, ctx: &PluginContext) -> PathBuf {
        ctx.config_path(self.name())
    }

    /// Declare the plugin's own flags on its subcommand.
    fn setup(&self, command: &mut CommandSpec) -> Result<(), PluginError>;

    /// Perform the unit of work.
    fn execute(&self, options: &OptionSet) -> Result<Outcome, PluginError>;
}

/// Errors raised by plugin code
#[derive(Debug, thiserror::Error)]
pub enum PluginError {
    #[error(transparent)]
    Abort(#[from] Abort),

    /// The plugin asks for the process to exit with this status.
    #[error("Exit requested with status {0}")]
    Exit(i32),

    #[error("Interrupted")]
    Interrupted,

    #[error("Invalid command spec: {0}")]
    InvalidSpec(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl PluginError {
    /// Convenience constructor for generic failures.
    pub fn other(message: impl fmt::Display + fmt::Debug + Send + Sync + 'static) -> Self {
        PluginError::Other(anyhow::Error::msg(message))
    }

    /// Exit and interrupt requests are never swallowed by the host.
    pub fn is_escalation(&self) -> bool {
        matches!(self, PluginError::Exit(_) | PluginError::Interrupted)
    }
}

impl From<std::io::Error> for PluginError {
    fn from(e: std::io::Error) -> Self {
        PluginError::Other(e.into())
    }
}

/// Constructor stored in a module's export table.
pub type PluginFactory = fn(&PluginContext) -> Result<Box<dyn Plugin>, PluginError>;

/// Instantiate `P` behind the trait object the host works with.
pub fn instantiate<P: Plugin + 'static>(ctx: &PluginContext) -> Result<Box<dyn Plugin>, PluginError> {
    Ok(Box::new(P::create(ctx)?))
}

/// A linked plugin module: a named table of exported plugin constructors.
#[derive(Clone)]
pub struct PluginModule {
    name: String,
    exports: BTreeMap<String, PluginFactory>,
}

impl PluginModule {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            exports: BTreeMap::new(),
        }
    }

    /// Add an export
    pub fn export(mut self, name: impl Into<String>, factory: PluginFactory) -> Self {
        self.exports.insert(name.into(), factory);
        self
    }

    /// Module base name, e.g. `test_plugin`
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Look up an exported constructor by attribute name
    pub fn get(&self, export: &str) -> Option<PluginFactory> {
        self.exports.get(export).copied()
    }

    pub fn export_names(&self) -> impl Iterator<Item = &str> {
        self.exports.keys().map(String::as_str)
    }
}

impl fmt::Debug for PluginModule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginModule")
            .field("name", &self.name)
            .field("exports", &self.exports.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Echo;

    impl Describe for Echo {
        fn name(&self) -> &str {
            "Echo"
        }
    }

    impl Plugin for Echo {
        fn create(_ctx: &PluginContext) -> Result<Self, PluginError> {
            Ok(Echo)
        }

        fn setup(&self, command: &mut CommandSpec) -> Result<(), PluginError> {
            command.add_arg(ArgSpec::positional("text"));
            Ok(())
        }

        fn execute(&self, options: &OptionSet) -> Result<Outcome, PluginError> {
            Ok(options.get_str("text").map(str::to_string).into_outcome())
        }
    }

    #[test]
    fn test_config_path_is_lowercased() {
        let ctx = PluginContext::new("/srv/app");
        assert_eq!(ctx.config_path("Echo"), PathBuf::from("/srv/app/echo.conf"));
    }

    #[test]
    fn test_module_exports() {
        let module = PluginModule::new("echo_plugin").export("EchoPlugin", instantiate::<Echo>);

        assert_eq!(module.name(), "echo_plugin");
        assert!(module.get("Echo").is_none());

        let factory = module.get("EchoPlugin").unwrap();
        let ctx = PluginContext::new("/tmp");
        let plugin = factory(&ctx).unwrap();
        assert_eq!(plugin.name(), "Echo");
        assert_eq!(plugin.config_file(&ctx), PathBuf::from("/tmp/echo.conf"));

        let mut spec = CommandSpec::new(plugin.name(), plugin.help());
        plugin.setup(&mut spec).unwrap();
        assert_eq!(spec.args.len(), 1);

        let mut options = OptionSet::new();
        options.set("text", "5");
        assert_eq!(plugin.execute(&options).unwrap().exit_status(), 5);
    }

    #[test]
    fn test_escalation_classification() {
        assert!(PluginError::Exit(3).is_escalation());
        assert!(PluginError::Interrupted.is_escalation());
        assert!(!PluginError::from(Abort::new(2)).is_escalation());
        assert!(!PluginError::other("boom").is_escalation());
    }
}
