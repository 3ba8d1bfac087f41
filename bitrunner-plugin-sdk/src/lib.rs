//! bitrunner-plugin-sdk: SDK for creating bitrunner plugins
//!
//! This SDK bundles the plugin contract, the `Describe` derive and the
//! `export_plugin!` macro so a plugin crate only needs one dependency.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use bitrunner_plugin_sdk::prelude::*;
//!
//! /// Greets a person.
//! #[derive(Describe)]
//! #[plugin(name = "greet")]
//! pub struct GreetPlugin;
//!
//! impl Plugin for GreetPlugin {
//!     fn create(_ctx: &PluginContext) -> Result<Self, PluginError> {
//!         Ok(GreetPlugin)
//!     }
//!
//!     fn setup(&self, command: &mut CommandSpec) -> Result<(), PluginError> {
//!         command.add_arg(ArgSpec::positional("who").help("Name to greet"));
//!         Ok(())
//!     }
//!
//!     fn execute(&self, options: &OptionSet) -> Result<Outcome, PluginError> {
//!         let who = options.get_str("who").unwrap_or("World");
//!         info!("Hello, {}!", who);
//!         Ok(Outcome::None)
//!     }
//! }
//!
//! // Generates `pub fn plugin_module() -> PluginModule`
//! export_plugin!(GreetPlugin);
//! ```

// Lets the derive's `::bitrunner_plugin_sdk` paths resolve inside this crate
extern crate self as bitrunner_plugin_sdk;

// Re-export everything from bitrunner-plugin-api
pub use bitrunner_plugin_api::*;

// The derive shares its name with the trait, like serde's
pub use bitrunner_macros::Describe;

// Re-exported so plugins log through the host's subscriber
pub use tracing;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::export_plugin;
    pub use bitrunner_macros::Describe;
    pub use bitrunner_plugin_api::{
        Abort, ArgAction, ArgSpec, CommandSpec, Describe, IntoOutcome, OptionSet, OptionValue,
        Outcome, Plugin, PluginContext, PluginError, PluginModule, API_VERSION,
    };
    pub use tracing::{debug, error, info, trace, warn};
}

/// Macro generating the module handle the host loads.
///
/// Each listed type is exported under its own type name, which is the
/// identifier the host derives from the plugin's manifest file name
/// (`test_plugin.toml` resolves to the export `TestPlugin`).
///
/// The module name defaults to the crate name; pass `module = "..."` to
/// override it.
///
/// # Example
///
/// ```rust,ignore
/// export_plugin!(TestPlugin);
/// export_plugin!(module = "extra_plugin"; ExtraPlugin, OtherPlugin);
/// ```
#[macro_export]
macro_rules! export_plugin {
    (module = $module:expr; $($plugin:ident),+ $(,)?) => {
        /// Module handle for the host's plugin catalog
        pub fn plugin_module() -> $crate::PluginModule {
            $crate::PluginModule::new($module)
                $(.export(stringify!($plugin), $crate::instantiate::<$plugin>))+
        }
    };
    ($($plugin:ident),+ $(,)?) => {
        $crate::export_plugin!(module = env!("CARGO_CRATE_NAME"); $($plugin),+);
    };
}
