//! Plugin wiring
//!
//! Turns registry entries into subcommands. For each entry, in discovery
//! order: instantiate the plugin, merge its private config, create the
//! subcommand with the plugin's `execute` bound as handler, and let the
//! plugin declare its flags. A failure at any step drops that plugin only.

use crate::config::{ConfigLoader, ConfigOutcome};
use crate::Escalation;
use bitrunner_plugin_api::{CommandSpec, OptionSet, Outcome, Plugin, PluginContext, PluginError};
use bitrunner_plugin_host::{build_command, PluginDescriptor, PluginRegistry};
use std::any::Any;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use thiserror::Error;

/// Reasons a single plugin is left out of the command surface
#[derive(Debug, Error)]
pub enum WireError {
    #[error("Module '{module}' has no export named '{identifier}'")]
    MissingExport { module: String, identifier: String },

    #[error("Plugin {identifier} failed to {stage}: {source}")]
    Plugin {
        identifier: String,
        stage: &'static str,
        #[source]
        source: PluginError,
    },

    #[error("Invalid flags declared by '{name}': {reason}")]
    InvalidSpec { name: String, reason: String },

    #[error("Subcommand '{0}' is already provided by another plugin")]
    DuplicateName(String),

    #[error("Plugin {identifier} panicked: {message}")]
    Panicked { identifier: String, message: String },

    /// Exit or interrupt request raised while wiring; ends wiring entirely.
    #[error("Plugin {identifier} requested escalation: {escalation:?}")]
    Escalated {
        identifier: String,
        escalation: Escalation,
    },
}

/// A plugin instance whose `execute` is invoked when its subcommand runs.
pub struct BoundHandler {
    plugin: Box<dyn Plugin>,
}

impl BoundHandler {
    pub fn new(plugin: Box<dyn Plugin>) -> Self {
        Self { plugin }
    }

    /// Run the plugin. A panic is contained and reported as a plugin error.
    pub fn invoke(&self, options: &OptionSet) -> Result<Outcome, PluginError> {
        match catch_unwind(AssertUnwindSafe(|| self.plugin.execute(options))) {
            Ok(result) => result,
            Err(payload) => Err(PluginError::other(format!(
                "{} panicked: {}",
                self.plugin.name(),
                panic_message(payload.as_ref())
            ))),
        }
    }
}

impl fmt::Debug for BoundHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundHandler")
            .field("plugin", &self.plugin.name())
            .finish()
    }
}

/// A wired subcommand
#[derive(Debug)]
pub struct Subcommand {
    /// Registry identifier of the plugin that provides it
    pub identifier: String,

    /// Name and flag declarations
    pub spec: CommandSpec,

    pub handler: BoundHandler,
}

impl Subcommand {
    pub fn name(&self) -> &str {
        &self.spec.name
    }
}

/// Result of a wiring pass
#[derive(Debug, Default)]
pub struct WiringReport {
    /// Subcommand names, in the order they were added
    pub wired: Vec<String>,

    /// Identifiers left out, with the reason
    pub failed: Vec<(String, WireError)>,
}

impl WiringReport {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Wire every registry entry.
///
/// A plugin's private config is merged into a copy of `options` that
/// replaces the original only once that plugin is fully wired. An exit or
/// interrupt request from plugin code stops wiring and is returned.
pub fn wire_plugins(
    registry: &PluginRegistry,
    ctx: &PluginContext,
    loader: &ConfigLoader,
    options: &mut OptionSet,
    subcommands: &mut Vec<Subcommand>,
) -> Result<WiringReport, Escalation> {
    let mut report = WiringReport::default();

    if registry.is_empty() {
        tracing::warn!("No plugins registered, no commands available");
        return Ok(report);
    }

    for descriptor in registry.iter() {
        let mut staged = options.clone();
        let result = catch_unwind(AssertUnwindSafe(|| {
            wire_plugin(descriptor, ctx, loader, &mut staged, subcommands)
        }))
        .unwrap_or_else(|payload| {
            Err(WireError::Panicked {
                identifier: descriptor.identifier.clone(),
                message: panic_message(payload.as_ref()),
            })
        });

        match result {
            Ok(subcommand) => {
                tracing::info!(
                    identifier = %descriptor.identifier,
                    subcommand = %subcommand.name(),
                    "Plugin wired"
                );
                *options = staged;
                report.wired.push(subcommand.name().to_string());
                subcommands.push(subcommand);
            }
            Err(WireError::Escalated { escalation, .. }) => return Err(escalation),
            Err(e) => {
                tracing::warn!(
                    identifier = %descriptor.identifier,
                    error = %e,
                    "Plugin excluded from command surface"
                );
                report.failed.push((descriptor.identifier.clone(), e));
            }
        }
    }

    Ok(report)
}

fn wire_plugin(
    descriptor: &PluginDescriptor,
    ctx: &PluginContext,
    loader: &ConfigLoader,
    staged: &mut OptionSet,
    existing: &[Subcommand],
) -> Result<Subcommand, WireError> {
    let identifier = &descriptor.identifier;
    let plugin_error = |stage: &'static str, source: PluginError| match Escalation::from_plugin_error(&source) {
        Some(escalation) => WireError::Escalated {
            identifier: identifier.clone(),
            escalation,
        },
        None => WireError::Plugin {
            identifier: identifier.clone(),
            stage,
            source,
        },
    };

    let factory = descriptor
        .module
        .get(identifier)
        .ok_or_else(|| WireError::MissingExport {
            module: descriptor.module.name().to_string(),
            identifier: identifier.clone(),
        })?;

    let plugin = factory(ctx).map_err(|e| plugin_error("instantiate", e))?;

    let config_path = plugin.config_file(ctx);
    if let ConfigOutcome::Merged(keys) = loader.read(&config_path, staged) {
        tracing::debug!(identifier = %identifier, keys, "Merged plugin config");
    }

    let name = plugin.name().to_string();
    if existing.iter().any(|s| s.name() == name) {
        return Err(WireError::DuplicateName(name));
    }

    let mut spec = CommandSpec::new(name.clone(), plugin.help());
    spec.version = plugin.version().map(str::to_string);

    plugin
        .setup(&mut spec)
        .map_err(|e| plugin_error("set up", e))?;
    spec.validate()
        .map_err(|reason| WireError::InvalidSpec { name, reason })?;
    build_command(&spec).debug_assert();

    Ok(Subcommand {
        identifier: identifier.clone(),
        spec,
        handler: BoundHandler::new(plugin),
    })
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
