//! Command dispatcher
//!
//! Owns the option set and the wired subcommands, runs the final parse,
//! invokes the selected handler and turns its result into an exit status.

use crate::args::{global_args, root_command, CONFIG_KEY, DEBUG_KEY, HELP_ID, PROFILE_KEY, VERSION_ID};
use crate::config::{ConfigLoader, ConfigOutcome};
use crate::tracing_support::LogHandle;
use crate::wiring::{wire_plugins, Subcommand, WiringReport};
use crate::{build_info, CliError, CliResult, Escalation, HELP_STATUS};
use bitrunner_plugin_api::{OptionSet, Outcome, PluginContext, PluginError, FAILURE_STATUS};
use bitrunner_plugin_host::{build_command, merge_matches, Blacklist, PluginRegistry};
use clap::Command;
use std::ffi::OsString;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Instant;

/// Dispatcher lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchState {
    Uninitialized,
    ConfigLoaded,
    PluginsWired,
    ArgsParsed,
    Executing,
    Succeeded,
    Failed,
}

impl fmt::Display for DispatchState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DispatchState::Uninitialized => "UNINITIALIZED",
            DispatchState::ConfigLoaded => "CONFIG_LOADED",
            DispatchState::PluginsWired => "PLUGINS_WIRED",
            DispatchState::ArgsParsed => "ARGS_PARSED",
            DispatchState::Executing => "EXECUTING",
            DispatchState::Succeeded => "SUCCEEDED",
            DispatchState::Failed => "FAILED",
        };
        f.write_str(name)
    }
}

fn advance(state: &mut DispatchState, next: DispatchState) {
    tracing::debug!(from = %state, to = %next, "Dispatcher state change");
    *state = next;
}

/// Map a handler result to an exit status.
///
/// Exit and interrupt requests are returned untouched; every other error
/// becomes [`FAILURE_STATUS`] except an abort, which carries its own.
pub fn normalize(result: Result<Outcome, PluginError>) -> Result<i32, Escalation> {
    match result {
        Ok(outcome) => Ok(outcome.exit_status()),
        Err(PluginError::Abort(abort)) => {
            tracing::info!(status = abort.status, reason = ?abort.reason, "Command aborted");
            Ok(abort.status)
        }
        Err(err) => match Escalation::from_plugin_error(&err) {
            Some(escalation) => Err(escalation),
            None => {
                tracing::error!(error = ?err, "Command failed");
                Ok(FAILURE_STATUS)
            }
        },
    }
}

/// The command-line engine
pub struct Cli {
    name: String,
    version: String,
    context: PluginContext,
    config: ConfigLoader,
    options: OptionSet,
    subcommands: Vec<Subcommand>,
    state: DispatchState,
}

impl Cli {
    /// Create a dispatcher for app `name` rooted at `root`.
    ///
    /// Built-in defaults of the global flags are seeded right away, below
    /// every config file.
    pub fn new(name: impl Into<String>, root: impl Into<PathBuf>) -> Self {
        let name = name.into();
        let root = root.into();

        let mut options = OptionSet::new();
        for spec in global_args(&name) {
            if let Some(default) = spec.effective_default() {
                options.set(spec.dest, default);
            }
        }

        Self {
            version: build_info::version_short().to_string(),
            context: PluginContext::new(root.clone()),
            config: ConfigLoader::new(root),
            options,
            subcommands: Vec::new(),
            state: DispatchState::Uninitialized,
            name,
        }
    }

    /// Version printed by `--version`
    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    /// Let `[LOGGING]` config sections reconfigure the installed sink
    pub fn with_log_handle(mut self, handle: LogHandle) -> Self {
        self.config = self.config.with_log_handle(handle);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn root(&self) -> &Path {
        self.context.root()
    }

    /// `<root>/<name>.conf`
    pub fn main_config_path(&self) -> PathBuf {
        self.context.config_path(&self.name)
    }

    /// Merge the main config file, then the user config if given.
    pub fn load_config(&mut self, user: Option<&Path>) -> Vec<ConfigOutcome> {
        let mut outcomes = vec![self.config.read(self.main_config_path(), &mut self.options)];
        if let Some(path) = user {
            outcomes.push(self.config.read(path, &mut self.options));
        }
        advance(&mut self.state, DispatchState::ConfigLoaded);
        outcomes
    }

    /// Plugin base names excluded from discovery
    pub fn blacklist(&self) -> Blacklist {
        Blacklist::from_options(&self.options)
    }

    /// Add one subcommand per registered plugin that wires cleanly.
    pub fn wire_plugins(&mut self, registry: &PluginRegistry) -> CliResult<WiringReport> {
        let report = wire_plugins(
            registry,
            &self.context,
            &self.config,
            &mut self.options,
            &mut self.subcommands,
        )?;
        advance(&mut self.state, DispatchState::PluginsWired);
        Ok(report)
    }

    /// The full command surface
    pub fn command(&self) -> Command {
        let mut cmd = root_command(&self.name).version(self.version.clone());
        for subcommand in &self.subcommands {
            cmd = cmd.subcommand(build_command(&subcommand.spec));
        }
        cmd
    }

    /// Names of the wired subcommands, in order
    pub fn subcommand_names(&self) -> Vec<&str> {
        self.subcommands.iter().map(Subcommand::name).collect()
    }

    pub fn options(&self) -> &OptionSet {
        &self.options
    }

    pub fn state(&self) -> DispatchState {
        self.state
    }

    /// Parse `argv` (program name first), run the selected subcommand and
    /// return its exit status.
    pub fn execute<I, T>(&mut self, argv: I) -> CliResult<i32>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        let mut cmd = self.command();
        let matches = match cmd.try_get_matches_from_mut(argv) {
            Ok(matches) => matches,
            Err(e) => {
                advance(&mut self.state, DispatchState::Failed);
                return Err(CliError::Usage(e));
            }
        };

        if matches.get_flag(HELP_ID) {
            print!("{}", cmd.render_help());
            advance(&mut self.state, DispatchState::Failed);
            return Ok(HELP_STATUS);
        }
        if matches.get_flag(VERSION_ID) {
            println!("{} {}", self.name, self.version);
            advance(&mut self.state, DispatchState::Succeeded);
            return Ok(0);
        }

        merge_matches(&global_args(&self.name), &matches, &mut self.options)?;

        let selected = matches.subcommand().and_then(|(name, sub_matches)| {
            self.subcommands
                .iter()
                .find(|s| s.name() == name)
                .map(|s| (s, sub_matches))
        });
        let Some((subcommand, sub_matches)) = selected else {
            advance(&mut self.state, DispatchState::Failed);
            tracing::error!("No command selected");
            return Err(CliError::NoCommandSelected);
        };

        merge_matches(&subcommand.spec.args, sub_matches, &mut self.options)?;
        advance(&mut self.state, DispatchState::ArgsParsed);

        if let Some(config) = self.options.get_str(CONFIG_KEY) {
            tracing::debug!(config = %config, "User config in effect");
        }
        if self.options.get_bool(DEBUG_KEY) == Some(true) {
            match serde_json::to_string(&self.options) {
                Ok(json) => tracing::info!(options = %json, "Merged options"),
                Err(e) => tracing::warn!(error = %e, "Failed to serialize options"),
            }
        }

        advance(&mut self.state, DispatchState::Executing);
        let started = Instant::now();
        let result = subcommand.handler.invoke(&self.options);
        if self.options.get_bool(PROFILE_KEY) == Some(true) {
            tracing::info!(
                command = %subcommand.name(),
                elapsed_ms = started.elapsed().as_secs_f64() * 1000.0,
                "Command finished"
            );
        }

        match normalize(result) {
            Ok(status) => {
                let next = if status == 0 {
                    DispatchState::Succeeded
                } else {
                    DispatchState::Failed
                };
                advance(&mut self.state, next);
                Ok(status)
            }
            Err(escalation) => {
                advance(&mut self.state, DispatchState::Failed);
                Err(CliError::Escalation(escalation))
            }
        }
    }
}

impl fmt::Debug for Cli {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cli")
            .field("name", &self.name)
            .field("root", &self.context.root())
            .field("subcommands", &self.subcommand_names())
            .field("state", &self.state)
            .finish()
    }
}
