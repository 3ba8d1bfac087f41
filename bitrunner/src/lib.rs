//! # bitrunner: plugin-oriented command-line execution engine
//!
//! Discovers plugins, merges configuration from several sources, builds a
//! single command-line surface with one subcommand per plugin, and turns
//! whatever the selected plugin returns into a process exit status.
//!
//! ## Startup sequence
//!
//! 1. Logging: a console sink at the level given by `-v` ([`init_subscriber`])
//! 2. Config: `<app>.conf` in the root, then `--config PATH` ([`Cli::load_config`])
//! 3. Discovery: `*_plugin.toml` manifests in the root ([`PluginRegistry::discover`])
//! 4. Wiring: instantiate, merge private config, declare flags ([`Cli::wire_plugins`])
//! 5. Dispatch: parse, run the selected handler, normalize ([`Cli::execute`])
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use bitrunner::{builtin_catalog, Cli, PluginRegistry};
//!
//! let root = std::env::current_dir()?;
//! let mut cli = Cli::new("bitrunner", &root);
//! cli.load_config(None);
//!
//! let mut registry = PluginRegistry::new(builtin_catalog());
//! registry.discover(&root, &cli.blacklist())?;
//! cli.wire_plugins(&registry)?;
//!
//! let status = cli.execute(std::env::args_os())?;
//! std::process::exit(status);
//! ```

pub mod args;
pub mod build_info;
pub mod config;
pub mod dispatch;
pub mod tracing_support;
pub mod wiring;

// Re-export tracing itself
pub use tracing_support::tracing;

// Re-export commonly used items
pub use args::{global_args, root_command, GlobalArgs};
pub use build_info::{version_info, version_short};
pub use config::{ConfigError, ConfigLoader, ConfigOutcome};
pub use dispatch::{normalize, Cli, DispatchState};
pub use tracing_support::{
    init_subscriber, LogHandle, LogLevel, LoggingError, TracingConfig, TracingFormat,
};
pub use wiring::{BoundHandler, Subcommand, WireError, WiringReport};

pub use bitrunner_plugin_api::{OptionSet, OptionValue, Outcome, PluginError};
pub use bitrunner_plugin_host::{Blacklist, PluginRegistry, StaticLoader};

/// Catalog of the plugin modules compiled into this binary.
pub fn builtin_catalog() -> StaticLoader {
    let catalog = StaticLoader::new();
    #[cfg(feature = "builtin-plugins")]
    let catalog = catalog.with_module(test_plugin::plugin_module());
    catalog
}

/// CLI result type.
pub type CliResult<T> = Result<T, CliError>;

// ============================================================================
// Error Types
// ============================================================================

/// Exit status when no subcommand was selected
pub const NO_COMMAND_STATUS: i32 = 2;

/// Exit status after printing top-level usage
pub const HELP_STATUS: i32 = 1;

/// Exit status for an interrupt escalation
pub const INTERRUPTED_STATUS: i32 = 130;

/// Requests from plugin code that end the process and are never swallowed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Escalation {
    /// Explicit process-exit request carrying its status.
    Exit(i32),

    /// Process interrupt.
    Interrupted,
}

impl Escalation {
    pub fn exit_code(&self) -> i32 {
        match self {
            Escalation::Exit(code) => *code,
            Escalation::Interrupted => INTERRUPTED_STATUS,
        }
    }

    /// Split an escalation off a plugin error.
    pub fn from_plugin_error(err: &PluginError) -> Option<Self> {
        match err {
            PluginError::Exit(code) => Some(Escalation::Exit(*code)),
            PluginError::Interrupted => Some(Escalation::Interrupted),
            _ => None,
        }
    }
}

/// Top-level error type for CLI operations.
#[derive(Debug)]
pub enum CliError {
    /// No subcommand resolved to a handler (exit code 2).
    NoCommandSelected,

    /// The command line could not be parsed, or help for a subcommand was
    /// requested. Exit code as decided by clap.
    Usage(clap::Error),

    /// Plugin code asked for the process to end.
    Escalation(Escalation),

    /// Startup failures (exit code 101).
    System(SystemError),
}

impl CliError {
    /// Get the appropriate exit code for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::NoCommandSelected => NO_COMMAND_STATUS,
            CliError::Usage(e) => e.exit_code(),
            CliError::Escalation(e) => e.exit_code(),
            CliError::System(_) => 101,
        }
    }

    /// Print the error the way the user should see it.
    pub fn report(&self) {
        match self {
            CliError::Usage(e) => {
                // Help and usage text are owned by clap
                let _ = e.print();
            }
            CliError::Escalation(_) => {}
            other => eprintln!("{}", other),
        }
    }
}

impl std::fmt::Display for CliError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CliError::NoCommandSelected => {
                write!(f, "Error: No command selected\n\nRun with -h to list commands.")
            }
            CliError::Usage(e) => write!(f, "{}", e),
            CliError::Escalation(Escalation::Exit(code)) => {
                write!(f, "Exit requested with status {}", code)
            }
            CliError::Escalation(Escalation::Interrupted) => write!(f, "Interrupted"),
            CliError::System(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for CliError {}

/// Startup failures the user cannot fix from the command line.
#[derive(Debug)]
pub enum SystemError {
    /// I/O error.
    Io(std::io::Error),

    /// Parsed arguments could not be read back.
    Matches(clap::parser::MatchesError),
}

impl std::fmt::Display for SystemError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SystemError::Io(e) => {
                write!(f, "Internal Error: I/O operation failed\n\n{}", e)
            }
            SystemError::Matches(e) => {
                write!(
                    f,
                    "Internal Error: Parsed arguments could not be read\n\n{}\n\nThis is likely a bug.",
                    e
                )
            }
        }
    }
}

impl From<std::io::Error> for CliError {
    fn from(e: std::io::Error) -> Self {
        CliError::System(SystemError::Io(e))
    }
}

impl From<clap::parser::MatchesError> for CliError {
    fn from(e: clap::parser::MatchesError) -> Self {
        CliError::System(SystemError::Matches(e))
    }
}

impl From<Escalation> for CliError {
    fn from(e: Escalation) -> Self {
        CliError::Escalation(e)
    }
}
