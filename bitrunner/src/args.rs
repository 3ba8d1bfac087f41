//! Global command-line flags and the root command.

use anstyle::{AnsiColor, Effects};
use bitrunner_plugin_api::ArgSpec;
use bitrunner_plugin_host::build_arg;
use clap::builder::Styles;
use clap::{Arg, ArgAction, Command};
use std::ffi::OsString;
use std::path::PathBuf;

/// Argument id of the top-level help flag
pub const HELP_ID: &str = "help";

/// Argument id of the top-level version flag
pub const VERSION_ID: &str = "version";

pub const CONFIG_KEY: &str = "config";
pub const LOGFILE_KEY: &str = "logfile";
pub const VERBOSE_KEY: &str = "verbose";
pub const PROFILE_KEY: &str = "profile";
pub const DEBUG_KEY: &str = "debug";

/// Declarations of the flags every invocation accepts before the subcommand.
pub fn global_args(app: &str) -> Vec<ArgSpec> {
    vec![
        ArgSpec::option(CONFIG_KEY, "config")
            .value_name("PATH")
            .help("Read additional configuration from PATH"),
        ArgSpec::option(LOGFILE_KEY, "logfile")
            .value_name("PATH")
            .default(format!("{}.log", app))
            .help("Log file path"),
        ArgSpec::option(VERBOSE_KEY, "verbose")
            .short('v')
            .count()
            .default(0i64)
            .help("Increase verbosity, repeatable"),
        ArgSpec::option(PROFILE_KEY, "profile")
            .store_true()
            .help("Time the selected command"),
        ArgSpec::option(DEBUG_KEY, "debug")
            .store_true()
            .help("Log the merged options before running"),
    ]
}

fn styles() -> Styles {
    Styles::styled()
        .header(AnsiColor::Yellow.on_default() | Effects::BOLD)
        .usage(AnsiColor::Yellow.on_default() | Effects::BOLD)
        .literal(AnsiColor::Green.on_default())
        .placeholder(AnsiColor::Cyan.on_default())
}

/// Root command without subcommands.
///
/// Help and version are plain flags so the dispatcher decides what they
/// print and which status they exit with.
pub fn root_command(app: &str) -> Command {
    let mut cmd = Command::new(app.to_string())
        .styles(styles())
        .disable_help_flag(true)
        .disable_version_flag(true)
        .disable_help_subcommand(true)
        .args_override_self(true)
        .arg(
            Arg::new(HELP_ID)
                .short('h')
                .short_alias('?')
                .long("help")
                .action(ArgAction::SetTrue)
                .help("Print help"),
        )
        .arg(
            Arg::new(VERSION_ID)
                .long("version")
                .action(ArgAction::SetTrue)
                .help("Print version"),
        );

    for spec in global_args(app) {
        cmd = cmd.arg(build_arg(&spec));
    }
    cmd
}

/// Flags needed before logging and configuration are set up.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GlobalArgs {
    pub verbose: i32,
    pub config: Option<PathBuf>,
}

impl GlobalArgs {
    /// Read the global flags without knowing any subcommand yet.
    ///
    /// Everything from the first positional on is left alone, and parse
    /// errors fall back to defaults; the full parse reports them later.
    pub fn pre_parse<I, T>(app: &str, argv: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        let cmd = root_command(app)
            .ignore_errors(true)
            .allow_external_subcommands(true);

        let Ok(matches) = cmd.try_get_matches_from(argv) else {
            return Self::default();
        };

        let verbose = matches
            .try_get_one::<u8>(VERBOSE_KEY)
            .ok()
            .flatten()
            .map(|count| i32::from(*count))
            .unwrap_or(0);
        let config = matches
            .try_get_one::<String>(CONFIG_KEY)
            .ok()
            .flatten()
            .map(PathBuf::from);

        Self { verbose, config }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_root_command_is_consistent() {
        root_command("bitrunner").debug_assert();
    }

    #[test]
    fn test_global_defaults() {
        let defaults: Vec<_> = global_args("bitrunner")
            .into_iter()
            .filter_map(|spec| spec.effective_default().map(|d| (spec.dest, d.to_string())))
            .collect();

        assert_eq!(
            defaults,
            vec![
                ("logfile".to_string(), "bitrunner.log".to_string()),
                ("verbose".to_string(), "0".to_string()),
                ("profile".to_string(), "false".to_string()),
                ("debug".to_string(), "false".to_string()),
            ]
        );
    }

    #[test]
    fn test_pre_parse_stops_at_subcommand() {
        let globals = GlobalArgs::pre_parse(
            "bitrunner",
            ["bitrunner", "-vv", "--config", "user.conf", "test_plugin", "-v", "-s", "x"],
        );
        assert_eq!(globals.verbose, 2);
        assert_eq!(globals.config, Some(PathBuf::from("user.conf")));
    }

    #[test]
    fn test_pre_parse_defaults() {
        let globals = GlobalArgs::pre_parse("bitrunner", ["bitrunner"]);
        assert_eq!(globals, GlobalArgs::default());
    }

    #[test]
    fn test_question_mark_is_help() {
        let matches = root_command("bitrunner")
            .try_get_matches_from(["bitrunner", "-?"])
            .unwrap();
        assert!(matches.get_flag(HELP_ID));
    }
}
