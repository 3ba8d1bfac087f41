//! End-to-end tests: config merge, discovery, wiring and dispatch over a
//! temporary root directory.

use bitrunner::{
    Cli, CliError, CliResult, ConfigOutcome, DispatchState, Escalation, PluginRegistry,
    StaticLoader,
};
use bitrunner_plugin_sdk::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

/// Returns whatever `--value` asks for.
#[derive(Describe)]
#[plugin(name = "ret")]
pub struct RetPlugin;

impl Plugin for RetPlugin {
    fn create(_ctx: &PluginContext) -> Result<Self, PluginError> {
        Ok(RetPlugin)
    }

    fn setup(&self, command: &mut CommandSpec) -> Result<(), PluginError> {
        command.add_arg(ArgSpec::option("value", "value"));
        Ok(())
    }

    fn execute(&self, options: &OptionSet) -> Result<Outcome, PluginError> {
        let Some(value) = options.get_str("value") else {
            return Ok(Outcome::None);
        };
        if let Some(status) = value.strip_prefix("abort:") {
            return Err(Abort::new(status.parse().map_err(bad_status)?).into());
        }
        if let Some(status) = value.strip_prefix("exit:") {
            return Err(PluginError::Exit(status.parse().map_err(bad_status)?));
        }
        match value {
            "interrupt" => Err(PluginError::Interrupted),
            "error" => Err(PluginError::other("requested failure")),
            "panic" => panic!("requested panic"),
            other => Ok(other.into_outcome()),
        }
    }
}

fn bad_status(e: std::num::ParseIntError) -> PluginError {
    PluginError::other(e.to_string())
}

/// Shows nothing, used to inspect merged options.
#[derive(Describe)]
#[plugin(name = "show")]
pub struct ShowPlugin;

impl Plugin for ShowPlugin {
    fn create(_ctx: &PluginContext) -> Result<Self, PluginError> {
        Ok(ShowPlugin)
    }

    fn setup(&self, command: &mut CommandSpec) -> Result<(), PluginError> {
        command.add_arg(ArgSpec::short_option("loud", 'l').store_true());
        Ok(())
    }

    fn execute(&self, _options: &OptionSet) -> Result<Outcome, PluginError> {
        Ok(Outcome::None)
    }
}

/// Fails while declaring flags.
#[derive(Describe)]
#[plugin(name = "bad_setup")]
pub struct BadSetupPlugin;

impl Plugin for BadSetupPlugin {
    fn create(_ctx: &PluginContext) -> Result<Self, PluginError> {
        Ok(BadSetupPlugin)
    }

    fn setup(&self, _command: &mut CommandSpec) -> Result<(), PluginError> {
        Err(PluginError::other("cannot declare flags"))
    }

    fn execute(&self, _options: &OptionSet) -> Result<Outcome, PluginError> {
        Ok(Outcome::None)
    }
}

/// Panics while declaring flags.
#[derive(Describe)]
#[plugin(name = "panic_setup")]
pub struct PanicSetupPlugin;

impl Plugin for PanicSetupPlugin {
    fn create(_ctx: &PluginContext) -> Result<Self, PluginError> {
        Ok(PanicSetupPlugin)
    }

    fn setup(&self, _command: &mut CommandSpec) -> Result<(), PluginError> {
        panic!("setup exploded");
    }

    fn execute(&self, _options: &OptionSet) -> Result<Outcome, PluginError> {
        Ok(Outcome::None)
    }
}

/// Claims a subcommand name that is already taken.
#[derive(Describe)]
#[plugin(name = "show")]
pub struct ZzShowPlugin;

impl Plugin for ZzShowPlugin {
    fn create(_ctx: &PluginContext) -> Result<Self, PluginError> {
        Ok(ZzShowPlugin)
    }

    fn setup(&self, _command: &mut CommandSpec) -> Result<(), PluginError> {
        Ok(())
    }

    fn execute(&self, _options: &OptionSet) -> Result<Outcome, PluginError> {
        Ok(Outcome::None)
    }
}

/// Asks for a process exit while declaring flags.
#[derive(Describe)]
#[plugin(name = "quit")]
pub struct QuitPlugin;

impl Plugin for QuitPlugin {
    fn create(_ctx: &PluginContext) -> Result<Self, PluginError> {
        Ok(QuitPlugin)
    }

    fn setup(&self, _command: &mut CommandSpec) -> Result<(), PluginError> {
        Err(PluginError::Exit(3))
    }

    fn execute(&self, _options: &OptionSet) -> Result<Outcome, PluginError> {
        Ok(Outcome::None)
    }
}

/// Interrupted before it exists.
#[derive(Describe)]
#[plugin(name = "halt")]
pub struct HaltPlugin;

impl Plugin for HaltPlugin {
    fn create(_ctx: &PluginContext) -> Result<Self, PluginError> {
        Err(PluginError::Interrupted)
    }

    fn setup(&self, _command: &mut CommandSpec) -> Result<(), PluginError> {
        Ok(())
    }

    fn execute(&self, _options: &OptionSet) -> Result<Outcome, PluginError> {
        Ok(Outcome::None)
    }
}

export_plugin!(
    module = "suite";
    RetPlugin,
    ShowPlugin,
    BadSetupPlugin,
    PanicSetupPlugin,
    ZzShowPlugin,
    QuitPlugin,
    HaltPlugin,
);

fn root_with(manifests: &[&str]) -> TempDir {
    let temp = TempDir::new().unwrap();
    for stem in manifests {
        fs::write(
            temp.path().join(format!("{}.toml", stem)),
            "module = \"suite\"\n",
        )
        .unwrap();
    }
    temp
}

fn write(root: &Path, name: &str, content: &str) {
    fs::write(root.join(name), content).unwrap();
}

fn wired_cli(root: &Path, user_config: Option<&Path>) -> Cli {
    let mut cli = Cli::new("app", root).version("9.9.9");
    cli.load_config(user_config);

    let mut registry = PluginRegistry::new(StaticLoader::new().with_module(plugin_module()));
    registry.discover(root, &cli.blacklist()).unwrap();
    cli.wire_plugins(&registry).unwrap();
    cli
}

fn run(root: &Path, argv: &[&str]) -> CliResult<i32> {
    let mut cli = wired_cli(root, None);
    let mut full = vec!["app"];
    full.extend_from_slice(argv);
    cli.execute(full)
}

#[test]
fn test_config_precedence() {
    let temp = root_with(&["show_plugin"]);
    let root = temp.path();
    write(
        root,
        "app.conf",
        "[main]\nk = \"main\"\nonly_main = \"kept\"\nlogfile = \"main.log\"\nflag = \"yes\"\n",
    );
    write(root, "user.conf", "[user]\nk = \"user\"\n");
    write(root, "show.conf", "[show]\nlogfile = \"plugin.log\"\nloud = \"True\"\n");

    let mut cli = wired_cli(root, Some(Path::new("user.conf")));
    assert_eq!(cli.options().get_str("k"), Some("user"));
    assert_eq!(cli.options().get_str("only_main"), Some("kept"));
    assert_eq!(cli.options().get_bool("flag"), Some(true));
    assert_eq!(cli.options().get_str("logfile"), Some("plugin.log"));

    let status = cli.execute(["app", "--logfile", "cli.log", "show"]).unwrap();
    assert_eq!(status, 0);
    assert_eq!(cli.options().get_str("logfile"), Some("cli.log"));
    // config value survives the flag's implicit default
    assert_eq!(cli.options().get_bool("loud"), Some(true));
    assert_eq!(cli.state(), DispatchState::Succeeded);
}

#[test]
fn test_builtin_defaults_are_lowest() {
    let temp = root_with(&["show_plugin"]);
    let mut cli = wired_cli(temp.path(), None);

    cli.execute(["app", "-vv", "show"]).unwrap();
    assert_eq!(cli.options().get_str("logfile"), Some("app.log"));
    assert_eq!(cli.options().get_int("verbose"), Some(2));
    assert_eq!(cli.options().get_bool("loud"), Some(false));
}

#[test]
fn test_normalized_exit_statuses() {
    let temp = root_with(&["ret_plugin"]);
    let root = temp.path();

    assert_eq!(run(root, &["ret"]).unwrap(), 0);
    assert_eq!(run(root, &["ret", "--value", "abort:7"]).unwrap(), 7);
    assert_eq!(run(root, &["ret", "--value", "abc"]).unwrap(), 1);
    assert_eq!(run(root, &["ret", "--value", "42"]).unwrap(), 42);
    assert_eq!(run(root, &["ret", "--value", "error"]).unwrap(), 1);
    assert_eq!(run(root, &["ret", "--value", "panic"]).unwrap(), 1);
}

#[test]
fn test_escalations_pass_through() {
    let temp = root_with(&["ret_plugin"]);
    let root = temp.path();

    let err = run(root, &["ret", "--value", "exit:4"]).unwrap_err();
    assert!(matches!(err, CliError::Escalation(Escalation::Exit(4))));
    assert_eq!(err.exit_code(), 4);

    let err = run(root, &["ret", "--value", "interrupt"]).unwrap_err();
    assert!(matches!(err, CliError::Escalation(Escalation::Interrupted)));
    assert_eq!(err.exit_code(), 130);
}

#[test]
fn test_escalations_during_wiring_stop_the_run() {
    for (stem, expected, code) in [
        ("quit_plugin", Escalation::Exit(3), 3),
        ("halt_plugin", Escalation::Interrupted, 130),
    ] {
        let temp = root_with(&[stem, "show_plugin"]);
        let root = temp.path();

        let mut cli = Cli::new("app", root);
        cli.load_config(None);
        let mut registry = PluginRegistry::new(StaticLoader::new().with_module(plugin_module()));
        registry.discover(root, &cli.blacklist()).unwrap();

        let err = cli.wire_plugins(&registry).unwrap_err();
        assert!(matches!(err, CliError::Escalation(e) if e == expected));
        assert_eq!(err.exit_code(), code);
        assert_eq!(cli.state(), DispatchState::ConfigLoaded);
    }
}

#[test]
fn test_profile_and_debug_flags() {
    let temp = root_with(&["show_plugin"]);
    let mut cli = wired_cli(temp.path(), None);

    let status = cli.execute(["app", "--profile", "--debug", "show"]).unwrap();
    assert_eq!(status, 0);
    assert_eq!(cli.options().get_bool("profile"), Some(true));
    assert_eq!(cli.options().get_bool("debug"), Some(true));
    assert_eq!(cli.state(), DispatchState::Succeeded);
}

#[test]
fn test_no_command_selected() {
    let temp = root_with(&["ret_plugin"]);
    let mut cli = wired_cli(temp.path(), None);

    let err = cli.execute(["app", "-v"]).unwrap_err();
    assert!(matches!(err, CliError::NoCommandSelected));
    assert_eq!(err.exit_code(), 2);
    assert_eq!(cli.state(), DispatchState::Failed);
}

#[test]
fn test_no_plugins_still_dispatches() {
    let temp = TempDir::new().unwrap();
    let mut cli = wired_cli(temp.path(), None);

    assert!(cli.subcommand_names().is_empty());
    assert!(matches!(
        cli.execute(["app"]).unwrap_err(),
        CliError::NoCommandSelected
    ));
}

#[test]
fn test_failing_plugins_are_excluded() {
    let temp = root_with(&[
        "bad_setup_plugin",
        "missing_export_plugin",
        "panic_setup_plugin",
        "ret_plugin",
        "show_plugin",
        "zz_show_plugin",
    ]);
    let root = temp.path();
    write(root, "bad_setup.conf", "[bad]\nleaked = \"1\"\n");

    let mut cli = Cli::new("app", root);
    cli.load_config(None);
    let mut registry = PluginRegistry::new(StaticLoader::new().with_module(plugin_module()));
    registry.discover(root, &cli.blacklist()).unwrap();
    assert_eq!(registry.len(), 6);

    let report = cli.wire_plugins(&registry).unwrap();
    assert_eq!(report.wired, vec!["ret", "show"]);
    assert!(!report.is_success());

    let failed: Vec<_> = report.failed.iter().map(|(id, _)| id.as_str()).collect();
    assert_eq!(
        failed,
        vec!["BadSetupPlugin", "MissingExportPlugin", "PanicSetupPlugin", "ZzShowPlugin"]
    );
    assert!(!cli.options().contains("leaked"));
    assert_eq!(cli.state(), DispatchState::PluginsWired);

    let names: Vec<String> = cli
        .command()
        .get_subcommands()
        .map(|s| s.get_name().to_string())
        .collect();
    assert_eq!(names, vec!["ret", "show"]);

    assert_eq!(cli.execute(["app", "show"]).unwrap(), 0);
}

#[test]
fn test_blacklist_from_config() {
    let temp = root_with(&["ret_plugin", "show_plugin"]);
    let root = temp.path();
    write(root, "app.conf", "[plugins]\nblacklist = \"ret_plugin\"\n");

    let cli = wired_cli(root, None);
    assert_eq!(cli.subcommand_names(), vec!["show"]);
}

#[test]
fn test_logging_section_is_not_merged() {
    let temp = root_with(&["show_plugin"]);
    let root = temp.path();
    write(
        root,
        "log.conf",
        "[LOGGING]\nconf = { level = \"debug\" }\n\n[main]\nk = \"v\"\n",
    );

    let mut cli = Cli::new("app", root);
    let outcomes = cli.load_config(Some(Path::new("log.conf")));
    assert_eq!(
        outcomes,
        vec![
            ConfigOutcome::NotFound(root.join("app.conf")),
            ConfigOutcome::LoggingReconfigured { applied: false },
        ]
    );
    assert!(!cli.options().contains("k"));
    assert_eq!(cli.state(), DispatchState::ConfigLoaded);
}

#[test]
fn test_malformed_config_is_not_fatal() {
    let temp = root_with(&["ret_plugin"]);
    let root = temp.path();
    write(root, "app.conf", "[main\nbroken");

    let mut cli = wired_cli(root, None);
    assert_eq!(cli.subcommand_names(), vec!["ret"]);
    assert_eq!(cli.execute(["app", "ret"]).unwrap(), 0);
}

#[test]
fn test_help_and_version() {
    let temp = root_with(&["ret_plugin"]);
    let root = temp.path();

    assert_eq!(run(root, &["--version"]).unwrap(), 0);
    assert_eq!(run(root, &["-h"]).unwrap(), 1);
    assert_eq!(run(root, &["-?"]).unwrap(), 1);

    let mut cli = wired_cli(root, None);
    assert_eq!(cli.execute(["app", "-h"]).unwrap(), 1);
    assert_eq!(cli.state(), DispatchState::Failed);

    let mut cli = wired_cli(root, None);
    assert_eq!(cli.execute(["app", "--version"]).unwrap(), 0);
    assert_eq!(cli.state(), DispatchState::Succeeded);

    let err = run(root, &["ret", "-h"]).unwrap_err();
    assert!(matches!(err, CliError::Usage(_)));
    assert_eq!(err.exit_code(), 0);

    let err = run(root, &["ret", "--bogus"]).unwrap_err();
    assert!(matches!(err, CliError::Usage(_)));
    assert_eq!(err.exit_code(), 2);
}

#[cfg(feature = "builtin-plugins")]
#[test]
fn test_builtin_test_plugin() {
    let temp = TempDir::new().unwrap();
    let root = temp.path();
    write(root, "test_plugin.toml", "");

    let mut cli = Cli::new("app", root);
    cli.load_config(None);
    let mut registry = PluginRegistry::new(bitrunner::builtin_catalog());
    registry.discover(root, &cli.blacklist()).unwrap();
    cli.wire_plugins(&registry).unwrap();
    assert_eq!(cli.subcommand_names(), vec!["test_plugin"]);

    let status = cli
        .execute([
            "app",
            "test_plugin",
            "-s",
            "v",
            "-c",
            "-t",
            "-f",
            "-a",
            "x",
            "-a",
            "y",
        ])
        .unwrap();
    assert_eq!(status, 0);

    let options = cli.options();
    assert_eq!(options.get_str("simple_value"), Some("v"));
    assert_eq!(options.get_str("constant_value"), Some("value-to-store"));
    assert_eq!(options.get_bool("boolean_switch"), Some(false));
    assert_eq!(
        options.get_list("collection"),
        Some(&["x".to_string(), "y".to_string()][..])
    );
}
