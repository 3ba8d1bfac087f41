use bitrunner::{
    builtin_catalog, init_subscriber, version_info, version_short, Cli, CliError, GlobalArgs,
    LogLevel, PluginRegistry,
};
use std::ffi::OsString;

const APP_NAME: &str = "bitrunner";

fn main() {
    std::process::exit(run());
}

fn run() -> i32 {
    let argv: Vec<OsString> = std::env::args_os().collect();
    let globals = GlobalArgs::pre_parse(APP_NAME, argv.iter().cloned());

    // Logging comes first so everything below can report
    let log_handle = match init_subscriber(LogLevel::from_verbosity(globals.verbose)) {
        Ok(handle) => Some(handle),
        Err(e) => {
            eprintln!("Warning: {}", e);
            None
        }
    };
    tracing::debug!(build = %version_info(), "Starting");

    let root = match std::env::current_dir() {
        Ok(root) => root,
        Err(e) => return fail(CliError::from(e)),
    };

    let mut cli = Cli::new(APP_NAME, &root).version(version_short());
    if let Some(handle) = log_handle {
        cli = cli.with_log_handle(handle);
    }
    cli.load_config(globals.config.as_deref());

    let mut registry = PluginRegistry::new(builtin_catalog());
    match registry.discover(&root, &cli.blacklist()) {
        Ok(report) => tracing::debug!(
            registered = report.registered.len(),
            failed = report.failures.len(),
            blacklisted = report.blacklisted.len(),
            "Plugin discovery finished"
        ),
        Err(e) => tracing::warn!(error = %e, "Plugin discovery failed"),
    }

    match cli.wire_plugins(&registry) {
        Ok(report) if !report.is_success() => tracing::warn!(
            wired = report.wired.len(),
            failed = report.failed.len(),
            "Some plugins were left out of the command surface"
        ),
        Ok(_) => {}
        Err(e) => return fail(e),
    }

    match cli.execute(argv) {
        Ok(status) => status,
        Err(e) => fail(e),
    }
}

fn fail(err: CliError) -> i32 {
    err.report();
    err.exit_code()
}
