//! Bridge between plugin command declarations and clap
//!
//! Plugins declare their flags as [`CommandSpec`]s; this module turns those
//! declarations into clap commands and writes parse results back into the
//! shared [`OptionSet`].
//!
//! Merging follows namespace semantics: a value given on the command line
//! always overwrites what config files put in the option set, while a
//! declared default is only written when the key is still absent.

use bitrunner_plugin_api::{ArgAction, ArgSpec, CommandSpec, OptionSet, OptionValue};
use clap::builder::PossibleValuesParser;
use clap::parser::{MatchesError, ValueSource};
use clap::{Arg, ArgMatches, Command};

/// Argument id of the help flag each subcommand carries
pub const HELP_ID: &str = "help";

/// Build a clap command from a plugin's declarations
pub fn build_command(spec: &CommandSpec) -> Command {
    // The root command turns off clap's help flag for every level, so
    // subcommands declare their own.
    let mut cmd = Command::new(spec.name.clone())
        .about(spec.about.clone())
        .args_override_self(true)
        .disable_version_flag(true)
        .disable_help_flag(true)
        .arg(
            Arg::new(HELP_ID)
                .short('h')
                .long("help")
                .action(clap::ArgAction::Help)
                .help("Print help"),
        );

    if let Some(version) = &spec.version {
        cmd = cmd.version(version.clone());
    }

    for arg in &spec.args {
        cmd = cmd.arg(build_arg(arg));
    }

    cmd
}

/// Build a single clap argument.
///
/// No clap-level defaults are installed; defaults are applied by
/// [`merge_matches`] so they never mask values loaded from config files.
pub fn build_arg(spec: &ArgSpec) -> Arg {
    let mut arg = Arg::new(spec.id.clone()).required(spec.required);

    if let Some(long) = &spec.long {
        arg = arg.long(long.clone());
    }
    if let Some(short) = spec.short {
        arg = arg.short(short);
    }
    if !spec.help.is_empty() {
        arg = arg.help(spec.help.clone());
    }

    arg = match &spec.action {
        ArgAction::Store => arg.action(clap::ArgAction::Set),
        ArgAction::Append if spec.is_positional() => {
            arg.action(clap::ArgAction::Append).num_args(1..)
        }
        ArgAction::Append => arg.action(clap::ArgAction::Append),
        ArgAction::StoreConst(_) | ArgAction::StoreTrue | ArgAction::StoreFalse => {
            arg.action(clap::ArgAction::SetTrue)
        }
        ArgAction::Count => arg.action(clap::ArgAction::Count),
    };

    if spec.action.takes_value() {
        let value_name = spec
            .value_name
            .clone()
            .unwrap_or_else(|| spec.dest.to_uppercase());
        arg = arg.value_name(value_name);

        if let Some(values) = &spec.possible_values {
            arg = arg.value_parser(PossibleValuesParser::new(values.clone()));
        }
    }

    arg
}

/// Write parsed values into `options`.
///
/// Explicit values are applied in command-line order, so when two
/// arguments share a `dest` the one given last wins.
pub fn merge_matches(
    specs: &[ArgSpec],
    matches: &ArgMatches,
    options: &mut OptionSet,
) -> Result<(), MatchesError> {
    let mut explicit = Vec::new();

    for spec in specs {
        if matches.value_source(&spec.id) != Some(ValueSource::CommandLine) {
            continue;
        }
        let Some(value) = explicit_value(spec, matches)? else {
            continue;
        };
        let position = matches
            .indices_of(&spec.id)
            .and_then(|indices| indices.max())
            .unwrap_or(0);
        explicit.push((position, spec, value));
    }

    explicit.sort_by_key(|(position, _, _)| *position);
    for (_, spec, value) in explicit {
        options.set(spec.dest.clone(), value);
    }

    for spec in specs {
        if let Some(default) = spec.effective_default() {
            options.set_default(spec.dest.clone(), default);
        }
    }

    Ok(())
}

fn explicit_value(spec: &ArgSpec, matches: &ArgMatches) -> Result<Option<OptionValue>, MatchesError> {
    let value = match &spec.action {
        ArgAction::Store => matches
            .try_get_one::<String>(&spec.id)?
            .map(|s| OptionValue::Str(s.clone())),
        ArgAction::Append => matches
            .try_get_many::<String>(&spec.id)?
            .map(|values| OptionValue::List(values.cloned().collect())),
        ArgAction::StoreConst(value) => Some(OptionValue::Str(value.clone())),
        ArgAction::StoreTrue => Some(OptionValue::Bool(true)),
        ArgAction::StoreFalse => Some(OptionValue::Bool(false)),
        ArgAction::Count => matches
            .try_get_one::<u8>(&spec.id)?
            .map(|count| OptionValue::Int(i64::from(*count))),
    };
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn switch_spec() -> CommandSpec {
        CommandSpec::new("switch", "Toggle things")
            .arg(ArgSpec::short_option("simple_value", 's'))
            .arg(ArgSpec::short_option("constant_value", 'c').store_const("value-to-store"))
            .arg(
                ArgSpec::short_option("boolean_switch", 't')
                    .store_true()
                    .default(false),
            )
            .arg(
                ArgSpec::short_option("boolean_switch_off", 'f')
                    .dest("boolean_switch")
                    .store_false()
                    .default(false),
            )
            .arg(ArgSpec::short_option("collection", 'a').append())
            .arg(ArgSpec::option("verbose", "verbose").short('v').count())
    }

    fn parse(spec: &CommandSpec, argv: &[&str], options: &mut OptionSet) {
        let mut full = vec![spec.name.as_str()];
        full.extend_from_slice(argv);
        let matches = build_command(spec).try_get_matches_from(full).unwrap();
        merge_matches(&spec.args, &matches, options).unwrap();
    }

    #[test]
    fn test_build_command_is_consistent() {
        build_command(&switch_spec()).debug_assert();
    }

    #[test]
    fn test_explicit_values() {
        let spec = switch_spec();
        let mut options = OptionSet::new();
        parse(&spec, &["-s", "hello", "-c", "-a", "x", "-a", "y", "-vv"], &mut options);

        assert_eq!(options.get_str("simple_value"), Some("hello"));
        assert_eq!(options.get_str("constant_value"), Some("value-to-store"));
        assert_eq!(
            options.get_list("collection"),
            Some(&["x".to_string(), "y".to_string()][..])
        );
        assert_eq!(options.get_int("verbose"), Some(2));
        assert_eq!(options.get_bool("boolean_switch"), Some(false));
    }

    #[test]
    fn test_last_flag_wins_for_shared_dest() {
        let spec = switch_spec();

        let mut options = OptionSet::new();
        parse(&spec, &["-t", "-f"], &mut options);
        assert_eq!(options.get_bool("boolean_switch"), Some(false));

        let mut options = OptionSet::new();
        parse(&spec, &["-f", "-t"], &mut options);
        assert_eq!(options.get_bool("boolean_switch"), Some(true));
    }

    #[test]
    fn test_repeated_store_keeps_last() {
        let spec = switch_spec();
        let mut options = OptionSet::new();
        parse(&spec, &["-s", "one", "-s", "two"], &mut options);
        assert_eq!(options.get_str("simple_value"), Some("two"));
    }

    #[test]
    fn test_defaults_do_not_mask_config_values() {
        let spec = switch_spec();
        let mut options = OptionSet::new();
        options.set("boolean_switch", true);
        options.set("simple_value", "from-config");

        parse(&spec, &[], &mut options);

        assert_eq!(options.get_bool("boolean_switch"), Some(true));
        assert_eq!(options.get_str("simple_value"), Some("from-config"));
        assert_eq!(options.get_list("collection"), Some(&[][..]));
        assert!(!options.contains("constant_value"));
        assert!(!options.contains("verbose"));
    }

    #[test]
    fn test_explicit_values_overwrite_config() {
        let spec = switch_spec();
        let mut options = OptionSet::new();
        options.set("simple_value", "from-config");

        parse(&spec, &["-s", "from-cli"], &mut options);
        assert_eq!(options.get_str("simple_value"), Some("from-cli"));
    }

    #[test]
    fn test_subcommand_help() {
        let err = build_command(&switch_spec())
            .try_get_matches_from(["switch", "-h"])
            .unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::DisplayHelp);
        assert_eq!(err.exit_code(), 0);
    }

    #[test]
    fn test_possible_values_are_enforced() {
        let spec = CommandSpec::new("pick", "").arg(
            ArgSpec::option("color", "color").possible_values(["red", "green"]),
        );

        let err = build_command(&spec)
            .try_get_matches_from(["pick", "--color", "blue"])
            .unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::InvalidValue);

        let mut options = OptionSet::new();
        parse(&spec, &["--color", "green"], &mut options);
        assert_eq!(options.get_str("color"), Some("green"));
    }

    #[test]
    fn test_positional_append_takes_many() {
        let spec = CommandSpec::new("cat", "").arg(ArgSpec::positional("files").append());
        let mut options = OptionSet::new();
        parse(&spec, &["a.txt", "b.txt"], &mut options);
        assert_eq!(
            options.get_list("files"),
            Some(&["a.txt".to_string(), "b.txt".to_string()][..])
        );
    }
}
