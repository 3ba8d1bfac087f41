//! Subcommand and argument declarations a plugin contributes in `setup`.

use crate::options::OptionValue;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// What happens when an argument is seen on the command line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ArgAction {
    /// Store the given value.
    Store,
    /// Store a fixed value when the flag is present.
    StoreConst(String),
    /// Store `true` when present.
    StoreTrue,
    /// Store `false` when present.
    StoreFalse,
    /// Collect every occurrence into a list.
    Append,
    /// Count occurrences.
    Count,
}

impl ArgAction {
    /// Whether the argument consumes a value.
    pub fn takes_value(&self) -> bool {
        matches!(self, ArgAction::Store | ArgAction::Append)
    }
}

/// Command specification built for every wired plugin
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandSpec {
    /// Subcommand name as typed on the command line
    pub name: String,

    /// Short description for help text
    pub about: String,

    /// Plugin version
    #[serde(default)]
    pub version: Option<String>,

    /// Argument specifications
    #[serde(default)]
    pub args: Vec<ArgSpec>,
}

/// Argument specification
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArgSpec {
    /// Unique argument id within the command
    pub id: String,

    /// Option-set key the parsed value is written to
    pub dest: String,

    /// Long option name without dashes (e.g., "output")
    #[serde(default)]
    pub long: Option<String>,

    /// Short option name (e.g., 'o')
    #[serde(default)]
    pub short: Option<char>,

    #[serde(default = "default_action")]
    pub action: ArgAction,

    /// Whether this argument is required
    #[serde(default)]
    pub required: bool,

    /// Help text for this argument
    #[serde(default)]
    pub help: String,

    /// Value placeholder name (e.g., "FILE")
    #[serde(default)]
    pub value_name: Option<String>,

    /// Default value if not provided
    #[serde(default)]
    pub default_value: Option<OptionValue>,

    /// List of allowed values
    #[serde(default)]
    pub possible_values: Option<Vec<String>>,
}

fn default_action() -> ArgAction {
    ArgAction::Store
}

/// Reserved for the help flag every subcommand carries, as id, long and short.
const RESERVED_SHORT: char = 'h';
const RESERVED_LONG: &str = "help";

impl CommandSpec {
    /// Create a new command spec
    pub fn new(name: impl Into<String>, about: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            about: about.into(),
            version: None,
            args: Vec::new(),
        }
    }

    /// Add version
    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    /// Add an argument
    pub fn arg(mut self, arg: ArgSpec) -> Self {
        self.args.push(arg);
        self
    }

    /// Add an argument in place, for use from `Plugin::setup`
    pub fn add_arg(&mut self, arg: ArgSpec) -> &mut Self {
        self.args.push(arg);
        self
    }

    /// Check the declarations for conflicts the parser would reject.
    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("command name is empty".to_string());
        }

        let mut ids = HashSet::new();
        let mut longs = HashSet::new();
        let mut shorts = HashSet::new();

        for arg in &self.args {
            if arg.id.is_empty() || arg.dest.is_empty() {
                return Err(format!("argument '{}' has an empty id or dest", arg.id));
            }
            if arg.id == RESERVED_LONG {
                return Err(format!("argument id '{}' is reserved", arg.id));
            }
            if !ids.insert(arg.id.as_str()) {
                return Err(format!("duplicate argument id '{}'", arg.id));
            }
            if let Some(long) = &arg.long {
                if long.is_empty() || long.starts_with('-') || long == RESERVED_LONG {
                    return Err(format!("invalid long flag '--{}'", long));
                }
                if !longs.insert(long.as_str()) {
                    return Err(format!("duplicate long flag '--{}'", long));
                }
            }
            if let Some(short) = arg.short {
                if short == '-' || short == RESERVED_SHORT || short.is_whitespace() {
                    return Err(format!("invalid short flag '-{}'", short));
                }
                if !shorts.insert(short) {
                    return Err(format!("duplicate short flag '-{}'", short));
                }
            }
            if arg.is_positional() && !arg.action.takes_value() {
                return Err(format!(
                    "positional argument '{}' must take a value",
                    arg.id
                ));
            }
        }

        Ok(())
    }
}

impl ArgSpec {
    /// Create a positional argument
    pub fn positional(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            id: name.clone(),
            dest: name,
            long: None,
            short: None,
            action: ArgAction::Store,
            required: false,
            help: String::new(),
            value_name: None,
            default_value: None,
            possible_values: None,
        }
    }

    /// Create an option with long name
    pub fn option(name: impl Into<String>, long: impl Into<String>) -> Self {
        Self {
            long: Some(long.into()),
            ..Self::positional(name)
        }
    }

    /// Create an option that only has a short flag
    pub fn short_option(name: impl Into<String>, short: char) -> Self {
        Self {
            short: Some(short),
            ..Self::positional(name)
        }
    }

    pub fn is_positional(&self) -> bool {
        self.long.is_none() && self.short.is_none()
    }

    /// Write the parsed value to a different option-set key
    pub fn dest(mut self, dest: impl Into<String>) -> Self {
        self.dest = dest.into();
        self
    }

    /// Set long option
    pub fn long(mut self, long: impl Into<String>) -> Self {
        self.long = Some(long.into());
        self
    }

    /// Set short option
    pub fn short(mut self, short: char) -> Self {
        self.short = Some(short);
        self
    }

    /// Set as required
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Set help text
    pub fn help(mut self, help: impl Into<String>) -> Self {
        self.help = help.into();
        self
    }

    pub fn value_name(mut self, value_name: impl Into<String>) -> Self {
        self.value_name = Some(value_name.into());
        self
    }

    /// Set default value
    pub fn default(mut self, value: impl Into<OptionValue>) -> Self {
        self.default_value = Some(value.into());
        self
    }

    pub fn possible_values(mut self, values: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.possible_values = Some(values.into_iter().map(Into::into).collect());
        self
    }

    pub fn action(mut self, action: ArgAction) -> Self {
        self.action = action;
        self
    }

    pub fn store_const(self, value: impl Into<String>) -> Self {
        self.action(ArgAction::StoreConst(value.into()))
    }

    pub fn store_true(self) -> Self {
        self.action(ArgAction::StoreTrue)
    }

    pub fn store_false(self) -> Self {
        self.action(ArgAction::StoreFalse)
    }

    pub fn append(self) -> Self {
        self.action(ArgAction::Append)
    }

    pub fn count(self) -> Self {
        self.action(ArgAction::Count)
    }

    /// Value written when the argument is absent: the explicit default, or
    /// the one implied by the action.
    pub fn effective_default(&self) -> Option<OptionValue> {
        if let Some(value) = &self.default_value {
            return Some(value.clone());
        }
        match self.action {
            ArgAction::StoreTrue => Some(OptionValue::Bool(false)),
            ArgAction::StoreFalse => Some(OptionValue::Bool(true)),
            ArgAction::Append => Some(OptionValue::List(Vec::new())),
            ArgAction::Store | ArgAction::StoreConst(_) | ArgAction::Count => None,
        }
    }
}
