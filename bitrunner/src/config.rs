//! Configuration file loading.
//!
//! Config files are TOML documents where every top-level table is a
//! section. Keys from all sections are flattened into the shared
//! [`OptionSet`]. The reserved `[LOGGING]` section instead carries a
//! [`TracingConfig`] under `conf` and reconfigures the log sink.
//!
//! Nothing here is fatal: a missing or malformed file is reported and the
//! option set is left exactly as it was.

use crate::tracing_support::{LogHandle, TracingConfig};
use bitrunner_plugin_api::{OptionSet, OptionValue};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Section that reconfigures logging instead of contributing options
pub const LOGGING_SECTION: &str = "LOGGING";

/// Key inside [`LOGGING_SECTION`] holding the logging configuration
pub const LOGGING_CONF_KEY: &str = "conf";

/// String values decoded as booleans
pub const BOOLEAN_LITERALS: [(&str, bool); 12] = [
    ("True", true),
    ("true", true),
    ("TRUE", true),
    ("yes", true),
    ("Yes", true),
    ("YES", true),
    ("False", false),
    ("false", false),
    ("FALSE", false),
    ("no", false),
    ("No", false),
    ("NO", false),
];

/// Decode a boolean literal token. Matching is exact.
pub fn parse_bool_literal(value: &str) -> Option<bool> {
    BOOLEAN_LITERALS
        .iter()
        .find(|(token, _)| *token == value)
        .map(|(_, b)| *b)
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Config file not found: {0}")]
    NotFound(PathBuf),

    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Key '{key}' in {path} is not inside a section")]
    KeyOutsideSection { path: PathBuf, key: String },

    #[error("Invalid [LOGGING] section in {path}: {reason}")]
    Logging { path: PathBuf, reason: String },
}

/// What a call to [`ConfigLoader::read`] did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigOutcome {
    /// Empty path, nothing to read
    Skipped,

    NotFound(PathBuf),

    /// The file exists but could not be parsed; nothing was merged
    ParseError(PathBuf),

    /// Number of keys written into the option set
    Merged(usize),

    /// The file held a `[LOGGING]` section; `applied` is false when no
    /// sink could be reconfigured
    LoggingReconfigured { applied: bool },
}

/// A parsed config file
enum Document {
    Logging(TracingConfig),
    Sections(Vec<(String, OptionValue)>),
}

/// Reads config files into an option set
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    root: PathBuf,
    log_handle: Option<LogHandle>,
}

impl ConfigLoader {
    /// Relative config paths resolve against `root`
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            log_handle: None,
        }
    }

    /// Let `[LOGGING]` sections reconfigure the sink behind `handle`
    pub fn with_log_handle(mut self, handle: LogHandle) -> Self {
        self.log_handle = Some(handle);
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }

    /// Merge the config file at `path` into `options`.
    ///
    /// Never fails: missing and malformed files are logged and reported
    /// through the returned [`ConfigOutcome`].
    pub fn read(&self, path: impl AsRef<Path>, options: &mut OptionSet) -> ConfigOutcome {
        let path = path.as_ref();
        if path.as_os_str().is_empty() {
            return ConfigOutcome::Skipped;
        }
        let path = self.resolve(path);

        match parse_document(&path) {
            Ok(Document::Sections(values)) => {
                let count = values.len();
                for (key, value) in values {
                    options.set(key, value);
                }
                tracing::debug!(path = %path.display(), keys = count, "Merged config file");
                ConfigOutcome::Merged(count)
            }
            Ok(Document::Logging(config)) => self.apply_logging(&path, &config),
            Err(ConfigError::NotFound(_)) => {
                tracing::warn!(path = %path.display(), "Config file not found");
                ConfigOutcome::NotFound(path)
            }
            Err(e) => {
                tracing::warn!(error = %e, "Config parse error");
                ConfigOutcome::ParseError(path)
            }
        }
    }

    fn apply_logging(&self, path: &Path, config: &TracingConfig) -> ConfigOutcome {
        let Some(handle) = &self.log_handle else {
            tracing::warn!(
                path = %path.display(),
                "No reloadable log sink installed, logging configuration ignored"
            );
            return ConfigOutcome::LoggingReconfigured { applied: false };
        };

        match handle.reconfigure(config) {
            Ok(()) => {
                tracing::info!(path = %path.display(), "Logging reconfigured");
                ConfigOutcome::LoggingReconfigured { applied: true }
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Logging reconfiguration failed");
                ConfigOutcome::LoggingReconfigured { applied: false }
            }
        }
    }
}

fn parse_document(path: &Path) -> Result<Document, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => ConfigError::NotFound(path.to_path_buf()),
        _ => ConfigError::Read {
            path: path.to_path_buf(),
            source: e,
        },
    })?;

    let table: toml::Table = toml::from_str(&content).map_err(|e| ConfigError::Parse {
        path: path.to_path_buf(),
        source: e,
    })?;

    if let Some((key, _)) = table.iter().find(|(_, value)| !value.is_table()) {
        return Err(ConfigError::KeyOutsideSection {
            path: path.to_path_buf(),
            key: key.clone(),
        });
    }

    if let Some(section) = table.get(LOGGING_SECTION).and_then(toml::Value::as_table) {
        return logging_config(path, section).map(Document::Logging);
    }

    let mut values = Vec::new();
    for section in table.values().filter_map(toml::Value::as_table) {
        for (key, value) in section {
            values.push((key.to_lowercase(), option_value(value)));
        }
    }
    Ok(Document::Sections(values))
}

fn logging_config(path: &Path, section: &toml::Table) -> Result<TracingConfig, ConfigError> {
    let invalid = |reason: String| ConfigError::Logging {
        path: path.to_path_buf(),
        reason,
    };

    match section.get(LOGGING_CONF_KEY) {
        Some(conf @ toml::Value::Table(_)) => conf
            .clone()
            .try_into()
            .map_err(|e: toml::de::Error| invalid(e.to_string())),
        Some(toml::Value::String(raw)) => {
            serde_json::from_str(raw).map_err(|e| invalid(e.to_string()))
        }
        Some(_) => Err(invalid(format!(
            "'{}' must be a table or a JSON string",
            LOGGING_CONF_KEY
        ))),
        None => Err(invalid(format!("missing '{}' key", LOGGING_CONF_KEY))),
    }
}

fn option_value(value: &toml::Value) -> OptionValue {
    match value {
        toml::Value::String(s) => match parse_bool_literal(s) {
            Some(b) => OptionValue::Bool(b),
            None => OptionValue::Str(s.clone()),
        },
        toml::Value::Boolean(b) => OptionValue::Bool(*b),
        toml::Value::Integer(i) => OptionValue::Str(i.to_string()),
        toml::Value::Float(f) => OptionValue::Str(f.to_string()),
        toml::Value::Datetime(d) => OptionValue::Str(d.to_string()),
        toml::Value::Array(items) => {
            let strings: Option<Vec<String>> = items
                .iter()
                .map(|item| item.as_str().map(str::to_string))
                .collect();
            match strings {
                Some(list) => OptionValue::List(list),
                None => OptionValue::Str(value.to_string()),
            }
        }
        toml::Value::Table(_) => OptionValue::Str(value.to_string()),
    }
}
