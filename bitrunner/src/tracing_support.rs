//! Tracing and logging support.
//!
//! The console sink is installed before anything else logs, at a level
//! derived from the `-v` count. It sits behind a reload handle so a
//! `[LOGGING]` config section can later replace it wholesale.

use serde::Deserialize;
use std::fmt;
use std::fs::OpenOptions;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Mutex;
use thiserror::Error;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::{
    layer::SubscriberExt, reload, util::SubscriberInitExt, EnvFilter, Layer, Registry,
};

pub use tracing::{self, debug, error, info, instrument, trace, warn};

/// Type-erased console layer; the unit the reload handle swaps.
pub type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Errors raised while setting up or reconfiguring logging
#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("Failed to open log file {path}: {source}")]
    OpenFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to install global subscriber: {0}")]
    Init(#[from] tracing_subscriber::util::TryInitError),

    #[error("Failed to reload logging configuration: {0}")]
    Reload(#[from] reload::Error),

    #[error("Unknown log level: {0}")]
    UnknownLevel(String),
}

/// Numeric severity levels, ordered from most to least verbose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Deserialize)]
#[serde(try_from = "String")]
pub enum LogLevel {
    Debug = 10,
    Info = 20,
    Warning = 30,
    Error = 40,
    Critical = 50,
}

impl LogLevel {
    /// Level used when no `-v` flag is given
    pub const BASE: LogLevel = LogLevel::Error;

    pub const fn value(self) -> i32 {
        self as i32
    }

    /// Each `-v` lowers the level by one step, clamped to
    /// `Debug..=Critical`.
    pub fn from_verbosity(verbosity: i32) -> Self {
        let level = Self::BASE
            .value()
            .saturating_sub(verbosity.saturating_mul(10));
        match level {
            l if l >= LogLevel::Critical.value() => LogLevel::Critical,
            l if l >= LogLevel::Error.value() => LogLevel::Error,
            l if l >= LogLevel::Warning.value() => LogLevel::Warning,
            l if l >= LogLevel::Info.value() => LogLevel::Info,
            _ => LogLevel::Debug,
        }
    }

    /// `tracing` has no level above ERROR, so Critical shares it.
    pub fn as_filter(self) -> LevelFilter {
        match self {
            LogLevel::Critical | LogLevel::Error => LevelFilter::ERROR,
            LogLevel::Warning => LevelFilter::WARN,
            LogLevel::Info => LevelFilter::INFO,
            LogLevel::Debug => LevelFilter::DEBUG,
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warning => "WARNING",
            LogLevel::Error => "ERROR",
            LogLevel::Critical => "CRITICAL",
        };
        f.write_str(name)
    }
}

impl FromStr for LogLevel {
    type Err = LoggingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "debug" | "trace" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warning" | "warn" => Ok(LogLevel::Warning),
            "error" => Ok(LogLevel::Error),
            "critical" | "fatal" => Ok(LogLevel::Critical),
            _ => Err(LoggingError::UnknownLevel(s.to_string())),
        }
    }
}

impl TryFrom<String> for LogLevel {
    type Error = LoggingError;

    fn try_from(value: String) -> Result<Self, LoggingError> {
        value.parse()
    }
}

/// Tracing output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TracingFormat {
    /// Human-readable multi-line format.
    Pretty,

    /// Single-line format.
    Compact,

    /// JSON format, one object per event.
    Json,
}

/// Tracing configuration, as found under `[LOGGING] conf`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TracingConfig {
    /// Log level filter.
    ///
    /// If None, uses RUST_LOG environment variable or defaults to "info".
    pub level: Option<LogLevel>,

    /// Output format.
    pub format: TracingFormat,

    /// Include timestamps in output.
    pub timestamps: bool,

    /// Include target module names in output.
    pub target: bool,

    /// Include thread IDs in output.
    pub thread_ids: bool,

    /// Append to this file instead of writing to stderr.
    pub file: Option<PathBuf>,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            level: None,
            format: TracingFormat::Pretty,
            timestamps: true,
            target: true,
            thread_ids: false,
            file: None,
        }
    }
}

impl TracingConfig {
    /// The bootstrap console sink
    pub fn console(level: LogLevel) -> Self {
        Self {
            level: Some(level),
            format: TracingFormat::Compact,
            timestamps: false,
            target: false,
            ..Self::default()
        }
    }

    pub fn filter(&self) -> EnvFilter {
        match self.level {
            Some(level) => EnvFilter::new(level.as_filter().to_string()),
            None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        }
    }

    fn make_writer(&self) -> Result<BoxMakeWriter, LoggingError> {
        match &self.file {
            Some(path) => {
                let file = OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(path)
                    .map_err(|e| LoggingError::OpenFile {
                        path: path.clone(),
                        source: e,
                    })?;
                Ok(BoxMakeWriter::new(Mutex::new(file)))
            }
            None => Ok(BoxMakeWriter::new(std::io::stderr)),
        }
    }

    /// Build the filter and formatting layer described by this config.
    pub fn build_layer(&self) -> Result<BoxedLayer, LoggingError> {
        let filter = self.filter();
        let base = tracing_subscriber::fmt::layer()
            .with_writer(self.make_writer()?)
            .with_ansi(self.file.is_none())
            .with_target(self.target)
            .with_thread_ids(self.thread_ids);

        let layer: BoxedLayer = match (self.format, self.timestamps) {
            (TracingFormat::Pretty, true) => filter.and_then(base.pretty()).boxed(),
            (TracingFormat::Pretty, false) => filter.and_then(base.pretty().without_time()).boxed(),
            (TracingFormat::Compact, true) => filter.and_then(base.compact()).boxed(),
            (TracingFormat::Compact, false) => {
                filter.and_then(base.compact().without_time()).boxed()
            }
            (TracingFormat::Json, true) => filter.and_then(base.json()).boxed(),
            (TracingFormat::Json, false) => filter.and_then(base.json().without_time()).boxed(),
        };
        Ok(layer)
    }
}

/// Handle for replacing the active console layer.
#[derive(Clone)]
pub struct LogHandle {
    handle: reload::Handle<BoxedLayer, Registry>,
}

impl LogHandle {
    /// Replace the active layer with one built from `config`.
    pub fn reconfigure(&self, config: &TracingConfig) -> Result<(), LoggingError> {
        let layer = config.build_layer()?;
        self.handle.reload(layer)?;
        Ok(())
    }
}

impl fmt::Debug for LogHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LogHandle").finish_non_exhaustive()
    }
}

/// Reloadable console layer and its handle, not yet installed.
pub fn reloadable(
    level: LogLevel,
) -> Result<(reload::Layer<BoxedLayer, Registry>, LogHandle), LoggingError> {
    let layer = TracingConfig::console(level).build_layer()?;
    let (layer, handle) = reload::Layer::new(layer);
    Ok((layer, LogHandle { handle }))
}

/// Install the global subscriber with a console sink at `level`.
///
/// # Example
///
/// ```ignore
/// use bitrunner::tracing_support::{init_subscriber, LogLevel};
///
/// let handle = init_subscriber(LogLevel::from_verbosity(2))?;
/// ```
pub fn init_subscriber(level: LogLevel) -> Result<LogHandle, LoggingError> {
    let (layer, handle) = reloadable(level)?;
    tracing_subscriber::registry().with(layer).try_init()?;
    Ok(handle)
}
