//! Values returned by plugin handlers and their exit-status interpretation.

use std::fmt;

/// Exit status used when a result cannot be read as an integer.
pub const FAILURE_STATUS: i32 = 1;

/// Explicit abort carrying the exit status the process should end with.
#[derive(Debug, Clone, PartialEq)]
pub struct Abort {
    pub status: i32,
    pub reason: Option<String>,
}

impl Abort {
    pub fn new(status: i32) -> Self {
        Self {
            status,
            reason: None,
        }
    }

    pub fn with_reason(status: i32, reason: impl Into<String>) -> Self {
        Self {
            status,
            reason: Some(reason.into()),
        }
    }
}

impl fmt::Display for Abort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Application terminated {}", self.status)?;
        if let Some(reason) = &self.reason {
            write!(f, ": {}", reason)?;
        }
        Ok(())
    }
}

impl std::error::Error for Abort {}

/// Result value of a plugin's `execute`.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// Nothing returned.
    None,
    Abort(Abort),
    Int(i64),
    Bool(bool),
    Float(f64),
    Text(String),
}

impl Outcome {
    /// Interpret the value the way a process exit would.
    ///
    /// `None` is success, an abort yields its status, everything else is
    /// coerced to an integer and falls back to [`FAILURE_STATUS`].
    pub fn exit_status(&self) -> i32 {
        match self {
            Outcome::None => 0,
            Outcome::Abort(abort) => abort.status,
            Outcome::Int(value) => coerce(*value),
            Outcome::Bool(value) => i32::from(*value),
            Outcome::Float(value) if value.is_finite() => coerce(value.trunc() as i64),
            Outcome::Float(_) => FAILURE_STATUS,
            Outcome::Text(text) => text
                .trim()
                .parse::<i64>()
                .map(coerce)
                .unwrap_or(FAILURE_STATUS),
        }
    }
}

fn coerce(value: i64) -> i32 {
    i32::try_from(value).unwrap_or(FAILURE_STATUS)
}

/// Conversion of handler return values into an [`Outcome`].
pub trait IntoOutcome {
    fn into_outcome(self) -> Outcome;
}

impl IntoOutcome for Outcome {
    fn into_outcome(self) -> Outcome {
        self
    }
}

impl IntoOutcome for () {
    fn into_outcome(self) -> Outcome {
        Outcome::None
    }
}

impl IntoOutcome for Abort {
    fn into_outcome(self) -> Outcome {
        Outcome::Abort(self)
    }
}

impl IntoOutcome for i32 {
    fn into_outcome(self) -> Outcome {
        Outcome::Int(i64::from(self))
    }
}

impl IntoOutcome for i64 {
    fn into_outcome(self) -> Outcome {
        Outcome::Int(self)
    }
}

impl IntoOutcome for bool {
    fn into_outcome(self) -> Outcome {
        Outcome::Bool(self)
    }
}

impl IntoOutcome for f64 {
    fn into_outcome(self) -> Outcome {
        Outcome::Float(self)
    }
}

impl IntoOutcome for String {
    fn into_outcome(self) -> Outcome {
        Outcome::Text(self)
    }
}

impl IntoOutcome for &str {
    fn into_outcome(self) -> Outcome {
        Outcome::Text(self.to_string())
    }
}

impl<T: IntoOutcome> IntoOutcome for Option<T> {
    fn into_outcome(self) -> Outcome {
        match self {
            Some(value) => value.into_outcome(),
            None => Outcome::None,
        }
    }
}
