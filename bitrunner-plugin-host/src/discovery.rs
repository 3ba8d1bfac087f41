//! Plugin discovery and directory scanning
//!
//! Finds plugin manifests in a directory by file-name convention.

use bitrunner_plugin_api::{OptionSet, OptionValue};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Base names of plugin manifests end with this suffix
pub const PLUGIN_SUFFIX: &str = "_plugin";

/// Extension of plugin manifest files
pub const MANIFEST_EXTENSION: &str = "toml";

/// Option-set key holding the blacklisted plugin base names
pub const BLACKLIST_KEY: &str = "blacklist";

/// Errors that can occur during plugin discovery
#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("Directory not found: {0}")]
    DirectoryNotFound(PathBuf),

    #[error("Failed to read directory: {0}")]
    ReadDirectory(#[source] std::io::Error),
}

/// A manifest file that follows the naming convention
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    /// File stem, e.g. `test_plugin`
    pub stem: String,

    /// Path of the manifest
    pub path: PathBuf,
}

impl Candidate {
    /// Identifier the plugin is registered under
    pub fn identifier(&self) -> String {
        derive_identifier(&self.stem)
    }
}

/// Scan a directory for plugin manifests, ordered by file name
pub fn scan_directory(dir: impl AsRef<Path>) -> Result<Vec<Candidate>, DiscoveryError> {
    let dir = dir.as_ref();

    if !dir.is_dir() {
        return Err(DiscoveryError::DirectoryNotFound(dir.to_path_buf()));
    }

    let entries = std::fs::read_dir(dir).map_err(DiscoveryError::ReadDirectory)?;

    let mut candidates = Vec::new();
    for entry in entries {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                tracing::warn!(dir = %dir.display(), error = %e, "Skipping unreadable directory entry");
                continue;
            }
        };

        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        if path.extension().map(|e| e != MANIFEST_EXTENSION).unwrap_or(true) {
            continue;
        }

        let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };
        if stem.ends_with(PLUGIN_SUFFIX) {
            candidates.push(Candidate {
                stem: stem.to_string(),
                path: path.clone(),
            });
        }
    }

    candidates.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(candidates)
}

/// Build the identifier for a plugin base name by title-casing each
/// underscore-delimited segment and concatenating them.
///
/// `test_plugin` becomes `TestPlugin`.
pub fn derive_identifier(base_name: &str) -> String {
    base_name.split('_').map(title_case).collect()
}

/// Uppercase letters that follow a non-letter, lowercase the rest
fn title_case(word: &str) -> String {
    let mut out = String::with_capacity(word.len());
    let mut at_boundary = true;
    for c in word.chars() {
        if c.is_alphabetic() {
            if at_boundary {
                out.extend(c.to_uppercase());
            } else {
                out.extend(c.to_lowercase());
            }
            at_boundary = false;
        } else {
            out.push(c);
            at_boundary = true;
        }
    }
    out
}

/// Plugin base names excluded from discovery
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Blacklist {
    names: BTreeSet<String>,
}

impl Blacklist {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: names.into_iter().map(Into::into).collect(),
        }
    }

    /// Read the `blacklist` option: a comma or whitespace separated string,
    /// or a list of names.
    pub fn from_options(options: &OptionSet) -> Self {
        match options.get(BLACKLIST_KEY) {
            Some(OptionValue::Str(raw)) => Self::new(
                raw.split(|c: char| c == ',' || c.is_whitespace())
                    .filter(|name| !name.is_empty()),
            ),
            Some(OptionValue::List(items)) => Self::new(items.iter().cloned()),
            _ => Self::default(),
        }
    }

    pub fn contains(&self, base_name: &str) -> bool {
        self.names.contains(base_name)
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}
