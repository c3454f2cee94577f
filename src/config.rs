use std::{fs, path::Path, path::PathBuf};

use miette::Diagnostic;
use serde::Deserialize;
use thiserror::Error;

use crate::errors::{FileOperation, IoError};

#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    #[error("I/O error within config domain")]
    #[diagnostic(code(specpath::config::io))]
    Io(#[from] IoError),

    #[error("Unable to parse toml file at '{path}': {source}")]
    #[diagnostic(code(specpath::config::parse_toml), help("Review toml file"))]
    ParseToml {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// Runtime settings, usually read from a `specpath.toml`.
///
/// ```toml
/// sort_listings = true
/// cleanup_on_interrupt = true
/// ```
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    /// Sort directory listings read from disk by file name. When off, files come in
    /// whatever order the operating system reports them.
    pub sort_listings: bool,
    /// Remove materialized directories when the process receives SIGINT or SIGTERM.
    pub cleanup_on_interrupt: bool,
}
impl Default for Config {
    fn default() -> Self {
        Self {
            sort_listings: true,
            cleanup_on_interrupt: true,
        }
    }
}
impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();

        let content = fs::read_to_string(path)
            .map_err(|error| IoError::new(FileOperation::Read, path.to_path_buf(), error))?;

        toml::from_str(&content).map_err(|error| ConfigError::ParseToml {
            path: path.to_path_buf(),
            source: error,
        })
    }
}
