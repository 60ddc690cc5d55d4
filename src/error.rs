//! Error types for cidata-tool

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::cli::CommandKind;
use crate::iso::IsoError;

/// Main error type for cidata-tool operations
#[derive(Error, Debug)]
pub enum CidataError {
    /// A required flag was not given. The dispatcher prints the usage of
    /// `command` when it sees this variant.
    #[error("option -{option} is required.")]
    RequiredOption {
        command: CommandKind,
        option: &'static str,
    },

    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("{field} must be a {expected}, found {found}")]
    Schema {
        field: String,
        expected: &'static str,
        found: &'static str,
    },

    #[error("password prompt failed: {0}")]
    Prompt(#[source] std::io::Error),

    #[error("password hashing failed: {0}")]
    Hash(#[from] bcrypt::BcryptError),

    #[error("ISO image error: {0}")]
    Iso(#[from] IsoError),
}

impl CidataError {
    /// Create a required-option error
    pub fn required(command: CommandKind, option: &'static str) -> Self {
        Self::RequiredOption { command, option }
    }

    /// Create a read error for `path`
    pub fn read(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::Read {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    /// Create a write error for `path`
    pub fn write(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::Write {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    /// Create a schema mismatch error
    pub fn schema(field: impl Into<String>, expected: &'static str, found: &'static str) -> Self {
        Self::Schema {
            field: field.into(),
            expected,
            found,
        }
    }
}
