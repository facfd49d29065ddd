//! Error types for the load pipeline.
//!
//! Every failure the pipeline can report falls into one of the variants of
//! [`EtlError`]. [`EtlError::stage`] tells the caller which pipeline stage
//! produced it, so the binary can handle read failures, normalizer failures
//! and load failures differently.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Pipeline stage an error originated from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Read,
    Normalize,
    Load,
}

#[derive(Debug, Error)]
pub enum EtlError {
    /// The source file does not exist.
    #[error("could not find '{}'", path.display())]
    SourceNotFound {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The source file exists but could not be read as a table.
    #[error("could not read '{}': {reason}", path.display())]
    SourceUnreadable { path: PathBuf, reason: String },

    /// A DuckDB extension the reader needs could not be installed or loaded.
    #[error("could not load DuckDB extension '{extension}': {source}")]
    ExtensionUnavailable {
        extension: &'static str,
        #[source]
        source: duckdb::Error,
    },

    /// Stringifying the dataset failed.
    #[error("failed to normalize dataset: {0}")]
    NormalizeFailed(#[source] duckdb::Error),

    /// The database could not be reached or refused the login.
    #[error("connection failed: {0}")]
    ConnectionFailed(#[source] tiberius::error::Error),

    /// Dropping, creating or filling the destination table failed.
    #[error("write failed: {0}")]
    WriteFailed(#[source] tiberius::error::Error),
}

impl EtlError {
    pub fn stage(&self) -> Stage {
        match self {
            EtlError::SourceNotFound { .. }
            | EtlError::SourceUnreadable { .. }
            | EtlError::ExtensionUnavailable { .. } => Stage::Read,
            EtlError::NormalizeFailed(_) => Stage::Normalize,
            EtlError::ConnectionFailed(_) | EtlError::WriteFailed(_) => Stage::Load,
        }
    }

    /// Path of the source file for read-stage errors.
    pub fn source_path(&self) -> Option<&PathBuf> {
        match self {
            EtlError::SourceNotFound { path, .. } | EtlError::SourceUnreadable { path, .. } => {
                Some(path)
            }
            _ => None,
        }
    }

    /// What the user can do about a read-stage error.
    pub fn hint(&self) -> Option<String> {
        match self {
            EtlError::SourceNotFound { path, .. } | EtlError::SourceUnreadable { path, .. } => Some(
                format!("Make sure '{}' exists and is a readable spreadsheet.", path.display()),
            ),
            EtlError::ExtensionUnavailable { extension, .. } => Some(format!(
                "DuckDB fetches '{extension}' from its extension repository on first use; \
                 check network access or install the extension ahead of time."
            )),
            _ => None,
        }
    }

    pub(crate) fn unreadable(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        EtlError::SourceUnreadable {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    /// Classify an error opening the source file.
    pub(crate) fn from_open(path: impl Into<PathBuf>, source: io::Error) -> Self {
        let path = path.into();
        if source.kind() == io::ErrorKind::NotFound {
            EtlError::SourceNotFound { path, source }
        } else {
            EtlError::unreadable(path, source)
        }
    }
}

pub type EtlResult<T> = Result<T, EtlError>;
