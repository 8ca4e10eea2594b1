//! Rich diagnostic error types for the proxy.
//!
//! Each subsystem defines its own error type with miette `#[diagnostic]` derives,
//! providing error codes and help text. Subsystem errors fold into [`ProxyError`],
//! whose variants form the closed taxonomy every caller sees: each one carries a
//! stable [`ErrorTag`] and a human-readable message.

use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::resource::ResourceRef;

/// Stable, machine-readable tag for every error the proxy reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorTag {
    UnknownKind,
    ValidationError,
    NotFound,
    AlreadyExists,
    DecodeError,
    Internal,
}

impl ErrorTag {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorTag::UnknownKind => "UnknownKind",
            ErrorTag::ValidationError => "ValidationError",
            ErrorTag::NotFound => "NotFound",
            ErrorTag::AlreadyExists => "AlreadyExists",
            ErrorTag::DecodeError => "DecodeError",
            ErrorTag::Internal => "Internal",
        }
    }

    /// Whether the error was caused by the request rather than by proxy state.
    pub fn is_caller_error(self) -> bool {
        matches!(
            self,
            ErrorTag::UnknownKind | ErrorTag::ValidationError | ErrorTag::DecodeError
        )
    }
}

impl std::fmt::Display for ErrorTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Top-level error type for the proxy.
#[derive(Debug, Error, Diagnostic)]
pub enum ProxyError {
    #[error("unknown resource kind: \"{kind}\"")]
    #[diagnostic(
        code(plantd::kind::unknown),
        help(
            "Valid kinds are: Schema, Dataset, LoadPattern, Pipeline, Experiment, \
             CostExporter, CoreConfig. Run `plantd kinds` to list aliases."
        )
    )]
    UnknownKind { kind: String },

    #[error("validation failed: {message}")]
    #[diagnostic(
        code(plantd::validation),
        help("Check the request against the kind's required fields with `plantd kinds`.")
    )]
    Validation { message: String },

    #[error("resource not found: {reference}")]
    #[diagnostic(
        code(plantd::not_found),
        help("Verify the kind, namespace and name. List resources with `plantd list <kind>`.")
    )]
    NotFound { reference: ResourceRef },

    #[error("resource already exists: {reference}")]
    #[diagnostic(
        code(plantd::already_exists),
        help("Use `update` to modify the existing resource, or delete it first.")
    )]
    AlreadyExists { reference: ResourceRef },

    #[error("decode error: {message}")]
    #[diagnostic(
        code(plantd::decode),
        help("The archive or manifest is malformed. Re-export it with `plantd export`.")
    )]
    Decode { message: String },

    #[error("internal error: {message}")]
    #[diagnostic(
        code(plantd::internal),
        help("The backing store or transport failed. Check the proxy logs.")
    )]
    Internal { message: String },
}

impl ProxyError {
    pub fn validation(message: impl Into<String>) -> Self {
        ProxyError::Validation {
            message: message.into(),
        }
    }

    pub fn decode(message: impl Into<String>) -> Self {
        ProxyError::Decode {
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        ProxyError::Internal {
            message: message.into(),
        }
    }

    /// The stable tag for this error.
    pub fn tag(&self) -> ErrorTag {
        match self {
            ProxyError::UnknownKind { .. } => ErrorTag::UnknownKind,
            ProxyError::Validation { .. } => ErrorTag::ValidationError,
            ProxyError::NotFound { .. } => ErrorTag::NotFound,
            ProxyError::AlreadyExists { .. } => ErrorTag::AlreadyExists,
            ProxyError::Decode { .. } => ErrorTag::DecodeError,
            ProxyError::Internal { .. } => ErrorTag::Internal,
        }
    }

    /// Map a store failure for `reference` onto the proxy taxonomy.
    pub fn from_store(reference: &ResourceRef, err: StoreError) -> Self {
        match err {
            StoreError::NotFound { .. } => ProxyError::NotFound {
                reference: reference.clone(),
            },
            StoreError::AlreadyExists { .. } => ProxyError::AlreadyExists {
                reference: reference.clone(),
            },
            other => ProxyError::Internal {
                message: other.to_string(),
            },
        }
    }
}

impl From<ArchiveError> for ProxyError {
    fn from(err: ArchiveError) -> Self {
        match err {
            ArchiveError::Io { source } => ProxyError::Internal {
                message: format!("archive I/O failed: {source}"),
            },
            other => ProxyError::Decode {
                message: other.to_string(),
            },
        }
    }
}

pub type ProxyResult<T> = std::result::Result<T, ProxyError>;

// ---------------------------------------------------------------------------
// Store errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum StoreError {
    #[error("key not found: {key}")]
    #[diagnostic(
        code(plantd::store::not_found),
        help("The requested key does not exist in the store. Verify the key is correct.")
    )]
    NotFound { key: String },

    #[error("key already exists: {key}")]
    #[diagnostic(
        code(plantd::store::already_exists),
        help("A create was issued for a key that is already present.")
    )]
    AlreadyExists { key: String },

    #[error("I/O error: {source}")]
    #[diagnostic(
        code(plantd::store::io),
        help(
            "A filesystem operation failed. Check that the data directory exists, \
             has correct permissions, and that the disk is not full."
        )
    )]
    Io {
        #[source]
        source: std::io::Error,
    },

    #[error("redb transaction error: {message}")]
    #[diagnostic(
        code(plantd::store::redb),
        help(
            "The embedded database encountered a transaction error. \
             This may indicate corruption; try running with a fresh data directory."
        )
    )]
    Redb { message: String },

    #[error("serialization error: {message}")]
    #[diagnostic(
        code(plantd::store::serde),
        help("Failed to serialize or deserialize a stored resource body.")
    )]
    Serialization { message: String },
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

// ---------------------------------------------------------------------------
// Archive errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum ArchiveError {
    #[error("archive is corrupt: {message}")]
    #[diagnostic(
        code(plantd::archive::corrupt),
        help("The upload is not a gzip-compressed tar archive, or it was truncated.")
    )]
    Corrupt { message: String },

    #[error("duplicate archive entry: \"{name}\"")]
    #[diagnostic(
        code(plantd::archive::duplicate_entry),
        help("Entry names must be unique within an archive.")
    )]
    DuplicateEntry { name: String },

    #[error("archive has more than {max} entries")]
    #[diagnostic(
        code(plantd::archive::too_many_entries),
        help("Split the bundle, or raise `archive.max_entries` in the proxy config.")
    )]
    TooManyEntries { max: usize },

    #[error("archive entry \"{name}\" exceeds {max} bytes")]
    #[diagnostic(
        code(plantd::archive::entry_too_large),
        help("Raise `archive.max_entry_bytes` in the proxy config.")
    )]
    EntryTooLarge { name: String, max: u64 },

    #[error("archive I/O error: {source}")]
    #[diagnostic(code(plantd::archive::io))]
    Io {
        #[source]
        source: std::io::Error,
    },
}

pub type ArchiveResult<T> = std::result::Result<T, ArchiveError>;
