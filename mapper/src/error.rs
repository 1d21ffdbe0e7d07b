//! Error types for the row-mapping engine.
//!
//! This module defines one error type per layer:
//!
//! - [`CsvError`] - row source / tokenizer errors
//! - [`MapError`] - mapping definition and per-row parse errors
//! - [`ImportError`] - top-level import loop errors
//!
//! Error conversion is automatic via `From` implementations,
//! allowing `?` to work across error boundaries.

use thiserror::Error;

// =============================================================================
// Row Source Errors
// =============================================================================

/// Errors while reading rows from the underlying tokenizer.
#[derive(Debug, Error)]
pub enum CsvError {
    /// Failed to read file.
    #[error("Failed to read file: {0}")]
    IoError(#[from] std::io::Error),

    /// Failed to decode the input bytes.
    #[error("Failed to decode input: {0}")]
    EncodingError(String),

    /// The tokenizer rejected a row.
    #[error("Invalid CSV at row {row}: {message}")]
    ParseError { row: usize, message: String },

    /// A header row was requested from an exhausted source.
    #[error("No header row found")]
    NoHeaders,
}

// =============================================================================
// Mapping Errors
// =============================================================================

/// Errors raised while building a [`crate::RowMap`] or parsing a row with it.
#[derive(Debug, Error)]
pub enum MapError {
    /// An attribute reads a column the row does not have.
    #[error("Field '{field}' reads column {index} but the row has {len} columns")]
    IndexOutOfRange {
        field: String,
        index: usize,
        len: usize,
    },

    /// An attribute without a column index was asked for its raw value.
    #[error("Field '{0}' has no column index")]
    UnsetIndex(String),

    /// The target has no settable member with this name.
    #[error("Target has no field named '{0}'")]
    MissingField(String),

    /// A named transform is not provided by the evaluation context.
    #[error("Field '{field}' uses unknown transform '{name}'")]
    UnresolvedTransform { field: String, name: String },

    /// A named hook is not provided by the evaluation context.
    #[error("Unknown row hook '{0}'")]
    UnresolvedHook(String),

    /// The same field was declared twice under [`crate::DuplicatePolicy::Reject`].
    #[error("Field '{0}' is declared more than once")]
    DuplicateField(String),

    /// A row hook reported a failure.
    #[error("Row hook failed: {0}")]
    HookFailed(String),

    /// A declarative mapping definition is inconsistent.
    #[error("Invalid mapping definition: {0}")]
    InvalidDefinition(String),

    /// Failed to read the header row.
    #[error("Header error: {0}")]
    Header(#[from] CsvError),

    /// JSON conversion of a record failed.
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

impl MapError {
    /// Shorthand for a hook failure.
    pub fn hook(message: impl Into<String>) -> Self {
        Self::HookFailed(message.into())
    }

    /// The attribute this error is about, if any.
    pub fn field(&self) -> Option<&str> {
        match self {
            Self::IndexOutOfRange { field, .. } | Self::UnresolvedTransform { field, .. } => Some(field),
            Self::UnsetIndex(field) | Self::MissingField(field) | Self::DuplicateField(field) => Some(field),
            _ => None,
        }
    }
}

// =============================================================================
// Import Errors (top-level)
// =============================================================================

/// Top-level import loop errors.
///
/// This is the error type returned by [`crate::import::import_source`] and
/// its wrappers. It wraps all lower-level errors.
#[derive(Debug, Error)]
pub enum ImportError {
    /// Row source error.
    #[error("CSV error: {0}")]
    Csv(#[from] CsvError),

    /// Mapping definition error (raised before any row is read).
    #[error("Mapping error: {0}")]
    Map(#[from] MapError),

    /// A single row failed to parse; the import is aborted.
    #[error("Row {row} failed: {source}")]
    Row {
        row: usize,
        #[source]
        source: MapError,
    },

    /// Mapping definition file could not be read.
    #[error("Invalid mapping definition: {0}")]
    Definition(#[from] serde_json::Error),

    /// An environment setting has an unusable value.
    #[error("Invalid setting {key}: {message}")]
    Config { key: String, message: String },
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for row source operations.
pub type CsvResult<T> = Result<T, CsvError>;

/// Result type for mapping operations.
pub type MapResult<T> = Result<T, MapError>;

/// Result type for import operations.
pub type ImportResult<T> = Result<T, ImportError>;
