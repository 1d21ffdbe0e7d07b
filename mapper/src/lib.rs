//! # csv-mapper - declarative CSV row mapping
//!
//! Describe once how the columns of a delimited file map onto named fields,
//! then turn every row into a record.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │  CSV File   │────▶│  RowSource  │────▶│   RowMap    │────▶│   Records   │
//! │ (ISO/UTF8)  │     │ (auto-enc)  │     │ (hooks+map) │     │ (or T)      │
//! └─────────────┘     └─────────────┘     └─────────────┘     └─────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use csv_mapper::{import_string, Context, RowMapBuilder};
//!
//! let mut builder = RowMapBuilder::with_context(Context::builtin());
//! builder.field("first");
//! builder.skip();
//! builder.field("age").map_named("to_number");
//! builder.start_at_row(1);
//! let map = builder.build()?;
//!
//! let report = import_string(&map, "first,last,age\nAda,Lovelace,36\n")?;
//! assert_eq!(report.records[0].get_str("first"), Some("Ada"));
//! ```
//!
//! ## Modules
//!
//! - [`error`] - Hierarchical error types
//! - [`logs`] - Log broadcaster
//! - [`config`] - Environment-driven import settings
//! - [`parser`] - Row source over the `csv` tokenizer
//! - [`mapping`] - Builder, attributes, context, and targets
//! - [`import`] - Import loop

// Core modules
pub mod error;
pub mod logs;
pub mod config;

// Parsing
pub mod parser;

// Mapping
pub mod mapping;

// Import
pub mod import;

// =============================================================================
// Re-exports - Error types
// =============================================================================

pub use error::{CsvError, CsvResult, ImportError, ImportResult, MapError, MapResult};

// =============================================================================
// Re-exports - Parser
// =============================================================================

pub use parser::{
    decode_content,
    detect_delimiter,
    detect_encoding,
    CsvSource,
    ParserOptions,
    Row,
    RowSource,
};

// =============================================================================
// Re-exports - Mapping
// =============================================================================

pub use mapping::{
    AttributeMap,
    Context,
    DuplicatePolicy,
    Hook,
    HookRef,
    MapContext,
    MapTarget,
    Record,
    RowMap,
    RowMapBuilder,
    RowRange,
    Schema,
    Transform,
};

// =============================================================================
// Re-exports - Definitions and operations
// =============================================================================

pub use mapping::{
    example_definition,
    operations_description,
    FieldEntry,
    FieldSpec,
    HeaderSpec,
    MappingDefinition,
    Operation,
    PreparedOperation,
};

// =============================================================================
// Re-exports - Import
// =============================================================================

pub use config::ImportOptions;
pub use import::{import_path, import_source, import_string, map_csv, ImportReport};
