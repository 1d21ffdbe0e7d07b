//! Row mapping: declarations, evaluation context, and targets.
//!
//! - [`row_map`] - builder with cursor semantics and the per-row parse
//! - [`attribute`] - one field declaration and its transform
//! - [`context`] - named transforms and hooks
//! - [`target`] - what a row is mapped onto
//! - [`header`] - attribute names from a header row
//! - [`operations`] - value rewrites usable as named transforms
//! - [`definition`] - JSON mapping definitions

pub mod attribute;
pub mod context;
pub mod definition;
pub mod header;
pub mod operations;
pub mod row_map;
pub mod target;

pub use attribute::{AttributeMap, IndexedFn, RowFn, Transform};
pub use context::{Context, Hook, HookRef, MapContext};
pub use definition::{example_definition, FieldEntry, FieldSpec, HeaderSpec, MappingDefinition, SkipSpec};
pub use header::{attribute_name, attribute_names};
pub use operations::{operations_description, prepare_all, Operation, PreparedOperation};
pub use row_map::{DuplicatePolicy, RowMap, RowMapBuilder, RowRange, TargetFactory};
pub use target::{MapTarget, Record, Schema};
