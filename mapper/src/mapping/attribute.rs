//! Per-field extraction rules.
//!
//! An [`AttributeMap`] names one destination field, the column it reads,
//! and an optional [`Transform`] applied to the row.

use serde_json::Value;
use std::fmt;
use std::sync::Arc;

use super::context::MapContext;
use crate::error::{MapError, MapResult};

/// Transform over the whole row.
pub type RowFn = Arc<dyn Fn(&[String]) -> MapResult<Value> + Send + Sync>;

/// Transform over the row and the attribute's column index.
pub type IndexedFn = Arc<dyn Fn(&[String], usize) -> MapResult<Value> + Send + Sync>;

/// How an attribute turns a row into a value.
#[derive(Clone)]
pub enum Transform {
    /// Called with the row only.
    Row(RowFn),
    /// Called with the row and the attribute's index.
    Indexed(IndexedFn),
    /// Looked up by name in the evaluation context when the mapping is built.
    Named(String),
    /// Always the same value; the row is never read.
    Constant(Value),
}

impl Transform {
    pub fn row<F>(f: F) -> Self
    where
        F: Fn(&[String]) -> MapResult<Value> + Send + Sync + 'static,
    {
        Self::Row(Arc::new(f))
    }

    pub fn indexed<F>(f: F) -> Self
    where
        F: Fn(&[String], usize) -> MapResult<Value> + Send + Sync + 'static,
    {
        Self::Indexed(Arc::new(f))
    }

    pub fn named(name: impl Into<String>) -> Self {
        Self::Named(name.into())
    }
}

impl fmt::Debug for Transform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Transform::Row(_) => f.write_str("Row(..)"),
            Transform::Indexed(_) => f.write_str("Indexed(..)"),
            Transform::Named(name) => f.debug_tuple("Named").field(name).finish(),
            Transform::Constant(value) => f.debug_tuple("Constant").field(value).finish(),
        }
    }
}

/// Extraction rule for one destination field.
#[derive(Debug, Clone)]
pub struct AttributeMap {
    name: String,
    index: Option<usize>,
    transform: Option<Transform>,
}

impl AttributeMap {
    /// Rule for `name` reading column `index`.
    ///
    /// `None` means the rule never reads the row (constant defaults).
    pub fn new(name: impl Into<String>, index: Option<usize>) -> Self {
        Self {
            name: name.into(),
            index,
            transform: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn index(&self) -> Option<usize> {
        self.index
    }

    pub fn transform(&self) -> Option<&Transform> {
        self.transform.as_ref()
    }

    /// Point this rule at another column.
    pub fn at(&mut self, index: usize) -> &mut Self {
        self.index = Some(index);
        self
    }

    /// Set the transform.
    pub fn map(&mut self, transform: Transform) -> &mut Self {
        self.transform = Some(transform);
        self
    }

    /// Set a row-only transform.
    pub fn map_row<F>(&mut self, f: F) -> &mut Self
    where
        F: Fn(&[String]) -> MapResult<Value> + Send + Sync + 'static,
    {
        self.map(Transform::row(f))
    }

    /// Set a row-and-index transform.
    pub fn map_indexed<F>(&mut self, f: F) -> &mut Self
    where
        F: Fn(&[String], usize) -> MapResult<Value> + Send + Sync + 'static,
    {
        self.map(Transform::indexed(f))
    }

    /// Use the context transform registered under `name`.
    pub fn map_named(&mut self, name: impl Into<String>) -> &mut Self {
        self.map(Transform::named(name))
    }

    /// Replace a [`Transform::Named`] with the context's callable.
    ///
    /// Other transforms are left untouched.
    pub fn resolve(&mut self, context: &dyn MapContext) -> MapResult<()> {
        if let Some(Transform::Named(name)) = &self.transform {
            let resolved =
                context
                    .transform(name)
                    .ok_or_else(|| MapError::UnresolvedTransform {
                        field: self.name.clone(),
                        name: name.clone(),
                    })?;
            self.transform = Some(resolved);
        }
        Ok(())
    }

    /// Value for this field from `row`.
    ///
    /// Without a transform this is the raw field at the index. An indexed
    /// transform is only called when the row has that column.
    pub fn parse(&self, row: &[String]) -> MapResult<Value> {
        match &self.transform {
            None => self.raw_value(row),
            Some(Transform::Row(f)) => f(row),
            Some(Transform::Indexed(f)) => {
                let index = self.require_index()?;
                column(row, &self.name, index)?;
                f(row, index)
            }
            Some(Transform::Constant(value)) => Ok(value.clone()),
            Some(Transform::Named(name)) => Err(MapError::UnresolvedTransform {
                field: self.name.clone(),
                name: name.clone(),
            }),
        }
    }

    /// Raw field at the index, ignoring any transform.
    pub fn raw_value(&self, row: &[String]) -> MapResult<Value> {
        column(row, &self.name, self.require_index()?)
    }

    fn require_index(&self) -> MapResult<usize> {
        self.index
            .ok_or_else(|| MapError::UnsetIndex(self.name.clone()))
    }
}

/// Field `index` of `row` as a string value.
///
/// Fails with [`MapError::IndexOutOfRange`] naming `field` when the row is
/// too short.
pub fn column(row: &[String], field: &str, index: usize) -> MapResult<Value> {
    row.get(index)
        .map(|v| Value::String(v.clone()))
        .ok_or_else(|| MapError::IndexOutOfRange {
            field: field.to_string(),
            index,
            len: row.len(),
        })
}
