//! Evaluation context for named transforms and row hooks.
//!
//! A mapping can refer to transforms and hooks by name. The names are
//! looked up in a [`MapContext`] once, when the mapping is built; a
//! missing name fails the build instead of the first row.

use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use super::attribute::{column, Transform};
use super::operations::Operation;
use super::target::MapTarget;
use crate::error::MapResult;
use crate::parser::Row;

/// Row hook: may rewrite the row or touch the target directly.
pub type Hook = Arc<dyn Fn(&mut Row, &mut dyn MapTarget) -> MapResult<()> + Send + Sync>;

/// A hook given directly or by context name.
#[derive(Clone)]
pub enum HookRef {
    Direct(Hook),
    Named(String),
}

impl HookRef {
    pub fn direct<F>(f: F) -> Self
    where
        F: Fn(&mut Row, &mut dyn MapTarget) -> MapResult<()> + Send + Sync + 'static,
    {
        Self::Direct(Arc::new(f))
    }

    pub fn named(name: impl Into<String>) -> Self {
        Self::Named(name.into())
    }
}

impl fmt::Debug for HookRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HookRef::Direct(_) => f.write_str("Direct(..)"),
            HookRef::Named(name) => f.debug_tuple("Named").field(name).finish(),
        }
    }
}

impl From<&str> for HookRef {
    fn from(name: &str) -> Self {
        Self::named(name)
    }
}

impl From<String> for HookRef {
    fn from(name: String) -> Self {
        Self::Named(name)
    }
}

/// Source of named transforms and hooks.
pub trait MapContext: Send + Sync {
    /// Transform registered under `name`.
    fn transform(&self, name: &str) -> Option<Transform>;

    /// Hook registered under `name`.
    fn hook(&self, name: &str) -> Option<Hook>;
}

/// Name-to-callable registry.
#[derive(Clone, Default)]
pub struct Context {
    transforms: HashMap<String, Transform>,
    hooks: HashMap<String, Hook>,
}

impl Context {
    /// Empty context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Context with one indexed transform per [`Operation`] preset, named
    /// after the operation (`trim`, `to_number`, ...).
    pub fn builtin() -> Self {
        Operation::presets()
            .into_iter()
            .fold(Self::new(), |ctx, (name, op)| ctx.with_operation(name, op))
    }

    /// Register a row-only transform.
    pub fn with_transform<F>(mut self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&[String]) -> MapResult<Value> + Send + Sync + 'static,
    {
        self.transforms.insert(name.into(), Transform::row(f));
        self
    }

    /// Register a row-and-index transform.
    pub fn with_indexed_transform<F>(mut self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&[String], usize) -> MapResult<Value> + Send + Sync + 'static,
    {
        self.transforms.insert(name.into(), Transform::indexed(f));
        self
    }

    /// Register an [`Operation`] applied to the attribute's raw field.
    ///
    /// An invalid `replace` pattern leaves values unchanged.
    pub fn with_operation(self, name: impl Into<String>, op: Operation) -> Self {
        let name = name.into();
        let label = name.clone();
        let op = op.prepare_lossy();
        self.with_indexed_transform(name, move |row, index| {
            Ok(op.apply(&column(row, &label, index)?))
        })
    }

    /// Register a row hook.
    pub fn with_hook<F>(mut self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&mut Row, &mut dyn MapTarget) -> MapResult<()> + Send + Sync + 'static,
    {
        self.hooks.insert(name.into(), Arc::new(f));
        self
    }

    /// Registered transform names, sorted.
    pub fn transform_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.transforms.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl MapContext for Context {
    fn transform(&self, name: &str) -> Option<Transform> {
        self.transforms.get(name).cloned()
    }

    fn hook(&self, name: &str) -> Option<Hook> {
        self.hooks.get(name).cloned()
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut hooks: Vec<&String> = self.hooks.keys().collect();
        hooks.sort();
        f.debug_struct("Context")
            .field("transforms", &self.transform_names())
            .field("hooks", &hooks)
            .finish()
    }
}
