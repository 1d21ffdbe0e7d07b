//! Target objects a row is mapped onto.
//!
//! [`MapTarget`] is the seam between the mapper and the caller's type.
//! When no type is chosen, [`Record`] is used: a fixed record type whose
//! fields are exactly the declared attribute names, synthesized once when
//! the mapping is built.

use serde::de::DeserializeOwned;
use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_json::{Map, Value};
use std::sync::Arc;

use crate::error::{MapError, MapResult};

/// A value a row can be mapped onto.
pub trait MapTarget {
    /// Assign `value` to the field `name`.
    ///
    /// Fails with [`MapError::MissingField`] when the target has no such field.
    fn set_field(&mut self, name: &str, value: Value) -> MapResult<()>;

    /// Current value of the field `name`, if the target has it and it is set.
    fn field(&self, name: &str) -> Option<Value>;
}

/// Field layout of a synthesized [`Record`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema {
    fields: Vec<String>,
}

impl Schema {
    /// Build a schema from names in declaration order. Repeated names keep
    /// their first position.
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut fields: Vec<String> = Vec::new();
        for name in names {
            let name = name.into();
            if !fields.contains(&name) {
                fields.push(name);
            }
        }
        Self { fields }
    }

    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Slot of `name` in the record.
    pub fn position(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f == name)
    }
}

/// Record with exactly the fields of its [`Schema`].
///
/// Unassigned fields read as `null`.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    schema: Arc<Schema>,
    values: Vec<Value>,
}

impl Record {
    pub fn new(schema: &Arc<Schema>) -> Self {
        Self {
            schema: Arc::clone(schema),
            values: vec![Value::Null; schema.len()],
        }
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Field value by name, `None` if the schema has no such field.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.schema.position(name).map(|i| &self.values[i])
    }

    /// Field value as a string slice.
    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(Value::as_str)
    }

    /// Fields in schema order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.schema
            .fields
            .iter()
            .map(String::as_str)
            .zip(self.values.iter())
    }

    /// JSON object of all fields.
    pub fn to_value(&self) -> Value {
        let map: Map<String, Value> = self
            .iter()
            .map(|(name, value)| (name.to_string(), value.clone()))
            .collect();
        Value::Object(map)
    }

    /// Convert into a caller-defined type through serde.
    pub fn into_typed<T: DeserializeOwned>(self) -> MapResult<T> {
        Ok(serde_json::from_value(self.to_value())?)
    }
}

impl MapTarget for Record {
    fn set_field(&mut self, name: &str, value: Value) -> MapResult<()> {
        let slot = self
            .schema
            .position(name)
            .ok_or_else(|| MapError::MissingField(name.to_string()))?;
        self.values[slot] = value;
        Ok(())
    }

    fn field(&self, name: &str) -> Option<Value> {
        self.get(name).cloned()
    }
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.values.len()))?;
        for (name, value) in self.iter() {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

/// Open record: accepts any field name.
impl MapTarget for Map<String, Value> {
    fn set_field(&mut self, name: &str, value: Value) -> MapResult<()> {
        self.insert(name.to_string(), value);
        Ok(())
    }

    fn field(&self, name: &str) -> Option<Value> {
        self.get(name).cloned()
    }
}
