//! Mapping definitions stored as JSON.
//!
//! A [`MappingDefinition`] replays its entries on a [`RowMapBuilder`], so
//! a file-based mapping claims exactly the same columns as the same
//! declarations written in code.
//!
//! ```json
//! {
//!   "header": { "aliases": { "files+": "files_plus" } },
//!   "fields": [
//!     { "name": "id" },
//!     { "skip": 1 },
//!     { "name": "email", "index": 4, "operations": [{ "type": "lowercase" }] },
//!     { "name": "age", "transform": "to_number" }
//!   ],
//!   "defaults": { "source": "legacy" },
//!   "stop_at_row": 100
//! }
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;
use std::sync::Arc;

use super::attribute::{column, Transform};
use super::context::{HookRef, MapContext};
use super::operations::{prepare_all, Operation, PreparedOperation};
use super::row_map::{DuplicatePolicy, RowMapBuilder};
use crate::error::{CsvError, ImportResult, MapError, MapResult};
use crate::parser::{ParserOptions, RowSource};

/// A complete mapping definition.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MappingDefinition {
    /// Human-readable description
    pub description: String,

    /// Declare one field per header column before `fields`
    pub header: Option<HeaderSpec>,

    /// Field declarations in order
    pub fields: Vec<FieldEntry>,

    /// Constant-valued fields
    pub defaults: BTreeMap<String, Value>,

    pub start_at_row: Option<usize>,

    pub stop_at_row: Option<usize>,

    /// Single ASCII character
    pub delimiter: Option<char>,

    pub parser: Option<ParserOptions>,

    /// Context hook names
    pub before_row: Vec<String>,

    /// Context hook names
    pub after_row: Vec<String>,

    pub on_duplicate: DuplicatePolicy,
}

/// Header introspection settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeaderSpec {
    /// Original header text -> attribute name
    pub aliases: HashMap<String, String>,
}

/// One entry of [`MappingDefinition::fields`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldEntry {
    Skip(SkipSpec),
    Field(FieldSpec),
}

/// Leave columns unmapped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SkipSpec {
    pub skip: usize,
}

/// A field declaration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub name: String,

    /// Claim this column and move the cursor past it
    #[serde(default)]
    pub index: Option<usize>,

    /// Read this column without moving the cursor
    #[serde(default)]
    pub at: Option<usize>,

    /// Context transform name
    #[serde(default)]
    pub transform: Option<String>,

    /// Operations applied to the raw field
    #[serde(default)]
    pub operations: Vec<Operation>,
}

impl FieldSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            index: None,
            at: None,
            transform: None,
            operations: Vec::new(),
        }
    }

    fn to_transform(&self) -> MapResult<Option<Transform>> {
        match (&self.transform, self.operations.is_empty()) {
            (Some(_), false) => Err(MapError::InvalidDefinition(format!(
                "field '{}' sets both 'transform' and 'operations'",
                self.name
            ))),
            (Some(name), true) => Ok(Some(Transform::named(name.clone()))),
            (None, false) => {
                let ops = prepare_all(&self.operations).map_err(|e| {
                    MapError::InvalidDefinition(format!("field '{}': {}", self.name, e))
                })?;
                let field = self.name.clone();
                Ok(Some(Transform::indexed(move |row, index| {
                    Ok(PreparedOperation::apply_all(&ops, column(row, &field, index)?))
                })))
            }
            (None, true) => Ok(None),
        }
    }
}

impl MappingDefinition {
    /// Parse a definition from JSON string
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Serialize to JSON string
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Load a definition file.
    pub fn from_path<P: AsRef<Path>>(path: P) -> ImportResult<Self> {
        let json = fs::read_to_string(path.as_ref()).map_err(CsvError::from)?;
        Ok(Self::from_json(&json)?)
    }

    /// Replay this definition on a new builder.
    ///
    /// `source` is only read when [`header`](Self::header) is set.
    pub fn to_builder(
        &self,
        context: Arc<dyn MapContext>,
        source: &mut dyn RowSource,
    ) -> MapResult<RowMapBuilder> {
        let mut builder = RowMapBuilder::with_shared_context(context);

        if let Some(parser) = &self.parser {
            builder.parser_options(parser.clone());
            builder.delimited_by(parser.delimiter);
        }
        if let Some(delimiter) = self.delimiter {
            builder.delimited_by(ascii_byte(delimiter)?);
        }
        if let Some(row) = self.start_at_row {
            builder.start_at_row(row);
        }
        if let Some(row) = self.stop_at_row {
            builder.stop_at_row(row);
        }
        builder.on_duplicate(self.on_duplicate);

        if let Some(header) = &self.header {
            builder.read_attributes_from(source, &header.aliases)?;
        }

        for (name, value) in &self.defaults {
            builder.default_value(name.clone(), value.clone());
        }

        for entry in &self.fields {
            match entry {
                FieldEntry::Skip(skip) => {
                    builder.move_cursor(skip.skip as isize);
                }
                FieldEntry::Field(spec) => {
                    let attr = match spec.index {
                        Some(index) => builder.field_at(spec.name.clone(), index),
                        None => builder.field(spec.name.clone()),
                    };
                    if let Some(at) = spec.at {
                        attr.at(at);
                    }
                    if let Some(transform) = spec.to_transform()? {
                        attr.map(transform);
                    }
                }
            }
        }

        builder.before_row(self.before_row.iter().map(|n| HookRef::named(n.clone())));
        builder.after_row(self.after_row.iter().map(|n| HookRef::named(n.clone())));

        Ok(builder)
    }
}

fn ascii_byte(c: char) -> MapResult<u8> {
    if c.is_ascii() {
        Ok(c as u8)
    } else {
        Err(MapError::InvalidDefinition(format!(
            "delimiter '{}' is not a single-byte character",
            c
        )))
    }
}

/// Example definition for documentation and the CLI.
pub fn example_definition() -> MappingDefinition {
    let mut name = FieldSpec::new("name");
    name.operations = vec![Operation::Trim];

    let mut email = FieldSpec::new("email");
    email.index = Some(3);
    email.operations = vec![Operation::Trim, Operation::Lowercase];

    let mut age = FieldSpec::new("age");
    age.transform = Some("to_number".to_string());

    let mut defaults = BTreeMap::new();
    defaults.insert("source".to_string(), Value::String("import".to_string()));

    MappingDefinition {
        description: "id, name, (unused), email, age".to_string(),
        fields: vec![
            FieldEntry::Field(FieldSpec::new("id")),
            FieldEntry::Field(name),
            FieldEntry::Field(email),
            FieldEntry::Field(age),
        ],
        defaults,
        start_at_row: Some(1),
        ..MappingDefinition::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::context::Context;
    use crate::parser::CsvSource;
    use serde_json::json;

    fn empty_source() -> CsvSource {
        CsvSource::from_string("", ParserOptions::default())
    }

    fn builtin() -> Arc<dyn MapContext> {
        Arc::new(Context::builtin())
    }

    #[test]
    fn test_definition_cursor_matches_code() {
        let def = MappingDefinition::from_json(
            r#"{"fields": [{"name": "a"}, {"skip": 1}, {"name": "b"}, {"name": "c", "index": 5}, {"name": "d", "at": 0}, {"name": "e"}]}"#,
        )
        .unwrap();
        let builder = def.to_builder(builtin(), &mut empty_source()).unwrap();

        let indices: Vec<(&str, Option<usize>)> = builder
            .attributes()
            .iter()
            .map(|a| (a.name(), a.index()))
            .collect();
        assert_eq!(
            indices,
            vec![
                ("a", Some(0)),
                ("b", Some(2)),
                ("c", Some(5)),
                ("d", Some(0)),
                ("e", Some(7)),
            ]
        );
    }

    #[test]
    fn test_operations_and_named_transforms() {
        let def = MappingDefinition::from_json(
            r#"{"fields": [
                {"name": "email", "operations": [{"type": "trim"}, {"type": "lowercase"}]},
                {"name": "age", "transform": "to_number"}
            ]}"#,
        )
        .unwrap();
        let map = def.to_builder(builtin(), &mut empty_source()).unwrap().build().unwrap();

        let mut row = vec![" Ada@Example.COM ".to_string(), "36 yrs".to_string()];
        let rec = map.parse(&mut row).unwrap();
        assert_eq!(rec.get_str("email"), Some("ada@example.com"));
        assert_eq!(rec.get("age"), Some(&json!(36)));
    }

    #[test]
    fn test_transform_and_operations_conflict() {
        let mut spec = FieldSpec::new("x");
        spec.transform = Some("trim".to_string());
        spec.operations = vec![Operation::Trim];
        let def = MappingDefinition {
            fields: vec![FieldEntry::Field(spec)],
            ..MappingDefinition::default()
        };
        let err = def.to_builder(builtin(), &mut empty_source()).unwrap_err();
        assert!(matches!(err, MapError::InvalidDefinition(_)));
    }

    #[test]
    fn test_header_defaults_and_bounds() {
        let def = MappingDefinition::from_json(
            r#"{"header": {"aliases": {"Last Name": "surname"}}, "defaults": {"kind": "person"}, "stop_at_row": 2, "delimiter": ";"}"#,
        )
        .unwrap();
        let mut source = CsvSource::from_string("First Name;Last Name\nAda;Lovelace\n", ParserOptions::default().with_delimiter(b';'));
        let map = def.to_builder(builtin(), &mut source).unwrap().build().unwrap();

        assert_eq!(map.schema().fields(), ["first_name", "surname", "kind"]);
        assert_eq!(map.start_at_row(), 1);
        assert_eq!(map.stop_at_row(), Some(2));
        assert_eq!(map.delimiter(), b';');
    }

    #[test]
    fn test_operations_on_missing_column() {
        let def = MappingDefinition::from_json(
            r#"{"fields": [{"name": "a"}, {"name": "b", "operations": [{"type": "trim"}]}]}"#,
        )
        .unwrap();
        let map = def.to_builder(builtin(), &mut empty_source()).unwrap().build().unwrap();

        let err = crate::import::import_string(&map, "1\n2,x\n").unwrap_err();
        match err {
            crate::error::ImportError::Row { row, source } => {
                assert_eq!(row, 0);
                assert!(matches!(source, MapError::IndexOutOfRange { ref field, index: 1, .. } if field == "b"));
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_invalid_replace_pattern_rejected() {
        let def = MappingDefinition::from_json(
            r#"{"fields": [{"name": "a", "operations": [{"type": "replace", "pattern": "("}]}]}"#,
        )
        .unwrap();
        let err = def.to_builder(builtin(), &mut empty_source()).unwrap_err();
        assert!(matches!(err, MapError::InvalidDefinition(ref msg) if msg.contains("'a'")));
    }

    #[test]
    fn test_from_path() {
        use std::io::Write;

        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"fields": [{{"name": "id"}}], "stop_at_row": 3}}"#).unwrap();
        let def = MappingDefinition::from_path(file.path()).unwrap();
        assert_eq!(def.stop_at_row, Some(3));

        let mut bad = tempfile::NamedTempFile::new().unwrap();
        write!(bad, "{{ not json").unwrap();
        let err = MappingDefinition::from_path(bad.path()).unwrap_err();
        assert!(matches!(err, crate::error::ImportError::Definition(_)));

        let err = MappingDefinition::from_path("/nonexistent/mapping.json").unwrap_err();
        assert!(matches!(err, crate::error::ImportError::Csv(CsvError::IoError(_))));
    }

    #[test]
    fn test_non_ascii_delimiter_rejected() {
        let def = MappingDefinition { delimiter: Some('§'), ..MappingDefinition::default() };
        assert!(def.to_builder(builtin(), &mut empty_source()).is_err());
    }

    #[test]
    fn test_unknown_hook_fails_build() {
        let def = MappingDefinition { before_row: vec!["audit".to_string()], ..MappingDefinition::default() };
        let builder = def.to_builder(builtin(), &mut empty_source()).unwrap();
        assert!(matches!(builder.build(), Err(MapError::UnresolvedHook(_))));
    }

    #[test]
    fn test_example_definition_serialization() {
        let def = example_definition();
        let parsed = MappingDefinition::from_json(&def.to_json().unwrap()).unwrap();
        assert_eq!(parsed, def);
    }
}
