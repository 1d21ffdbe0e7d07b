//! Value operations usable as named transforms.
//!
//! Each [`Operation`] rewrites a single field value. The parameterless ones
//! are registered by name in [`crate::Context::builtin`]; definition files
//! can also chain them on a field (see [`crate::MappingDefinition`]).

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

static YEAR: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d{4}").expect("valid regex"));

/// A single value rewrite.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Operation {
    /// Remove leading and trailing whitespace
    Trim,

    /// Convert to uppercase
    Uppercase,

    /// Convert to lowercase
    Lowercase,

    /// Replace every match of a regex
    Replace {
        pattern: String,
        #[serde(default)]
        value: String,
    },

    /// First 4-digit run as a number
    ExtractYear,

    /// Look the value up in a table
    Map {
        mapping: HashMap<String, String>,
        #[serde(default)]
        case_insensitive: bool,
        /// Used when the table has no entry; otherwise the value passes through
        #[serde(default)]
        default_unmapped: Option<String>,
    },

    /// Split into an array of trimmed parts
    Split {
        #[serde(default = "default_split_separator")]
        separator: String,
    },

    /// Convert to boolean
    ToBoolean {
        #[serde(default = "default_true_values")]
        true_values: Vec<String>,
    },

    /// Convert to an integer
    ToNumber,

    /// Keep only alphanumeric characters
    Alphanumeric,

    /// Keep only ASCII digits
    DigitsOnly,
}

fn default_split_separator() -> String {
    ",".to_string()
}

fn default_true_values() -> Vec<String> {
    ["true", "1", "yes", "y", "t"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

impl Operation {
    /// Parameterless operations under their registry names.
    pub fn presets() -> Vec<(&'static str, Operation)> {
        vec![
            ("trim", Operation::Trim),
            ("uppercase", Operation::Uppercase),
            ("lowercase", Operation::Lowercase),
            ("extract_year", Operation::ExtractYear),
            ("split", Operation::Split { separator: default_split_separator() }),
            ("to_boolean", Operation::ToBoolean { true_values: default_true_values() }),
            ("to_number", Operation::ToNumber),
            ("alphanumeric", Operation::Alphanumeric),
            ("digits_only", Operation::DigitsOnly),
        ]
    }

    /// Apply this operation to a value.
    ///
    /// A `replace` pattern is compiled on every call; use
    /// [`prepare`](Self::prepare) when applying to many values.
    pub fn apply(&self, value: &Value) -> Value {
        match self {
            Operation::Replace { pattern, .. } => match Regex::new(pattern) {
                Ok(re) => apply_with(self, Some(&re), value),
                Err(_) => value.clone(),
            },
            _ => apply_with(self, None, value),
        }
    }

    /// Compile any pattern this operation needs.
    pub fn prepare(self) -> Result<PreparedOperation, regex::Error> {
        let pattern = match &self {
            Operation::Replace { pattern, .. } => Some(Regex::new(pattern)?),
            _ => None,
        };
        Ok(PreparedOperation { op: self, pattern })
    }

    /// Like [`prepare`](Self::prepare), but an invalid `replace` pattern
    /// leaves values unchanged instead of failing.
    pub fn prepare_lossy(self) -> PreparedOperation {
        match self.clone().prepare() {
            Ok(prepared) => prepared,
            Err(_) => PreparedOperation { op: self, pattern: None },
        }
    }
}

/// An [`Operation`] with its pattern compiled.
#[derive(Debug, Clone)]
pub struct PreparedOperation {
    op: Operation,
    pattern: Option<Regex>,
}

impl PreparedOperation {
    pub fn operation(&self) -> &Operation {
        &self.op
    }

    pub fn apply(&self, value: &Value) -> Value {
        apply_with(&self.op, self.pattern.as_ref(), value)
    }

    /// Apply `ops` left to right.
    pub fn apply_all(ops: &[PreparedOperation], value: Value) -> Value {
        ops.iter().fold(value, |v, op| op.apply(&v))
    }
}

/// Prepare a chain of operations, failing on the first bad pattern.
pub fn prepare_all(ops: &[Operation]) -> Result<Vec<PreparedOperation>, regex::Error> {
    ops.iter().cloned().map(Operation::prepare).collect()
}

fn apply_with(op: &Operation, pattern: Option<&Regex>, value: &Value) -> Value {
    match op {
        Operation::Trim => map_text(value, |s| s.trim().to_string()),
        Operation::Uppercase => map_text(value, |s| s.to_uppercase()),
        Operation::Lowercase => map_text(value, |s| s.to_lowercase()),
        Operation::Replace { value: replacement, .. } => match pattern {
            Some(re) => map_text(value, |s| re.replace_all(s, replacement.as_str()).into_owned()),
            None => value.clone(),
        },
        Operation::ExtractYear => extract_year(value),
        Operation::Map { mapping, case_insensitive, default_unmapped } => {
            map_text(value, |s| lookup(s, mapping, *case_insensitive, default_unmapped.as_deref()))
        }
        Operation::Split { separator } => match as_text(value) {
            Some(s) => Value::Array(
                s.split(separator.as_str())
                    .map(|p| Value::String(p.trim().to_string()))
                    .collect(),
            ),
            None => value.clone(),
        },
        Operation::ToBoolean { true_values } => to_boolean(value, true_values),
        Operation::ToNumber => to_number(value),
        Operation::Alphanumeric => {
            map_text(value, |s| s.chars().filter(|c| c.is_alphanumeric()).collect())
        }
        Operation::DigitsOnly => {
            map_text(value, |s| s.chars().filter(|c| c.is_ascii_digit()).collect())
        }
    }
}

fn as_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Rewrite scalar text; arrays, objects and null pass through.
fn map_text<F: FnOnce(&str) -> String>(value: &Value, f: F) -> Value {
    match as_text(value) {
        Some(s) => Value::String(f(&s)),
        None => value.clone(),
    }
}

fn lookup(
    s: &str,
    mapping: &HashMap<String, String>,
    case_insensitive: bool,
    default_unmapped: Option<&str>,
) -> String {
    let found = if case_insensitive {
        let key = s.to_lowercase();
        mapping
            .iter()
            .find(|(k, _)| k.to_lowercase() == key)
            .map(|(_, v)| v)
    } else {
        mapping.get(s)
    };

    match (found, default_unmapped) {
        (Some(v), _) => v.clone(),
        (None, Some(d)) => d.to_string(),
        (None, None) => s.to_string(),
    }
}

fn extract_year(value: &Value) -> Value {
    let Some(s) = as_text(value) else {
        return Value::Null;
    };
    YEAR.find(&s)
        .and_then(|m| m.as_str().parse::<i64>().ok())
        .map(Value::from)
        .unwrap_or(Value::Null)
}

fn to_boolean(value: &Value, true_values: &[String]) -> Value {
    match value {
        Value::Bool(b) => Value::Bool(*b),
        _ => {
            let text = as_text(value).unwrap_or_default().trim().to_lowercase();
            Value::Bool(true_values.iter().any(|tv| tv.to_lowercase() == text))
        }
    }
}

fn to_number(value: &Value) -> Value {
    if value.is_number() {
        return value.clone();
    }
    let Some(s) = as_text(value) else {
        return Value::Null;
    };
    let digits: String = s.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return Value::Null;
    }
    let signed = if s.trim().starts_with('-') {
        format!("-{}", digits)
    } else {
        digits
    };
    signed.parse::<i64>().map(Value::from).unwrap_or(Value::Null)
}

/// Human-readable list of the named transforms.
pub fn operations_description() -> String {
    r#"Built-in named transforms (applied to the attribute's raw field):

| Name | Description |
|------|-------------|
| trim | Remove leading/trailing whitespace |
| uppercase | Convert to uppercase |
| lowercase | Convert to lowercase |
| extract_year | First 4-digit run as a number |
| split | Split on "," into an array |
| to_boolean | true/1/yes/y/t (any case) as true, anything else false |
| to_number | Keep digits (and a leading minus) as an integer |
| alphanumeric | Keep only alphanumeric characters |
| digits_only | Keep only digits |

Definition files may also chain parameterised operations on a field:
[
  {"type": "trim"},
  {"type": "replace", "pattern": "[-. ]", "value": ""},
  {"type": "map", "mapping": {"M": "male", "F": "female"}, "case_insensitive": true},
  {"type": "to_number"}
]"#
    .to_string()
}
