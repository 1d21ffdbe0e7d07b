//! Import settings shared by the CLI and library callers.
//!
//! Settings come from three layers, later ones winning: the mapping
//! definition, the environment (`CSVMAP_*`, `.env` loaded by the CLI), and
//! explicit overrides such as command-line flags.

use serde::{Deserialize, Serialize};
use std::env;

use crate::error::{ImportError, ImportResult};
use crate::mapping::{MapTarget, RowMapBuilder};

pub const ENV_DELIMITER: &str = "CSVMAP_DELIMITER";
pub const ENV_START_AT_ROW: &str = "CSVMAP_START_AT_ROW";
pub const ENV_STOP_AT_ROW: &str = "CSVMAP_STOP_AT_ROW";

/// Row range and delimiter overrides.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportOptions {
    /// Column delimiter (single ASCII character)
    pub delimiter: Option<char>,

    /// First row to parse
    pub start_at_row: Option<usize>,

    /// Last row to parse (inclusive)
    pub stop_at_row: Option<usize>,
}

impl ImportOptions {
    /// Read the `CSVMAP_*` environment variables.
    pub fn from_env() -> ImportResult<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from any key lookup; unset or blank keys are skipped.
    pub fn from_lookup<F>(lookup: F) -> ImportResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let delimiter = match get(ENV_DELIMITER) {
            Some(raw) => Some(parse_delimiter(ENV_DELIMITER, &raw)?),
            None => None,
        };
        let start_at_row = match get(ENV_START_AT_ROW) {
            Some(raw) => Some(parse_row(ENV_START_AT_ROW, &raw)?),
            None => None,
        };
        let stop_at_row = match get(ENV_STOP_AT_ROW) {
            Some(raw) => Some(parse_row(ENV_STOP_AT_ROW, &raw)?),
            None => None,
        };

        Ok(Self {
            delimiter,
            start_at_row,
            stop_at_row,
        })
    }

    /// `other`'s set values replace ours.
    pub fn merge(mut self, other: ImportOptions) -> Self {
        self.delimiter = other.delimiter.or(self.delimiter);
        self.start_at_row = other.start_at_row.or(self.start_at_row);
        self.stop_at_row = other.stop_at_row.or(self.stop_at_row);
        self
    }

    /// Delimiter as a tokenizer byte.
    pub fn delimiter_byte(&self) -> ImportResult<Option<u8>> {
        match self.delimiter {
            Some(c) if c.is_ascii() => Ok(Some(c as u8)),
            Some(c) => Err(ImportError::Config {
                key: "delimiter".to_string(),
                message: format!("'{}' is not a single-byte character", c),
            }),
            None => Ok(None),
        }
    }

    /// Write the set values onto `builder`.
    pub fn apply<T: MapTarget>(&self, builder: &mut RowMapBuilder<T>) -> ImportResult<()> {
        if let Some(delimiter) = self.delimiter_byte()? {
            builder.delimited_by(delimiter);
        }
        if let Some(row) = self.start_at_row {
            builder.start_at_row(row);
        }
        if let Some(row) = self.stop_at_row {
            builder.stop_at_row(row);
        }
        Ok(())
    }
}

fn parse_delimiter(key: &str, raw: &str) -> ImportResult<char> {
    let value = match raw {
        "\\t" | "tab" | "TAB" => '\t',
        _ => {
            let mut chars = raw.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) if c.is_ascii() => c,
                _ => {
                    return Err(ImportError::Config {
                        key: key.to_string(),
                        message: format!("expected one ASCII character, got '{}'", raw),
                    })
                }
            }
        }
    };
    Ok(value)
}

fn parse_row(key: &str, raw: &str) -> ImportResult<usize> {
    raw.trim().parse().map_err(|_| ImportError::Config {
        key: key.to_string(),
        message: format!("expected a row number, got '{}'", raw),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_empty_environment() {
        let options = ImportOptions::from_lookup(lookup(&[])).unwrap();
        assert_eq!(options, ImportOptions::default());
    }

    #[test]
    fn test_reads_all_keys() {
        let options = ImportOptions::from_lookup(lookup(&[
            (ENV_DELIMITER, "tab"),
            (ENV_START_AT_ROW, "1"),
            (ENV_STOP_AT_ROW, " 10 "),
        ]))
        .unwrap();
        assert_eq!(options.delimiter, Some('\t'));
        assert_eq!(options.start_at_row, Some(1));
        assert_eq!(options.stop_at_row, Some(10));
    }

    #[test]
    fn test_invalid_values() {
        let err = ImportOptions::from_lookup(lookup(&[(ENV_STOP_AT_ROW, "ten")])).unwrap_err();
        assert!(err.to_string().contains(ENV_STOP_AT_ROW));

        assert!(ImportOptions::from_lookup(lookup(&[(ENV_DELIMITER, ";;")])).is_err());
        assert!(ImportOptions::from_lookup(lookup(&[(ENV_DELIMITER, "§")])).is_err());
    }

    #[test]
    fn test_merge_prefers_other() {
        let env = ImportOptions {
            delimiter: Some(';'),
            start_at_row: Some(1),
            stop_at_row: None,
        };
        let flags = ImportOptions {
            delimiter: Some('|'),
            ..ImportOptions::default()
        };
        let merged = env.merge(flags);
        assert_eq!(merged.delimiter, Some('|'));
        assert_eq!(merged.start_at_row, Some(1));
    }

    #[test]
    fn test_apply_to_builder() {
        let options = ImportOptions {
            delimiter: Some(';'),
            start_at_row: Some(2),
            stop_at_row: Some(5),
        };
        let mut builder = RowMapBuilder::new();
        options.apply(&mut builder).unwrap();

        let map = builder.build().unwrap();
        assert_eq!(map.delimiter(), b';');
        assert_eq!(map.start_at_row(), 2);
        assert_eq!(map.stop_at_row(), Some(5));
    }
}
