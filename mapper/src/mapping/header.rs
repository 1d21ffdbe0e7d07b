//! Attribute names from a header row.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;

static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid regex"));
static NON_WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^A-Za-z0-9_]+").expect("valid regex"));

/// Derive an attribute name from one header cell.
///
/// The cell is trimmed first. An alias keyed by the trimmed header wins;
/// otherwise whitespace runs become `_`, other non-word characters are
/// dropped, and the result is lower-cased.
///
/// Distinct headers can collapse to the same name (`files+` and `files-`
/// both give `files`); use aliases to tell them apart.
pub fn attribute_name(header: &str, aliases: &HashMap<String, String>) -> String {
    let trimmed = header.trim();
    if let Some(alias) = aliases.get(trimmed) {
        return alias.clone();
    }
    let underscored = WHITESPACE.replace_all(trimmed, "_");
    NON_WORD.replace_all(&underscored, "").to_lowercase()
}

/// Attribute names for a whole header row, in column order.
pub fn attribute_names(header: &[String], aliases: &HashMap<String, String>) -> Vec<String> {
    header.iter().map(|h| attribute_name(h, aliases)).collect()
}
