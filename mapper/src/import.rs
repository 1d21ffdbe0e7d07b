//! Import loop: run a [`RowMap`] over every row of a source.
//!
//! # Example
//!
//! ```rust,ignore
//! use csv_mapper::{import_path, RowMapBuilder};
//!
//! let mut builder = RowMapBuilder::new();
//! builder.fields(["first", "last", "age"]).start_at_row(1);
//! let map = builder.build()?;
//!
//! let report = import_path(&map, "people.csv")?;
//! println!("Imported {} records", report.records.len());
//! ```

use serde::Serialize;
use std::path::Path;

use crate::error::{ImportError, ImportResult};
use crate::logs::{log_info, log_info_indent, log_success, LogEntry, LOG_BROADCASTER};
use crate::mapping::{MapTarget, RowMap};
use crate::parser::{CsvSource, RowSource};

/// Outcome of an import.
#[derive(Debug, Clone, Serialize)]
pub struct ImportReport<T> {
    /// Parsed targets, in row order
    pub records: Vec<T>,

    /// Rows pulled from the source
    pub rows_read: usize,

    /// Rows inside the map's row range
    pub rows_parsed: usize,
}

/// Parse every in-range row of `source` with `map`.
///
/// The source is rewound first. Rows before `start_at_row` are read and
/// dropped; reading stops once `stop_at_row` is passed. The first row that
/// fails aborts the import.
pub fn import_source<T: MapTarget>(
    map: &RowMap<T>,
    source: &mut dyn RowSource,
) -> ImportResult<ImportReport<T>> {
    let mut records = Vec::new();
    let (rows_read, rows_parsed) = map_rows(map, source, |_, record| records.push(record))?;
    let report = ImportReport { records, rows_read, rows_parsed };
    log_success(format!(
        "Mapped {} of {} rows",
        report.rows_parsed, report.rows_read
    ));
    Ok(report)
}

/// Like [`import_source`], handing each target to `f` instead of collecting.
///
/// Returns the number of rows parsed.
pub fn map_csv<T, F>(map: &RowMap<T>, source: &mut dyn RowSource, mut f: F) -> ImportResult<usize>
where
    T: MapTarget,
    F: FnMut(usize, T),
{
    let (_, parsed) = map_rows(map, source, |row, record| f(row, record))?;
    Ok(parsed)
}

/// Import in-memory text, tokenized with the map's parser options.
pub fn import_string<T: MapTarget>(map: &RowMap<T>, content: &str) -> ImportResult<ImportReport<T>> {
    let mut source = CsvSource::from_string(content, map.parser_options().clone());
    import_source(map, &mut source)
}

/// Import a file, decoded with auto-detected encoding and tokenized with
/// the map's parser options.
pub fn import_path<T: MapTarget, P: AsRef<Path>>(map: &RowMap<T>, path: P) -> ImportResult<ImportReport<T>> {
    log_info(format!("Reading {}", path.as_ref().display()));
    let mut source = CsvSource::from_path(path, map.parser_options().clone())?;
    log_info_indent(format!("Delimiter: '{}'", map.delimiter().escape_ascii()), 1);
    import_source(map, &mut source)
}

fn map_rows<T, F>(
    map: &RowMap<T>,
    source: &mut dyn RowSource,
    mut emit: F,
) -> ImportResult<(usize, usize)>
where
    T: MapTarget,
    F: FnMut(usize, T),
{
    let range = map.rows();
    source.rewind()?;

    let (mut rows_read, mut rows_parsed) = (0, 0);
    let mut index = 0;
    while !range.is_past(index) {
        let Some(mut row) = source.read_row()? else {
            break;
        };
        rows_read += 1;

        if range.contains(index) {
            let record = map.parse(&mut row).map_err(|source| {
                let mut entry = LogEntry::error(source.to_string()).at_row(index);
                if let Some(field) = source.field() {
                    entry = entry.for_field(field);
                }
                LOG_BROADCASTER.log(entry);
                ImportError::Row { row: index, source }
            })?;
            rows_parsed += 1;
            emit(index, record);
        }
        index += 1;
    }
    Ok((rows_read, rows_parsed))
}
