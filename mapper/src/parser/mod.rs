//! Row source: delimited text to row-vectors.
//!
//! Wraps the `csv` tokenizer behind the [`RowSource`] trait the mapper
//! consumes. The mapper never splits fields itself; it only receives the
//! rows produced here. Input bytes go through encoding auto-detection
//! before tokenizing.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{CsvError, CsvResult};

/// One row of tabular input: the raw field strings in column order.
pub type Row = Vec<String>;

/// Tokenizer options passed through by the mapping definition.
///
/// The mapper stores these without interpreting them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParserOptions {
    /// Field delimiter
    pub delimiter: u8,
    /// Quote character
    pub quote: u8,
    /// Trim whitespace around fields
    pub trim: bool,
    /// Lines starting with this byte are ignored
    pub comment: Option<u8>,
    /// Allow rows with differing field counts
    pub flexible: bool,
}

impl Default for ParserOptions {
    fn default() -> Self {
        Self {
            delimiter: b',',
            quote: b'"',
            trim: false,
            comment: None,
            flexible: true,
        }
    }
}

impl ParserOptions {
    /// Same options with a different delimiter.
    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    fn reader_builder(&self) -> csv::ReaderBuilder {
        let mut builder = csv::ReaderBuilder::new();
        builder
            .has_headers(false)
            .delimiter(self.delimiter)
            .quote(self.quote)
            .comment(self.comment)
            .flexible(self.flexible)
            .trim(if self.trim { csv::Trim::All } else { csv::Trim::None });
        builder
    }
}

/// A producer of row-vectors.
///
/// Header introspection needs to read one row and then start over, so
/// sources must be rewindable.
pub trait RowSource {
    /// Read the next row, or `None` at end of input.
    fn read_row(&mut self) -> CsvResult<Option<Row>>;

    /// Go back to the first row.
    fn rewind(&mut self) -> CsvResult<()>;
}

/// In-memory delimited text source.
#[derive(Debug, Clone)]
pub struct CsvSource {
    content: String,
    options: ParserOptions,
    /// Byte offset of the next unread row
    position: usize,
    /// Index of the next unread row
    row: usize,
}

impl CsvSource {
    /// Source over already-decoded text.
    pub fn from_string(content: impl Into<String>, options: ParserOptions) -> Self {
        Self {
            content: content.into(),
            options,
            position: 0,
            row: 0,
        }
    }

    /// Source over raw bytes, decoded with auto-detected encoding.
    pub fn from_bytes(bytes: &[u8], options: ParserOptions) -> CsvResult<Self> {
        let encoding = detect_encoding(bytes);
        let content = decode_content(bytes, &encoding)?;
        Ok(Self::from_string(content, options))
    }

    /// Source over a file, decoded with auto-detected encoding.
    pub fn from_path<P: AsRef<Path>>(path: P, options: ParserOptions) -> CsvResult<Self> {
        let bytes = std::fs::read(path.as_ref())?;
        Self::from_bytes(&bytes, options)
    }

    /// The decoded text.
    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn options(&self) -> &ParserOptions {
        &self.options
    }

    /// Replace the tokenizer options. Also rewinds.
    pub fn configure(&mut self, options: ParserOptions) {
        self.options = options;
        self.position = 0;
        self.row = 0;
    }
}

impl RowSource for CsvSource {
    fn read_row(&mut self) -> CsvResult<Option<Row>> {
        let remaining = self.content.as_bytes().get(self.position..).unwrap_or_default();
        let mut reader = self.options.reader_builder().from_reader(remaining);
        let mut record = csv::StringRecord::new();

        let found = reader
            .read_record(&mut record)
            .map_err(|e| parse_error(self.row, e))?;
        if !found {
            return Ok(None);
        }

        self.position += reader.position().byte() as usize;
        self.row += 1;
        Ok(Some(record.iter().map(String::from).collect()))
    }

    fn rewind(&mut self) -> CsvResult<()> {
        self.position = 0;
        self.row = 0;
        Ok(())
    }
}

fn parse_error(row: usize, err: csv::Error) -> CsvError {
    CsvError::ParseError {
        row,
        message: err.to_string(),
    }
}

/// Detect the encoding of raw bytes using chardet
pub fn detect_encoding(bytes: &[u8]) -> String {
    let result = chardet::detect(bytes);
    let charset = result.0;

    match charset.to_lowercase().as_str() {
        "ascii" | "utf-8" | "utf8" | "" => "utf-8".to_string(),
        "iso-8859-1" | "iso-8859-15" | "latin-1" | "latin1" => "iso-8859-1".to_string(),
        "windows-1252" | "cp1252" => "windows-1252".to_string(),
        _ => charset,
    }
}

/// Decode bytes to string using the specified encoding
pub fn decode_content(bytes: &[u8], encoding: &str) -> CsvResult<String> {
    let decoded = match encoding.to_lowercase().as_str() {
        "utf-8" | "utf8" | "ascii" => String::from_utf8_lossy(bytes).into_owned(),
        "iso-8859-1" | "latin-1" | "latin1" => {
            encoding_rs::ISO_8859_15.decode(bytes).0.into_owned()
        }
        "windows-1252" | "cp1252" => encoding_rs::WINDOWS_1252.decode(bytes).0.into_owned(),
        other => {
            let codec = encoding_rs::Encoding::for_label(other.as_bytes())
                .ok_or_else(|| CsvError::EncodingError(format!("unsupported encoding '{}'", other)))?;
            codec.decode(bytes).0.into_owned()
        }
    };
    Ok(decoded)
}

/// Detect the delimiter by counting occurrences in the first line
pub fn detect_delimiter(content: &str) -> u8 {
    let first_line = content.lines().next().unwrap_or("");

    let separators = [b',', b';', b'\t', b'|'];
    let mut best_sep = b',';
    let mut best_count = 0;

    for &sep in &separators {
        let count = first_line.matches(sep as char).count();
        if count > best_count {
            best_count = count;
            best_sep = sep;
        }
    }

    best_sep
}
