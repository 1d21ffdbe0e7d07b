//! csvmap CLI - map CSV rows onto JSON records
//!
//! # Main Commands
//!
//! ```bash
//! csvmap import input.csv --mapping people.json   # Map rows with a definition file
//! csvmap parse input.csv                          # Map rows by header names
//! ```
//!
//! # Inspection Commands
//!
//! ```bash
//! csvmap headers input.csv         # Show attribute names derived from the header
//! csvmap operations                # Show built-in named transforms
//! csvmap example-mapping           # Show an example mapping definition
//! ```

use clap::{Parser, Subcommand};
use csv_mapper::logs::{self, LogLevel, LOG_BROADCASTER};
use csv_mapper::mapping::attribute_names;
use csv_mapper::{
    detect_delimiter, import_source, CsvSource, Context, ImportOptions,
    MapContext, MappingDefinition, ParserOptions, RowMapBuilder, RowSource,
};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "csvmap")]
#[command(about = "Map rows of delimited text onto JSON records", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Map a CSV file with a mapping definition
    Import {
        /// Input CSV file
        input: PathBuf,

        /// Mapping definition (JSON)
        #[arg(short, long)]
        mapping: PathBuf,

        /// CSV delimiter (auto-detect if not specified)
        #[arg(short, long)]
        delimiter: Option<char>,

        /// First row to parse
        #[arg(long)]
        start: Option<usize>,

        /// Last row to parse (inclusive)
        #[arg(long)]
        stop: Option<usize>,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Only print a summary of warnings and errors
        #[arg(short, long)]
        quiet: bool,
    },

    /// Map a CSV file using its header row as field names
    Parse {
        /// Input CSV file
        input: PathBuf,

        /// CSV delimiter (auto-detect if not specified)
        #[arg(short, long)]
        delimiter: Option<char>,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Only print a summary of warnings and errors
        #[arg(short, long)]
        quiet: bool,
    },

    /// Show the attribute name derived from each header column
    Headers {
        /// Input CSV file
        input: PathBuf,

        /// CSV delimiter (auto-detect if not specified)
        #[arg(short, long)]
        delimiter: Option<char>,
    },

    /// Show available named transforms
    Operations,

    /// Show example mapping definition
    ExampleMapping,
}

fn main() {
    // Load .env file (if present)
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Import {
            input,
            mapping,
            delimiter,
            start,
            stop,
            output,
            quiet,
        } => {
            let flags = ImportOptions {
                delimiter,
                start_at_row: start,
                stop_at_row: stop,
            };
            with_log_summary(quiet, || cmd_import(&input, &mapping, flags, output.as_deref()))
        }

        Commands::Parse {
            input,
            delimiter,
            output,
            quiet,
        } => with_log_summary(quiet, || cmd_parse(&input, delimiter, output.as_deref())),

        Commands::Headers { input, delimiter } => cmd_headers(&input, delimiter),

        Commands::Operations => cmd_operations(),

        Commands::ExampleMapping => cmd_example_mapping(),
    };

    if let Err(e) = result {
        eprintln!("❌ Error: {}", e);
        std::process::exit(1);
    }
}

fn cmd_import(
    input: &Path,
    mapping: &Path,
    flags: ImportOptions,
    output: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    eprintln!("📄 Importing: {}", input.display());

    let definition = MappingDefinition::from_path(mapping)?;
    eprintln!("   Mapping: {}", mapping.display());
    if !definition.description.is_empty() {
        eprintln!("   {}", definition.description);
    }

    let options = ImportOptions::from_env()?.merge(flags);
    let parser = definition.parser.clone().unwrap_or_default();
    let explicit = options
        .delimiter
        .or(definition.delimiter)
        .or(definition.parser.as_ref().map(|p| p.delimiter as char));
    let mut source = open_source(input, explicit, parser)?;

    let context: Arc<dyn MapContext> = Arc::new(Context::builtin());
    let mut builder = definition.to_builder(context, &mut source)?;
    builder.delimited_by(source.options().delimiter);
    options.apply(&mut builder)?;
    let map = builder.build()?;

    eprintln!("   Fields: {}", map.schema().fields().join(", "));

    source.configure(map.parser_options().clone());
    let report = import_source(&map, &mut source)?;
    eprintln!("✅ Mapped {} records ({} rows read)", report.rows_parsed, report.rows_read);

    let json = serde_json::to_string_pretty(&report.records)?;
    write_output(&json, output)?;

    Ok(())
}

fn cmd_parse(
    input: &Path,
    delimiter: Option<char>,
    output: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    eprintln!("📄 Parsing CSV: {}", input.display());

    let mut source = open_source(input, delimiter, ParserOptions::default())?;

    let mut builder = RowMapBuilder::new();
    builder.read_attributes_from(&mut source, &HashMap::new())?;
    builder.delimited_by(source.options().delimiter);
    let map = builder.build()?;
    eprintln!("   Columns: {}", map.schema().fields().join(", "));

    let report = import_source(&map, &mut source)?;
    eprintln!("✅ Parsed {} records", report.records.len());

    let json = serde_json::to_string_pretty(&report.records)?;
    write_output(&json, output)?;

    Ok(())
}

fn cmd_headers(input: &Path, delimiter: Option<char>) -> Result<(), Box<dyn std::error::Error>> {
    let mut source = open_source(input, delimiter, ParserOptions::default())?;
    let header = source.read_row()?.ok_or("CSV file is empty")?;

    println!("📋 CSV has {} columns:", header.len());
    for (i, (column, name)) in header.iter().zip(attribute_names(&header, &HashMap::new())).enumerate() {
        println!("  [{:2}] {:<30} -> {}", i, column, name);
    }
    Ok(())
}

fn cmd_operations() -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", csv_mapper::operations_description());
    Ok(())
}

fn cmd_example_mapping() -> Result<(), Box<dyn std::error::Error>> {
    let definition = csv_mapper::example_definition();
    println!("{}", definition.to_json()?);
    Ok(())
}

/// Run `command` with the engine's log echo switched off when `quiet`,
/// then report the warnings and errors it logged.
fn with_log_summary<F>(quiet: bool, command: F) -> Result<(), Box<dyn std::error::Error>>
where
    F: FnOnce() -> Result<(), Box<dyn std::error::Error>>,
{
    let mut receiver = LOG_BROADCASTER.subscribe();
    LOG_BROADCASTER.set_echo(!quiet);
    let result = command();

    let flagged: Vec<_> = logs::drain(&mut receiver)
        .into_iter()
        .filter(|e| matches!(e.level, LogLevel::Warning | LogLevel::Error))
        .collect();
    if !flagged.is_empty() {
        eprintln!("\n⚠️  {} warning(s) or error(s):", flagged.len());
        for entry in &flagged {
            eprintln!("   - {}", entry);
        }
    }
    result
}

/// Open `input`, using `delimiter` or detecting one from the first line.
fn open_source(
    input: &Path,
    delimiter: Option<char>,
    parser: ParserOptions,
) -> Result<CsvSource, Box<dyn std::error::Error>> {
    let mut source = CsvSource::from_path(input, parser.clone())?;

    let (used, detected) = match delimiter {
        Some(c) if c.is_ascii() => (c as u8, false),
        Some(c) => return Err(format!("delimiter '{}' is not a single-byte character", c).into()),
        None => (detect_delimiter(source.content()), true),
    };
    eprintln!(
        "   Delimiter: '{}'{}",
        format_delimiter(used),
        if detected { " (auto-detected)" } else { "" }
    );

    source.configure(parser.with_delimiter(used));
    Ok(source)
}

fn format_delimiter(d: u8) -> String {
    match d {
        b'\t' => "\\t".to_string(),
        c => (c as char).to_string(),
    }
}

fn write_output(content: &str, path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    match path {
        Some(p) => {
            fs::write(p, content)?;
            eprintln!("💾 Output written to: {}", p.display());
        }
        None => {
            println!("{}", content);
        }
    }
    Ok(())
}
