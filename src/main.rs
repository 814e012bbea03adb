//! Purpose: `rowpeek` CLI entry point: schema, file info and row windows for Parquet files.
//! Role: Binary crate root; parses args, runs one command, emits JSON on stdout.
//! Invariants: Commands emit stable stdout formats (JSON, or an aligned table for `rows --format table`).
//! Invariants: Non-interactive errors are emitted as JSON on stderr.
//! Invariants: Process exit code is derived from `api::to_exit_code`.
//! Invariants: Diagnostics go through `tracing` on stderr; stdout stays machine-readable.
#![allow(clippy::result_large_err)]
use std::ffi::OsString;
use std::io::{self, IsTerminal};
use std::path::PathBuf;
use std::sync::Arc;

use clap::{CommandFactory, Parser, Subcommand, ValueEnum, ValueHint, error::ErrorKind as ClapErrorKind};
use clap_complete::aot::Shell;
use rowpeek::api::{
    CacheOptions, Error, ErrorKind, ReaderCache, TableReader, to_exit_code,
};
use serde_json::{Map, Value, json};
use std::error::Error as StdError;
use tracing_subscriber::EnvFilter;

mod color_json;
mod command_dispatch;
mod table_json;

use color_json::render_json;

const DEFAULT_ROW_COUNT: u64 = 20;

#[derive(Copy, Clone, Debug)]
struct RunOutcome {
    exit_code: i32,
}

impl RunOutcome {
    fn ok() -> Self {
        Self { exit_code: 0 }
    }

    fn with_code(exit_code: i32) -> Self {
        Self { exit_code }
    }
}

fn main() {
    init_tracing();
    let exit_code = match run() {
        Ok(outcome) => outcome.exit_code,
        Err((err, color_mode)) => {
            emit_error(&err, color_mode);
            to_exit_code(err.kind())
        }
    };
    std::process::exit(exit_code);
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .try_init();
}

fn run() -> Result<RunOutcome, (Error, ColorMode)> {
    let cli = match Cli::try_parse_from(normalize_args(std::env::args_os())) {
        Ok(cli) => cli,
        Err(err) => match err.kind() {
            ClapErrorKind::DisplayHelp
            | ClapErrorKind::DisplayVersion
            | ClapErrorKind::DisplayHelpOnMissingArgumentOrSubcommand => {
                err.print().map_err(|io_err| {
                    (
                        Error::new(ErrorKind::Io)
                            .with_message("failed to write help")
                            .with_source(io_err),
                        ColorMode::Auto,
                    )
                })?;
                let exit_code = if matches!(
                    err.kind(),
                    ClapErrorKind::DisplayHelpOnMissingArgumentOrSubcommand
                ) {
                    2
                } else {
                    0
                };
                return Ok(RunOutcome::with_code(exit_code));
            }
            _ => {
                return Err((
                    Error::new(ErrorKind::Usage)
                        .with_message(clap_error_summary(&err))
                        .with_hint(clap_error_hint(&err)),
                    ColorMode::Auto,
                ));
            }
        },
    };

    let color_mode = cli.color;
    let options = match cli.batch_size {
        Some(0) => {
            return Err((
                Error::new(ErrorKind::Usage)
                    .with_message("--batch-size must be at least 1")
                    .with_hint("Omit --batch-size to use the default of 65536 rows."),
                color_mode,
            ));
        }
        Some(batch_size) => CacheOptions { batch_size },
        None => CacheOptions::default(),
    };
    let reader = TableReader::new(Arc::new(ReaderCache::with_options(options)));

    command_dispatch::dispatch_command(cli.command, &reader, color_mode)
        .map_err(add_missing_file_hint)
        .map_err(add_corrupt_hint)
        .map_err(add_io_hint)
        .map_err(add_internal_hint)
        .map_err(|err| (err, color_mode))
}

fn normalize_args<I>(args: I) -> Vec<OsString>
where
    I: IntoIterator<Item = OsString>,
{
    args.into_iter()
        .map(|arg| {
            let replacement = arg.to_str().and_then(|value| match value {
                "---help" => Some("--help"),
                "---version" => Some("--version"),
                _ => None,
            });
            replacement.map(OsString::from).unwrap_or(arg)
        })
        .collect()
}

#[derive(Parser)]
#[command(
    name = "rowpeek",
    version,
    about = "Schema and row-window inspection for Parquet files",
    help_template = r#"{about-with-newline}
{before-help}USAGE
  {usage}

COMMANDS
{subcommands}

OPTIONS
{options}

{after-help}
"#,
    long_about = None,
    before_help = r#"Reads only the row groups a window touches. Every cell is printed as text.

Mental model:
  - `schema` lists columns and the total row count
  - `info` adds row-group layout and writer metadata
  - `rows` prints a window of rows
"#,
    after_help = r#"EXAMPLES
  $ rowpeek schema trips.parquet
  $ rowpeek rows trips.parquet --start 250 --count 10
  $ rowpeek rows trips.parquet --count 5 --format table
  $ RUST_LOG=rowpeek=debug rowpeek rows trips.parquet   # log row-group reads

LEARN MORE
  $ rowpeek <command> --help"#,
    arg_required_else_help = true,
    disable_help_subcommand = false
)]
struct Cli {
    #[arg(
        long,
        default_value = "auto",
        value_enum,
        help = "Colorize stderr diagnostics and pretty JSON output: auto|always|never"
    )]
    color: ColorMode,
    #[arg(
        long,
        value_name = "ROWS",
        help = "Rows per decoded batch (default: 65536)"
    )]
    batch_size: Option<usize>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum ColorMode {
    Auto,
    Always,
    Never,
}

impl ColorMode {
    fn use_color(self, is_tty: bool) -> bool {
        match self {
            ColorMode::Auto => is_tty,
            ColorMode::Always => true,
            ColorMode::Never => false,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum RowsFormat {
    Json,
    Table,
}

#[derive(Subcommand)]
enum Command {
    #[command(
        about = "List columns and the total row count",
        after_help = r#"EXAMPLES
  $ rowpeek schema trips.parquet

NOTES
  - Output: {"path": ..., "row_count": N, "columns": [{"name": ..., "type": ...}]}"#
    )]
    Schema {
        #[arg(help = "Parquet file", value_hint = ValueHint::FilePath)]
        path: PathBuf,
    },
    #[command(
        about = "Show row-group layout, writer and per-column nullability",
        after_help = r#"EXAMPLES
  $ rowpeek info trips.parquet"#
    )]
    Info {
        #[arg(help = "Parquet file", value_hint = ValueHint::FilePath)]
        path: PathBuf,
    },
    #[command(
        about = "Print a window of rows as text",
        after_help = r#"EXAMPLES
  $ rowpeek rows trips.parquet                       # first 20 rows
  $ rowpeek rows trips.parquet --start 995 --count 50
  $ rowpeek rows trips.parquet --format table

NOTES
  - Windows past the end are clamped; a start beyond the last row prints zero rows
  - Nulls print as NULL, unrenderable types as UNSUPPORTED"#
    )]
    Rows {
        #[arg(help = "Parquet file", value_hint = ValueHint::FilePath)]
        path: PathBuf,
        #[arg(long, default_value_t = 0, help = "First row to print (0-based)")]
        start: u64,
        #[arg(
            long,
            short = 'n',
            default_value_t = DEFAULT_ROW_COUNT,
            help = "Maximum number of rows to print"
        )]
        count: u64,
        #[arg(long, default_value = "json", value_enum, help = "Output format: json|table")]
        format: RowsFormat,
    },
    #[command(about = "Generate shell completions")]
    Completion {
        #[arg(value_enum)]
        shell: Shell,
    },
}

fn add_missing_file_hint(err: Error) -> Error {
    if err.kind() != ErrorKind::NotFound || err.hint().is_some() {
        return err;
    }
    err.with_hint("File not found. Check the path, or pass an absolute path.")
}

fn add_io_hint(err: Error) -> Error {
    if err.hint().is_some() {
        return err;
    }
    match err.kind() {
        ErrorKind::Permission => {
            err.with_hint("Permission denied. Check that the file is readable by this user.")
        }
        ErrorKind::Io => err.with_hint("I/O error. Check the path and filesystem."),
        ErrorKind::Read => err.with_hint(
            "Row groups could not be decoded. The file may be truncated or use an unsupported codec.",
        ),
        _ => err,
    }
}

fn add_corrupt_hint(err: Error) -> Error {
    if err.kind() != ErrorKind::Corrupt || err.hint().is_some() {
        return err;
    }
    err.with_hint("File is not readable as Parquet. Check that it was fully written.")
}

fn add_internal_hint(err: Error) -> Error {
    if err.kind() != ErrorKind::Internal || err.hint().is_some() {
        return err;
    }
    err.with_hint(
        "Unexpected internal failure. Retry with RUST_BACKTRACE=1 and share command/context if it persists.",
    )
}

fn emit_json(value: Value, color_mode: ColorMode) {
    let is_tty = io::stdout().is_terminal();
    let use_color = color_mode.use_color(is_tty);
    let json = if is_tty || use_color {
        render_json(&value, use_color)
    } else {
        serde_json::to_string(&value)
            .unwrap_or_else(|_| "{\"error\":\"json encode failed\"}".to_string())
    };
    println!("{json}");
}

fn emit_table(headers: &[String], rows: &[Vec<String>]) {
    let rendered = render_table(headers, rows);
    if !rendered.is_empty() {
        println!("{rendered}");
    }
}

fn render_table(headers: &[String], rows: &[Vec<String>]) -> String {
    if headers.is_empty() {
        return String::new();
    }
    let mut widths = headers
        .iter()
        .map(|header| header.chars().count())
        .collect::<Vec<_>>();
    let mut sanitized_rows = Vec::with_capacity(rows.len());
    for row in rows {
        let mut sanitized = Vec::with_capacity(widths.len());
        for (idx, width) in widths.iter_mut().enumerate() {
            let cleaned = sanitize_table_cell(row.get(idx).map(String::as_str).unwrap_or(""));
            *width = (*width).max(cleaned.chars().count());
            sanitized.push(cleaned);
        }
        sanitized_rows.push(sanitized);
    }

    let mut lines = Vec::with_capacity(sanitized_rows.len() + 1);
    lines.push(format_table_line(headers, &widths));
    for row in &sanitized_rows {
        lines.push(format_table_line(row, &widths));
    }
    lines.join("\n")
}

fn sanitize_table_cell(value: &str) -> String {
    value
        .replace('\n', "\\n")
        .replace('\r', "\\r")
        .replace('\t', "\\t")
}

fn format_table_line(cells: &[String], widths: &[usize]) -> String {
    let mut line = String::new();
    for (idx, width) in widths.iter().enumerate() {
        if idx > 0 {
            line.push_str("  ");
        }
        let cell = cells.get(idx).map(String::as_str).unwrap_or("");
        line.push_str(cell);
        let cell_len = cell.chars().count();
        if *width > cell_len {
            line.push_str(&" ".repeat(*width - cell_len));
        }
    }
    line.trim_end().to_string()
}

#[derive(Copy, Clone, Debug)]
enum AnsiColor {
    Red,
    Yellow,
}

fn colorize_label(label: &str, enabled: bool, color: AnsiColor) -> String {
    if !enabled {
        return label.to_string();
    }
    let code = match color {
        AnsiColor::Red => "31",
        AnsiColor::Yellow => "33",
    };
    format!("\u{1b}[{code}m{label}\u{1b}[0m")
}

fn emit_error(err: &Error, color_mode: ColorMode) {
    let is_tty = io::stderr().is_terminal();
    if is_tty {
        eprintln!("{}", error_text(err, color_mode.use_color(is_tty)));
        return;
    }

    let json = serde_json::to_string(&error_json(err)).unwrap_or_else(|_| {
        "{\"error\":{\"kind\":\"Internal\",\"message\":\"json encode failed\"}}".to_string()
    });
    eprintln!("{json}");
}

fn error_message(err: &Error) -> String {
    if let Some(message) = err.message() {
        return message.to_string();
    }
    match err.kind() {
        ErrorKind::Internal => "internal error".to_string(),
        ErrorKind::Usage => "usage error".to_string(),
        ErrorKind::NotFound => "not found".to_string(),
        ErrorKind::Permission => "permission denied".to_string(),
        ErrorKind::Corrupt => "not a readable parquet file".to_string(),
        ErrorKind::Io => "i/o error".to_string(),
        ErrorKind::Read => "failed to read rows".to_string(),
    }
}

fn error_causes(err: &Error) -> Vec<String> {
    let mut causes = Vec::new();
    let mut cur = err.source();
    while let Some(source) = cur {
        causes.push(source.to_string());
        cur = source.source();
    }
    causes
}

fn error_json(err: &Error) -> Value {
    let mut inner = Map::new();
    inner.insert("kind".to_string(), json!(format!("{:?}", err.kind())));
    inner.insert("message".to_string(), json!(error_message(err)));
    if let Some(hint) = err.hint() {
        inner.insert("hint".to_string(), json!(hint));
    }
    if let Some(path) = err.path() {
        inner.insert("path".to_string(), json!(path.display().to_string()));
    }
    let causes = error_causes(err);
    if !causes.is_empty() {
        inner.insert("causes".to_string(), json!(causes));
    }

    let mut outer = Map::new();
    outer.insert("error".to_string(), Value::Object(inner));
    Value::Object(outer)
}

fn error_text(err: &Error, use_color: bool) -> String {
    let mut lines = vec![format!(
        "{} {}",
        colorize_label("error:", use_color, AnsiColor::Red),
        error_message(err)
    )];
    if let Some(hint) = err.hint() {
        lines.push(format!(
            "{} {hint}",
            colorize_label("hint:", use_color, AnsiColor::Yellow)
        ));
    }
    if let Some(path) = err.path() {
        lines.push(format!(
            "{} {}",
            colorize_label("path:", use_color, AnsiColor::Yellow),
            path.display()
        ));
    }
    if let Some(cause) = error_causes(err).first() {
        lines.push(format!(
            "{} {cause}",
            colorize_label("caused by:", use_color, AnsiColor::Yellow)
        ));
    }
    lines.join("\n")
}

fn clap_error_summary(err: &clap::Error) -> String {
    for line in err.to_string().lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        if let Some(rest) = trimmed.strip_prefix("error:") {
            return rest.trim().to_string();
        }
        return trimmed.to_string();
    }
    "invalid arguments".to_string()
}

fn clap_error_hint(err: &clap::Error) -> String {
    let rendered = err.to_string();
    let command = rendered
        .lines()
        .find_map(|line| line.trim().strip_prefix("Usage: "))
        .and_then(|usage| {
            let mut tokens = usage.split_whitespace();
            tokens.find(|token| *token == "rowpeek")?;
            tokens.next().filter(|token| {
                !token.starts_with('-') && !token.starts_with('<') && !token.starts_with('[')
            })
        });
    match command {
        Some(command) => format!("Try `rowpeek {command} --help`."),
        None => "Try `rowpeek --help`.".to_string(),
    }
}
