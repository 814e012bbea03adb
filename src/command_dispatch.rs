//! Purpose: Hold top-level CLI command dispatch for `rowpeek`.
//! Exports: `dispatch_command`.
//! Role: Keep `main.rs` focused on parse/bootstrap and delegate command execution.
//! Invariants: Every command reads through the one `TableReader` built in `main.rs`.
//! Invariants: Output envelopes come from `table_json`; errors propagate untouched.

use super::*;
use super::table_json::{file_info_json, schema_json, table_json};

pub(super) fn dispatch_command(
    command: Command,
    reader: &TableReader,
    color_mode: ColorMode,
) -> Result<RunOutcome, Error> {
    match command {
        Command::Completion { shell } => {
            let mut cmd = Cli::command();
            clap_complete::aot::generate(shell, &mut cmd, "rowpeek", &mut io::stdout());
            Ok(RunOutcome::ok())
        }
        Command::Schema { path } => {
            let schema = reader.schema(&path)?;
            emit_json(schema_json(&path, &schema)?, color_mode);
            Ok(RunOutcome::ok())
        }
        Command::Info { path } => {
            let info = reader.file_info(&path)?;
            emit_json(file_info_json(&info)?, color_mode);
            Ok(RunOutcome::ok())
        }
        Command::Rows {
            path,
            start,
            count,
            format,
        } => {
            if count == 0 {
                return Err(Error::new(ErrorKind::Usage)
                    .with_message("--count must be at least 1")
                    .with_hint("Use `rowpeek schema` to see the total row count."));
            }
            let table = reader.rows(&path, start, count)?;
            match format {
                RowsFormat::Json => emit_json(table_json(&path, &table), color_mode),
                RowsFormat::Table => {
                    let rows = table.rows().map(<[String]>::to_vec).collect::<Vec<_>>();
                    emit_table(table.column_names(), &rows);
                }
            }
            Ok(RunOutcome::ok())
        }
    }
}
