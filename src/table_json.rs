//! Purpose: JSON envelopes for `schema`, `info` and `rows` output.
//! Exports: `schema_json`, `file_info_json`, `table_json`.
//! Role: Keep CLI payload shapes in one place.
//! Invariants: Schema and info payloads are the serde form of the API types; column types sit under `type`.
//! Invariants: `rows` is row-major and every inner array has `column_count` strings.

use std::path::Path;

use rowpeek::api::{Error, ErrorKind, FileInfo, SchemaDescriptor, TableResult};
use serde::Serialize;
use serde_json::{Value, json};

pub(crate) fn schema_json(path: &Path, schema: &SchemaDescriptor) -> Result<Value, Error> {
    let mut value = to_json(schema)?;
    if let Value::Object(map) = &mut value {
        map.insert("path".to_string(), json!(path.display().to_string()));
    }
    Ok(value)
}

pub(crate) fn file_info_json(info: &FileInfo) -> Result<Value, Error> {
    to_json(info)
}

fn to_json(value: &impl Serialize) -> Result<Value, Error> {
    serde_json::to_value(value).map_err(|err| {
        Error::new(ErrorKind::Internal)
            .with_message("failed to encode output")
            .with_source(err)
    })
}

pub(crate) fn table_json(path: &Path, table: &TableResult) -> Value {
    let rows = table
        .rows()
        .map(|row| json!(row))
        .collect::<Vec<_>>();
    json!({
        "path": path.display().to_string(),
        "start": table.start_row(),
        "row_count": table.row_count(),
        "column_count": table.column_count(),
        "columns": table.column_names(),
        "rows": rows,
    })
}
