//! Purpose: Parquet fixture writers shared by unit tests.
//! Exports: `write_int_file`, `write_typed_file`.
//! Role: Test-only; row groups are sized explicitly so window tests control the layout.
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use arrow_array::{
    ArrayRef, BooleanArray, Date32Array, Float64Array, Int32Array, Int64Array, RecordBatch,
    StringArray, TimestampMicrosecondArray, UInt8Array,
};
use arrow_schema::{DataType, Field, Schema, TimeUnit};
use parquet::arrow::ArrowWriter;
use parquet::file::properties::WriterProperties;

/// Writes `rows` rows of (`id` = row index, `label` = "row-{id}") in groups of `group_rows`.
pub(crate) fn write_int_file(dir: &Path, name: &str, rows: usize, group_rows: usize) -> PathBuf {
    let schema = Arc::new(Schema::new(vec![
        Field::new("id", DataType::Int64, false),
        Field::new("label", DataType::Utf8, true),
    ]));
    let ids: Vec<i64> = (0..rows as i64).collect();
    let labels: Vec<String> = ids.iter().map(|id| format!("row-{id}")).collect();
    let batch = RecordBatch::try_new(
        schema.clone(),
        vec![
            Arc::new(Int64Array::from(ids)) as ArrayRef,
            Arc::new(StringArray::from(labels)) as ArrayRef,
        ],
    )
    .expect("batch");
    write_batch(dir, name, &batch, group_rows)
}

/// Two rows covering every rendered type, the second row null wherever nullable.
pub(crate) fn write_typed_file(dir: &Path, name: &str) -> PathBuf {
    let schema = Arc::new(Schema::new(vec![
        Field::new("i32", DataType::Int32, true),
        Field::new("name", DataType::Utf8, true),
        Field::new("ratio", DataType::Float64, false),
        Field::new("flag", DataType::Boolean, false),
        Field::new("ts", DataType::Timestamp(TimeUnit::Microsecond, None), true),
        Field::new("day", DataType::Date32, true),
        Field::new("small", DataType::UInt8, true),
    ]));
    let columns: Vec<ArrayRef> = vec![
        Arc::new(Int32Array::from(vec![Some(7), None])),
        Arc::new(StringArray::from(vec![Some("alpha"), None])),
        Arc::new(Float64Array::from(vec![1.5, 1.0 / 3.0])),
        Arc::new(BooleanArray::from(vec![true, false])),
        Arc::new(TimestampMicrosecondArray::from(vec![
            Some(1_614_834_367_000_000),
            None,
        ])),
        Arc::new(Date32Array::from(vec![Some(18_000), None])),
        Arc::new(UInt8Array::from(vec![Some(3), None])),
    ];
    let batch = RecordBatch::try_new(schema, columns).expect("batch");
    write_batch(dir, name, &batch, 1024)
}

fn write_batch(dir: &Path, name: &str, batch: &RecordBatch, group_rows: usize) -> PathBuf {
    let path = dir.join(name);
    let file = File::create(&path).expect("create parquet");
    let props = WriterProperties::builder()
        .set_max_row_group_size(group_rows)
        .build();
    let mut writer = ArrowWriter::try_new(file, batch.schema(), Some(props)).expect("writer");
    writer.write(batch).expect("write");
    writer.close().expect("close");
    path
}
