//! Purpose: Query façade: schema lookup and row-window materialization over cached handles.
//! Exports: `TableReader`, `ApiResult`.
//! Role: Orchestrates cache → row-group planning → one physical read → slicing → stringify.
//! Invariants: An empty clamped window returns an empty result, never an error.
//! Invariants: Failures never yield partial results; panics surface as `ErrorKind::Internal`.
#![allow(clippy::result_large_err)]

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;
use std::sync::Arc;

use arrow_array::RecordBatch;
use tracing::warn;

use super::table::{ColumnInfo, FileColumn, FileInfo, SchemaDescriptor, TableResult};
use crate::core::cache::ReaderCache;
use crate::core::error::{Error, ErrorKind};
use crate::core::handle::FileHandle;
use crate::core::stringify::CellFormatter;
use crate::core::window::{RowGroupPlan, RowWindow, plan_window};

pub type ApiResult<T> = Result<T, Error>;

#[derive(Clone, Debug)]
pub struct TableReader {
    cache: Arc<ReaderCache>,
}

impl TableReader {
    pub fn new(cache: Arc<ReaderCache>) -> Self {
        Self { cache }
    }

    pub fn cache(&self) -> &Arc<ReaderCache> {
        &self.cache
    }

    pub fn schema(&self, path: impl AsRef<Path>) -> ApiResult<SchemaDescriptor> {
        let path = path.as_ref();
        guard(path, || {
            let handle = self.cache.acquire(path)?;
            let columns = handle
                .schema()
                .fields()
                .iter()
                .map(|field| ColumnInfo {
                    name: field.name().clone(),
                    type_name: field.data_type().to_string(),
                })
                .collect();
            Ok(SchemaDescriptor {
                columns,
                row_count: handle.total_rows(),
            })
        })
    }

    pub fn file_info(&self, path: impl AsRef<Path>) -> ApiResult<FileInfo> {
        let path = path.as_ref();
        guard(path, || {
            let handle = self.cache.acquire(path)?;
            let columns = handle
                .schema()
                .fields()
                .iter()
                .map(|field| FileColumn {
                    name: field.name().clone(),
                    type_name: field.data_type().to_string(),
                    nullable: field.is_nullable(),
                })
                .collect();
            Ok(FileInfo {
                path: handle.path().to_path_buf(),
                file_size: handle.file_len(),
                row_count: handle.total_rows(),
                row_group_count: handle.num_row_groups(),
                row_group_sizes: handle.row_group_sizes().to_vec(),
                created_by: handle.created_by().map(str::to_string),
                format_version: handle.format_version(),
                columns,
            })
        })
    }

    /// Materializes rows `[start_row, start_row + num_rows)`, clamped to the file.
    pub fn rows(
        &self,
        path: impl AsRef<Path>,
        start_row: u64,
        num_rows: u64,
    ) -> ApiResult<TableResult> {
        let path = path.as_ref();
        guard(path, || {
            let handle = self.cache.acquire(path)?;
            let columns = column_names(&handle);
            let plan = plan_window(RowWindow::new(start_row, num_rows), handle.row_group_sizes());
            if plan.is_empty() {
                return Ok(TableResult::empty(start_row, columns));
            }
            let batch = handle.read_row_groups(&plan)?;
            let window = slice_to_window(&handle, batch, &plan)?;
            Ok(materialize(start_row, columns, &window))
        })
    }

    pub fn invalidate(&self, path: impl AsRef<Path>) -> bool {
        self.cache.invalidate(path)
    }

    pub fn invalidate_all(&self) -> usize {
        self.cache.invalidate_all()
    }
}

impl Default for TableReader {
    fn default() -> Self {
        Self::new(Arc::new(ReaderCache::new()))
    }
}

fn column_names(handle: &FileHandle) -> Vec<String> {
    handle
        .schema()
        .fields()
        .iter()
        .map(|field| field.name().clone())
        .collect()
}

fn slice_to_window(
    handle: &FileHandle,
    batch: RecordBatch,
    plan: &RowGroupPlan,
) -> ApiResult<RecordBatch> {
    let window_error = |message: String| {
        Error::new(ErrorKind::Read)
            .with_message(message)
            .with_path(handle.path())
    };
    let (Ok(offset), Ok(len)) = (usize::try_from(plan.offset), usize::try_from(plan.len)) else {
        return Err(window_error(format!(
            "window of {} rows at offset {} does not fit in memory",
            plan.len, plan.offset
        )));
    };
    let needed = offset.checked_add(len).ok_or_else(|| {
        window_error(format!(
            "window of {len} rows at offset {offset} does not fit in memory"
        ))
    })?;
    if batch.num_rows() < needed {
        return Err(window_error(format!(
            "row groups returned {} rows, window needs {needed}",
            batch.num_rows()
        )));
    }
    if batch.num_rows() == len {
        return Ok(batch);
    }
    Ok(batch.slice(offset, len))
}

fn materialize(start_row: u64, columns: Vec<String>, batch: &RecordBatch) -> TableResult {
    let formatters: Vec<CellFormatter<'_>> = batch
        .columns()
        .iter()
        .map(|column| CellFormatter::new(column.as_ref()))
        .collect();
    let mut cells = Vec::with_capacity(batch.num_rows() * formatters.len());
    for row in 0..batch.num_rows() {
        for formatter in &formatters {
            cells.push(formatter.format(row));
        }
    }
    TableResult::new(start_row, columns, cells)
}

fn guard<T>(path: &Path, op: impl FnOnce() -> ApiResult<T>) -> ApiResult<T> {
    match panic::catch_unwind(AssertUnwindSafe(op)) {
        Ok(result) => result,
        Err(payload) => {
            let detail = panic_message(payload.as_ref());
            warn!(path = %path.display(), panic = %detail, "read path panicked");
            Err(Error::new(ErrorKind::Internal)
                .with_message(format!("read path panicked: {detail}"))
                .with_path(path))
        }
    }
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        return (*message).to_string();
    }
    if let Some(message) = payload.downcast_ref::<String>() {
        return message.clone();
    }
    "unknown panic".to_string()
}

#[cfg(test)]
mod tests {
    use super::{TableReader, guard, slice_to_window};
    use crate::core::error::ErrorKind;
    use crate::core::window::{RowGroupPlan, RowWindow, plan_window};
    use crate::test_support::{write_int_file, write_typed_file};
    use std::path::Path;

    #[test]
    fn schema_lists_columns_and_rows() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = write_int_file(dir.path(), "ints.parquet", 1000, 100);
        let reader = TableReader::default();
        let schema = reader.schema(&path).expect("schema");
        assert_eq!(schema.row_count, 1000);
        let names: Vec<_> = schema.columns.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["id", "label"]);
        assert_eq!(schema.columns[0].type_name, "Int64");
        assert_eq!(schema.columns[1].type_name, "Utf8");
        assert_eq!(reader.schema(&path).expect("again"), schema);
    }

    #[test]
    fn window_in_one_group_reads_one_group() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = write_int_file(dir.path(), "ints.parquet", 1000, 100);
        let reader = TableReader::default();
        let table = reader.rows(&path, 250, 10).expect("rows");
        assert_eq!(table.row_count(), 10);
        assert_eq!(table.cell(0, 0), Some("250"));
        assert_eq!(table.cell(9, 1), Some("row-259"));

        let stats = reader.cache().acquire(&path).expect("handle").read_stats();
        assert_eq!(stats.physical_reads, 1);
        assert_eq!(stats.row_groups_read, 1);
    }

    #[test]
    fn window_past_end_is_clamped() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = write_int_file(dir.path(), "ints.parquet", 1000, 100);
        let reader = TableReader::default();
        let table = reader.rows(&path, 995, 50).expect("rows");
        assert_eq!(table.row_count(), 5);
        assert_eq!(table.cell(0, 0), Some("995"));
        assert_eq!(table.cell(4, 0), Some("999"));
        let stats = reader.cache().acquire(&path).expect("handle").read_stats();
        assert_eq!(stats.row_groups_read, 1);
    }

    #[test]
    fn start_beyond_end_is_empty_without_reading() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = write_int_file(dir.path(), "ints.parquet", 100, 10);
        let reader = TableReader::default();
        let table = reader.rows(&path, 100, 10).expect("rows");
        assert!(table.is_empty());
        assert_eq!(table.column_count(), 2);
        let stats = reader.cache().acquire(&path).expect("handle").read_stats();
        assert_eq!(stats.physical_reads, 0);
    }

    #[test]
    fn spanning_window_matches_whole_file_slice() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = write_int_file(dir.path(), "ints.parquet", 1000, 100);
        let reader = TableReader::default();
        let whole = reader.rows(&path, 0, 1000).expect("whole");
        for (start, count) in [(95, 10), (150, 300), (0, 101), (899, 2), (10, 990)] {
            let window = reader.rows(&path, start, count).expect("window");
            assert_eq!(window.row_count() as u64, count);
            for row in 0..window.row_count() {
                assert_eq!(
                    window.row(row),
                    whole.row(start as usize + row),
                    "start={start} row={row}"
                );
            }
        }
    }

    #[test]
    fn typed_columns_are_stringified() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = write_typed_file(dir.path(), "typed.parquet");
        let reader = TableReader::default();
        let table = reader.rows(&path, 0, 10).expect("rows");
        assert_eq!(table.row_count(), 2);
        assert_eq!(
            table.row(0).expect("row 0"),
            &[
                "7", "alpha", "1.5", "true", "2021-03-04 05:06:07", "2019-04-14", "UNSUPPORTED"
            ]
            .map(String::from)[..]
        );
        assert_eq!(
            table.row(1).expect("row 1"),
            &["NULL", "NULL", "0.333333", "false", "NULL", "NULL", "NULL"].map(String::from)[..]
        );
    }

    #[test]
    fn file_info_reports_layout() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = write_int_file(dir.path(), "ints.parquet", 250, 100);
        let reader = TableReader::default();
        let info = reader.file_info(&path).expect("info");
        assert_eq!(info.row_count, 250);
        assert_eq!(info.row_group_count, 3);
        assert_eq!(info.row_group_sizes, vec![100, 100, 50]);
        assert!(info.file_size > 0);
        assert!(!info.columns[0].nullable);
        assert!(info.columns[1].nullable);
    }

    #[test]
    fn missing_path_is_an_error_for_every_operation() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("missing.parquet");
        let reader = TableReader::default();
        assert_eq!(
            reader.schema(&path).expect_err("schema").kind(),
            ErrorKind::NotFound
        );
        assert_eq!(
            reader.rows(&path, 0, 10).expect_err("rows").kind(),
            ErrorKind::NotFound
        );
        assert!(reader.cache().is_empty());
    }

    #[test]
    fn oversized_window_is_a_read_error_not_a_truncated_slice() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = write_int_file(dir.path(), "ints.parquet", 100, 50);
        let reader = TableReader::default();
        let handle = reader.cache().acquire(&path).expect("handle");
        let plan = plan_window(RowWindow::new(60, 10), handle.row_group_sizes());
        let batch = handle.read_row_groups(&plan).expect("read");

        let overflowing = RowGroupPlan {
            offset: 1,
            len: u64::MAX,
            ..plan.clone()
        };
        let err = slice_to_window(&handle, batch.clone(), &overflowing).expect_err("overflow");
        assert_eq!(err.kind(), ErrorKind::Read);

        let short = RowGroupPlan {
            offset: 45,
            len: 10,
            ..plan.clone()
        };
        let err = slice_to_window(&handle, batch.clone(), &short).expect_err("short batch");
        assert!(err.is_read_error());

        let window = slice_to_window(&handle, batch, &plan).expect("fits");
        assert_eq!(window.num_rows(), 10);
    }

    #[test]
    fn panics_become_internal_errors() {
        let result: super::ApiResult<()> = guard(Path::new("/x"), || panic!("boom"));
        let err = result.expect_err("panic");
        assert_eq!(err.kind(), ErrorKind::Internal);
        assert!(err.message().unwrap_or_default().contains("boom"));
    }
}
