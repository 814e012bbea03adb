//! Purpose: C ABI bridge for host bindings (librowpeek).
//! Exports: read/release/invalidate entry points plus `rowpeek_error_free`.
//! Role: Stable ABI surface backed by one process-wide `ReaderCache`.
//! Invariants: Failure is a null return; an error record is written only if `out_err` is non-null.
//! Invariants: Every returned result is released by exactly one matching free call; null is accepted.
//! Invariants: Panics never cross the boundary.
#![allow(clippy::result_large_err)]
#![allow(non_camel_case_types)]

use crate::api::{
    Error, ErrorKind, ReaderCache, SchemaDescriptor, TableReader, TableResult, to_exit_code,
};
use std::ffi::{CStr, CString};
use std::os::raw::c_char;
use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use std::ptr;
use std::sync::{Arc, OnceLock};
use tracing::warn;

#[repr(C)]
pub struct rowpeek_column {
    pub name: *mut c_char,
    pub type_name: *mut c_char,
}

#[repr(C)]
pub struct rowpeek_schema {
    pub columns: *mut rowpeek_column,
    pub column_count: usize,
    pub row_count: u64,
}

/// Row-major grid: cell `(r, c)` lives at `cells[r * column_count + c]`.
#[repr(C)]
pub struct rowpeek_table {
    pub cells: *mut *mut c_char,
    pub row_count: usize,
    pub column_count: usize,
    pub start_row: u64,
}

#[repr(C)]
pub struct rowpeek_error {
    pub kind: i32,
    pub message: *mut c_char,
    pub path: *mut c_char,
}

static DEFAULT_CACHE: OnceLock<Arc<ReaderCache>> = OnceLock::new();

fn default_reader() -> TableReader {
    TableReader::new(Arc::clone(
        DEFAULT_CACHE.get_or_init(|| Arc::new(ReaderCache::new())),
    ))
}

#[unsafe(no_mangle)]
pub extern "C" fn rowpeek_read_schema(
    path: *const c_char,
    out_err: *mut *mut rowpeek_error,
) -> *mut rowpeek_schema {
    boundary(out_err, || {
        let path = parse_path(path)?;
        let schema = default_reader().schema(&path)?;
        Ok(Box::into_raw(schema_to_c(schema)))
    })
}

#[unsafe(no_mangle)]
pub extern "C" fn rowpeek_read_rows(
    path: *const c_char,
    start_row: i64,
    num_rows: i64,
    out_err: *mut *mut rowpeek_error,
) -> *mut rowpeek_table {
    boundary(out_err, || {
        let path = parse_path(path)?;
        let start = u64::try_from(start_row)
            .map_err(|_| Error::new(ErrorKind::Usage).with_message("start_row is negative"))?;
        let count = u64::try_from(num_rows)
            .map_err(|_| Error::new(ErrorKind::Usage).with_message("num_rows is negative"))?;
        let table = default_reader().rows(&path, start, count)?;
        Ok(Box::into_raw(table_to_c(table)))
    })
}

#[unsafe(no_mangle)]
pub extern "C" fn rowpeek_release_schema(schema: *mut rowpeek_schema) {
    if schema.is_null() {
        return;
    }
    unsafe {
        let schema = Box::from_raw(schema);
        let columns = take_boxed_slice(schema.columns, schema.column_count);
        for column in columns.iter() {
            free_c_string(column.name);
            free_c_string(column.type_name);
        }
    }
}

#[unsafe(no_mangle)]
pub extern "C" fn rowpeek_release_table(table: *mut rowpeek_table) {
    if table.is_null() {
        return;
    }
    unsafe {
        let table = Box::from_raw(table);
        let cells = take_boxed_slice(table.cells, table.row_count * table.column_count);
        for cell in cells.iter() {
            free_c_string(*cell);
        }
    }
}

/// Returns 1 when a cached reader for `path` was dropped, 0 otherwise.
#[unsafe(no_mangle)]
pub extern "C" fn rowpeek_invalidate_cache(path: *const c_char) -> i32 {
    let Ok(path) = parse_path(path) else {
        return 0;
    };
    let Some(cache) = DEFAULT_CACHE.get() else {
        return 0;
    };
    panic::catch_unwind(AssertUnwindSafe(|| cache.invalidate(&path)))
        .map(i32::from)
        .unwrap_or(0)
}

#[unsafe(no_mangle)]
pub extern "C" fn rowpeek_invalidate_cache_all() {
    if let Some(cache) = DEFAULT_CACHE.get() {
        let _ = panic::catch_unwind(AssertUnwindSafe(|| cache.invalidate_all()));
    }
}

#[unsafe(no_mangle)]
pub extern "C" fn rowpeek_error_free(err: *mut rowpeek_error) {
    if err.is_null() {
        return;
    }
    unsafe {
        let err = Box::from_raw(err);
        free_c_string(err.message);
        free_c_string(err.path);
    }
}

fn boundary<T>(
    out_err: *mut *mut rowpeek_error,
    op: impl FnOnce() -> Result<*mut T, Error>,
) -> *mut T {
    match panic::catch_unwind(AssertUnwindSafe(op)) {
        Ok(Ok(ptr)) => ptr,
        Ok(Err(err)) => fail(out_err, err),
        Err(payload) => {
            let detail = crate::api::panic_message(payload.as_ref());
            warn!(panic = %detail, "panic at C boundary");
            fail(
                out_err,
                Error::new(ErrorKind::Internal).with_message(format!("panic: {detail}")),
            )
        }
    }
}

fn parse_path(input: *const c_char) -> Result<PathBuf, Error> {
    if input.is_null() {
        return Err(Error::new(ErrorKind::Usage).with_message("path is null"));
    }
    let raw = unsafe { CStr::from_ptr(input) };
    if raw.is_empty() {
        return Err(Error::new(ErrorKind::Usage).with_message("path is empty"));
    }
    path_from_bytes(raw)
}

#[cfg(unix)]
fn path_from_bytes(raw: &CStr) -> Result<PathBuf, Error> {
    use std::os::unix::ffi::OsStrExt;
    Ok(PathBuf::from(std::ffi::OsStr::from_bytes(raw.to_bytes())))
}

#[cfg(not(unix))]
fn path_from_bytes(raw: &CStr) -> Result<PathBuf, Error> {
    raw.to_str()
        .map(PathBuf::from)
        .map_err(|_| Error::new(ErrorKind::Usage).with_message("path is not valid UTF-8"))
}

fn schema_to_c(schema: SchemaDescriptor) -> Box<rowpeek_schema> {
    let columns: Box<[rowpeek_column]> = schema
        .columns
        .into_iter()
        .map(|column| rowpeek_column {
            name: to_c_string(&column.name),
            type_name: to_c_string(&column.type_name),
        })
        .collect();
    let column_count = columns.len();
    Box::new(rowpeek_schema {
        columns: leak_boxed_slice(columns),
        column_count,
        row_count: schema.row_count,
    })
}

fn table_to_c(table: TableResult) -> Box<rowpeek_table> {
    let row_count = table.row_count();
    let column_count = table.column_count();
    let start_row = table.start_row();
    let (_, cells) = table.into_parts();
    let cells: Box<[*mut c_char]> = cells.iter().map(|cell| to_c_string(cell)).collect();
    Box::new(rowpeek_table {
        cells: leak_boxed_slice(cells),
        row_count,
        column_count,
        start_row,
    })
}

fn leak_boxed_slice<T>(items: Box<[T]>) -> *mut T {
    if items.is_empty() {
        return ptr::null_mut();
    }
    Box::into_raw(items) as *mut T
}

unsafe fn take_boxed_slice<T>(data: *mut T, len: usize) -> Box<[T]> {
    if data.is_null() || len == 0 {
        return Box::new([]);
    }
    unsafe { Box::from_raw(ptr::slice_from_raw_parts_mut(data, len)) }
}

unsafe fn free_c_string(value: *mut c_char) {
    if !value.is_null() {
        unsafe {
            drop(CString::from_raw(value));
        }
    }
}

// Interior NULs cannot cross a C string boundary; they are replaced so every cell stays valid.
fn to_c_string(input: &str) -> *mut c_char {
    let owned = if input.contains('\0') {
        input.replace('\0', "\u{fffd}")
    } else {
        input.to_string()
    };
    CString::new(owned)
        .map(CString::into_raw)
        .unwrap_or(ptr::null_mut())
}

fn fail<T>(out_err: *mut *mut rowpeek_error, err: Error) -> *mut T {
    if !out_err.is_null() {
        let error = Box::new(rowpeek_error {
            kind: to_exit_code(err.kind()),
            message: to_c_string(&err.to_string()),
            path: err
                .path()
                .map(|path| to_c_string(path.to_string_lossy().as_ref()))
                .unwrap_or(ptr::null_mut()),
        });
        unsafe {
            *out_err = Box::into_raw(error);
        }
    }
    ptr::null_mut()
}
