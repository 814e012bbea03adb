//! Purpose: Owned result types returned by `TableReader`.
//! Exports: `ColumnInfo`, `SchemaDescriptor`, `FileInfo`, `TableResult`.
//! Invariants: `TableResult` cells are row-major and `cells.len() == row_count * column_count`.
//! Invariants: Every cell is a string; nulls and unsupported types use the sentinel strings.
use serde::{Serialize, Serializer};
use std::path::{Path, PathBuf};

#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct ColumnInfo {
    pub name: String,
    #[serde(rename = "type")]
    pub type_name: String,
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct SchemaDescriptor {
    pub columns: Vec<ColumnInfo>,
    pub row_count: u64,
}

impl SchemaDescriptor {
    pub fn column_count(&self) -> usize {
        self.columns.len()
    }
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct FileInfo {
    #[serde(serialize_with = "serialize_path_lossy")]
    pub path: PathBuf,
    pub file_size: u64,
    pub row_count: u64,
    pub row_group_count: usize,
    pub row_group_sizes: Vec<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_by: Option<String>,
    pub format_version: i32,
    pub columns: Vec<FileColumn>,
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct FileColumn {
    pub name: String,
    #[serde(rename = "type")]
    pub type_name: String,
    pub nullable: bool,
}

// Paths are reported for display; non-UTF-8 bytes must not fail the whole payload.
fn serialize_path_lossy<S: Serializer>(path: &Path, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&path.to_string_lossy())
}

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct TableResult {
    start_row: u64,
    row_count: usize,
    column_count: usize,
    columns: Vec<String>,
    cells: Vec<String>,
}

impl TableResult {
    pub(crate) fn new(start_row: u64, columns: Vec<String>, cells: Vec<String>) -> Self {
        let column_count = columns.len();
        let row_count = if column_count == 0 {
            0
        } else {
            cells.len() / column_count
        };
        debug_assert_eq!(row_count * column_count, cells.len());
        Self {
            start_row,
            row_count,
            column_count,
            columns,
            cells,
        }
    }

    pub(crate) fn empty(start_row: u64, columns: Vec<String>) -> Self {
        Self::new(start_row, columns, Vec::new())
    }

    /// First file row in the window.
    pub fn start_row(&self) -> u64 {
        self.start_row
    }

    pub fn row_count(&self) -> usize {
        self.row_count
    }

    pub fn column_count(&self) -> usize {
        self.column_count
    }

    pub fn is_empty(&self) -> bool {
        self.row_count == 0
    }

    pub fn column_names(&self) -> &[String] {
        &self.columns
    }

    pub fn cell(&self, row: usize, column: usize) -> Option<&str> {
        if row >= self.row_count || column >= self.column_count {
            return None;
        }
        self.cells
            .get(row * self.column_count + column)
            .map(String::as_str)
    }

    pub fn row(&self, row: usize) -> Option<&[String]> {
        if row >= self.row_count {
            return None;
        }
        let start = row * self.column_count;
        self.cells.get(start..start + self.column_count)
    }

    pub fn rows(&self) -> impl Iterator<Item = &[String]> + '_ {
        self.cells.chunks_exact(self.column_count.max(1))
    }

    pub fn into_parts(self) -> (Vec<String>, Vec<String>) {
        (self.columns, self.cells)
    }
}
