//! Purpose: Open one Parquet file and read selected row groups from it.
//! Exports: `FileHandle`, `ReadStats`.
//! Role: The unit the reader cache stores; owns the mapping and the parsed metadata.
//! Invariants: Metadata is parsed once per handle; every read reuses it.
//! Invariants: One `read_row_groups` call is one physical read of exactly the planned groups.
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use arrow_array::{RecordBatch, RecordBatchReader};
use arrow_schema::SchemaRef;
use arrow_select::concat::concat_batches;
use bytes::Bytes;
use memmap2::Mmap;
use parquet::arrow::arrow_reader::{
    ArrowReaderMetadata, ArrowReaderOptions, ParquetRecordBatchReaderBuilder,
};
use tracing::debug;

use crate::core::cache::CacheOptions;
use crate::core::error::{Error, ErrorKind};
use crate::core::window::RowGroupPlan;

const MAGIC: &[u8; 4] = b"PAR1";
// Leading magic, trailing footer length and magic.
const MIN_FILE_LEN: u64 = 12;

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct ReadStats {
    pub physical_reads: u64,
    pub row_groups_read: u64,
}

pub struct FileHandle {
    path: PathBuf,
    data: Bytes,
    metadata: ArrowReaderMetadata,
    row_group_sizes: Vec<u64>,
    batch_size: usize,
    physical_reads: AtomicU64,
    row_groups_read: AtomicU64,
}

impl FileHandle {
    pub fn open(path: impl AsRef<Path>, options: &CacheOptions) -> Result<Self, Error> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path)
            .map_err(|err| Error::from_io(err, &path).with_message("failed to open file"))?;
        let len = file
            .metadata()
            .map(|meta| meta.len())
            .map_err(|err| Error::from_io(err, &path).with_message("failed to stat file"))?;
        if len < MIN_FILE_LEN {
            return Err(Error::new(ErrorKind::Corrupt)
                .with_message("file too small to be parquet")
                .with_path(&path));
        }

        // Read-only mapping; the file is treated as immutable for the handle's lifetime.
        let mmap = unsafe {
            Mmap::map(&file)
                .map_err(|err| Error::from_io(err, &path).with_message("failed to map file"))?
        };
        if &mmap[..4] != MAGIC || &mmap[mmap.len() - 4..] != MAGIC {
            return Err(Error::new(ErrorKind::Corrupt)
                .with_message("missing PAR1 magic")
                .with_path(&path));
        }
        let data = Bytes::from_owner(mmap);

        let metadata = ArrowReaderMetadata::load(&data, ArrowReaderOptions::new()).map_err(|err| {
            Error::new(ErrorKind::Corrupt)
                .with_message("unreadable parquet metadata")
                .with_path(&path)
                .with_source(err)
        })?;
        let row_group_sizes = metadata
            .metadata()
            .row_groups()
            .iter()
            .map(|group| group.num_rows().max(0) as u64)
            .collect();

        Ok(Self {
            path,
            data,
            metadata,
            row_group_sizes,
            batch_size: options.batch_size.max(1),
            physical_reads: AtomicU64::new(0),
            row_groups_read: AtomicU64::new(0),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn schema(&self) -> &SchemaRef {
        self.metadata.schema()
    }

    pub fn file_len(&self) -> u64 {
        self.data.len() as u64
    }

    pub fn total_rows(&self) -> u64 {
        self.metadata.metadata().file_metadata().num_rows().max(0) as u64
    }

    pub fn row_group_sizes(&self) -> &[u64] {
        &self.row_group_sizes
    }

    pub fn num_row_groups(&self) -> usize {
        self.row_group_sizes.len()
    }

    pub fn created_by(&self) -> Option<&str> {
        self.metadata.metadata().file_metadata().created_by()
    }

    pub fn format_version(&self) -> i32 {
        self.metadata.metadata().file_metadata().version()
    }

    pub fn read_stats(&self) -> ReadStats {
        ReadStats {
            physical_reads: self.physical_reads.load(Ordering::Relaxed),
            row_groups_read: self.row_groups_read.load(Ordering::Relaxed),
        }
    }

    /// Reads the planned row groups as one batch, in file order.
    ///
    /// Exactly one physical read is issued per call; the returned batch holds every
    /// row of the selected groups, so callers slice it to the window themselves.
    pub fn read_row_groups(&self, plan: &RowGroupPlan) -> Result<RecordBatch, Error> {
        let mut builder = ParquetRecordBatchReaderBuilder::new_with_metadata(
            self.data.clone(),
            self.metadata.clone(),
        )
        .with_batch_size(self.batch_size);
        if !plan.covers_all(self.num_row_groups()) {
            builder = builder.with_row_groups(plan.row_groups.clone());
        }
        let reader = builder.build().map_err(|err| self.read_error(err))?;
        let schema = reader.schema();

        debug!(
            path = %self.path.display(),
            row_groups = ?plan.row_groups,
            "reading row groups"
        );
        self.physical_reads.fetch_add(1, Ordering::Relaxed);
        self.row_groups_read
            .fetch_add(plan.row_groups.len() as u64, Ordering::Relaxed);

        let batches = reader
            .collect::<Result<Vec<_>, _>>()
            .map_err(|err| self.read_error(err))?;
        concat_batches(&schema, &batches).map_err(|err| self.read_error(err))
    }

    fn read_error(&self, err: impl std::error::Error + Send + Sync + 'static) -> Error {
        Error::new(ErrorKind::Read)
            .with_message("failed to read row groups")
            .with_path(&self.path)
            .with_source(err)
    }
}

impl std::fmt::Debug for FileHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileHandle")
            .field("path", &self.path)
            .field("row_groups", &self.row_group_sizes.len())
            .field("total_rows", &self.total_rows())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::FileHandle;
    use crate::core::cache::CacheOptions;
    use crate::core::error::ErrorKind;
    use crate::core::window::{RowWindow, plan_window};
    use crate::test_support::write_int_file;
    use std::fs::OpenOptions;
    use std::io::{Seek, SeekFrom, Write};

    #[test]
    fn open_reads_row_group_layout() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = write_int_file(dir.path(), "ints.parquet", 250, 100);
        let handle = FileHandle::open(&path, &CacheOptions::default()).expect("open");
        assert_eq!(handle.total_rows(), 250);
        assert_eq!(handle.row_group_sizes(), &[100, 100, 50]);
        assert_eq!(handle.schema().fields().len(), 2);
        assert!(handle.created_by().is_some());
    }

    #[test]
    fn read_touches_only_planned_groups() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = write_int_file(dir.path(), "ints.parquet", 1000, 100);
        let handle = FileHandle::open(&path, &CacheOptions::default()).expect("open");
        let plan = plan_window(RowWindow::new(250, 10), handle.row_group_sizes());
        let batch = handle.read_row_groups(&plan).expect("read");
        assert_eq!(batch.num_rows(), 100);
        let stats = handle.read_stats();
        assert_eq!(stats.physical_reads, 1);
        assert_eq!(stats.row_groups_read, 1);
    }

    #[test]
    fn small_batch_size_still_yields_one_batch() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = write_int_file(dir.path(), "ints.parquet", 300, 100);
        let options = CacheOptions { batch_size: 7 };
        let handle = FileHandle::open(&path, &options).expect("open");
        let plan = plan_window(RowWindow::new(0, 300), handle.row_group_sizes());
        let batch = handle.read_row_groups(&plan).expect("read");
        assert_eq!(batch.num_rows(), 300);
    }

    #[test]
    fn damaged_row_group_is_a_read_error_for_that_group_only() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = write_int_file(dir.path(), "ints.parquet", 500, 100);
        let (chunk_start, _) = {
            let handle = FileHandle::open(&path, &CacheOptions::default()).expect("open");
            handle.metadata.metadata().row_group(3).column(0).byte_range()
        };

        // Zeroed bytes decode as a page header with every required field missing.
        let mut file = OpenOptions::new().write(true).open(&path).expect("reopen");
        file.seek(SeekFrom::Start(chunk_start)).expect("seek");
        file.write_all(&[0u8; 16]).expect("damage");
        drop(file);

        let handle = FileHandle::open(&path, &CacheOptions::default()).expect("footer intact");
        let err = handle
            .read_row_groups(&plan_window(RowWindow::new(300, 10), handle.row_group_sizes()))
            .expect_err("damaged group");
        assert_eq!(err.kind(), ErrorKind::Read);
        assert!(err.is_read_error());
        assert!(!err.is_open_error());

        for start in [0, 150, 250, 450] {
            let plan = plan_window(RowWindow::new(start, 10), handle.row_group_sizes());
            let batch = handle.read_row_groups(&plan).expect("undamaged group");
            assert_eq!(batch.num_rows(), 100);
        }
    }

    #[test]
    fn missing_file_is_not_found() {
        let dir = tempfile::tempdir().expect("tempdir");
        let err = FileHandle::open(dir.path().join("nope.parquet"), &CacheOptions::default())
            .expect_err("missing");
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn non_parquet_file_is_corrupt() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("text.parquet");
        std::fs::write(&path, b"id,name\n1,alice\n2,bob\n").expect("write");
        let err = FileHandle::open(&path, &CacheOptions::default()).expect_err("corrupt");
        assert_eq!(err.kind(), ErrorKind::Corrupt);

        std::fs::write(&path, b"PAR1").expect("write");
        let err = FileHandle::open(&path, &CacheOptions::default()).expect_err("short");
        assert_eq!(err.kind(), ErrorKind::Corrupt);
    }

    #[test]
    fn damaged_footer_is_corrupt() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("bad.parquet");
        let mut bytes = b"PAR1".to_vec();
        bytes.extend_from_slice(&[0xAB; 64]);
        bytes.extend_from_slice(&32u32.to_le_bytes());
        bytes.extend_from_slice(b"PAR1");
        std::fs::write(&path, bytes).expect("write");
        let err = FileHandle::open(&path, &CacheOptions::default()).expect_err("corrupt");
        assert_eq!(err.kind(), ErrorKind::Corrupt);
    }
}
