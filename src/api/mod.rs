//! Purpose: Define the stable public Rust API boundary for rowpeek.
//! Exports: `TableReader` plus the result types it returns and the cache it is built on.
//! Role: Public, additive-only surface used by the CLI, the C ABI and Rust embedders.
//! Invariants: Results never borrow from cached handles; they outlive invalidation.

mod reader;
mod table;

pub use crate::core::cache::{CacheOptions, CacheStats, ReaderCache};
#[doc(hidden)]
pub use crate::core::error::to_exit_code;
pub use crate::core::error::{Error, ErrorKind};
pub use crate::core::handle::ReadStats;
pub use crate::core::stringify::{NULL_CELL, UNSUPPORTED_CELL};
pub use crate::core::window::{RowGroupPlan, RowWindow, plan_window};
pub(crate) use reader::panic_message;
pub use reader::{ApiResult, TableReader};
pub use table::{ColumnInfo, FileColumn, FileInfo, SchemaDescriptor, TableResult};
