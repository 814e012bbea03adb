//! Purpose: Cached schema introspection and row-window reads over Parquet files.
//! Exports: `api` (stable Rust surface), `abi` (C entry points), `core` (building blocks).
//! Role: Library behind the `rowpeek` CLI and the `cdylib`/`staticlib` artifacts.
//! Invariants: Core modules prefer explicit inputs/outputs over hidden state.
//! Invariants: The only process-wide state is the ABI's default reader cache.
pub mod abi;
pub mod api;
pub mod core;

#[cfg(test)]
pub(crate) mod test_support;
