//! Purpose: Building blocks behind the public API.
//! Exports: `cache`, `error`, `handle`, `stringify`, `window`.
//! Role: Internal layering; `api` composes these and `abi` reaches them only through `api`.
pub mod cache;
pub mod error;
pub mod handle;
pub mod stringify;
pub mod window;
