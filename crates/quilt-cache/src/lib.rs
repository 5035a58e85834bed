//! # quilt-cache
//!
//! Storage abstraction for the quilt ledger. Provides a trait-based
//! interface for heads, blocks, pending entries, and record-to-block
//! mappings, with filesystem and in-memory implementations.
//!
//! ## Key Types
//!
//! - [`Cache`] - The async trait for all cache operations
//! - [`FsCache`] - Filesystem-backed persistent cache (atomic renames)
//! - [`MemoryCache`] - In-memory cache for tests
//!
//! ## Design Notes
//!
//! - **Not-found is structured**: lookups return typed errors, letting the
//!   channel layer fall through to the network.
//! - **No delete path**: the ledger only grows; heads are the single
//!   mutable value.

pub mod error;
pub mod fs;
pub mod memory;
pub mod traits;

pub use error::{CacheError, Result};
pub use fs::FsCache;
pub use memory::MemoryCache;
pub use traits::Cache;
