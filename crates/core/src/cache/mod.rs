//! Named cache partitions keyed by canonical request.
//!
//! This module defines the `CacheStore` capability the worker runs against
//! and two implementations of it:
//!
//! - `MemoryStore`: process-local, used by tests and dry runs
//! - `CacheDb`: persistent SQLite store via tokio-rusqlite (WAL mode,
//!   versioned schema, SHA-256 addressed entries)

pub mod connection;
pub mod entries;
pub mod hash;
pub mod memory;
pub mod store;

pub use crate::Error;

pub use connection::{CacheDb, SCHEMA_VERSION};
pub use hash::CacheKey;
pub use memory::{MemoryStore, StoreStats};
pub use store::{CacheStore, CachedResponse, MatchOptions, Partition};
