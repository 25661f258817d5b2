//! Core types and shared functionality for sw-cache.
//!
//! This crate provides:
//! - Request/response snapshots exchanged between the worker and its host
//! - Named cache partitions and the `CacheStore` abstraction
//! - In-memory and SQLite cache store implementations
//! - Unified error types
//! - Configuration structures

pub mod cache;
pub mod config;
pub mod error;
pub mod http;
pub mod partition;

pub use cache::{CacheDb, CacheKey, CacheStore, CachedResponse, MatchOptions, MemoryStore, Partition};
pub use config::WorkerConfig;
pub use error::Error;
pub use http::{Destination, Headers, Request, RequestMode, Response, ResponseType};
pub use partition::{CacheRole, PartitionNames};
