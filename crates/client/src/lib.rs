//! Network access for sw-cache.
//!
//! This crate provides the `Network` capability the worker fetches through,
//! an HTTP implementation backed by reqwest, a scripted stub for tests and
//! dry runs, and URL helpers for scope resolution.

pub mod fetch;

pub use fetch::{FetchConfig, HttpNetwork, Network, NetworkError, StubNetwork};
