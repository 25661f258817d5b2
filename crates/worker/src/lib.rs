//! Request interception and caching strategies for sw-cache.
//!
//! This crate provides:
//! - Request classification into routes, strategies and partitions
//! - Cache-first, network-first and stale-while-revalidate strategies
//! - Bounded eviction for the media partition
//! - Install/activate lifecycle with generation cleanup
//! - `ServiceWorker`, which wires all of the above behind `LifecycleHandler`

pub mod classify;
pub mod evict;
pub mod lifecycle;
pub mod offline;
pub mod strategy;
pub mod tasks;
pub mod worker;

pub use classify::{Decision, Route, RoutingRules, StrategyKind};
pub use lifecycle::{ActivateReport, LifecycleState, PrecacheReport};
pub use strategy::{CacheFirstOptions, Strategies};
pub use tasks::BackgroundTasks;
pub use worker::{ControlMessage, FetchEvent, Host, LifecycleHandler, PreloadUnsupported, ServiceWorker};
