//! Worker logic for sw-cache.
//!
//! This crate provides the network fetch client, request routing, the three
//! fetch strategies, the request dispatcher and the worker lifecycle, all
//! built on the cache stores from `swcache-core`.

pub mod dispatch;
pub mod fetch;
pub mod lifecycle;
pub mod route;
pub mod strategy;

#[cfg(test)]
pub(crate) mod testing;

pub use dispatch::{Dispatch, Dispatcher};
pub use fetch::{FetchClient, FetchConfig, Method, Network, NetworkError, Request};
pub use lifecycle::{LifecycleManager, Message, MessageOutcome, PrecacheManifest, SyncOutcome, WorkerState};
pub use route::{Route, Strategy, classify, route, store_kind_for};
pub use strategy::{Handled, ResponseSource, Strategies};
