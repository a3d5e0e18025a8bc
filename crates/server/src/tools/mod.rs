//! MCP tool implementations.
//!
//! This module contains all tools exposed by the sw-cache server.

pub mod cache;
pub mod sw_fetch;
pub mod sw_message;
pub mod sw_status;
pub mod sw_sync;

pub use cache::{CacheMatchParams, match_impl};
pub use sw_fetch::{SwFetchParams, fetch_impl};
pub use sw_message::{SwMessageParams, message_impl};
pub use sw_status::{SwStatusParams, status_impl};
pub use sw_sync::{SwSyncParams, sync_impl};
