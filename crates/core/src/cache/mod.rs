//! SQLite-backed cache stores for intercepted responses.
//!
//! This module provides named, versioned key-value stores using SQLite
//! with async access via tokio-rusqlite. It supports:
//!
//! - One store per resource class, named after the current version marker
//! - Request identity hashed with SHA-256
//! - Automatic schema migrations
//! - Whole-store deletion for version-based eviction

pub mod connection;
pub mod entries;
pub mod hash;
pub mod migrations;
pub mod names;
pub mod stores;

pub use crate::Error;

pub use connection::CacheDb;
pub use entries::{EntryMeta, ResponseSnapshot};
pub use hash::CacheKey;
pub use names::{StoreKind, StoreNames};
pub use stores::CacheStore;
