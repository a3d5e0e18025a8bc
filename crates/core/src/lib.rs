//! Core types and shared functionality for sw-cache.
//!
//! This crate provides:
//! - Versioned cache stores with a SQLite backend
//! - Unified error types
//! - Configuration structures

pub mod cache;
pub mod config;
pub mod error;

pub use cache::{CacheDb, CacheKey, CacheStore, EntryMeta, ResponseSnapshot, StoreKind, StoreNames};
pub use config::{AppConfig, ConfigError, InstallPolicy};
pub use error::Error;
