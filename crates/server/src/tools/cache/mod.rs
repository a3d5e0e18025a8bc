//! Cache inspection tools.

pub mod lookup;

pub use lookup::{CacheMatchParams, match_impl};
