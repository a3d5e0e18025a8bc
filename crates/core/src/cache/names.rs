//! Versioned store naming.
//!
//! Every store name embeds the version marker. Bumping the marker is the only
//! way to invalidate previously cached content: the next activation deletes
//! every store that is not one of the four current names.

use serde::{Deserialize, Serialize};

/// Resource class a store is dedicated to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum StoreKind {
    /// Application shell and entry points, pre-cached on install.
    Critical,
    /// Scripts, stylesheets and fonts.
    Static,
    /// Everything that is not an image or a static asset.
    Dynamic,
    /// Images, opened empty on install.
    Image,
}

impl StoreKind {
    pub const ALL: [StoreKind; 4] = [StoreKind::Critical, StoreKind::Static, StoreKind::Dynamic, StoreKind::Image];

    pub fn logical_name(self) -> &'static str {
        match self {
            StoreKind::Critical => "critical",
            StoreKind::Static => "static",
            StoreKind::Dynamic => "dynamic",
            StoreKind::Image => "images",
        }
    }
}

impl std::fmt::Display for StoreKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.logical_name())
    }
}

/// Produces the store names for one build version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreNames {
    prefix: String,
    version: String,
}

impl StoreNames {
    pub fn new(prefix: impl Into<String>, version: impl Into<String>) -> Self {
        Self { prefix: prefix.into(), version: version.into() }
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    /// Name of the store for `kind`, e.g. `iafy-static-v3`.
    pub fn name(&self, kind: StoreKind) -> String {
        format!("{}-{}-{}", self.prefix, kind.logical_name(), self.version)
    }

    /// The four store names of the current version.
    pub fn current(&self) -> Vec<String> {
        StoreKind::ALL.iter().map(|kind| self.name(*kind)).collect()
    }

    /// True if `name` is exactly one of the current store names.
    pub fn is_current(&self, name: &str) -> bool {
        StoreKind::ALL.iter().any(|kind| self.name(*kind) == name)
    }

    /// True if one `-`-delimited segment of `name` equals the version marker.
    ///
    /// Segment matching keeps `v3` from matching `v30`.
    pub fn carries_version(&self, name: &str) -> bool {
        name.split('-').any(|segment| segment == self.version)
    }
}
