//! Request classification.
//!
//! A retrieval request is routed to one of three fetch strategies by testing
//! its full URL against ordered pattern groups; the first group with a match
//! wins and unmatched URLs fall back to network-first. Independently, the
//! path extension picks the store a fetched response is written into.

use std::sync::LazyLock;

use regex::RegexSet;
use serde::{Deserialize, Serialize};
use swcache_core::StoreKind;
use url::Url;

use crate::fetch::Request;

/// How a single request combines the network with the stores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Strategy {
    CacheFirst,
    NetworkFirst,
    StaleWhileRevalidate,
}

impl std::fmt::Display for Strategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Strategy::CacheFirst => write!(f, "cacheFirst"),
            Strategy::NetworkFirst => write!(f, "networkFirst"),
            Strategy::StaleWhileRevalidate => write!(f, "staleWhileRevalidate"),
        }
    }
}

/// Static files and font hosts.
const CACHE_FIRST: &[&str] = &[
    r"\.(?:js|css|woff2?|png|jpg|jpeg|svg|gif|webp|avif)$",
    r"fonts\.googleapis\.com",
    r"fonts\.gstatic\.com",
];

/// API paths and the scheduling/messaging hosts.
const NETWORK_FIRST: &[&str] = &[r"/api/", r"calendly\.com", r"wa\.me"];

/// HTML documents and directory-style paths, including the root.
const STALE_WHILE_REVALIDATE: &[&str] = &[r"\.(?:html)$", r"/$"];

static ROUTES: LazyLock<[(Strategy, RegexSet); 3]> = LazyLock::new(|| {
    [
        (Strategy::CacheFirst, RegexSet::new(CACHE_FIRST).expect("cache-first patterns are valid")),
        (Strategy::NetworkFirst, RegexSet::new(NETWORK_FIRST).expect("network-first patterns are valid")),
        (
            Strategy::StaleWhileRevalidate,
            RegexSet::new(STALE_WHILE_REVALIDATE).expect("stale-while-revalidate patterns are valid"),
        ),
    ]
});

/// Classify a URL. Groups are tested in order: cache-first, network-first,
/// stale-while-revalidate. Nothing matched means network-first.
pub fn classify(url: &Url) -> Strategy {
    ROUTES
        .iter()
        .find(|(_, patterns)| patterns.is_match(url.as_str()))
        .map(|(strategy, _)| *strategy)
        .unwrap_or(Strategy::NetworkFirst)
}

/// What the dispatcher does with a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// Not a retrieval request; goes to the network untouched.
    PassThrough,
    Intercept(Strategy),
}

pub fn route(request: &Request) -> Route {
    if request.is_retrieval() { Route::Intercept(classify(&request.url)) } else { Route::PassThrough }
}

/// Store a successful response for `url` is written into.
///
/// Decided by the path extension only, so it is orthogonal to [`classify`].
pub fn store_kind_for(url: &Url) -> StoreKind {
    let file = url.path().rsplit('/').next().unwrap_or_default();
    let extension = file.rsplit_once('.').map(|(_, ext)| ext.to_ascii_lowercase());

    match extension.as_deref() {
        Some("png" | "jpg" | "jpeg" | "svg" | "gif" | "webp" | "avif") => StoreKind::Image,
        Some("js" | "css" | "woff" | "woff2") => StoreKind::Static,
        _ => StoreKind::Dynamic,
    }
}
