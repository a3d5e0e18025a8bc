//! cache_match tool implementation.
//!
//! Looks up a cached response by request URL.

use rmcp::{
    ErrorData as McpError,
    model::{CallToolResult, Content},
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use swcache_client::fetch::resolve;
use swcache_core::{CacheKey, Error};

use crate::worker::Worker;

/// Parameters for the cache_match tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheMatchParams {
    /// Request URL, absolute or relative to the worker origin.
    pub url: String,

    /// Only search this store. Every store is searched when absent.
    #[serde(default)]
    pub store: Option<String>,
}

/// Output from the cache_match tool.
#[derive(Debug, Clone, Serialize)]
pub struct CacheMatchOutput {
    pub url: String,
    pub status: u16,
    pub content_type: Option<String>,
    pub body: String,
}

/// Implementation of the cache_match tool.
pub async fn match_impl(worker: &Worker, params: CacheMatchParams) -> Result<CallToolResult, McpError> {
    let url = resolve(&worker.origin, &params.url).map_err(|e| Error::InvalidUrl(format!("{}: {e}", params.url)))?;
    let key = CacheKey::get(url.as_str());
    let db = worker.db();

    let found = match &params.store {
        Some(name) if !db.has_store(name).await? => None,
        Some(name) => db.open_store(name).await?.get(&key).await?,
        None => db.match_any(&key).await?,
    };
    let response = found.ok_or_else(|| Error::CacheMiss(key.to_string()))?;

    let output = CacheMatchOutput {
        content_type: response.content_type().map(str::to_string),
        body: response.text(),
        url: response.url,
        status: response.status,
    };
    let json = serde_json::to_string_pretty(&output)
        .map_err(|e| Error::InvalidInput(format!("Failed to serialize entry: {e}")))?;

    Ok(CallToolResult::success(vec![Content::text(json)]))
}
