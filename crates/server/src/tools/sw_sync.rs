//! sw_sync tool implementation.
//!
//! Fires a background-sync event at the worker.

use rmcp::{
    ErrorData as McpError,
    model::{CallToolResult, Content},
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use swcache_core::Error;

use crate::worker::Worker;

/// Parameters for the sw_sync tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SwSyncParams {
    /// Sync tag. Only `background-sync` refreshes the critical resources.
    pub tag: String,
}

/// Implementation of the sw_sync tool.
///
/// A failed refresh is reported in the outcome, never as a tool error.
pub async fn sync_impl(worker: &Worker, params: SwSyncParams) -> Result<CallToolResult, McpError> {
    let outcome = worker.lifecycle.background_sync(&params.tag).await;
    let json = serde_json::to_string_pretty(&outcome)
        .map_err(|e| Error::InvalidInput(format!("Failed to serialize outcome: {e}")))?;

    Ok(CallToolResult::success(vec![Content::text(json)]))
}
