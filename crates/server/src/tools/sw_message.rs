//! sw_message tool implementation.
//!
//! Posts a maintenance message to the worker.

use rmcp::{
    ErrorData as McpError,
    model::{CallToolResult, Content},
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use swcache_core::Error;

use crate::worker::Worker;

/// Parameters for the sw_message tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SwMessageParams {
    /// Message type: `CLEAN_CACHE` or `PRELOAD_RESOURCES`. Other types are ignored.
    #[serde(rename = "type")]
    pub kind: String,

    /// URLs to preload, absolute or relative to the worker origin.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub urls: Option<Vec<String>>,
}

/// Implementation of the sw_message tool.
pub async fn message_impl(worker: &Worker, params: SwMessageParams) -> Result<CallToolResult, McpError> {
    let data = serde_json::to_value(&params)
        .map_err(|e| Error::InvalidInput(format!("Failed to encode message: {e}")))?;

    let outcome = worker.lifecycle.post_message(&data).await?;
    let json = serde_json::to_string_pretty(&outcome)
        .map_err(|e| Error::InvalidInput(format!("Failed to serialize outcome: {e}")))?;

    Ok(CallToolResult::success(vec![Content::text(json)]))
}
