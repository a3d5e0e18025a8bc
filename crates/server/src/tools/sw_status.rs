//! sw_status tool implementation.
//!
//! Reports the lifecycle state and every store in the database.

use rmcp::{
    ErrorData as McpError,
    model::{CallToolResult, Content},
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use swcache_client::WorkerState;
use swcache_core::Error;

use crate::worker::Worker;

/// Parameters for the sw_status tool.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct SwStatusParams {}

#[derive(Debug, Clone, Serialize)]
pub struct StoreStatus {
    pub name: String,
    pub entries: u64,
    /// One of the four stores of the running version.
    pub current: bool,
}

/// Output from the sw_status tool.
#[derive(Debug, Clone, Serialize)]
pub struct SwStatusOutput {
    pub state: WorkerState,
    pub version: String,
    pub controls_clients: bool,
    pub stores: Vec<StoreStatus>,
}

/// Implementation of the sw_status tool.
pub async fn status_impl(worker: &Worker, _params: SwStatusParams) -> Result<CallToolResult, McpError> {
    let names = worker.dispatcher.strategies().names();
    let db = worker.db();

    let mut stores = Vec::new();
    for name in db.keys().await? {
        let entries = db.open_store(&name).await?.len().await?;
        let current = names.is_current(&name);
        stores.push(StoreStatus { name, entries, current });
    }

    let output = SwStatusOutput {
        state: worker.lifecycle.state().await,
        version: names.version().to_string(),
        controls_clients: worker.lifecycle.controls_clients(),
        stores,
    };

    let json = serde_json::to_string_pretty(&output)
        .map_err(|e| Error::InvalidInput(format!("Failed to serialize status: {e}")))?;

    Ok(CallToolResult::success(vec![Content::text(json)]))
}
