//! Test doubles for the tool modules.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use rmcp::model::CallToolResult;
use swcache_client::{Network, NetworkError, Request};
use swcache_core::{AppConfig, CacheDb, ResponseSnapshot};

use crate::worker::Worker;

pub(crate) const ORIGIN: &str = "https://example.com";

/// Scripted replies per URL; anything unscripted is unreachable.
#[derive(Debug, Default)]
pub(crate) struct StubNetwork {
    replies: Mutex<HashMap<String, (u16, String)>>,
}

impl StubNetwork {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn respond(self, url: &str, status: u16, body: &str) -> Self {
        self.replies.lock().unwrap().insert(url.to_string(), (status, body.to_string()));
        self
    }

    pub(crate) fn fail(&self, url: &str) {
        self.replies.lock().unwrap().remove(url);
    }
}

#[async_trait::async_trait]
impl Network for StubNetwork {
    async fn fetch(&self, request: &Request) -> Result<ResponseSnapshot, NetworkError> {
        let reply = self.replies.lock().unwrap().get(request.url.as_str()).cloned();
        match reply {
            Some((status, body)) => Ok(ResponseSnapshot::new(request.url.as_str(), status, vec![], body)),
            None => Err(NetworkError::Connect(format!("unreachable: {}", request.url))),
        }
    }
}

/// A worker over an in-memory database with empty precache lists.
pub(crate) async fn test_worker(network: Arc<StubNetwork>) -> (CacheDb, Worker) {
    let config = AppConfig {
        origin: ORIGIN.to_string(),
        critical_resources: vec![],
        static_resources: vec![],
        ..AppConfig::default()
    };
    let db = CacheDb::open_in_memory().await.unwrap();
    let worker = Worker::new(db.clone(), network, &config).unwrap();
    (db, worker)
}

/// Parse the JSON text content of a tool result.
pub(crate) fn result_json(result: &CallToolResult) -> serde_json::Value {
    let content = serde_json::to_value(&result.content[0]).unwrap();
    let text = content.get("text").and_then(|v| v.as_str()).unwrap();
    serde_json::from_str(text).unwrap()
}
