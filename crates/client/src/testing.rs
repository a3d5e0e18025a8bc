//! Test doubles shared by the worker test modules.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use swcache_core::{CacheDb, ResponseSnapshot, StoreNames};

use crate::fetch::{Network, NetworkError, Request};
use crate::strategy::Strategies;

#[derive(Debug, Clone)]
enum Reply {
    Respond { status: u16, body: String },
    Fail,
}

/// Scripted network: replies per URL, counts every attempt.
/// URLs without a scripted reply fail like an unreachable host.
#[derive(Debug, Default)]
pub(crate) struct StubNetwork {
    replies: Mutex<HashMap<String, Reply>>,
    calls: AtomicUsize,
    delay: Option<Duration>,
}

impl StubNetwork {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn respond(self, url: &str, status: u16, body: &str) -> Self {
        self.set_response(url, status, body);
        self
    }

    pub(crate) fn fail(self, url: &str) -> Self {
        self.replies.lock().unwrap().insert(url.to_string(), Reply::Fail);
        self
    }

    pub(crate) fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub(crate) fn set_response(&self, url: &str, status: u16, body: &str) {
        self.replies
            .lock()
            .unwrap()
            .insert(url.to_string(), Reply::Respond { status, body: body.to_string() });
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl Network for StubNetwork {
    async fn fetch(&self, request: &Request) -> Result<ResponseSnapshot, NetworkError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let reply = self.replies.lock().unwrap().get(request.url.as_str()).cloned();
        match reply {
            Some(Reply::Respond { status, body }) => Ok(ResponseSnapshot::new(
                request.url.as_str(),
                status,
                vec![("content-type".to_string(), "text/plain".to_string())],
                body,
            )),
            Some(Reply::Fail) | None => Err(NetworkError::Connect(format!("unreachable: {}", request.url))),
        }
    }
}

pub(crate) fn names() -> StoreNames {
    StoreNames::new("iafy", "v3")
}

pub(crate) fn url(s: &str) -> url::Url {
    url::Url::parse(s).unwrap()
}

/// Strategies over a fresh in-memory database.
pub(crate) async fn strategies(network: Arc<StubNetwork>) -> (CacheDb, Strategies) {
    strategies_with_timeout(network, Duration::from_secs(2)).await
}

pub(crate) async fn strategies_with_timeout(network: Arc<StubNetwork>, timeout: Duration) -> (CacheDb, Strategies) {
    let db = CacheDb::open_in_memory().await.unwrap();
    let strategies = Strategies::new(db.clone(), names(), network, timeout);
    (db, strategies)
}

pub(crate) fn ok(url: &str, body: &str) -> ResponseSnapshot {
    ResponseSnapshot::new(url, 200, vec![("content-type".to_string(), "text/plain".to_string())], body)
}
