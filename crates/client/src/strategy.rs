//! Fetch strategies.
//!
//! Each strategy combines at most one network attempt with reads from and
//! writes to the stores:
//!
//! - **cache-first**: answer from the stores; on a miss fetch once and store.
//! - **network-first**: fetch once and store; on a transport failure answer
//!   from the stores.
//! - **stale-while-revalidate**: answer from the stores while a background
//!   fetch refreshes them; on a miss wait for that fetch.
//!
//! Only 2xx responses are written. A non-2xx response is still returned as-is;
//! only transport failures (including the timeout) fall back to the stores or
//! the synthetic `Offline` 503 response. Store errors propagate to the caller.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use swcache_core::{CacheDb, CacheStore, Error, ResponseSnapshot, StoreNames};
use tokio::task::JoinHandle;

use crate::fetch::{Network, NetworkError, Request};
use crate::route::{Strategy, store_kind_for};

/// Where a returned response came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseSource {
    Cache,
    Network,
    /// Synthetic `Offline` 503.
    Offline,
    /// Cached application shell served by the dispatcher's catch-all.
    Fallback,
}

/// Result of running a strategy.
#[derive(Debug)]
pub struct Handled {
    pub response: ResponseSnapshot,
    pub source: ResponseSource,
    /// Background refresh started by stale-while-revalidate when it answered from a store.
    /// Resolves to the network response, or `None` if the attempt failed.
    pub revalidation: Option<JoinHandle<Option<ResponseSnapshot>>>,
}

impl Handled {
    pub fn new(response: ResponseSnapshot, source: ResponseSource) -> Self {
        Self { response, source, revalidation: None }
    }

    fn offline(request: &Request) -> Self {
        Self::new(ResponseSnapshot::offline(request.url.as_str()), ResponseSource::Offline)
    }
}

/// The three strategies over a shared set of stores and one network.
#[derive(Clone)]
pub struct Strategies {
    db: CacheDb,
    names: StoreNames,
    network: Arc<dyn Network>,
    timeout: Duration,
}

impl Strategies {
    pub fn new(db: CacheDb, names: StoreNames, network: Arc<dyn Network>, timeout: Duration) -> Self {
        Self { db, names, network, timeout }
    }

    pub fn db(&self) -> &CacheDb {
        &self.db
    }

    pub fn names(&self) -> &StoreNames {
        &self.names
    }

    pub async fn run(&self, strategy: Strategy, request: &Request) -> Result<Handled, Error> {
        match strategy {
            Strategy::CacheFirst => self.cache_first(request).await,
            Strategy::NetworkFirst => self.network_first(request).await,
            Strategy::StaleWhileRevalidate => self.stale_while_revalidate(request).await,
        }
    }

    pub async fn cache_first(&self, request: &Request) -> Result<Handled, Error> {
        let key = request.cache_key();
        if let Some(cached) = self.db.match_any(&key).await? {
            tracing::debug!("cache hit for {}", key);
            return Ok(Handled::new(cached, ResponseSource::Cache));
        }

        match self.fetch(request).await {
            Ok(response) => {
                self.store_if_ok(request, &response).await?;
                Ok(Handled::new(response, ResponseSource::Network))
            }
            Err(e) => {
                tracing::debug!("cache miss and network failed for {}: {}", key, e);
                Ok(Handled::offline(request))
            }
        }
    }

    pub async fn network_first(&self, request: &Request) -> Result<Handled, Error> {
        match self.fetch(request).await {
            Ok(response) => {
                self.store_if_ok(request, &response).await?;
                Ok(Handled::new(response, ResponseSource::Network))
            }
            Err(e) => {
                let key = request.cache_key();
                tracing::debug!("network failed for {}, trying stores: {}", key, e);
                match self.db.match_any(&key).await? {
                    Some(cached) => Ok(Handled::new(cached, ResponseSource::Cache)),
                    None => Ok(Handled::offline(request)),
                }
            }
        }
    }

    pub async fn stale_while_revalidate(&self, request: &Request) -> Result<Handled, Error> {
        let key = request.cache_key();
        let cached = self.db.match_any(&key).await?;
        let revalidation = self.spawn_revalidation(request.clone());

        if let Some(cached) = cached {
            tracing::debug!("serving stale {} while revalidating", key);
            return Ok(Handled { response: cached, source: ResponseSource::Cache, revalidation: Some(revalidation) });
        }

        match revalidation.await {
            Ok(Some(response)) => Ok(Handled::new(response, ResponseSource::Network)),
            Ok(None) => Ok(Handled::offline(request)),
            Err(e) => {
                tracing::warn!("revalidation task for {} failed: {}", key, e);
                Ok(Handled::offline(request))
            }
        }
    }

    /// Store handle a response for `request` is written into.
    pub async fn store_for(&self, request: &Request) -> Result<CacheStore, Error> {
        let name = self.names.name(store_kind_for(&request.url));
        self.db.open_store(&name).await
    }

    /// One network attempt bounded by the configured timeout.
    pub async fn fetch(&self, request: &Request) -> Result<ResponseSnapshot, NetworkError> {
        match tokio::time::timeout(self.timeout, self.network.fetch(request)).await {
            Ok(result) => result,
            Err(_) => Err(NetworkError::Timeout(self.timeout)),
        }
    }

    /// Write `response` into the request's store if its status is 2xx.
    ///
    /// Returns whether a write happened.
    pub async fn store_if_ok(&self, request: &Request, response: &ResponseSnapshot) -> Result<bool, Error> {
        if !response.is_ok() {
            tracing::debug!("not caching {} (status {})", request.url, response.status);
            return Ok(false);
        }

        let store = self.store_for(request).await?;
        store.put(&request.cache_key(), response).await?;
        Ok(true)
    }

    fn spawn_revalidation(&self, request: Request) -> JoinHandle<Option<ResponseSnapshot>> {
        let strategies = self.clone();
        tokio::spawn(async move {
            match strategies.fetch(&request).await {
                Ok(response) => {
                    if let Err(e) = strategies.store_if_ok(&request, &response).await {
                        tracing::warn!("failed to store revalidated {}: {}", request.url, e);
                    }
                    Some(response)
                }
                Err(e) => {
                    tracing::debug!("revalidation of {} failed: {}", request.url, e);
                    None
                }
            }
        })
    }
}
