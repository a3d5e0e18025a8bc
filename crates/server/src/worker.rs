//! The worker instance hosted by the server.

use std::sync::Arc;

use swcache_client::{Dispatcher, LifecycleManager, Network, PrecacheManifest, Strategies};
use swcache_core::{AppConfig, CacheDb, Error};
use url::Url;

/// Dispatcher and lifecycle sharing one set of stores and one network.
pub struct Worker {
    pub dispatcher: Dispatcher,
    pub lifecycle: LifecycleManager,
    pub origin: Url,
}

impl Worker {
    pub fn new(db: CacheDb, network: Arc<dyn Network>, config: &AppConfig) -> Result<Self, Error> {
        let origin = Url::parse(&config.origin).map_err(|e| Error::InvalidUrl(format!("{}: {e}", config.origin)))?;
        let manifest = PrecacheManifest::from_config(&origin, config)?;
        let strategies = Strategies::new(db, config.store_names(), network, config.timeout());

        Ok(Self {
            dispatcher: Dispatcher::new(strategies.clone(), &origin),
            lifecycle: LifecycleManager::new(strategies, manifest, origin.clone(), config.install_policy),
            origin,
        })
    }

    pub fn db(&self) -> &CacheDb {
        self.dispatcher.strategies().db()
    }
}
