//! Worker lifecycle.
//!
//! `parsed → installing → installed → activating → activated`, with
//! `redundant` as the terminal state of a failed install.
//!
//! Install pre-caches the critical and static resource lists and opens the
//! image store, then asks to skip waiting. Activate deletes every store that is
//! not one of the four current-version stores and claims the open clients.
//! Maintenance messages and background sync run independently of the state.

use std::sync::atomic::{AtomicBool, Ordering};

use futures_util::future::join_all;
use serde::{Deserialize, Serialize};
use swcache_core::{AppConfig, CacheKey, Error, InstallPolicy, ResponseSnapshot, StoreKind};
use tokio::sync::RwLock;
use url::Url;

use crate::fetch::{Request, resolve};
use crate::strategy::Strategies;

/// Sync tag that triggers a refresh of the critical resources.
pub const SYNC_TAG: &str = "background-sync";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerState {
    Parsed,
    Installing,
    Installed,
    Activating,
    Activated,
    Redundant,
}

impl std::fmt::Display for WorkerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            WorkerState::Parsed => "parsed",
            WorkerState::Installing => "installing",
            WorkerState::Installed => "installed",
            WorkerState::Activating => "activating",
            WorkerState::Activated => "activated",
            WorkerState::Redundant => "redundant",
        };
        f.write_str(name)
    }
}

/// Maintenance commands posted by the page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Message {
    CleanCache,
    PreloadResources { urls: Vec<String> },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum MessageOutcome {
    /// Not a recognized command.
    Ignored,
    Cleaned { deleted: Vec<String> },
    Preloaded { stored: usize, failed: usize },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SyncOutcome {
    Ignored,
    Synced(PrecacheReport),
    Failed { reason: String },
}

/// Resources fetched on install, resolved against the origin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrecacheManifest {
    pub critical: Vec<Url>,
    pub static_assets: Vec<Url>,
}

impl PrecacheManifest {
    pub fn from_config(origin: &Url, config: &AppConfig) -> Result<Self, Error> {
        let resolve_all = |paths: &[String]| {
            paths
                .iter()
                .map(|path| {
                    resolve(origin, path).map_err(|e| Error::InvalidUrl(format!("{path}: {e}")))
                })
                .collect::<Result<Vec<_>, _>>()
        };

        Ok(Self {
            critical: resolve_all(&config.critical_resources)?,
            static_assets: resolve_all(&config.static_resources)?,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PrecacheReport {
    pub store: String,
    pub stored: usize,
    /// URLs that failed or returned a non-2xx status.
    pub failed: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InstallReport {
    pub critical: PrecacheReport,
    pub static_assets: PrecacheReport,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActivateReport {
    pub deleted: Vec<String>,
}

pub struct LifecycleManager {
    strategies: Strategies,
    manifest: PrecacheManifest,
    origin: Url,
    policy: InstallPolicy,
    state: RwLock<WorkerState>,
    skip_waiting: AtomicBool,
    clients_claimed: AtomicBool,
}

impl LifecycleManager {
    pub fn new(strategies: Strategies, manifest: PrecacheManifest, origin: Url, policy: InstallPolicy) -> Self {
        Self {
            strategies,
            manifest,
            origin,
            policy,
            state: RwLock::new(WorkerState::Parsed),
            skip_waiting: AtomicBool::new(false),
            clients_claimed: AtomicBool::new(false),
        }
    }

    pub async fn state(&self) -> WorkerState {
        *self.state.read().await
    }

    /// Whether open clients route their requests through this worker.
    pub fn controls_clients(&self) -> bool {
        self.clients_claimed.load(Ordering::SeqCst)
    }

    /// Install, then activate straight away if install asked to skip waiting.
    pub async fn start(&self) -> Result<(InstallReport, Option<ActivateReport>), Error> {
        let installed = self.install().await?;
        let activated =
            if self.skip_waiting.load(Ordering::SeqCst) { Some(self.activate().await?) } else { None };
        Ok((installed, activated))
    }

    pub async fn install(&self) -> Result<InstallReport, Error> {
        self.transition(WorkerState::Parsed, WorkerState::Installing).await?;

        let names = self.strategies.names();
        let critical_name = names.name(StoreKind::Critical);
        let static_name = names.name(StoreKind::Static);
        let image_name = names.name(StoreKind::Image);

        let (critical, static_assets, images) = tokio::join!(
            self.precache(&critical_name, &self.manifest.critical),
            self.precache(&static_name, &self.manifest.static_assets),
            self.strategies.db().open_store(&image_name),
        );

        let report = match (critical, static_assets, images) {
            (Ok(critical), Ok(static_assets), Ok(_)) => InstallReport { critical, static_assets },
            (Err(e), _, _) | (_, Err(e), _) | (_, _, Err(e)) => {
                tracing::warn!("install failed: {}", e);
                self.set_state(WorkerState::Redundant).await;
                return Err(e);
            }
        };

        self.set_state(WorkerState::Installed).await;
        self.skip_waiting.store(true, Ordering::SeqCst);

        tracing::info!(
            critical = report.critical.stored,
            static_assets = report.static_assets.stored,
            "installed worker version {}",
            names.version()
        );

        Ok(report)
    }

    pub async fn activate(&self) -> Result<ActivateReport, Error> {
        self.transition(WorkerState::Installed, WorkerState::Activating).await?;

        let names = self.strategies.names();
        let deleted = match self.delete_stores(|name| !names.is_current(name)).await {
            Ok(deleted) => deleted,
            Err(e) => {
                tracing::warn!("activation failed: {}", e);
                self.set_state(WorkerState::Installed).await;
                return Err(e);
            }
        };

        self.clients_claimed.store(true, Ordering::SeqCst);
        self.set_state(WorkerState::Activated).await;

        tracing::info!(deleted = deleted.len(), "activated worker version {}", names.version());

        Ok(ActivateReport { deleted })
    }

    /// Handle a message posted by the page. Anything that is not a known command is ignored.
    pub async fn post_message(&self, data: &serde_json::Value) -> Result<MessageOutcome, Error> {
        match serde_json::from_value::<Message>(data.clone()) {
            Ok(message) => self.handle_message(message).await,
            Err(e) => {
                tracing::debug!("ignoring message {}: {}", data, e);
                Ok(MessageOutcome::Ignored)
            }
        }
    }

    pub async fn handle_message(&self, message: Message) -> Result<MessageOutcome, Error> {
        match message {
            Message::CleanCache => Ok(MessageOutcome::Cleaned { deleted: self.clean_old_caches().await? }),
            Message::PreloadResources { urls } => {
                let (stored, failed) = self.preload_resources(&urls).await?;
                Ok(MessageOutcome::Preloaded { stored, failed })
            }
        }
    }

    /// Delete every store whose name lacks the current version marker.
    pub async fn clean_old_caches(&self) -> Result<Vec<String>, Error> {
        let names = self.strategies.names();
        let deleted = self.delete_stores(|name| !names.carries_version(name)).await?;
        tracing::info!(deleted = deleted.len(), "cleaned old caches");
        Ok(deleted)
    }

    /// Fetch each URL and store the successful ones in the static store.
    ///
    /// Best effort: a failing URL is counted and skipped. Returns `(stored, failed)`.
    pub async fn preload_resources(&self, urls: &[String]) -> Result<(usize, usize), Error> {
        let store = self.strategies.db().open_store(&self.strategies.names().name(StoreKind::Static)).await?;
        let store = &store;

        let attempts = join_all(urls.iter().map(|raw| async move {
            let url = resolve(&self.origin, raw).map_err(|e| e.to_string())?;
            let request = Request::get(url);
            let response = self.strategies.fetch(&request).await.map_err(|e| e.to_string())?;
            if !response.is_ok() {
                return Err(format!("status {}", response.status));
            }
            store
                .put(&request.cache_key(), &response)
                .await
                .map_err(|e| e.to_string())
        }))
        .await;

        let mut stored = 0;
        let mut failed = 0;
        for (raw, attempt) in urls.iter().zip(attempts) {
            match attempt {
                Ok(()) => stored += 1,
                Err(reason) => {
                    tracing::debug!("preload of {} skipped: {}", raw, reason);
                    failed += 1;
                }
            }
        }

        Ok((stored, failed))
    }

    /// Handle a background-sync event. Only [`SYNC_TAG`] refreshes the critical resources.
    pub async fn background_sync(&self, tag: &str) -> SyncOutcome {
        if tag != SYNC_TAG {
            tracing::debug!("ignoring sync tag {}", tag);
            return SyncOutcome::Ignored;
        }

        let critical_name = self.strategies.names().name(StoreKind::Critical);
        match self.precache(&critical_name, &self.manifest.critical).await {
            Ok(report) => SyncOutcome::Synced(report),
            Err(e) => {
                tracing::warn!("background sync failed: {}", e);
                SyncOutcome::Failed { reason: e.to_string() }
            }
        }
    }

    /// Fetch `urls` and write them into `store_name` under the configured policy.
    async fn precache(&self, store_name: &str, urls: &[Url]) -> Result<PrecacheReport, Error> {
        let store = self.strategies.db().open_store(store_name).await?;

        let responses = join_all(urls.iter().map(|url| async move {
            let request = Request::get(url.clone());
            let result = self.strategies.fetch(&request).await;
            (request, result)
        }))
        .await;

        let mut fetched: Vec<(CacheKey, ResponseSnapshot)> = Vec::new();
        let mut failed = Vec::new();
        let mut reasons = Vec::new();
        for (request, result) in responses {
            match result {
                Ok(response) if response.is_ok() => fetched.push((request.cache_key(), response)),
                Ok(response) => {
                    reasons.push(format!("{}: status {}", request.url, response.status));
                    failed.push(request.url.to_string());
                }
                Err(e) => {
                    reasons.push(format!("{}: {}", request.url, e));
                    failed.push(request.url.to_string());
                }
            }
        }

        if !failed.is_empty() {
            if self.policy == InstallPolicy::AllOrNothing {
                return Err(Error::InstallFailed(format!("{store_name}: {}", reasons.join("; "))));
            }
            for reason in &reasons {
                tracing::warn!(store = store_name, "pre-cache skipped {}", reason);
            }
        }

        let stored = fetched.len();
        if !fetched.is_empty() {
            store.put_all(fetched).await?;
        }

        Ok(PrecacheReport { store: store_name.to_string(), stored, failed })
    }

    async fn delete_stores(&self, doomed: impl Fn(&str) -> bool) -> Result<Vec<String>, Error> {
        let db = self.strategies.db();
        let mut deleted = Vec::new();
        for name in db.keys().await? {
            if doomed(&name) && db.delete_store(&name).await? {
                tracing::debug!("deleted store {}", name);
                deleted.push(name);
            }
        }
        Ok(deleted)
    }

    async fn transition(&self, from: WorkerState, to: WorkerState) -> Result<(), Error> {
        let mut state = self.state.write().await;
        if *state != from {
            return Err(Error::InvalidState(format!("cannot move to {to} from {}", *state)));
        }
        *state = to;
        tracing::debug!("worker state {} -> {}", from, to);
        Ok(())
    }

    async fn set_state(&self, to: WorkerState) {
        let mut state = self.state.write().await;
        tracing::debug!("worker state {} -> {}", *state, to);
        *state = to;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::testing::{StubNetwork, strategies, url};
    use swcache_core::CacheDb;

    const ROOT: &str = "https://example.com/";
    const MAIN: &str = "https://example.com/src/main.tsx";
    const HEADER: &str = "https://example.com/src/components/Header.tsx";

    fn manifest() -> PrecacheManifest {
        PrecacheManifest { critical: vec![url(ROOT), url(MAIN)], static_assets: vec![url(HEADER)] }
    }

    async fn manager(network: Arc<StubNetwork>, policy: InstallPolicy) -> (CacheDb, LifecycleManager) {
        let (db, strategies) = strategies(network).await;
        let manager = LifecycleManager::new(strategies, manifest(), url(ROOT), policy);
        (db, manager)
    }

    fn healthy_network() -> Arc<StubNetwork> {
        Arc::new(
            StubNetwork::new()
                .respond(ROOT, 200, "shell")
                .respond(MAIN, 200, "main")
                .respond(HEADER, 200, "header"),
        )
    }

    #[tokio::test]
    async fn test_install_precaches_and_opens_image_store() {
        let (db, manager) = manager(healthy_network(), InstallPolicy::BestEffort).await;

        let report = manager.install().await.unwrap();
        assert_eq!(report.critical.stored, 2);
        assert_eq!(report.static_assets.stored, 1);
        assert_eq!(manager.state().await, WorkerState::Installed);
        assert!(!manager.controls_clients());

        let critical = db.open_store("iafy-critical-v3").await.unwrap();
        let shell = critical.get(&CacheKey::get(ROOT)).await.unwrap().unwrap();
        assert_eq!(shell.text(), "shell");
        assert!(db.has_store("iafy-images-v3").await.unwrap());
    }

    #[tokio::test]
    async fn test_best_effort_install_skips_failures() {
        let network = Arc::new(StubNetwork::new().respond(ROOT, 200, "shell").respond(MAIN, 500, "boom").fail(HEADER));
        let (db, manager) = manager(network, InstallPolicy::BestEffort).await;

        let report = manager.install().await.unwrap();
        assert_eq!(report.critical.stored, 1);
        assert_eq!(report.critical.failed, vec![MAIN.to_string()]);
        assert_eq!(report.static_assets.failed, vec![HEADER.to_string()]);
        assert_eq!(manager.state().await, WorkerState::Installed);

        let critical = db.open_store("iafy-critical-v3").await.unwrap();
        assert_eq!(critical.len().await.unwrap(), 1);
        assert!(critical.get(&CacheKey::get(MAIN)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_all_or_nothing_install_fails_and_stores_nothing() {
        let network =
            Arc::new(StubNetwork::new().respond(ROOT, 200, "shell").fail(MAIN).respond(HEADER, 200, "header"));
        let (db, manager) = manager(network, InstallPolicy::AllOrNothing).await;

        let result = manager.install().await;
        assert!(matches!(result, Err(Error::InstallFailed(_))));
        assert_eq!(manager.state().await, WorkerState::Redundant);

        let critical = db.open_store("iafy-critical-v3").await.unwrap();
        assert_eq!(critical.len().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_start_activates_and_deletes_stale_stores() {
        let (db, manager) = manager(healthy_network(), InstallPolicy::BestEffort).await;
        db.open_store("iafy-static-v2").await.unwrap();
        db.open_store("iafy-dynamic-v3").await.unwrap();
        db.open_store("unrelated").await.unwrap();

        let (_, activated) = manager.start().await.unwrap();
        let activated = activated.unwrap();

        assert_eq!(activated.deleted, vec!["iafy-static-v2".to_string(), "unrelated".to_string()]);
        assert_eq!(manager.state().await, WorkerState::Activated);
        assert!(manager.controls_clients());

        let mut keys = db.keys().await.unwrap();
        keys.sort();
        assert_eq!(keys, vec!["iafy-critical-v3", "iafy-dynamic-v3", "iafy-images-v3", "iafy-static-v3"]);
        let dynamic = db.open_store("iafy-dynamic-v3").await.unwrap();
        assert_eq!(dynamic.len().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_out_of_order_transitions_are_rejected() {
        let (_db, manager) = manager(healthy_network(), InstallPolicy::BestEffort).await;

        assert!(matches!(manager.activate().await, Err(Error::InvalidState(_))));
        assert_eq!(manager.state().await, WorkerState::Parsed);

        manager.install().await.unwrap();
        assert!(matches!(manager.install().await, Err(Error::InvalidState(_))));
        assert_eq!(manager.state().await, WorkerState::Installed);
    }

    #[tokio::test]
    async fn test_clean_cache_deletes_stores_without_version_marker() {
        let (db, manager) = manager(healthy_network(), InstallPolicy::BestEffort).await;
        for name in ["iafy-static-v2", "iafy-static-v30", "iafy-images-v3", "thirdparty-v3"] {
            db.open_store(name).await.unwrap();
        }

        let outcome = manager.post_message(&serde_json::json!({ "type": "CLEAN_CACHE" })).await.unwrap();
        assert_eq!(
            outcome,
            MessageOutcome::Cleaned { deleted: vec!["iafy-static-v2".to_string(), "iafy-static-v30".to_string()] }
        );

        let keys = db.keys().await.unwrap();
        assert_eq!(keys, vec!["iafy-images-v3", "thirdparty-v3"]);
    }

    #[tokio::test]
    async fn test_preload_stores_successes_in_static_store() {
        let network = Arc::new(
            StubNetwork::new()
                .respond("https://example.com/a.js", 200, "a")
                .respond("https://cdn.example.net/b.css", 200, "b")
                .respond("https://example.com/missing.js", 404, "nope"),
        );
        let (db, manager) = manager(network, InstallPolicy::BestEffort).await;

        let message = serde_json::json!({
            "type": "PRELOAD_RESOURCES",
            "urls": ["/a.js", "https://cdn.example.net/b.css", "/missing.js", "/down.js"],
        });
        let outcome = manager.post_message(&message).await.unwrap();
        assert_eq!(outcome, MessageOutcome::Preloaded { stored: 2, failed: 2 });

        let store = db.open_store("iafy-static-v3").await.unwrap();
        assert_eq!(store.len().await.unwrap(), 2);
        let b = store.get(&CacheKey::get("https://cdn.example.net/b.css")).await.unwrap().unwrap();
        assert_eq!(b.text(), "b");
    }

    #[tokio::test]
    async fn test_unknown_messages_are_ignored() {
        let network = healthy_network();
        let (_db, manager) = manager(network.clone(), InstallPolicy::BestEffort).await;

        for message in [
            serde_json::json!({ "type": "SKIP_WAITING" }),
            serde_json::json!({ "type": "PRELOAD_RESOURCES" }),
            serde_json::json!("CLEAN_CACHE"),
            serde_json::json!(null),
        ] {
            assert_eq!(manager.post_message(&message).await.unwrap(), MessageOutcome::Ignored);
        }
        assert_eq!(network.calls(), 0);
    }

    #[tokio::test]
    async fn test_background_sync_refreshes_critical_resources() {
        let network = healthy_network();
        let (db, manager) = manager(network.clone(), InstallPolicy::BestEffort).await;
        manager.start().await.unwrap();

        network.set_response(ROOT, 200, "new shell");
        let outcome = manager.background_sync(SYNC_TAG).await;
        match outcome {
            SyncOutcome::Synced(report) => assert_eq!(report.stored, 2),
            other => panic!("unexpected outcome: {other:?}"),
        }

        let critical = db.open_store("iafy-critical-v3").await.unwrap();
        let shell = critical.get(&CacheKey::get(ROOT)).await.unwrap().unwrap();
        assert_eq!(shell.text(), "new shell");
    }

    #[tokio::test]
    async fn test_background_sync_ignores_other_tags() {
        let network = healthy_network();
        let (_db, manager) = manager(network.clone(), InstallPolicy::BestEffort).await;

        assert_eq!(manager.background_sync("periodic-refresh").await, SyncOutcome::Ignored);
        assert_eq!(network.calls(), 0);
    }

    #[tokio::test]
    async fn test_background_sync_failure_is_reported_not_raised() {
        let network = Arc::new(StubNetwork::new().respond(ROOT, 200, "shell"));
        let (_db, manager) = manager(network, InstallPolicy::AllOrNothing).await;

        assert!(matches!(manager.background_sync(SYNC_TAG).await, SyncOutcome::Failed { .. }));
    }

    #[test]
    fn test_manifest_resolves_paths_against_origin() {
        let config = AppConfig {
            critical_resources: vec!["/".to_string(), "/src/main.tsx".to_string()],
            static_resources: vec!["https://cdn.example.net/lib.js".to_string()],
            ..AppConfig::default()
        };

        let manifest = PrecacheManifest::from_config(&url("https://example.com"), &config).unwrap();
        assert_eq!(manifest.critical, vec![url(ROOT), url(MAIN)]);
        assert_eq!(manifest.static_assets, vec![url("https://cdn.example.net/lib.js")]);
    }

    #[test]
    fn test_message_wire_format() {
        let message: Message =
            serde_json::from_value(serde_json::json!({ "type": "PRELOAD_RESOURCES", "urls": ["/a.js"] })).unwrap();
        assert_eq!(message, Message::PreloadResources { urls: vec!["/a.js".to_string()] });

        let outcome = serde_json::to_value(MessageOutcome::Cleaned { deleted: vec![] }).unwrap();
        assert_eq!(outcome, serde_json::json!({ "outcome": "cleaned", "deleted": [] }));
    }
}
