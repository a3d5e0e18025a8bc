//! Request dispatcher.
//!
//! Entry point for every request the page issues. Non-retrieval requests are
//! handed back for pass-through; retrieval requests are classified and run
//! through the matching strategy. Any error escaping a strategy (a store that
//! cannot be opened or written) is absorbed here: the page gets the cached
//! application shell if there is one, otherwise the `Offline` 503 response.

use swcache_core::{CacheKey, ResponseSnapshot};
use url::Url;

use crate::fetch::Request;
use crate::route::{Route, Strategy, route};
use crate::strategy::{Handled, ResponseSource, Strategies};

/// Outcome of dispatching one request.
#[derive(Debug)]
pub enum Dispatch {
    /// Not intercepted; the caller sends the request to the network itself.
    PassThrough,
    Respond { strategy: Strategy, handled: Handled },
}

#[derive(Clone)]
pub struct Dispatcher {
    strategies: Strategies,
    shell: CacheKey,
}

impl Dispatcher {
    /// `origin` locates the application shell (`/`) used by the catch-all.
    pub fn new(strategies: Strategies, origin: &Url) -> Self {
        let mut shell = origin.clone();
        shell.set_path("/");
        shell.set_query(None);
        shell.set_fragment(None);

        Self { strategies, shell: CacheKey::get(shell.as_str()) }
    }

    pub fn strategies(&self) -> &Strategies {
        &self.strategies
    }

    pub async fn dispatch(&self, request: &Request) -> Dispatch {
        let strategy = match route(request) {
            Route::PassThrough => {
                tracing::debug!("passing through {} {}", request.method, request.url);
                return Dispatch::PassThrough;
            }
            Route::Intercept(strategy) => strategy,
        };

        let handled = match self.strategies.run(strategy, request).await {
            Ok(handled) => handled,
            Err(e) => {
                tracing::warn!("{} failed for {}: {}", strategy, request.url, e);
                self.fallback(request).await
            }
        };

        Dispatch::Respond { strategy, handled }
    }

    async fn fallback(&self, request: &Request) -> Handled {
        match self.strategies.db().match_any(&self.shell).await {
            Ok(Some(shell)) => Handled::new(shell, ResponseSource::Fallback),
            Ok(None) => Handled::new(ResponseSnapshot::offline(request.url.as_str()), ResponseSource::Offline),
            Err(e) => {
                tracing::warn!("application shell lookup failed: {}", e);
                Handled::new(ResponseSnapshot::offline(request.url.as_str()), ResponseSource::Offline)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{StubNetwork, ok, strategies, url};
    use reqwest::Method;
    use std::sync::Arc;

    const ORIGIN: &str = "https://example.com";

    fn respond(dispatch: Dispatch) -> (Strategy, Handled) {
        match dispatch {
            Dispatch::Respond { strategy, handled } => (strategy, handled),
            Dispatch::PassThrough => panic!("expected an intercepted response"),
        }
    }

    #[tokio::test]
    async fn test_non_retrieval_passes_through() {
        let network = Arc::new(StubNetwork::new());
        let (_db, strategies) = strategies(network.clone()).await;
        let dispatcher = Dispatcher::new(strategies, &url(ORIGIN));

        let request = Request::new(Method::POST, url("https://example.com/api/leads"));
        assert!(matches!(dispatcher.dispatch(&request).await, Dispatch::PassThrough));
        assert_eq!(network.calls(), 0);
    }

    #[tokio::test]
    async fn test_dispatch_uses_classified_strategy() {
        let network = Arc::new(StubNetwork::new().respond("https://example.com/api/roi", 200, "42"));
        let (_db, strategies) = strategies(network).await;
        let dispatcher = Dispatcher::new(strategies, &url(ORIGIN));

        let (strategy, handled) = respond(dispatcher.dispatch(&Request::get(url("https://example.com/api/roi"))).await);
        assert_eq!(strategy, Strategy::NetworkFirst);
        assert_eq!(handled.response.text(), "42");
    }

    #[tokio::test]
    async fn test_fallback_prefers_cached_shell() {
        let network = Arc::new(StubNetwork::new());
        let (db, strategies) = strategies(network).await;
        let critical = db.open_store("iafy-critical-v3").await.unwrap();
        critical
            .put(&CacheKey::get("https://example.com/"), &ok("https://example.com/", "<html>shell</html>"))
            .await
            .unwrap();

        let dispatcher = Dispatcher::new(strategies, &url("https://example.com/landing?ref=ad#top"));
        let handled = dispatcher.fallback(&Request::get(url("https://example.com/logo.png"))).await;

        assert_eq!(handled.source, ResponseSource::Fallback);
        assert_eq!(handled.response.text(), "<html>shell</html>");
    }

    #[tokio::test]
    async fn test_fallback_without_shell_is_offline() {
        let network = Arc::new(StubNetwork::new());
        let (_db, strategies) = strategies(network).await;
        let dispatcher = Dispatcher::new(strategies, &url(ORIGIN));

        let handled = dispatcher.fallback(&Request::get(url("https://example.com/logo.png"))).await;
        assert_eq!(handled.source, ResponseSource::Offline);
        assert_eq!(handled.response.status, 503);
    }

    #[tokio::test]
    async fn test_store_failure_is_absorbed() {
        let network = Arc::new(StubNetwork::new().respond("https://example.com/logo.png", 200, "png"));
        let (db, strategies) = strategies(network).await;
        let dispatcher = Dispatcher::new(strategies, &url(ORIGIN));
        db.close().await.unwrap();

        let (strategy, handled) =
            respond(dispatcher.dispatch(&Request::get(url("https://example.com/logo.png"))).await);

        assert_eq!(strategy, Strategy::CacheFirst);
        assert_eq!(handled.source, ResponseSource::Offline);
        assert_eq!(handled.response.status, 503);
        assert_eq!(handled.response.text(), "Offline");
    }
}
