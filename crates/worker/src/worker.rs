//! The service worker: lifecycle events in, responses out.

use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use swcache_client::Network;
use swcache_client::fetch::url::resolve;
use swcache_core::{CacheKey, CacheRole, CacheStore, Error, Partition, PartitionNames, Request, Response, WorkerConfig};
use url::Url;

use crate::classify::{Decision, Route, RoutingRules, StrategyKind};
use crate::lifecycle::{ActivateReport, LifecycleState, PrecacheReport, precache, purge_stale_partitions};
use crate::offline::{gateway_offline, offline_page};
use crate::strategy::{CacheFirstOptions, Strategies, is_cacheable, read_entry, write_entry};
use crate::tasks::BackgroundTasks;

/// The host cannot preload navigations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("navigation preload is not supported by this host")]
pub struct PreloadUnsupported;

/// Capabilities the embedding environment gives the worker.
#[async_trait]
pub trait Host: Send + Sync {
    /// Let this worker replace the active one without waiting for clients to close.
    async fn skip_waiting(&self);

    /// Take control of already open clients.
    async fn claim_clients(&self);

    /// Start preloading navigations in parallel with worker dispatch.
    async fn enable_navigation_preload(&self) -> Result<(), PreloadUnsupported> {
        Err(PreloadUnsupported)
    }
}

/// Commands accepted on the message channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlMessage {
    SkipWaiting,
}

impl ControlMessage {
    pub fn parse(message: &str) -> Option<Self> {
        match message.trim() {
            "SKIP_WAITING" => Some(Self::SkipWaiting),
            _ => None,
        }
    }
}

/// An intercepted request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchEvent {
    pub request: Request,
    /// Response the host already preloaded for a navigation, if any.
    pub preload: Option<Response>,
}

impl FetchEvent {
    pub fn new(request: Request) -> Self {
        Self { request, preload: None }
    }

    pub fn with_preload(mut self, response: Response) -> Self {
        self.preload = Some(response);
        self
    }
}

/// Events a host delivers to a worker.
#[async_trait]
pub trait LifecycleHandler: Send + Sync {
    async fn on_install(&self) -> Result<PrecacheReport, Error>;

    async fn on_activate(&self) -> Result<ActivateReport, Error>;

    /// `None` leaves the request to the host's default handling.
    async fn on_fetch(&self, event: FetchEvent) -> Option<Response>;

    /// Returns whether the message was understood.
    async fn on_message(&self, message: &str) -> bool;
}

/// Caching worker for one scope and one cache generation.
pub struct ServiceWorker {
    config: WorkerConfig,
    scope: Url,
    precache: Vec<Url>,
    shell_document: Url,
    names: PartitionNames,
    rules: RoutingRules,
    store: Arc<dyn CacheStore>,
    network: Arc<dyn Network>,
    host: Arc<dyn Host>,
    tasks: Arc<BackgroundTasks>,
    strategies: Strategies,
    state: Mutex<LifecycleState>,
}

impl ServiceWorker {
    /// Build a worker from validated configuration.
    ///
    /// # Errors
    ///
    /// `Error::InvalidUrl` if the scope or a precache path does not resolve,
    /// `Error::Config` if a routing pattern does not compile.
    pub fn new(
        config: WorkerConfig, store: Arc<dyn CacheStore>, network: Arc<dyn Network>, host: Arc<dyn Host>,
    ) -> Result<Self, Error> {
        let scope = config.scope_url().map_err(|e| Error::InvalidUrl(e.to_string()))?;
        let precache = config
            .precache
            .iter()
            .map(|path| resolve(&scope, path))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| Error::InvalidUrl(e.to_string()))?;
        let shell_document = resolve(&scope, &config.shell_document).map_err(|e| Error::InvalidUrl(e.to_string()))?;
        let rules = RoutingRules::new(&config, &scope)?;
        let tasks = Arc::new(BackgroundTasks::new());
        let strategies = Strategies::new(store.clone(), network.clone(), tasks.clone());

        Ok(Self {
            names: config.partition_names(),
            config,
            scope,
            precache,
            shell_document,
            rules,
            store,
            network,
            host,
            tasks,
            strategies,
            state: Mutex::new(LifecycleState::Parsed),
        })
    }

    pub fn state(&self) -> LifecycleState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_state(&self, state: LifecycleState) {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = state;
        tracing::debug!(state = state.as_str(), "lifecycle transition");
    }

    /// Move to `next` if the current state is one of `from`, returning the
    /// state it left. Check and move happen under one lock.
    fn transition(&self, from: &[LifecycleState], next: LifecycleState) -> Result<LifecycleState, Error> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let previous = *state;
        if !from.contains(&previous) {
            return Err(Error::InvalidState(format!("cannot move to {} from {}", next.as_str(), previous.as_str())));
        }
        *state = next;
        drop(state);
        tracing::debug!(state = next.as_str(), "lifecycle transition");
        Ok(previous)
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    pub fn scope(&self) -> &Url {
        &self.scope
    }

    pub fn partitions(&self) -> &PartitionNames {
        &self.names
    }

    pub fn rules(&self) -> &RoutingRules {
        &self.rules
    }

    /// Wait for background revalidation and eviction to finish.
    pub async fn settle(&self) {
        self.tasks.settle().await;
    }

    async fn open(&self, role: CacheRole) -> Partition {
        let name = self.names.name(role);
        match self.store.open(&name).await {
            Ok(partition) => partition,
            Err(err) => {
                tracing::warn!(partition = %name, error = %err, "failed to open partition");
                Partition::new(name)
            }
        }
    }

    async fn respond(&self, decision: Decision, event: FetchEvent) -> Response {
        let request = &event.request;
        let Some(role) = decision.role else {
            return self.strategies.network_only(request).await;
        };
        if decision.route == Route::Navigation {
            return self.navigate(event).await;
        }

        let partition = self.open(role).await;
        match decision.strategy {
            StrategyKind::NetworkOnly => self.strategies.network_only(request).await,
            StrategyKind::NetworkFirst => self
                .strategies
                .network_first(request, &partition)
                .await
                .unwrap_or_else(gateway_offline),
            StrategyKind::StaleWhileRevalidate => self.strategies.stale_while_revalidate(request, &partition).await,
            StrategyKind::CacheFirst => {
                let options = if role == CacheRole::Media {
                    CacheFirstOptions {
                        max_age: self.config.media_max_age(),
                        ceiling: Some(self.config.media_ceiling),
                        accept_opaque: true,
                    }
                } else {
                    CacheFirstOptions::default()
                };
                self.strategies.cache_first(request, &partition, options).await
            }
        }
    }

    /// Network first for documents. A fresh document replaces the cached
    /// shell document; offline, the shell document stands in for any page.
    async fn navigate(&self, event: FetchEvent) -> Response {
        if let Some(preload) = event.preload {
            tracing::debug!(url = %event.request.url, "using preloaded navigation response");
            return preload;
        }

        let request = &event.request;
        let partition = self.open(CacheRole::Shell).await;
        let shell_key = CacheKey::new("GET", self.shell_document.clone());

        match self.network.fetch(request).await {
            Ok(response) => {
                if is_cacheable(&response, false) {
                    write_entry(self.store.as_ref(), &partition, &shell_key, &response).await;
                }
                response
            }
            Err(err) => {
                tracing::debug!(url = %request.url, error = %err, "navigation offline, serving shell");
                match read_entry(self.store.as_ref(), &partition, &shell_key).await {
                    Some(hit) => hit.response,
                    None => offline_page(&self.config.app_name),
                }
            }
        }
    }
}

impl std::fmt::Debug for ServiceWorker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceWorker")
            .field("scope", &self.scope.as_str())
            .field("generation", &self.names.generation())
            .field("state", &self.state())
            .finish()
    }
}

#[async_trait]
impl LifecycleHandler for ServiceWorker {
    /// Precache the shell partition, then ask the host to skip waiting.
    async fn on_install(&self) -> Result<PrecacheReport, Error> {
        self.transition(&[LifecycleState::Parsed, LifecycleState::Redundant], LifecycleState::Installing)?;

        let partition = self.open(CacheRole::Shell).await;
        let report = match precache(
            self.store.as_ref(),
            self.network.as_ref(),
            &partition,
            &self.precache,
            self.config.precache_policy,
        )
        .await
        {
            Ok(report) => report,
            Err(err) => {
                tracing::error!(generation = self.names.generation(), error = %err, "install failed");
                self.set_state(LifecycleState::Redundant);
                return Err(err);
            }
        };

        self.set_state(LifecycleState::Installed);
        self.host.skip_waiting().await;
        tracing::info!(generation = self.names.generation(), stored = report.stored.len(), "installed");
        Ok(report)
    }

    /// Enable preload, drop every partition outside the current generation,
    /// then claim open clients.
    async fn on_activate(&self) -> Result<ActivateReport, Error> {
        let previous =
            self.transition(&[LifecycleState::Installed, LifecycleState::Activated], LifecycleState::Activating)?;

        let preload_enabled = if self.config.navigation_preload {
            match self.host.enable_navigation_preload().await {
                Ok(()) => true,
                Err(err) => {
                    tracing::debug!(error = %err, "navigation preload unavailable");
                    false
                }
            }
        } else {
            false
        };

        let (deleted, kept) = match purge_stale_partitions(self.store.as_ref(), &self.names.keep_set()).await {
            Ok(result) => result,
            Err(err) => {
                self.set_state(previous);
                return Err(err);
            }
        };

        self.host.claim_clients().await;
        self.set_state(LifecycleState::Activated);
        tracing::info!(generation = self.names.generation(), deleted = deleted.len(), "activated");

        Ok(ActivateReport { deleted, kept, preload_enabled })
    }

    async fn on_fetch(&self, event: FetchEvent) -> Option<Response> {
        if self.state() != LifecycleState::Activated {
            return None;
        }
        let decision = self.rules.classify(&event.request)?;
        tracing::debug!(
            url = %event.request.url,
            route = decision.route.as_str(),
            strategy = decision.strategy.as_str(),
            "intercepted"
        );
        Some(self.respond(decision, event).await)
    }

    async fn on_message(&self, message: &str) -> bool {
        match ControlMessage::parse(message) {
            Some(ControlMessage::SkipWaiting) => {
                self.host.skip_waiting().await;
                true
            }
            None => {
                tracing::debug!(msg = message, "ignoring unknown message");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use swcache_client::StubNetwork;
    use swcache_core::MemoryStore;

    #[derive(Default)]
    struct CountingHost {
        skips: AtomicUsize,
        claims: AtomicUsize,
    }

    #[async_trait]
    impl Host for CountingHost {
        async fn skip_waiting(&self) {
            self.skips.fetch_add(1, Ordering::SeqCst);
        }

        async fn claim_clients(&self) {
            self.claims.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn config() -> WorkerConfig {
        WorkerConfig {
            scope: "https://app.example.com/".into(),
            precache: vec!["./index.html".into()],
            ..Default::default()
        }
    }

    fn worker(network: &StubNetwork, host: Arc<CountingHost>) -> ServiceWorker {
        ServiceWorker::new(config(), Arc::new(MemoryStore::new()), Arc::new(network.clone()), host).unwrap()
    }

    #[test]
    fn test_control_message_parse() {
        assert_eq!(ControlMessage::parse("SKIP_WAITING"), Some(ControlMessage::SkipWaiting));
        assert_eq!(ControlMessage::parse(" SKIP_WAITING\n"), Some(ControlMessage::SkipWaiting));
        assert_eq!(ControlMessage::parse("skip_waiting"), None);
    }

    #[test]
    fn test_invalid_scope_rejected() {
        let config = WorkerConfig { scope: "not a url".into(), ..Default::default() };
        let network = StubNetwork::new();
        let result = ServiceWorker::new(
            config,
            Arc::new(MemoryStore::new()),
            Arc::new(network),
            Arc::new(CountingHost::default()),
        );
        assert!(matches!(result, Err(Error::InvalidUrl(_))));
    }

    #[tokio::test]
    async fn test_lifecycle_transitions() {
        let network = StubNetwork::new();
        network.route("https://app.example.com/index.html", Response::new(200, "index"));
        let host = Arc::new(CountingHost::default());
        let sw = worker(&network, host.clone());

        assert_eq!(sw.state(), LifecycleState::Parsed);
        assert!(matches!(sw.on_activate().await, Err(Error::InvalidState(_))));

        sw.on_install().await.unwrap();
        assert_eq!(sw.state(), LifecycleState::Installed);
        assert_eq!(host.skips.load(Ordering::SeqCst), 1);

        let report = sw.on_activate().await.unwrap();
        assert!(!report.preload_enabled);
        assert_eq!(sw.state(), LifecycleState::Activated);
        assert_eq!(host.claims.load(Ordering::SeqCst), 1);

        assert!(matches!(sw.on_install().await, Err(Error::InvalidState(_))));
    }

    #[tokio::test]
    async fn test_concurrent_install_runs_once() {
        let network = StubNetwork::new();
        network.route("https://app.example.com/index.html", Response::new(200, "index"));
        let host = Arc::new(CountingHost::default());
        let sw = worker(&network, host.clone());

        let (a, b) = tokio::join!(sw.on_install(), sw.on_install());
        assert_ne!(a.is_ok(), b.is_ok());
        assert!(matches!(a.err().or(b.err()), Some(Error::InvalidState(_))));
        assert_eq!(sw.state(), LifecycleState::Installed);
        assert_eq!(host.skips.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_no_interception_before_activation() {
        let network = StubNetwork::new();
        let sw = worker(&network, Arc::new(CountingHost::default()));
        let event = FetchEvent::new(Request::get(Url::parse("https://app.example.com/app.js").unwrap()));
        assert_eq!(sw.on_fetch(event).await, None);
        assert_eq!(network.calls(), 0);
    }

    #[tokio::test]
    async fn test_preloaded_navigation_is_used() {
        let network = StubNetwork::new();
        network.route("https://app.example.com/index.html", Response::new(200, "index"));
        let sw = worker(&network, Arc::new(CountingHost::default()));
        sw.on_install().await.unwrap();
        sw.on_activate().await.unwrap();
        let before = network.calls();

        let event = FetchEvent::new(Request::navigate(Url::parse("https://app.example.com/feed").unwrap()))
            .with_preload(Response::new(200, "preloaded"));
        let resp = sw.on_fetch(event).await.unwrap();
        assert_eq!(resp.body, "preloaded");
        assert_eq!(network.calls(), before);
    }

    #[tokio::test]
    async fn test_unknown_message_ignored() {
        let host = Arc::new(CountingHost::default());
        let sw = worker(&StubNetwork::new(), host.clone());
        assert!(!sw.on_message("RELOAD").await);
        assert!(sw.on_message("SKIP_WAITING").await);
        assert_eq!(host.skips.load(Ordering::SeqCst), 1);
    }
}
