//! The assembled cache layer
//!
//! A `Worker` owns one dispatcher and one lifecycle manager over shared
//! stores and network. It tracks the version lifecycle and exposes the
//! three entry points a host drives: lifecycle events, intercepted
//! requests and control messages.

use crate::background::BackgroundTasks;
use crate::classify::Classifier;
use crate::config::Config;
use crate::dispatch::{Interception, InterceptionDispatcher};
use crate::error::{RelayError, RelayResult};
use crate::fetch::{Fetcher, HttpFetcher, RequestDescriptor};
use crate::lifecycle::{
    ActivateReport, Clients, ControlMessage, InstallReport, LifecycleManager, MessageOutcome,
};
use crate::store::CacheRegistry;
use crate::strategy::StrategyContext;
use serde::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info};

/// Version lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkerState {
    Parsed,
    Installing,
    Installed,
    Activating,
    Activated,
}

impl fmt::Display for WorkerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Parsed => "parsed",
            Self::Installing => "installing",
            Self::Installed => "installed",
            Self::Activating => "activating",
            Self::Activated => "activated",
        };
        write!(f, "{}", name)
    }
}

/// One running instance of the cache layer
pub struct Worker {
    config: Arc<Config>,
    state: Mutex<WorkerState>,
    skip_waiting: AtomicBool,
    registry: CacheRegistry,
    dispatcher: InterceptionDispatcher,
    lifecycle: LifecycleManager,
    background: BackgroundTasks,
}

impl Worker {
    /// Assemble a worker over the given stores and network
    pub fn new(config: Config, registry: CacheRegistry, fetcher: Arc<dyn Fetcher>) -> Self {
        let config = Arc::new(config);
        let background = BackgroundTasks::new();
        let ctx = StrategyContext::new(config.clone(), registry.clone(), fetcher, background.clone());
        let classifier = Classifier::from_config(&config);

        Self {
            dispatcher: InterceptionDispatcher::new(ctx.clone(), classifier.clone()),
            lifecycle: LifecycleManager::new(ctx, classifier, Clients::new()),
            config,
            state: Mutex::new(WorkerState::Parsed),
            skip_waiting: AtomicBool::new(false),
            registry,
            background,
        }
    }

    /// Worker over the configured backend and the real network
    pub fn from_config(config: Config) -> RelayResult<Self> {
        config.validate()?;
        let fetcher = HttpFetcher::new(Duration::from_millis(config.timeouts.fetch_ms));
        let registry = CacheRegistry::from_config(&config);
        debug!(
            "Worker using {} stores and {} network",
            registry.backend_name(),
            fetcher.name()
        );
        Ok(Self::new(config, registry, Arc::new(fetcher)))
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn registry(&self) -> &CacheRegistry {
        &self.registry
    }

    pub fn clients(&self) -> &Clients {
        self.lifecycle.clients()
    }

    pub async fn state(&self) -> WorkerState {
        *self.state.lock().await
    }

    /// Run the install event. Always asks to skip waiting.
    pub async fn install(&self) -> RelayResult<InstallReport> {
        self.enter(WorkerState::Parsed, WorkerState::Installing, "install")
            .await?;

        match self.lifecycle.install().await {
            Ok(report) => {
                self.skip_waiting.store(true, Ordering::SeqCst);
                self.set_state(WorkerState::Installed).await;
                Ok(report)
            }
            Err(e) => {
                self.set_state(WorkerState::Parsed).await;
                Err(e)
            }
        }
    }

    /// Run the activate event
    pub async fn activate(&self) -> RelayResult<ActivateReport> {
        self.enter(WorkerState::Installed, WorkerState::Activating, "activate")
            .await?;

        match self.lifecycle.activate().await {
            Ok(report) => {
                self.set_state(WorkerState::Activated).await;
                Ok(report)
            }
            Err(e) => {
                self.set_state(WorkerState::Installed).await;
                Err(e)
            }
        }
    }

    /// Install, then activate straight away if skip-waiting was requested
    pub async fn start(&self) -> RelayResult<(InstallReport, Option<ActivateReport>)> {
        let installed = self.install().await?;
        let activated = if self.skip_waiting.load(Ordering::SeqCst) {
            Some(self.activate().await?)
        } else {
            None
        };
        Ok((installed, activated))
    }

    /// Treat stores left by an earlier run as a completed install
    pub async fn resume_installed(&self) {
        let mut state = self.state.lock().await;
        if *state == WorkerState::Parsed {
            *state = WorkerState::Installed;
        }
    }

    /// Offer an outgoing request
    pub async fn fetch(&self, request: &RequestDescriptor) -> Interception {
        self.dispatcher.handle(request).await
    }

    /// Deliver a control message
    pub async fn message(&self, message: ControlMessage) -> RelayResult<MessageOutcome> {
        let outcome = self.lifecycle.handle_message(message).await?;
        if outcome == MessageOutcome::SkipWaiting {
            self.skip_waiting.store(true, Ordering::SeqCst);
            if self.state().await == WorkerState::Installed {
                info!("Skip waiting requested, activating");
                self.activate().await?;
            }
        }
        Ok(outcome)
    }

    /// Wait for all background work started by any handler
    pub async fn wait_until_idle(&self) -> usize {
        self.background.drain().await
    }

    async fn enter(&self, from: WorkerState, to: WorkerState, action: &str) -> RelayResult<()> {
        let mut state = self.state.lock().await;
        if *state != from {
            return Err(RelayError::InvalidTransition {
                action: action.to_string(),
                state: state.to_string(),
            });
        }
        info!("Worker {} -> {}", *state, to);
        *state = to;
        Ok(())
    }

    async fn set_state(&self, next: WorkerState) {
        let mut state = self.state.lock().await;
        info!("Worker {} -> {}", *state, next);
        *state = next;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStorage;
    use crate::testing::{production_config, MockFetcher};
    use url::Url;

    fn worker() -> (Worker, Arc<MockFetcher>) {
        let net = Arc::new(MockFetcher::new());
        let registry = CacheRegistry::new(Arc::new(MemoryStorage::new()), vec![]);
        (Worker::new(production_config(), registry, net.clone()), net)
    }

    #[tokio::test]
    async fn start_installs_then_activates() {
        let (worker, _net) = worker();
        assert_eq!(worker.state().await, WorkerState::Parsed);

        let (_, activated) = worker.start().await.unwrap();
        assert!(activated.is_some());
        assert_eq!(worker.state().await, WorkerState::Activated);
    }

    #[tokio::test]
    async fn activate_before_install_is_rejected() {
        let (worker, _net) = worker();
        let err = worker.activate().await.unwrap_err();
        assert!(matches!(err, RelayError::InvalidTransition { .. }));
        assert_eq!(worker.state().await, WorkerState::Parsed);
    }

    #[tokio::test]
    async fn skip_waiting_activates_installed_worker() {
        let (worker, _net) = worker();
        worker.install().await.unwrap();
        assert_eq!(worker.state().await, WorkerState::Installed);

        worker.message(ControlMessage::SkipWaiting).await.unwrap();
        assert_eq!(worker.state().await, WorkerState::Activated);
    }

    #[tokio::test]
    async fn activation_leaves_exactly_the_version_set() {
        let (worker, _net) = worker();
        let key = crate::store::CacheKey::get(&Url::parse("https://shop.example.org/").unwrap());
        worker
            .registry()
            .put("relay-main-v0", &key, crate::fetch::Response::not_found())
            .await;

        worker.start().await.unwrap();
        let names: std::collections::BTreeSet<String> =
            worker.registry().list_names().await.unwrap().into_iter().collect();
        assert_eq!(names, worker.config().version_set());
    }

    #[tokio::test]
    async fn resumed_activation_on_fresh_backend_matches_version_set() {
        let (worker, _net) = worker();
        worker.resume_installed().await;
        worker.activate().await.unwrap();

        assert_eq!(worker.state().await, WorkerState::Activated);
        let names: std::collections::BTreeSet<String> =
            worker.registry().list_names().await.unwrap().into_iter().collect();
        assert_eq!(names, worker.config().version_set());
    }

    #[tokio::test]
    async fn offline_navigation_after_install_serves_root() {
        let (worker, net) = worker();
        net.respond("https://shop.example.org/", 200, b"<html>app shell</html>");
        worker.start().await.unwrap();
        net.go_offline();

        let nav = RequestDescriptor::navigate(Url::parse("https://shop.example.org/team").unwrap());
        let response = worker.fetch(&nav).await.into_response().unwrap();
        assert_eq!(response.text(), "<html>app shell</html>");
        assert!(response.is_from_cache());
    }
}
