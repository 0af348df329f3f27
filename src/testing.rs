//! Test doubles shared by unit tests

use crate::background::BackgroundTasks;
use crate::config::Config;
use crate::error::{RelayError, RelayResult};
use crate::fetch::{Fetcher, Headers, RequestDescriptor, Response};
use crate::store::{CacheKey, CacheRegistry, CacheStorage, Entry, MemoryStorage};
use crate::strategy::StrategyContext;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Clone)]
struct Route {
    status: u16,
    headers: Headers,
    body: Vec<u8>,
    delay: Duration,
    /// Attempts that fail before the route starts answering
    failures_left: usize,
}

/// Scripted network: unknown URLs behave as if offline
#[derive(Default)]
pub struct MockFetcher {
    routes: Mutex<HashMap<String, Route>>,
    log: Mutex<Vec<RequestDescriptor>>,
}

impl MockFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(&self, url: &str, status: u16, body: &[u8]) -> &Self {
        self.respond_after(url, status, body, Duration::ZERO)
    }

    pub fn respond_after(&self, url: &str, status: u16, body: &[u8], delay: Duration) -> &Self {
        self.routes.lock().unwrap().insert(
            url.to_string(),
            Route {
                status,
                headers: Headers::new(),
                body: body.to_vec(),
                delay,
                failures_left: 0,
            },
        );
        self
    }

    /// Refuse the next `times` requests to an already scripted URL
    pub fn fail_first(&self, url: &str, times: usize) -> &Self {
        if let Some(route) = self.routes.lock().unwrap().get_mut(url) {
            route.failures_left = times;
        }
        self
    }

    /// Drop every route, so all requests fail
    pub fn go_offline(&self) {
        self.routes.lock().unwrap().clear();
    }

    /// Every request seen, in order
    pub fn requests(&self) -> Vec<RequestDescriptor> {
        self.log.lock().unwrap().clone()
    }

    /// How many times a URL was requested
    pub fn count(&self, url: &str) -> usize {
        self.log
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.url.as_str() == url)
            .count()
    }
}

#[async_trait]
impl Fetcher for MockFetcher {
    async fn fetch(&self, request: &RequestDescriptor) -> RelayResult<Response> {
        self.log.lock().unwrap().push(request.clone());
        let route = {
            let mut routes = self.routes.lock().unwrap();
            match routes.get_mut(request.url.as_str()) {
                Some(route) if route.failures_left > 0 => {
                    route.failures_left -= 1;
                    return Err(RelayError::network(request.url.as_str(), "connection refused"));
                }
                Some(route) => route.clone(),
                None => return Err(RelayError::network(request.url.as_str(), "offline")),
            }
        };

        if !route.delay.is_zero() {
            tokio::time::sleep(route.delay).await;
        }

        Ok(Response::new(route.status, route.headers, route.body))
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}

/// Backend whose every operation fails
pub struct FailingStorage;

#[async_trait]
impl CacheStorage for FailingStorage {
    async fn open(&self, store: &str) -> RelayResult<()> {
        Err(RelayError::storage(store, "unavailable"))
    }

    async fn get(&self, store: &str, _key: &CacheKey) -> RelayResult<Option<Entry>> {
        Err(RelayError::storage(store, "unavailable"))
    }

    async fn put(&self, store: &str, _key: &CacheKey, _entry: Entry) -> RelayResult<()> {
        Err(RelayError::storage(store, "unavailable"))
    }

    async fn delete_store(&self, store: &str) -> RelayResult<bool> {
        Err(RelayError::storage(store, "unavailable"))
    }

    async fn list_names(&self) -> RelayResult<Vec<String>> {
        Err(RelayError::storage("*", "unavailable"))
    }

    async fn keys(&self, store: &str) -> RelayResult<Vec<CacheKey>> {
        Err(RelayError::storage(store, "unavailable"))
    }

    fn backend_name(&self) -> &'static str {
        "failing"
    }
}

/// Production-context configuration on an in-memory backend
pub fn production_config() -> Config {
    let mut config = Config::default();
    config.origin.url = "https://shop.example.org/".to_string();
    config.stores.backend = crate::config::BackendKind::Memory;
    config.prewarm.enabled = false;
    config
}

/// Strategy context over fresh in-memory stores and a scripted network
pub fn strategy_context() -> (StrategyContext, Arc<MockFetcher>) {
    let config = Arc::new(production_config());
    let fetcher = Arc::new(MockFetcher::new());
    let registry = CacheRegistry::new(Arc::new(MemoryStorage::new()), vec![]);
    let ctx = StrategyContext::new(config, registry, fetcher.clone(), BackgroundTasks::new());
    (ctx, fetcher)
}

/// Lifecycle manager sharing the scripted network of `strategy_context`
pub fn lifecycle_manager() -> (crate::lifecycle::LifecycleManager, Arc<MockFetcher>) {
    let (ctx, fetcher) = strategy_context();
    let classifier = crate::classify::Classifier::from_config(&ctx.config);
    let manager = crate::lifecycle::LifecycleManager::new(
        ctx,
        classifier,
        crate::lifecycle::Clients::new(),
    );
    (manager, fetcher)
}
