//! Per-class response strategies
//!
//! Each strategy turns a request into a response, consulting and filling
//! one store. An `Err` from `execute` means the strategy gave up without a
//! fallback of its own; the dispatcher decides what to serve instead.

mod cache_first;
mod generic;
mod network;
mod timeout;

pub use generic::navigation_fallback;
pub use network::placeholder_for;

use crate::background::BackgroundTasks;
use crate::classify::ResourceClass;
use crate::config::{Config, StoreKind};
use crate::dispatch::PendingFetchContext;
use crate::error::{RelayError, RelayResult};
use crate::fetch::{Fetcher, RequestDescriptor, Response};
use crate::rewrite::RequestRewriter;
use crate::store::CacheRegistry;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Response algorithm applied to a class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Strategy {
    CacheFirst,
    CacheFirstTimeoutFormatFallback,
    NetworkFirstCacheFallback,
    NetworkOnlyNoCache,
    NavigationFallback,
    GenericCacheThenNetwork,
}

impl Strategy {
    /// The fixed class to strategy mapping
    pub fn for_class(class: ResourceClass) -> Self {
        match class {
            ResourceClass::StaticAsset | ResourceClass::Navigation | ResourceClass::Default => {
                Self::GenericCacheThenNetwork
            }
            ResourceClass::Font | ResourceClass::GenericImage => Self::CacheFirst,
            ResourceClass::TeamImage => Self::CacheFirstTimeoutFormatFallback,
            ResourceClass::ExternalAllowlisted | ResourceClass::PaymentVendor => {
                Self::NetworkFirstCacheFallback
            }
            ResourceClass::PaymentApi => Self::NetworkOnlyNoCache,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CacheFirst => "cache-first",
            Self::CacheFirstTimeoutFormatFallback => "cache-first-timeout-format-fallback",
            Self::NetworkFirstCacheFallback => "network-first-cache-fallback",
            Self::NetworkOnlyNoCache => "network-only",
            Self::NavigationFallback => "navigation-fallback",
            Self::GenericCacheThenNetwork => "cache-then-network",
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Everything a strategy needs, cheap to clone into background tasks
#[derive(Clone)]
pub struct StrategyContext {
    pub config: Arc<Config>,
    pub registry: CacheRegistry,
    pub fetcher: Arc<dyn Fetcher>,
    pub rewriter: RequestRewriter,
    pub background: BackgroundTasks,
}

impl StrategyContext {
    pub fn new(
        config: Arc<Config>,
        registry: CacheRegistry,
        fetcher: Arc<dyn Fetcher>,
        background: BackgroundTasks,
    ) -> Self {
        let rewriter = RequestRewriter::from_config(&config);
        Self {
            config,
            registry,
            fetcher,
            rewriter,
            background,
        }
    }

    pub fn store_name(&self, kind: StoreKind) -> String {
        self.config.store_name(kind)
    }

    /// Store backing a class
    pub fn store_for(&self, class: ResourceClass) -> RelayResult<String> {
        class
            .store_kind()
            .map(|kind| self.store_name(kind))
            .ok_or_else(|| RelayError::Internal(format!("class {} has no store", class)))
    }

    /// One network attempt: HTTPS-normalised and bounded by the fetch ceiling
    pub async fn network(&self, request: &RequestDescriptor) -> RelayResult<Response> {
        let secure = self.rewriter.build_secure_request(request);
        let ceiling = Duration::from_millis(self.config.timeouts.fetch_ms);
        match tokio::time::timeout(ceiling, self.fetcher.fetch(&secure)).await {
            Ok(result) => result,
            Err(_) => Err(RelayError::Timeout {
                url: secure.url.to_string(),
                millis: self.config.timeouts.fetch_ms,
            }),
        }
    }

    /// Fetch `request` and keep a copy in `store` when it is cacheable.
    /// Returns the response only if it was a 200.
    pub async fn fetch_and_store(
        &self,
        request: &RequestDescriptor,
        store: &str,
    ) -> RelayResult<Response> {
        let response = self.network(request).await?;
        if !is_cacheable(request, &response) {
            return Err(RelayError::network(
                request.url.as_str(),
                format!("status {}", response.status),
            ));
        }
        let key = self.registry.key_for(request);
        self.registry.put(store, &key, response.clone()).await;
        Ok(response)
    }

    /// Cached root document from the main store
    pub async fn root_document(&self) -> Option<Response> {
        let url = self.config.root_document_url().ok()?;
        let key = self.registry.key_for(&RequestDescriptor::get(url));
        self.registry
            .get(&self.store_name(StoreKind::Main), &key)
            .await
    }
}

/// Run the strategy selected for this request
pub async fn execute(
    ctx: &StrategyContext,
    request: &RequestDescriptor,
    pending: &mut PendingFetchContext,
) -> RelayResult<Response> {
    debug!("Running {} for {} ({})", pending.strategy, request, pending.class);
    match pending.strategy {
        Strategy::GenericCacheThenNetwork => generic::run(ctx, request, pending).await,
        Strategy::CacheFirst => cache_first::run(ctx, request, pending).await,
        Strategy::CacheFirstTimeoutFormatFallback => timeout::run(ctx, request, pending).await,
        Strategy::NetworkFirstCacheFallback => network::network_first(ctx, request, pending).await,
        Strategy::NetworkOnlyNoCache => network::network_only(ctx, request, pending).await,
        Strategy::NavigationFallback => Ok(navigation_fallback(ctx).await),
    }
}

/// Only successful GETs are ever persisted
pub fn is_cacheable(request: &RequestDescriptor, response: &Response) -> bool {
    response.status == 200 && request.is_get()
}

/// The other image format: `.webp` becomes `.jpg`, `.jpg`/`.jpeg` become `.webp`
pub fn alternate_format(url: &Url) -> Option<Url> {
    let path = url.path();
    let lower = path.to_ascii_lowercase();
    let (stem, target) = if lower.ends_with(".webp") {
        (&path[..path.len() - 5], "jpg")
    } else if lower.ends_with(".jpeg") {
        (&path[..path.len() - 5], "webp")
    } else if lower.ends_with(".jpg") {
        (&path[..path.len() - 4], "webp")
    } else {
        return None;
    };
    let mut alternate = url.clone();
    alternate.set_path(&format!("{}.{}", stem, target));
    Some(alternate)
}

/// The `.jpg` counterpart of a `.webp` URL
pub fn jpg_counterpart(url: &Url) -> Option<Url> {
    if url.path().to_ascii_lowercase().ends_with(".webp") {
        alternate_format(url)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn class_mapping() {
        assert_eq!(
            Strategy::for_class(ResourceClass::TeamImage),
            Strategy::CacheFirstTimeoutFormatFallback
        );
        assert_eq!(
            Strategy::for_class(ResourceClass::PaymentApi),
            Strategy::NetworkOnlyNoCache
        );
        assert_eq!(
            Strategy::for_class(ResourceClass::PaymentVendor),
            Strategy::NetworkFirstCacheFallback
        );
        assert_eq!(
            Strategy::for_class(ResourceClass::Navigation),
            Strategy::GenericCacheThenNetwork
        );
    }

    #[test]
    fn format_toggle() {
        assert_eq!(
            alternate_format(&url("https://x/team/a.webp")).unwrap().as_str(),
            "https://x/team/a.jpg"
        );
        assert_eq!(
            alternate_format(&url("https://x/team/a.JPG?v=2")).unwrap().as_str(),
            "https://x/team/a.webp?v=2"
        );
        assert_eq!(
            alternate_format(&url("https://x/team/a.jpeg")).unwrap().as_str(),
            "https://x/team/a.webp"
        );
        assert!(alternate_format(&url("https://x/team/a.png")).is_none());
    }

    #[test]
    fn jpg_counterpart_only_for_webp() {
        assert!(jpg_counterpart(&url("https://x/a.webp")).is_some());
        assert!(jpg_counterpart(&url("https://x/a.jpg")).is_none());
    }
}
