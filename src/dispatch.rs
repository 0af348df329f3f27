//! Interception entry point
//!
//! The dispatcher classifies a request, runs the matching strategy and
//! always ends with a concrete response. Strategy errors and panics are
//! caught here: network and storage faults get one plain, uncached fetch,
//! and anything left over is answered with the cached root document or a
//! 500.

use crate::classify::{Classifier, ResourceClass};
use crate::error::RelayError;
use crate::fetch::{RequestDescriptor, Response};
use crate::strategy::{self, Strategy, StrategyContext};
use futures_util::FutureExt;
use std::panic::AssertUnwindSafe;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, error, warn};
use uuid::Uuid;

/// Outcome of offering a request to the cache layer
#[derive(Debug)]
pub enum Interception {
    /// The layer answered the request
    Respond(Response),
    /// The layer stepped aside; the host handles the request itself
    Declined,
}

impl Interception {
    pub fn into_response(self) -> Option<Response> {
        match self {
            Self::Respond(response) => Some(response),
            Self::Declined => None,
        }
    }
}

/// Per-request bookkeeping, dropped once the response is produced
#[derive(Debug, Clone)]
pub struct PendingFetchContext {
    pub id: Uuid,
    pub class: ResourceClass,
    pub strategy: Strategy,
    pub started: Instant,
    /// Set when a strategy races the network against a deadline
    pub deadline: Option<Instant>,
    pub deadline_expired: bool,
    /// Network attempts made so far
    pub attempts: u32,
    /// Fallback steps taken, in order
    pub fallbacks: Vec<&'static str>,
}

impl PendingFetchContext {
    pub fn new(class: ResourceClass) -> Self {
        Self {
            id: Uuid::new_v4(),
            class,
            strategy: Strategy::for_class(class),
            started: Instant::now(),
            deadline: None,
            deadline_expired: false,
            attempts: 0,
            fallbacks: Vec::new(),
        }
    }

    pub fn record_attempt(&mut self) {
        self.attempts += 1;
    }

    pub fn record_fallback(&mut self, step: &'static str) {
        self.fallbacks.push(step);
    }

    pub fn arm_deadline(&mut self, after: Duration) -> Instant {
        let deadline = Instant::now() + after;
        self.deadline = Some(deadline);
        deadline
    }

    pub fn mark_deadline_expired(&mut self) {
        self.deadline_expired = true;
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }
}

/// Top-level request handler
#[derive(Clone)]
pub struct InterceptionDispatcher {
    ctx: StrategyContext,
    classifier: Classifier,
}

impl InterceptionDispatcher {
    pub fn new(ctx: StrategyContext, classifier: Classifier) -> Self {
        Self { ctx, classifier }
    }

    /// Offer a request to the cache layer
    pub async fn handle(&self, request: &RequestDescriptor) -> Interception {
        if let Some(reason) = self.decline_reason(request) {
            debug!("Declining {}: {}", request, reason);
            return Interception::Declined;
        }

        let class = self.classifier.classify(request);
        let mut pending = PendingFetchContext::new(class);

        let outcome = AssertUnwindSafe(strategy::execute(&self.ctx, request, &mut pending))
            .catch_unwind()
            .await;

        let response = match outcome {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => self.recover(request, e, &mut pending).await,
            Err(_) => {
                error!("Strategy {} panicked on {}", pending.strategy, request);
                self.last_resort().await
            }
        };

        debug!(
            id = %pending.id,
            class = %pending.class,
            strategy = %pending.strategy,
            attempts = pending.attempts,
            fallbacks = ?pending.fallbacks,
            status = response.status,
            source = %response.source,
            elapsed_ms = pending.elapsed().as_millis() as u64,
            "Resolved {}",
            request
        );
        Interception::Respond(response)
    }

    fn decline_reason(&self, request: &RequestDescriptor) -> Option<&'static str> {
        if !matches!(request.url.scheme(), "http" | "https") {
            return Some("not an HTTP request");
        }
        let upgrade = request.header("upgrade").unwrap_or_default();
        if self.ctx.rewriter.is_production() && upgrade.eq_ignore_ascii_case("websocket") {
            return Some("protocol upgrade");
        }
        None
    }

    async fn recover(
        &self,
        request: &RequestDescriptor,
        error: RelayError,
        pending: &mut PendingFetchContext,
    ) -> Response {
        if error.falls_through() {
            warn!("{} failed for {}, fetching directly: {}", pending.strategy, request, error);
            pending.record_fallback("direct-fetch");
            pending.record_attempt();
            match self.ctx.network(request).await {
                Ok(response) => return response,
                Err(e) => warn!("Direct fetch of {} failed: {}", request, e),
            }
        } else {
            error!("{} failed for {}: {}", pending.strategy, request, error);
        }
        pending.record_fallback("last-resort");
        self.last_resort().await
    }

    async fn last_resort(&self) -> Response {
        match self.ctx.root_document().await {
            Some(root) => root,
            None => Response::internal_error(),
        }
    }
}
