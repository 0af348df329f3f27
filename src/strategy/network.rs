use super::{is_cacheable, StrategyContext};
use crate::dispatch::PendingFetchContext;
use crate::error::RelayResult;
use crate::fetch::{RequestDescriptor, Response};
use tracing::{debug, warn};

/// Network, then cache, then a placeholder that will not break the page
pub(super) async fn network_first(
    ctx: &StrategyContext,
    request: &RequestDescriptor,
    pending: &mut PendingFetchContext,
) -> RelayResult<Response> {
    let store = ctx.store_for(pending.class)?;
    let key = ctx.registry.key_for(request);

    pending.record_attempt();
    let error = match ctx.network(request).await {
        Ok(response) => {
            if is_cacheable(request, &response) {
                ctx.registry.put(&store, &key, response.clone()).await;
            }
            return Ok(response);
        }
        Err(e) => e,
    };

    debug!("Network failed for {}, trying {}: {}", request, store, error);
    if request.is_get() {
        if let Some(hit) = ctx.registry.get(&store, &key).await {
            return Ok(hit);
        }
    }

    pending.record_fallback("placeholder");
    Ok(placeholder_for(request))
}

/// Never touches a store
pub(super) async fn network_only(
    ctx: &StrategyContext,
    request: &RequestDescriptor,
    pending: &mut PendingFetchContext,
) -> RelayResult<Response> {
    pending.record_attempt();
    match ctx.network(request).await {
        Ok(response) => Ok(response),
        Err(e) => {
            warn!("Payment endpoint {} unreachable: {}", request, e);
            pending.record_fallback("payment-unavailable");
            Ok(Response::payment_unavailable())
        }
    }
}

/// Empty script for scripts, empty stylesheet for styles, 404 otherwise
pub fn placeholder_for(request: &RequestDescriptor) -> Response {
    let extension = request.extension();
    let destination = request.header("sec-fetch-dest").unwrap_or_default();
    let accept = request.header("accept").unwrap_or_default();

    if destination == "script"
        || matches!(extension.as_deref(), Some("js" | "mjs"))
        || accept.contains("javascript")
    {
        Response::empty_script()
    } else if destination == "style"
        || extension.as_deref() == Some("css")
        || accept.contains("text/css")
    {
        Response::empty_stylesheet()
    } else {
        Response::not_found()
    }
}
