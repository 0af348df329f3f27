use super::{is_cacheable, jpg_counterpart, StrategyContext};
use crate::classify::ResourceClass;
use crate::dispatch::PendingFetchContext;
use crate::error::RelayResult;
use crate::fetch::{RequestDescriptor, Response};
use tracing::debug;

/// Cache hit or network.
///
/// Fonts let network failures bubble to the dispatcher. Images retry a
/// `.webp` as `.jpg` once and otherwise settle for a 404.
pub(super) async fn run(
    ctx: &StrategyContext,
    request: &RequestDescriptor,
    pending: &mut PendingFetchContext,
) -> RelayResult<Response> {
    let store = ctx.store_for(pending.class)?;
    let key = ctx.registry.key_for(request);

    if request.is_get() {
        if let Some(hit) = ctx.registry.get(&store, &key).await {
            return Ok(hit);
        }
    }

    pending.record_attempt();
    let result = ctx.network(request).await;

    if pending.class != ResourceClass::GenericImage {
        let response = result?;
        if is_cacheable(request, &response) {
            ctx.registry.put(&store, &key, response.clone()).await;
        }
        return Ok(response);
    }

    match result {
        Ok(response) if is_cacheable(request, &response) => {
            ctx.registry.put(&store, &key, response.clone()).await;
            Ok(response)
        }
        Ok(response) => {
            debug!("Image {} returned {}", request, response.status);
            Ok(image_fallback(ctx, request, &store, pending).await)
        }
        Err(e) => {
            debug!("Image {} failed: {}", request, e);
            Ok(image_fallback(ctx, request, &store, pending).await)
        }
    }
}

async fn image_fallback(
    ctx: &StrategyContext,
    request: &RequestDescriptor,
    store: &str,
    pending: &mut PendingFetchContext,
) -> Response {
    let Some(jpg) = jpg_counterpart(&request.url) else {
        return Response::not_found();
    };

    pending.record_fallback("jpg-counterpart");
    pending.record_attempt();
    match ctx.fetch_and_store(&request.with_url(jpg), store).await {
        Ok(response) => response,
        Err(e) => {
            debug!("No jpg counterpart for {}: {}", request, e);
            Response::not_found()
        }
    }
}
