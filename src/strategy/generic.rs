use super::{is_cacheable, StrategyContext};
use crate::dispatch::PendingFetchContext;
use crate::error::RelayResult;
use crate::fetch::{RequestDescriptor, Response};
use tracing::{debug, warn};

/// Cache lookup, then network; failures fall back by request kind
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
    match ctx.network(request).await {
        Ok(response) => {
            if is_cacheable(request, &response) {
                ctx.registry.put(&store, &key, response.clone()).await;
            } else {
                debug!("Not caching {} (status {})", request, response.status);
            }
            Ok(response)
        }
        Err(e) => {
            warn!("Network failed for {}: {}", request, e);
            if request.is_navigation() {
                pending.record_fallback("root-document");
                Ok(navigation_fallback(ctx).await)
            } else {
                pending.record_fallback("error-response");
                Ok(Response::network_error())
            }
        }
    }
}

/// Cached root document, or the offline page
pub async fn navigation_fallback(ctx: &StrategyContext) -> Response {
    match ctx.root_document().await {
        Some(root) => root,
        None => {
            debug!("No cached root document, serving offline page");
            Response::offline_page()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::ResourceClass;
    use crate::testing::strategy_context as context;
    use url::Url;

    fn pending(class: ResourceClass) -> PendingFetchContext {
        PendingFetchContext::new(class)
    }

    #[tokio::test]
    async fn miss_then_hit() {
        let (ctx, net) = context();
        net.respond("https://shop.example.org/js/app.js", 200, b"console.log(1)");
        let req = RequestDescriptor::get(Url::parse("https://shop.example.org/js/app.js").unwrap());

        let first = run(&ctx, &req, &mut pending(ResourceClass::StaticAsset)).await.unwrap();
        assert!(!first.is_from_cache());

        net.go_offline();
        let second = run(&ctx, &req, &mut pending(ResourceClass::StaticAsset)).await.unwrap();
        assert!(second.is_from_cache());
        assert_eq!(second.body, first.body);
    }

    #[tokio::test]
    async fn bad_status_returned_but_not_stored() {
        let (ctx, net) = context();
        net.respond("https://shop.example.org/missing.js", 404, b"nope");
        let req = RequestDescriptor::get(Url::parse("https://shop.example.org/missing.js").unwrap());

        let resp = run(&ctx, &req, &mut pending(ResourceClass::StaticAsset)).await.unwrap();
        assert_eq!(resp.status, 404);
        assert!(ctx.registry.keys("relay-main-v1").await.is_err());
    }

    #[tokio::test]
    async fn offline_navigation_serves_root_document() {
        let (ctx, net) = context();
        net.respond("https://shop.example.org/", 200, b"<html>shell</html>");
        let root = RequestDescriptor::get(Url::parse("https://shop.example.org/").unwrap());
        run(&ctx, &root, &mut pending(ResourceClass::StaticAsset)).await.unwrap();

        net.go_offline();
        let nav = RequestDescriptor::navigate(Url::parse("https://shop.example.org/about").unwrap());
        let mut ctx_pending = pending(ResourceClass::Navigation);
        let resp = run(&ctx, &nav, &mut ctx_pending).await.unwrap();
        assert_eq!(resp.text(), "<html>shell</html>");
        assert_eq!(ctx_pending.fallbacks, vec!["root-document"]);
    }

    #[tokio::test]
    async fn offline_navigation_without_root_gets_offline_page() {
        let (ctx, _net) = context();
        let nav = RequestDescriptor::navigate(Url::parse("https://shop.example.org/about").unwrap());
        let resp = run(&ctx, &nav, &mut pending(ResourceClass::Navigation)).await.unwrap();
        assert_eq!(resp.status, 503);
        assert!(resp.header("content-type").unwrap().starts_with("text/html"));
    }

    #[tokio::test]
    async fn offline_asset_gets_generic_error() {
        let (ctx, _net) = context();
        let req = RequestDescriptor::get(Url::parse("https://shop.example.org/api/products").unwrap());
        let resp = run(&ctx, &req, &mut pending(ResourceClass::Default)).await.unwrap();
        assert_eq!(resp.status, 503);
    }
}
