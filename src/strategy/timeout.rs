//! Team images: cache, then a deadline-bounded race, then the other format
//!
//! The network attempt runs as a tracked background task. If the deadline
//! fires first the handler moves on to the alternate format while the
//! original attempt keeps running; should it later succeed it still lands
//! in the store.

use super::{alternate_format, is_cacheable, StrategyContext};
use crate::dispatch::PendingFetchContext;
use crate::error::RelayResult;
use crate::fetch::{RequestDescriptor, Response};
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::debug;

pub(super) async fn run(
    ctx: &StrategyContext,
    request: &RequestDescriptor,
    pending: &mut PendingFetchContext,
) -> RelayResult<Response> {
    let store = ctx.store_for(pending.class)?;
    let key = ctx.registry.key_for(request);

    if let Some(hit) = ctx.registry.get(&store, &key).await {
        return Ok(hit);
    }

    let deadline = Duration::from_millis(ctx.config.timeouts.team_image_ms);
    pending.arm_deadline(deadline);
    pending.record_attempt();

    let (tx, rx) = oneshot::channel::<RelayResult<Response>>();
    {
        let background = ctx.background.clone();
        let ctx = ctx.clone();
        let request = request.clone();
        let store = store.clone();
        background.spawn("team-image-fetch", async move {
            let result = ctx.network(&request).await;
            if let Ok(response) = &result {
                if is_cacheable(&request, response) {
                    ctx.registry.put(&store, &key, response.clone()).await;
                }
            }
            // The receiver is gone once the deadline has won
            let _ = tx.send(result);
        });
    }

    match tokio::time::timeout(deadline, rx).await {
        Ok(Ok(Ok(response))) if is_cacheable(request, &response) => return Ok(response),
        Ok(Ok(Ok(response))) => debug!("Team image {} returned {}", request, response.status),
        Ok(Ok(Err(e))) => debug!("Team image {} failed: {}", request, e),
        Ok(Err(_)) => debug!("Team image fetch for {} was dropped", request),
        Err(_) => {
            pending.mark_deadline_expired();
            debug!(
                "Team image {} missed the {} ms deadline",
                request,
                deadline.as_millis()
            );
        }
    }

    Ok(alternate(ctx, request, &store, pending).await)
}

async fn alternate(
    ctx: &StrategyContext,
    request: &RequestDescriptor,
    store: &str,
    pending: &mut PendingFetchContext,
) -> Response {
    let Some(url) = alternate_format(&request.url) else {
        return Response::not_found();
    };

    pending.record_fallback("alternate-format");
    let alternate = request.with_url(url);
    let key = ctx.registry.key_for(&alternate);
    if let Some(hit) = ctx.registry.get(store, &key).await {
        return hit;
    }

    pending.record_attempt();
    match ctx.fetch_and_store(&alternate, store).await {
        Ok(response) => response,
        Err(e) => {
            debug!("Alternate {} unavailable: {}", alternate, e);
            Response::not_found()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::ResourceClass;
    use crate::testing::strategy_context;
    use tokio::time::Instant;
    use url::Url;

    const WEBP: &str = "https://shop.example.org/images/team/ana.webp";
    const JPG: &str = "https://shop.example.org/images/team/ana.jpg";

    fn team(url: &str) -> (RequestDescriptor, PendingFetchContext) {
        (
            RequestDescriptor::get(Url::parse(url).unwrap()),
            PendingFetchContext::new(ResourceClass::TeamImage),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn slow_network_resolves_via_alternate_before_slow_fetch() {
        let (ctx, net) = strategy_context();
        net.respond_after(WEBP, 200, b"WEBP", Duration::from_millis(5000));
        net.respond(JPG, 200, b"JPEG");
        let (req, mut pending) = team(WEBP);

        let started = Instant::now();
        let resp = run(&ctx, &req, &mut pending).await.unwrap();
        let elapsed = started.elapsed();

        assert_eq!(resp.body, b"JPEG");
        assert!(elapsed >= Duration::from_millis(3000));
        assert!(elapsed < Duration::from_millis(3500), "took {:?}", elapsed);
        assert!(pending.deadline_expired);
    }

    #[tokio::test(start_paused = true)]
    async fn abandoned_fetch_still_populates_store() {
        let (ctx, net) = strategy_context();
        net.respond_after(WEBP, 200, b"WEBP", Duration::from_millis(5000));
        net.respond(JPG, 200, b"JPEG");
        let (req, mut pending) = team(WEBP);

        run(&ctx, &req, &mut pending).await.unwrap();
        ctx.background.drain().await;

        let keys = ctx.registry.keys("relay-team-images-v1").await.unwrap();
        let urls: Vec<&str> = keys.iter().map(|k| k.url.as_str()).collect();
        assert!(urls.contains(&WEBP));
        assert!(urls.contains(&JPG));
    }

    #[tokio::test]
    async fn webp_404_yields_jpg_and_stores_it() {
        let (ctx, net) = strategy_context();
        net.respond(WEBP, 404, b"");
        net.respond(JPG, 200, b"JPEG");
        let (req, mut pending) = team(WEBP);

        let resp = run(&ctx, &req, &mut pending).await.unwrap();
        assert_eq!(resp.body, b"JPEG");
        assert!(!pending.deadline_expired);

        let keys = ctx.registry.keys("relay-team-images-v1").await.unwrap();
        assert_eq!(keys.len(), 1);
        assert_eq!(keys[0].url, JPG);
    }

    #[tokio::test]
    async fn alternate_served_from_cache() {
        let (ctx, net) = strategy_context();
        net.respond(JPG, 200, b"JPEG");
        let (jpg_req, mut jpg_pending) = team(JPG);
        run(&ctx, &jpg_req, &mut jpg_pending).await.unwrap();

        net.go_offline();
        let (req, mut pending) = team(WEBP);
        let resp = run(&ctx, &req, &mut pending).await.unwrap();
        assert!(resp.is_from_cache());
        assert_eq!(resp.body, b"JPEG");
    }

    #[tokio::test]
    async fn both_formats_missing_is_404() {
        let (ctx, _net) = strategy_context();
        let (req, mut pending) = team(WEBP);
        let resp = run(&ctx, &req, &mut pending).await.unwrap();
        assert_eq!(resp.status, 404);
        assert_eq!(pending.fallbacks, vec!["alternate-format"]);
    }
}
