use super::LifecycleManager;
use crate::background::run_bounded;
use crate::config::StoreKind;
use crate::error::RelayResult;
use crate::fetch::RequestDescriptor;
use futures_util::future::join_all;
use serde::Serialize;
use tracing::{debug, info, warn};

/// Result of an install
#[derive(Debug, Clone, Default, Serialize)]
pub struct InstallReport {
    /// Stores opened, in catalogue order
    pub opened: Vec<String>,
    /// Seed URLs now cached
    pub seeded: Vec<String>,
    /// Seeds that could not be cached
    pub failed: Vec<SeedFailure>,
    /// Team-image URLs handed to the background pre-warm
    pub prewarm_scheduled: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SeedFailure {
    pub seed: String,
    pub reason: String,
}

impl LifecycleManager {
    /// Open every store, seed the main and font stores, and start the
    /// team-image pre-warm in the background.
    ///
    /// A seed that fails is reported, not fatal. Failing to open a store is.
    pub async fn install(&self) -> RelayResult<InstallReport> {
        let config = self.ctx.config.clone();
        let mut report = InstallReport::default();

        for kind in StoreKind::all() {
            let name = config.store_name(*kind);
            self.ctx.registry.open(&name).await?;
            report.opened.push(name);
        }

        let seeds = config
            .seeds
            .main
            .iter()
            .map(|seed| (seed.as_str(), StoreKind::Main))
            .chain(config.seeds.fonts.iter().map(|seed| (seed.as_str(), StoreKind::Fonts)));

        let results = join_all(seeds.map(|(seed, kind)| self.seed(seed, kind))).await;
        for result in results {
            match result {
                Ok(url) => report.seeded.push(url),
                Err(failure) => report.failed.push(failure),
            }
        }

        report.prewarm_scheduled = self.schedule_prewarm();

        info!(
            "Installed: {} stores, {} seeded, {} failed, {} pre-warm candidates",
            report.opened.len(),
            report.seeded.len(),
            report.failed.len(),
            report.prewarm_scheduled
        );
        Ok(report)
    }

    async fn seed(&self, seed: &str, kind: StoreKind) -> Result<String, SeedFailure> {
        let failure = |reason: String| {
            warn!("Seed {} not cached: {}", seed, reason);
            SeedFailure {
                seed: seed.to_string(),
                reason,
            }
        };

        let url = self
            .ctx
            .config
            .resolve(seed)
            .map_err(|e| failure(e.to_string()))?;
        let store = self.ctx.store_name(kind);
        self.ctx
            .fetch_and_store(&RequestDescriptor::get(url.clone()), &store)
            .await
            .map_err(|e| failure(e.to_string()))?;

        debug!("Seeded {} into {}", url, store);
        Ok(url.to_string())
    }

    /// Queue speculative team-image fetches; returns how many
    fn schedule_prewarm(&self) -> usize {
        let prewarm = &self.ctx.config.prewarm;
        if !prewarm.enabled {
            return 0;
        }

        let urls: Vec<_> = prewarm
            .candidate_paths()
            .iter()
            .filter_map(|path| self.ctx.config.resolve(path).ok())
            .collect();
        let scheduled = urls.len();
        if scheduled == 0 {
            return 0;
        }

        let ctx = self.ctx.clone();
        let store = self.ctx.store_name(StoreKind::TeamImages);
        let concurrency = prewarm.concurrency;
        self.ctx.background.spawn("team-image-prewarm", async move {
            run_bounded(urls, concurrency, |url| {
                let ctx = ctx.clone();
                let store = store.clone();
                async move {
                    if let Err(e) = ctx
                        .fetch_and_store(&RequestDescriptor::get(url), &store)
                        .await
                    {
                        debug!("Pre-warm skipped: {}", e);
                    }
                }
            })
            .await;
            debug!("Team-image pre-warm finished");
        });
        scheduled
    }
}
