use super::{ClientMessage, LifecycleManager};
use crate::error::RelayResult;
use serde::Serialize;
use tracing::{debug, info, warn};

/// Result of an activation
#[derive(Debug, Clone, Default, Serialize)]
pub struct ActivateReport {
    /// Stale stores removed
    pub deleted: Vec<String>,
    /// Current stores left in place
    pub kept: Vec<String>,
    /// Current stores that did not exist yet
    pub opened: Vec<String>,
    /// Stale stores that could not be removed
    pub failed: Vec<String>,
    /// Instances told to switch to HTTPS
    pub notified: usize,
}

impl LifecycleManager {
    /// Delete every store outside the current version set, open any current
    /// store that is missing, then take control of open instances.
    ///
    /// Afterwards the backend holds exactly the current version set.
    pub async fn activate(&self) -> RelayResult<ActivateReport> {
        let current = self.ctx.config.version_set();
        let mut report = ActivateReport::default();

        for name in self.ctx.registry.list_names().await? {
            if current.contains(&name) {
                report.kept.push(name);
                continue;
            }
            match self.ctx.registry.delete_store(&name).await {
                Ok(_) => {
                    info!("Deleted stale store {}", name);
                    report.deleted.push(name);
                }
                Err(e) => {
                    warn!("Failed to delete stale store {}: {}", name, e);
                    report.failed.push(name);
                }
            }
        }

        for name in &current {
            if !report.kept.contains(name) {
                self.ctx.registry.open(name).await?;
                debug!("Opened missing store {}", name);
                report.opened.push(name.clone());
            }
        }

        report.notified = self.claim_clients().await;

        info!(
            "Activated: {} stale stores deleted, {} kept, {} clients notified",
            report.deleted.len(),
            report.kept.len(),
            report.notified
        );
        Ok(report)
    }

    /// Claim every instance and point plain-HTTP ones at HTTPS
    async fn claim_clients(&self) -> usize {
        let claimed = self.clients.claim().await;
        if !self.ctx.rewriter.is_production() {
            return 0;
        }

        let mut notified = 0;
        for client in claimed {
            if client.url.scheme() != "http" {
                continue;
            }
            let url = self.ctx.rewriter.enforce_https(&client.url);
            let message = ClientMessage::UseHttps {
                url: url.to_string(),
            };
            if self.clients.post(client.id, message).await {
                notified += 1;
            } else {
                debug!("Client {} went away before USE_HTTPS", client.id);
            }
        }
        notified
    }
}
