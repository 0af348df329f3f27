//! Version-level events: install, activate and control messages
//!
//! None of these go through classification. Install fills the stores,
//! activate removes every store the running configuration does not name,
//! and messages let the host ask for specific resources to be cached.

mod activate;
mod clients;
mod install;
mod message;

pub use activate::ActivateReport;
pub use clients::{ClientInfo, ClientMessage, Clients};
pub use install::{InstallReport, SeedFailure};
pub use message::{ControlMessage, MessageOutcome};

use crate::classify::Classifier;
use crate::strategy::StrategyContext;

/// Handles lifecycle events for one worker
#[derive(Clone)]
pub struct LifecycleManager {
    ctx: StrategyContext,
    classifier: Classifier,
    clients: Clients,
}

impl LifecycleManager {
    pub fn new(ctx: StrategyContext, classifier: Classifier, clients: Clients) -> Self {
        Self {
            ctx,
            classifier,
            clients,
        }
    }

    pub fn clients(&self) -> &Clients {
        &self.clients
    }
}
