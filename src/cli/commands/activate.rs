//! Activate command - drop stores outside the current version

use super::install::print_activation;
use crate::config::Config;
use crate::error::RelayResult;
use crate::ui::{self, UiContext};
use crate::worker::Worker;

/// Execute the activate command
pub async fn execute(config: &Config) -> RelayResult<()> {
    let ctx = UiContext::detect();
    let worker = Worker::from_config(config.clone())?;

    // Stores on disk stand for a previous install
    worker.resume_installed().await;
    let report = worker.activate().await?;

    print_activation(&ctx, &report);
    ui::outro_success(&ctx, &format!("{} is active", config.stores.version));
    Ok(())
}
