//! Message command - deliver one control message

use crate::config::Config;
use crate::error::RelayResult;
use crate::lifecycle::{ControlMessage, MessageOutcome};
use crate::ui::{self, UiContext};
use crate::worker::Worker;

/// Execute the message command
pub async fn execute(json: &str, config: &Config) -> RelayResult<()> {
    let ctx = UiContext::detect();
    let message = ControlMessage::parse(json)?;
    let worker = Worker::from_config(config.clone())?;
    worker.resume_installed().await;

    let outcome = worker.message(message).await?;
    worker.wait_until_idle().await;

    match &outcome {
        MessageOutcome::Cached { stored: false, .. }
        | MessageOutcome::Cleared { deleted: false, .. } => {
            ui::step_warn(&ctx, &outcome.to_string())
        }
        MessageOutcome::SkipWaiting => {
            ui::step_ok_detail(&ctx, "Skip waiting", &worker.state().await.to_string())
        }
        _ => ui::step_ok(&ctx, &outcome.to_string()),
    }

    if let MessageOutcome::Cached {
        alternate_stored: Some(false),
        ..
    } = outcome
    {
        ui::remark(&ctx, "Alternate image format was not available");
    }

    Ok(())
}
