//! Confirmation prompt with a non-interactive fallback

use super::context::UiContext;
use crate::error::{RelayError, RelayResult};

/// Ask yes/no. Auto-yes answers yes; non-interactive runs get `default`.
pub async fn confirm(ctx: &UiContext, message: &str, default: bool) -> RelayResult<bool> {
    if ctx.auto_yes() {
        return Ok(true);
    }
    if !ctx.is_interactive() {
        return Ok(default);
    }

    let message = message.to_string();
    tokio::task::spawn_blocking(move || {
        cliclack::confirm(&message)
            .initial_value(default)
            .interact()
    })
    .await
    .map_err(|e| RelayError::User(format!("Prompt task failed: {}", e)))?
    .map_err(|e| RelayError::User(format!("Prompt failed: {}", e)))
}
