//! Install command - open stores, cache seeds, then activate

use crate::config::Config;
use crate::error::RelayResult;
use crate::lifecycle::ActivateReport;
use crate::ui::{self, TaskSpinner, UiContext};
use crate::worker::Worker;

/// Execute the install command
pub async fn execute(config: &Config) -> RelayResult<()> {
    let ctx = UiContext::detect();
    let worker = Worker::from_config(config.clone())?;

    ui::intro(&ctx, "relaycache install");
    let mut spinner = TaskSpinner::new(&ctx);
    spinner.start(&format!("Installing {}", config.stores.version));

    let (installed, activated) = match worker.start().await {
        Ok(reports) => reports,
        Err(e) => {
            spinner.stop_error("Install failed");
            return Err(e);
        }
    };
    spinner.stop(&format!(
        "Opened {} stores, seeded {} of {}",
        installed.opened.len(),
        installed.seeded.len(),
        installed.seeded.len() + installed.failed.len()
    ));

    for failure in &installed.failed {
        ui::step_warn_hint(&ctx, &format!("Not cached: {}", failure.seed), &failure.reason);
    }

    if installed.prewarm_scheduled > 0 {
        spinner.start(&format!(
            "Pre-warming up to {} team images",
            installed.prewarm_scheduled
        ));
        worker.wait_until_idle().await;
        spinner.stop("Pre-warm finished");
    }

    if let Some(report) = activated {
        print_activation(&ctx, &report);
    }

    ui::outro_success(&ctx, &format!("{} is active", config.stores.version));
    Ok(())
}

/// Shared with the activate command
pub(crate) fn print_activation(ctx: &UiContext, report: &ActivateReport) {
    for name in &report.deleted {
        ui::step_ok_detail(ctx, "Deleted stale store", name);
    }
    for name in &report.failed {
        ui::step_warn_hint(ctx, &format!("Could not delete {}", name), "Run: relaycache stores clear");
    }
    if !report.opened.is_empty() {
        ui::step_info(ctx, &format!("Created {} missing store(s)", report.opened.len()));
    }
    if report.deleted.is_empty() && report.failed.is_empty() {
        ui::step_info(ctx, "No stale stores");
    }
    ui::key_value(ctx, "current stores", &report.kept.len().to_string());
}
