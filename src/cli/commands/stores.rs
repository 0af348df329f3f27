//! Stores command - inspect and clear stores

use crate::cli::args::{OutputFormat, StoresAction, StoresArgs};
use crate::config::Config;
use crate::error::{RelayError, RelayResult};
use crate::store::CacheRegistry;
use crate::ui::{self, UiContext};
use console::style;
use serde::Serialize;

/// Execute the stores command
pub async fn execute(args: StoresArgs, config: &Config) -> RelayResult<()> {
    let registry = CacheRegistry::from_config(config);

    match args.action {
        StoresAction::List { format } => list_stores(&registry, config, format).await,
        StoresAction::Show { name, format } => show_store(&registry, &name, format).await,
        StoresAction::Clear { name, yes } => clear_store(&registry, &name, yes).await,
    }
}

#[derive(Serialize)]
struct StoreRow {
    name: String,
    entries: usize,
    current: bool,
}

async fn list_stores(
    registry: &CacheRegistry,
    config: &Config,
    format: OutputFormat,
) -> RelayResult<()> {
    let current = config.version_set();
    let mut rows = Vec::new();
    for name in registry.list_names().await? {
        let entries = registry.keys(&name).await.map(|k| k.len()).unwrap_or(0);
        rows.push(StoreRow {
            current: current.contains(&name),
            name,
            entries,
        });
    }

    if rows.is_empty() && !matches!(format, OutputFormat::Json) {
        println!("No stores found ({} backend).", registry.backend_name());
        return Ok(());
    }

    match format {
        OutputFormat::Table => {
            println!("{:<32} {:>8}  {:<8}", "STORE", "ENTRIES", "STATUS");
            println!("{}", "-".repeat(50));
            for row in &rows {
                let status = if row.current {
                    style("current").green().to_string()
                } else {
                    style("stale").yellow().to_string()
                };
                println!("{:<32} {:>8}  {:<8}", row.name, row.entries, status);
            }
            println!();
            println!("Total: {} store(s)", rows.len());
        }
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&rows)?),
        OutputFormat::Plain => {
            for row in &rows {
                println!("{}", row.name);
            }
        }
    }

    Ok(())
}

#[derive(Serialize)]
struct EntryRow {
    method: String,
    url: String,
    status: u16,
    bytes: usize,
    stored_at: String,
}

async fn show_store(registry: &CacheRegistry, name: &str, format: OutputFormat) -> RelayResult<()> {
    let mut rows = Vec::new();
    for key in registry.keys(name).await? {
        if let Some(entry) = registry.entry(name, &key).await? {
            rows.push(EntryRow {
                method: key.method,
                url: key.url,
                status: entry.status,
                bytes: entry.body.len(),
                stored_at: entry.stored_at.to_rfc3339(),
            });
        }
    }

    match format {
        OutputFormat::Table => {
            println!("{:<6} {:<6} {:>9}  {:<20} URL", "METHOD", "STATUS", "BYTES", "STORED");
            println!("{}", "-".repeat(80));
            for row in &rows {
                let stored = row.stored_at.get(..16).unwrap_or(&row.stored_at).replace('T', " ");
                println!(
                    "{:<6} {:<6} {:>9}  {:<20} {}",
                    row.method, row.status, row.bytes, stored, row.url
                );
            }
            println!();
            println!("Total: {} entr{}", rows.len(), if rows.len() == 1 { "y" } else { "ies" });
        }
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&rows)?),
        OutputFormat::Plain => {
            for row in &rows {
                println!("{}", row.url);
            }
        }
    }

    Ok(())
}

async fn clear_store(registry: &CacheRegistry, name: &str, yes: bool) -> RelayResult<()> {
    let ctx = UiContext::detect().with_auto_yes(yes);

    let confirmed = ui::confirm(&ctx, &format!("Delete store {}?", name), false).await?;
    if !confirmed {
        ui::remark(&ctx, "Nothing deleted (pass --yes to skip the prompt)");
        return Ok(());
    }

    if !registry.delete_store(name).await? {
        return Err(RelayError::StoreNotFound(name.to_string()));
    }
    ui::step_ok_detail(&ctx, "Deleted store", name);
    Ok(())
}
