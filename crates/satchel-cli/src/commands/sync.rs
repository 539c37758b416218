use satchel_core::{ExitCode, RecordingSink, SatchelError, SatchelResult};
use satchel_store::SyncStatus;
use satchel_sync::{BadgeState, ItemRepository, SyncOutcome};
use serde_json::json;

use crate::{GlobalOptions, SyncCommand, print_json, with_context};

pub(crate) fn cmd_sync(
    force: bool,
    command: Option<SyncCommand>,
    globals: &GlobalOptions,
) -> SatchelResult<ExitCode> {
    with_context(globals, |ctx| match command {
        None => {
            let events = RecordingSink::new();
            let outcome = ctx.run_engine(&events, |engine| engine.retrieve_items(force))?;
            render_outcome(&outcome, &events, globals)?;
            Ok(ExitCode::Success)
        }
        Some(SyncCommand::Reset) => {
            if !globals.yes {
                return Err(SatchelError::usage(
                    "sync reset drops the local cache; pass --yes to confirm",
                ));
            }

            let events = RecordingSink::new();
            let outcome = ctx.run_engine(&events, |engine| {
                engine.reset_cache()?;
                engine.retrieve_items(true)
            })?;
            render_outcome(&outcome, &events, globals)?;
            Ok(ExitCode::Success)
        }
        Some(SyncCommand::Status) => {
            let status = SyncStatus::load(&ctx.store)?;
            let mut repository = ItemRepository::new(&ctx.store);
            let items = repository.load_items()?;
            let cursor = repository.last_retrieve()?;
            let full_sync_version = repository.full_sync_version()?;
            let badge = BadgeState::from_items(&items);

            if globals.json {
                print_json(&json!({
                    "ok": true,
                    "result": {
                        "profile": ctx.profile,
                        "server": ctx.server,
                        "cached_items": items.len(),
                        "badge": badge.text(),
                        "last_retrieve": cursor,
                        "last_full_sync_version": full_sync_version,
                        "status": status,
                    }
                }))?;
            } else {
                println!("Profile: {}", ctx.profile);
                println!("Cached items: {}", items.len());
                println!(
                    "Cursor: {}",
                    cursor.map_or_else(|| "none".to_string(), |cursor| cursor.to_string())
                );
                println!(
                    "Last sync: {} ({})",
                    status.last_sync_at.as_deref().unwrap_or("never"),
                    status.last_strategy.as_deref().unwrap_or("-")
                );
                if let Some(error) = &status.last_error {
                    println!("Last error: {error}");
                }
            }

            Ok(ExitCode::Success)
        }
    })
}

fn render_outcome(
    outcome: &SyncOutcome,
    events: &RecordingSink,
    globals: &GlobalOptions,
) -> SatchelResult<()> {
    if globals.json {
        return print_json(&json!({
            "ok": true,
            "result": outcome,
            "events": events.events(),
        }));
    }

    match outcome.strategy.as_str() {
        "noop" => println!("Cache is fresh; nothing fetched"),
        strategy => println!(
            "{} fetch: {} fetched, {} removed, {} pages",
            if strategy == "full" { "Full" } else { "Incremental" },
            outcome.fetched,
            outcome.removed,
            outcome.pages
        ),
    }
    println!("Cached items: {}", outcome.cached_total);
    if !outcome.anomalies.is_empty() {
        println!("Anomalies: {}", outcome.anomalies.len());
    }
    Ok(())
}
