use satchel_core::{Event, ExitCode, RecordingSink, SatchelError, SatchelResult};
use satchel_sync::{Command, Item, MutationOutcome, RawItemToAdd, find_by_id};
use serde_json::json;

use crate::{GlobalOptions, print_json, with_context};

pub(crate) fn cmd_list(
    query: &str,
    page: i64,
    per_page: Option<usize>,
    all: bool,
    sync_first: bool,
    globals: &GlobalOptions,
) -> SatchelResult<ExitCode> {
    with_context(globals, |ctx| {
        let per_page = if all {
            None
        } else {
            Some(per_page.unwrap_or(ctx.settings.per_page))
        };
        let events = RecordingSink::new();
        let (items, total) = ctx.run_engine(&events, |engine| {
            if sync_first {
                engine.retrieve_items(false)?;
            }
            engine.read_items(query, Some(page), per_page, None)
        })?;

        if globals.json {
            print_json(&json!({
                "ok": true,
                "result": {
                    "query": query,
                    "page": page,
                    "per_page": per_page,
                    "total": total,
                    "items": items,
                }
            }))?;
        } else if items.is_empty() {
            println!("No items");
        } else {
            for item in &items {
                println!("{}", render_item(item));
            }
            println!("Showing {} of {} (page {page})", items.len(), total);
        }

        Ok(ExitCode::Success)
    })
}

pub(crate) fn cmd_add(
    urls: Vec<String>,
    title: Option<String>,
    globals: &GlobalOptions,
) -> SatchelResult<ExitCode> {
    if title.is_some() && urls.len() > 1 {
        return Err(SatchelError::usage("--title applies to a single URL"));
    }

    with_context(globals, |ctx| {
        let inputs: Vec<RawItemToAdd> = urls
            .into_iter()
            .map(|url| RawItemToAdd::new(url, title.clone()))
            .collect();
        let events = RecordingSink::new();
        let outcome = ctx.run_engine(&events, |engine| engine.add_items(inputs))?;
        render_mutation(&outcome, &events, globals)?;
        Ok(ExitCode::Success)
    })
}

pub(crate) fn cmd_archive(id: &str, globals: &GlobalOptions) -> SatchelResult<ExitCode> {
    mutate(globals, |engine| engine.archive(id, None))
}

pub(crate) fn cmd_delete(id: &str, globals: &GlobalOptions) -> SatchelResult<ExitCode> {
    mutate(globals, |engine| engine.delete(id, None))
}

pub(crate) fn cmd_favorite(id: &str, fav: bool, globals: &GlobalOptions) -> SatchelResult<ExitCode> {
    mutate(globals, |engine| {
        if fav {
            engine.favorite(id)
        } else {
            engine.unfavorite(id)
        }
    })
}

/// Omitted fields keep their cached values.
pub(crate) fn cmd_update(
    id: &str,
    title: Option<String>,
    tags: Vec<String>,
    clear_tags: bool,
    globals: &GlobalOptions,
) -> SatchelResult<ExitCode> {
    if title.is_none() && tags.is_empty() && !clear_tags {
        return Err(SatchelError::usage(
            "nothing to update; pass --title, --tag or --clear-tags",
        ));
    }

    mutate(globals, |engine| {
        let cached = engine.cached_items()?;
        let current = find_by_id(&cached, id);
        let title = title
            .clone()
            .or_else(|| current.map(|item| item.title.clone()))
            .unwrap_or_default();
        let tags = if clear_tags {
            Vec::new()
        } else if tags.is_empty() {
            current.map(|item| item.tags.clone()).unwrap_or_default()
        } else {
            tags.clone()
        };
        engine.update(id, &title, &tags)
    })
}

pub(crate) fn cmd_dispatch(payload: &str, globals: &GlobalOptions) -> SatchelResult<ExitCode> {
    let command = Command::parse(payload)?;

    with_context(globals, |ctx| {
        let events = RecordingSink::new();
        let reply = ctx.run_engine(&events, |engine| engine.dispatch(command))?;
        print_json(&json!({
            "ok": true,
            "result": reply,
            "events": events.events(),
        }))?;
        Ok(ExitCode::Success)
    })
}

fn mutate<F>(globals: &GlobalOptions, operation: F) -> SatchelResult<ExitCode>
where
    F: FnOnce(&mut satchel_sync::SyncEngine<'_>) -> SatchelResult<MutationOutcome>,
{
    with_context(globals, |ctx| {
        let events = RecordingSink::new();
        let outcome = ctx.run_engine(&events, operation)?;
        render_mutation(&outcome, &events, globals)?;
        Ok(ExitCode::Success)
    })
}

fn render_mutation(
    outcome: &MutationOutcome,
    events: &RecordingSink,
    globals: &GlobalOptions,
) -> SatchelResult<()> {
    let events = events.events();
    if globals.json {
        return print_json(&json!({
            "ok": true,
            "result": outcome,
            "events": events,
        }));
    }

    for event in &events {
        match event {
            Event::AddedItem { ids } => println!("Added {} item(s): {}", ids.len(), ids.join(", ")),
            Event::AlreadyInList { urls } => {
                for url in urls {
                    println!("Already in list: {url}");
                }
            }
            Event::MarkedAsRead { id } => println!("Archived {id}"),
            Event::Deleted { id } => println!("Deleted {id}"),
            Event::Favorited { id } => println!("Favorited {id}"),
            Event::Unfavorited { id } => println!("Unfavorited {id}"),
            Event::Updated { id } => println!("Updated {id}"),
            Event::RetrievedItems { .. } | Event::Error { .. } => {}
        }
    }
    if events.is_empty() && !outcome.anomalies.is_empty() {
        println!("Nothing changed: item not in the local cache");
    }
    Ok(())
}

fn render_item(item: &Item) -> String {
    let star = if item.fav.is_faved() { "*" } else { " " };
    let title = if item.title.is_empty() { &item.url } else { &item.title };
    let mut line = format!("{star} {:>10}  {title}", item.id);
    if title != &item.url {
        line.push_str(&format!("  <{}>", item.url));
    }
    if !item.tags.is_empty() {
        line.push_str(&format!("  [{}]", item.tags.join(", ")));
    }
    line
}
