use crate::item::{Item, position_by_id, upsert};
use crate::notifier::{NoTabs, NoopNotifier, PresentationNotifier, TabHost};
use crate::repository::ItemRepository;
use chrono::Utc;
use satchel_api::{FetchRequest, ItemStatus, PocketApi};
use satchel_core::{Event, EventSink, SatchelError, SatchelResult};
use satchel_store::{KeyValueStore, SyncStatus};
use serde::Serialize;

pub const DEFAULT_RETRIEVE_INTERVAL_SECS: i64 = 15 * 60;
pub const DEFAULT_PAGE_SIZE: usize = 100;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncSettings {
    /// Minimum age of the cursor before a diff fetch is worth making.
    pub retrieve_interval_secs: i64,
    pub page_size: usize,
    pub close_tab_on_add: bool,
    pub close_tab_on_read: bool,
    /// Recorded as the full-sync marker.
    pub version: String,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            retrieve_interval_secs: DEFAULT_RETRIEVE_INTERVAL_SECS,
            page_size: DEFAULT_PAGE_SIZE,
            close_tab_on_add: false,
            close_tab_on_read: false,
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Strategy {
    Full,
    Diff { since: i64 },
    NoOp,
}

impl Strategy {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::Diff { .. } => "diff",
            Self::NoOp => "noop",
        }
    }
}

/// Full when forced, when nothing is cached or when there is no cursor.
/// Otherwise diff once the cursor is older than `interval_secs`.
pub fn decide_strategy(
    force: bool,
    has_items: bool,
    cursor: Option<i64>,
    now: i64,
    interval_secs: i64,
) -> Strategy {
    match cursor {
        Some(since) if !force && has_items => {
            if now.saturating_sub(since) > interval_secs {
                Strategy::Diff { since }
            } else {
                Strategy::NoOp
            }
        }
        _ => Strategy::Full,
    }
}

/// Cache inconsistencies worth reporting that never abort an operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Anomaly {
    /// Archived or deleted item served by a full fetch; left out of the cache.
    RemovedInFullFetch { id: String, status: String },
    UnknownStatus { id: String, status: String },
    MissingForRemoval { id: String },
    ItemNotFound { id: String },
    AddCountMismatch { requested: usize, returned: usize },
    AddRejected { url: String },
}

impl Anomaly {
    pub(crate) fn report(self, into: &mut Vec<Anomaly>) {
        tracing::warn!(anomaly = ?self, "cache anomaly");
        into.push(self);
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncOutcome {
    pub strategy: Strategy,
    pub fetched: usize,
    pub removed: usize,
    pub pages: usize,
    pub cached_total: usize,
    pub cursor: Option<i64>,
    pub anomalies: Vec<Anomaly>,
}

impl SyncOutcome {
    fn new(strategy: Strategy) -> Self {
        Self {
            strategy,
            fetched: 0,
            removed: 0,
            pages: 0,
            cached_total: 0,
            cursor: None,
            anomalies: Vec::new(),
        }
    }
}

/// Keeps the local item cache in step with the account and applies
/// mutations to both.
///
/// Every operation reads the cache once, changes it in memory and writes
/// it once. Nothing locks the store, so two engines writing the same
/// profile concurrently can lose one side's change.
pub struct SyncEngine<'a> {
    pub(crate) api: &'a PocketApi,
    pub(crate) items: ItemRepository<'a>,
    pub(crate) events: &'a dyn EventSink,
    pub(crate) notifier: &'a dyn PresentationNotifier,
    pub(crate) tabs: &'a dyn TabHost,
    pub(crate) settings: SyncSettings,
}

impl<'a> SyncEngine<'a> {
    pub fn new(api: &'a PocketApi, store: &'a dyn KeyValueStore, events: &'a dyn EventSink) -> Self {
        Self {
            api,
            items: ItemRepository::new(store),
            events,
            notifier: &NoopNotifier,
            tabs: &NoTabs,
            settings: SyncSettings::default(),
        }
    }

    pub fn with_notifier(mut self, notifier: &'a dyn PresentationNotifier) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn with_tabs(mut self, tabs: &'a dyn TabHost) -> Self {
        self.tabs = tabs;
        self
    }

    pub fn with_settings(mut self, settings: SyncSettings) -> Self {
        self.settings = SyncSettings {
            page_size: settings.page_size.max(1),
            ..settings
        };
        self
    }

    pub fn settings(&self) -> &SyncSettings {
        &self.settings
    }

    pub fn cached_items(&mut self) -> SatchelResult<Vec<Item>> {
        self.items.load_items()
    }

    pub fn reset_cache(&mut self) -> SatchelResult<()> {
        self.items.reset()?;
        self.notifier.on_items_changed(&[]);
        Ok(())
    }

    /// Brings the cache up to date. A failed fetch still notifies with
    /// whatever the cache holds, raises the error indicator and records the
    /// failure before the error is returned. An unreadable cache or cursor
    /// counts as absent, which leads to a full fetch that rewrites both.
    pub fn retrieve_items(&mut self, force: bool) -> SatchelResult<SyncOutcome> {
        let cached = self.items.load_items().unwrap_or_else(|error| {
            tracing::warn!(error = %error, "cached items unreadable; starting over");
            Vec::new()
        });
        let cursor = self.items.last_retrieve().unwrap_or_else(|error| {
            tracing::warn!(error = %error, "retrieve cursor unreadable; starting over");
            None
        });
        let strategy = decide_strategy(
            force,
            !cached.is_empty(),
            cursor,
            Utc::now().timestamp(),
            self.settings.retrieve_interval_secs,
        );
        tracing::debug!(
            strategy = strategy.as_str(),
            cached = cached.len(),
            cursor,
            force,
            "retrieve strategy decided"
        );

        let mut outcome = SyncOutcome::new(strategy);
        outcome.cursor = cursor;
        let result = match strategy {
            Strategy::Full => self.full_fetch(&mut outcome),
            Strategy::Diff { since } => self.diff_fetch(since, &mut outcome),
            Strategy::NoOp => Ok(()),
        };

        let mut status = SyncStatus::load(self.items.store()).unwrap_or_default();
        let current = match self.items.load_items() {
            Ok(items) => items,
            Err(error) => {
                tracing::warn!(error = %error, "failed to reload cache after retrieve");
                cached
            }
        };
        outcome.cached_total = current.len();

        self.events.emit(Event::RetrievedItems {
            count: current.len(),
        });
        self.notifier.on_items_changed(&current);

        match result {
            Ok(()) => {
                status.mark_ok(strategy.as_str(), current.len());
                self.record_status(&status);
                tracing::debug!(
                    strategy = strategy.as_str(),
                    fetched = outcome.fetched,
                    removed = outcome.removed,
                    cached_total = outcome.cached_total,
                    anomalies = outcome.anomalies.len(),
                    "retrieve completed"
                );
                Ok(outcome)
            }
            Err(error) => {
                tracing::error!(
                    strategy = strategy.as_str(),
                    kind = error.kind.as_str(),
                    message = %error.message,
                    "retrieve failed"
                );
                status.mark_error(strategy.as_str(), &error.message);
                self.record_status(&status);
                self.events.emit(Event::from_error(&error));
                self.notifier.on_mutation_failed();
                Err(error)
            }
        }
    }

    /// Downloads every unread item page by page. The cursor is dropped up
    /// front so an interrupted run leads to another full fetch.
    fn full_fetch(&mut self, outcome: &mut SyncOutcome) -> SatchelResult<()> {
        let token = self.items.access_token()?;
        self.items.clear_last_retrieve()?;

        let mut accumulated: Vec<Item> = Vec::new();
        let mut offset = 0usize;

        loop {
            let page = self
                .api
                .fetch(&token, &FetchRequest::unread_page(offset, self.settings.page_size))?;
            outcome.pages += 1;

            if page.list.is_empty() {
                if outcome.pages == 1 {
                    self.items.save_items(&accumulated)?;
                }
                let cursor = page.since.unwrap_or_else(|| Utc::now().timestamp());
                self.items.set_last_retrieve(cursor)?;
                self.items.set_full_sync_version(&self.settings.version)?;
                outcome.cursor = Some(cursor);
                break;
            }

            offset += page.list.len();
            outcome.fetched += page.list.len();

            for raw in &page.list {
                match raw.status() {
                    ItemStatus::Normal => upsert(&mut accumulated, Item::from_api(raw)),
                    status => Anomaly::RemovedInFullFetch {
                        id: raw.item_id.clone(),
                        status: status.code().to_string(),
                    }
                    .report(&mut outcome.anomalies),
                }
            }

            self.items.save_items(&accumulated)?;
            tracing::debug!(
                page = outcome.pages,
                offset,
                accumulated = accumulated.len(),
                "full fetch page persisted"
            );
        }

        Ok(())
    }

    fn diff_fetch(&mut self, since: i64, outcome: &mut SyncOutcome) -> SatchelResult<()> {
        let token = self.items.access_token()?;
        let response = self.api.fetch(&token, &FetchRequest::changes_since(since))?;
        outcome.pages = 1;
        outcome.fetched = response.list.len();

        let mut items = self.items.load_items()?;
        for raw in &response.list {
            match raw.status() {
                ItemStatus::Archived | ItemStatus::Deleted => {
                    match position_by_id(&items, &raw.item_id) {
                        Some(index) => {
                            items.remove(index);
                            outcome.removed += 1;
                        }
                        None => Anomaly::MissingForRemoval {
                            id: raw.item_id.clone(),
                        }
                        .report(&mut outcome.anomalies),
                    }
                }
                ItemStatus::Normal => upsert(&mut items, Item::from_api(raw)),
                ItemStatus::Unknown(status) => Anomaly::UnknownStatus {
                    id: raw.item_id.clone(),
                    status,
                }
                .report(&mut outcome.anomalies),
            }
        }

        self.items.save_items(&items)?;
        let cursor = response.since.unwrap_or(since);
        self.items.set_last_retrieve(cursor)?;
        outcome.cursor = Some(cursor);
        Ok(())
    }

    fn record_status(&self, status: &SyncStatus) {
        if let Err(error) = status.save(self.items.store()) {
            tracing::warn!(error = %error, "failed to record sync status");
        }
    }

    /// Reports a caught failure: log, error event, error indicator.
    pub(crate) fn fail(&self, operation: &str, error: SatchelError) -> SatchelError {
        tracing::error!(
            operation,
            kind = error.kind.as_str(),
            http_code = error.http_code,
            message = %error.message,
            "operation failed"
        );
        self.events.emit(Event::from_error(&error));
        self.notifier.on_mutation_failed();
        error
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOW: i64 = 1_700_000_000;
    const INTERVAL: i64 = 15 * 60;

    #[test]
    fn full_when_forced_empty_or_without_cursor() {
        assert_eq!(decide_strategy(true, true, Some(NOW), NOW, INTERVAL), Strategy::Full);
        assert_eq!(decide_strategy(false, false, Some(NOW), NOW, INTERVAL), Strategy::Full);
        assert_eq!(decide_strategy(false, true, None, NOW, INTERVAL), Strategy::Full);
    }

    #[test]
    fn diff_once_cursor_is_older_than_interval() {
        let since = NOW - 20 * 60;
        assert_eq!(
            decide_strategy(false, true, Some(since), NOW, INTERVAL),
            Strategy::Diff { since }
        );
    }

    #[test]
    fn noop_while_cursor_is_fresh() {
        assert_eq!(
            decide_strategy(false, true, Some(NOW - 5 * 60), NOW, INTERVAL),
            Strategy::NoOp
        );
        assert_eq!(
            decide_strategy(false, true, Some(NOW - INTERVAL), NOW, INTERVAL),
            Strategy::NoOp
        );
    }

    #[test]
    fn strategy_serializes_with_kind_tag() {
        let value = serde_json::to_value(Strategy::Diff { since: 5 }).expect("encode");
        assert_eq!(value, serde_json::json!({ "kind": "diff", "since": 5 }));
    }
}
