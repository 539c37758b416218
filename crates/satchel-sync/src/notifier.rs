use crate::item::Item;
use crate::matching::matches_url;
use serde::{Deserialize, Serialize};

/// An open browser tab as seen by the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tab {
    pub id: u64,
    pub url: String,
}

/// Receives presentation signals. Rendering is up to the implementor.
pub trait PresentationNotifier {
    fn on_items_changed(&self, items: &[Item]);

    fn on_mutation_started(&self);

    fn on_mutation_succeeded(&self);

    fn on_mutation_failed(&self);

    /// A tab whose page was just added to or removed from the list.
    fn refresh_tab(&self, _tab: &Tab, _in_list: bool) {}
}

pub trait TabHost {
    fn open_tabs(&self) -> Vec<Tab>;

    fn close_tab(&self, tab_id: u64);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopNotifier;

impl PresentationNotifier for NoopNotifier {
    fn on_items_changed(&self, _items: &[Item]) {}

    fn on_mutation_started(&self) {}

    fn on_mutation_succeeded(&self) {}

    fn on_mutation_failed(&self) {}
}

/// Logs every signal at debug level.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl PresentationNotifier for TracingNotifier {
    fn on_items_changed(&self, items: &[Item]) {
        let badge = BadgeState::from_items(items);
        tracing::debug!(count = badge.count, badge = %badge.text(), "items changed");
    }

    fn on_mutation_started(&self) {
        tracing::debug!("mutation started");
    }

    fn on_mutation_succeeded(&self) {
        tracing::debug!("mutation succeeded");
    }

    fn on_mutation_failed(&self) {
        tracing::debug!("mutation failed");
    }

    fn refresh_tab(&self, tab: &Tab, in_list: bool) {
        tracing::debug!(tab_id = tab.id, in_list, "tab refresh requested");
    }
}

/// No browser attached.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoTabs;

impl TabHost for NoTabs {
    fn open_tabs(&self) -> Vec<Tab> {
        Vec::new()
    }

    fn close_tab(&self, _tab_id: u64) {}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BadgeState {
    pub count: usize,
}

impl BadgeState {
    pub fn from_items(items: &[Item]) -> Self {
        Self { count: items.len() }
    }

    /// Badge label; empty when there is nothing to read.
    pub fn text(&self) -> String {
        if self.count == 0 {
            String::new()
        } else {
            self.count.to_string()
        }
    }
}

/// Whether the page in `tab` is one of `items`.
pub fn tab_in_list(tab: &Tab, items: &[Item]) -> bool {
    items.iter().any(|item| matches_url(item, &tab.url))
}
