#![allow(dead_code)]

use satchel_core::{SatchelError, SatchelResult};
use satchel_store::{KeyValueStore, MemoryStore, keys, save_json};
use satchel_sync::{Item, PresentationNotifier, Tab, TabHost};
use std::cell::{Cell, RefCell};

pub const TOKEN: &str = "token-1";

#[derive(Default)]
pub struct RecordingNotifier {
    pub signals: RefCell<Vec<String>>,
    pub last_items: RefCell<Option<Vec<Item>>>,
    pub refreshed: RefCell<Vec<(u64, bool)>>,
}

impl RecordingNotifier {
    pub fn signals(&self) -> Vec<String> {
        self.signals.borrow().clone()
    }

    pub fn last_items(&self) -> Option<Vec<Item>> {
        self.last_items.borrow().clone()
    }
}

impl PresentationNotifier for RecordingNotifier {
    fn on_items_changed(&self, items: &[Item]) {
        self.signals.borrow_mut().push("items_changed".to_string());
        *self.last_items.borrow_mut() = Some(items.to_vec());
    }

    fn on_mutation_started(&self) {
        self.signals.borrow_mut().push("started".to_string());
    }

    fn on_mutation_succeeded(&self) {
        self.signals.borrow_mut().push("succeeded".to_string());
    }

    fn on_mutation_failed(&self) {
        self.signals.borrow_mut().push("failed".to_string());
    }

    fn refresh_tab(&self, tab: &Tab, in_list: bool) {
        self.refreshed.borrow_mut().push((tab.id, in_list));
    }
}

#[derive(Default)]
pub struct FakeTabs {
    pub open: RefCell<Vec<Tab>>,
    pub closed: RefCell<Vec<u64>>,
}

impl FakeTabs {
    pub fn with(tabs: &[(u64, &str)]) -> Self {
        Self {
            open: RefCell::new(
                tabs.iter()
                    .map(|(id, url)| Tab {
                        id: *id,
                        url: (*url).to_string(),
                    })
                    .collect(),
            ),
            closed: RefCell::new(Vec::new()),
        }
    }
}

impl TabHost for FakeTabs {
    fn open_tabs(&self) -> Vec<Tab> {
        self.open.borrow().clone()
    }

    fn close_tab(&self, tab_id: u64) {
        self.open.borrow_mut().retain(|tab| tab.id != tab_id);
        self.closed.borrow_mut().push(tab_id);
    }
}

pub fn item(id: &str, url: &str, title: &str, created_at: i64) -> Item {
    Item::added(id, url, title.to_string(), created_at)
}

/// A store holding an access token and, optionally, cached items and a cursor.
pub fn seeded_store(items: &[Item], cursor: Option<i64>) -> MemoryStore {
    let store = MemoryStore::new();
    save_json(&store, keys::ACCESS_TOKEN, TOKEN).expect("seed token");
    if !items.is_empty() {
        save_json(&store, keys::ITEMS, items).expect("seed items");
    }
    if let Some(cursor) = cursor {
        save_json(&store, keys::LAST_RETRIEVE, &cursor).expect("seed cursor");
    }
    store
}

pub fn stored_items(store: &MemoryStore) -> Vec<Item> {
    store
        .get(keys::ITEMS)
        .expect("read items")
        .map(|raw| serde_json::from_str(&raw).expect("items json"))
        .unwrap_or_default()
}

pub fn stored_cursor(store: &MemoryStore) -> Option<i64> {
    store
        .get(keys::LAST_RETRIEVE)
        .expect("read cursor")
        .map(|raw| raw.parse().expect("numeric cursor"))
}

/// Delegates to a memory store but refuses writes to the item cache while
/// `fail_item_writes` is set.
pub struct ItemWriteFailingStore {
    pub inner: MemoryStore,
    pub fail_item_writes: Cell<bool>,
}

impl ItemWriteFailingStore {
    pub fn wrapping(inner: MemoryStore) -> Self {
        Self {
            inner,
            fail_item_writes: Cell::new(true),
        }
    }
}

impl KeyValueStore for ItemWriteFailingStore {
    fn get(&self, key: &str) -> SatchelResult<Option<String>> {
        self.inner.get(key)
    }

    fn set(&self, key: &str, value: &str) -> SatchelResult<()> {
        if key == keys::ITEMS && self.fail_item_writes.get() {
            return Err(SatchelError::io("disk full"));
        }
        self.inner.set(key, value)
    }

    fn remove(&self, key: &str) -> SatchelResult<()> {
        self.inner.remove(key)
    }
}
