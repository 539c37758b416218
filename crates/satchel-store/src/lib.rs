//! Durable state for one profile, held as string values under string keys.
//!
//! The store is deliberately dumb: no transactions, no compare-and-swap, no
//! secondary indexes. Values are JSON text; callers own their shape.

mod env;
mod memory;
mod sqlite;

pub use env::{EnvCredentials, resolve_env_credentials};
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use chrono::Utc;
use satchel_core::{SatchelError, SatchelResult};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

pub mod keys {
    pub const ITEMS: &str = "items";
    pub const LAST_RETRIEVE: &str = "last_retrieve";
    pub const LAST_FULL_SYNC_AT_VERSION: &str = "lastFullSyncAtVersion";
    pub const ACCESS_TOKEN: &str = "access_token";
    pub const USERNAME: &str = "username";
    pub const REQUEST_TOKEN: &str = "request_token";
    pub const SYNC_STATUS: &str = "sync_status";
}

pub trait KeyValueStore {
    fn get(&self, key: &str) -> SatchelResult<Option<String>>;

    fn set(&self, key: &str, value: &str) -> SatchelResult<()>;

    fn remove(&self, key: &str) -> SatchelResult<()>;
}

pub fn load_json<T: DeserializeOwned>(
    store: &dyn KeyValueStore,
    key: &str,
) -> SatchelResult<Option<T>> {
    let Some(raw) = store.get(key)? else {
        return Ok(None);
    };
    if raw.trim().is_empty() {
        return Ok(None);
    }

    serde_json::from_str::<T>(&raw)
        .map(Some)
        .map_err(|err| SatchelError::io(format!("failed to parse stored '{key}': {err}")))
}

pub fn save_json<T: Serialize + ?Sized>(
    store: &dyn KeyValueStore,
    key: &str,
    value: &T,
) -> SatchelResult<()> {
    let payload = serde_json::to_string(value)
        .map_err(|err| SatchelError::io(format!("failed to encode '{key}': {err}")))?;
    store.set(key, &payload)
}

/// Outcome of the most recent retrieve attempt, for status reporting.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncStatus {
    pub last_sync_at: Option<String>,
    pub last_strategy: Option<String>,
    pub last_sync_status: Option<String>,
    pub last_error: Option<String>,
    #[serde(default)]
    pub item_count: usize,
}

impl SyncStatus {
    pub fn load(store: &dyn KeyValueStore) -> SatchelResult<Self> {
        Ok(load_json(store, keys::SYNC_STATUS)?.unwrap_or_default())
    }

    pub fn save(&self, store: &dyn KeyValueStore) -> SatchelResult<()> {
        save_json(store, keys::SYNC_STATUS, self)
    }

    pub fn mark_ok(&mut self, strategy: &str, item_count: usize) {
        self.last_sync_at = Some(Utc::now().to_rfc3339());
        self.last_strategy = Some(strategy.to_string());
        self.last_sync_status = Some("ok".to_string());
        self.last_error = None;
        self.item_count = item_count;
    }

    pub fn mark_error(&mut self, strategy: &str, message: &str) {
        self.last_sync_at = Some(Utc::now().to_rfc3339());
        self.last_strategy = Some(strategy.to_string());
        self.last_sync_status = Some(format!("error: {message}"));
        self.last_error = Some(message.to_string());
    }
}
