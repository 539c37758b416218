use crate::item::Item;
use satchel_core::{SatchelError, SatchelResult};
use satchel_store::{KeyValueStore, keys, load_json, save_json};
use sha2::{Digest, Sha256};

/// Typed access to the item cache and its bookkeeping keys.
///
/// The stored `items` blob is hashed on every read; a parse only happens
/// when the digest differs from the one behind the last parsed copy.
pub struct ItemRepository<'a> {
    store: &'a dyn KeyValueStore,
    parsed: Option<ParsedItems>,
    parse_count: usize,
}

struct ParsedItems {
    checksum: String,
    items: Vec<Item>,
}

impl<'a> ItemRepository<'a> {
    pub fn new(store: &'a dyn KeyValueStore) -> Self {
        Self {
            store,
            parsed: None,
            parse_count: 0,
        }
    }

    pub fn store(&self) -> &'a dyn KeyValueStore {
        self.store
    }

    pub fn load_items(&mut self) -> SatchelResult<Vec<Item>> {
        let raw = match self.store.get(keys::ITEMS)? {
            Some(raw) if !raw.trim().is_empty() => raw,
            _ => {
                self.parsed = None;
                return Ok(Vec::new());
            }
        };

        let checksum = checksum(&raw);
        if let Some(parsed) = &self.parsed
            && parsed.checksum == checksum
        {
            return Ok(parsed.items.clone());
        }

        let items: Vec<Item> = serde_json::from_str(&raw)
            .map_err(|err| SatchelError::io(format!("failed to parse cached items: {err}")))?;
        self.parse_count += 1;
        self.parsed = Some(ParsedItems {
            checksum,
            items: items.clone(),
        });
        Ok(items)
    }

    pub fn save_items(&mut self, items: &[Item]) -> SatchelResult<()> {
        let payload = serde_json::to_string(items)
            .map_err(|err| SatchelError::io(format!("failed to encode cached items: {err}")))?;
        self.store.set(keys::ITEMS, &payload)?;
        self.parsed = Some(ParsedItems {
            checksum: checksum(&payload),
            items: items.to_vec(),
        });
        Ok(())
    }

    /// How many times the stored blob was actually parsed.
    pub fn parse_count(&self) -> usize {
        self.parse_count
    }

    pub fn last_retrieve(&self) -> SatchelResult<Option<i64>> {
        load_json(self.store, keys::LAST_RETRIEVE)
    }

    pub fn set_last_retrieve(&self, since: i64) -> SatchelResult<()> {
        save_json(self.store, keys::LAST_RETRIEVE, &since)
    }

    pub fn clear_last_retrieve(&self) -> SatchelResult<()> {
        self.store.remove(keys::LAST_RETRIEVE)
    }

    pub fn full_sync_version(&self) -> SatchelResult<Option<String>> {
        load_json(self.store, keys::LAST_FULL_SYNC_AT_VERSION)
    }

    pub fn set_full_sync_version(&self, version: &str) -> SatchelResult<()> {
        save_json(self.store, keys::LAST_FULL_SYNC_AT_VERSION, version)
    }

    pub fn access_token(&self) -> SatchelResult<String> {
        load_json::<String>(self.store, keys::ACCESS_TOKEN)?
            .filter(|token| !token.trim().is_empty())
            .ok_or_else(|| {
                SatchelError::unauthorized("no access token stored; run `satchel auth login` first")
            })
    }

    /// Drops the cached items together with the cursor and the full-sync
    /// marker, so the next retrieve starts from scratch.
    pub fn reset(&mut self) -> SatchelResult<()> {
        self.store.remove(keys::ITEMS)?;
        self.store.remove(keys::LAST_RETRIEVE)?;
        self.store.remove(keys::LAST_FULL_SYNC_AT_VERSION)?;
        self.parsed = None;
        Ok(())
    }
}

fn checksum(raw: &str) -> String {
    hex::encode(Sha256::digest(raw.as_bytes()))
}
