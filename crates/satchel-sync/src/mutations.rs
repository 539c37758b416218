use crate::engine::{Anomaly, SyncEngine};
use crate::item::{Fav, Item, RawItemToAdd, find_by_id, normalize_tags, position_by_id};
use crate::matching::{contains, matches_url};
use crate::notifier::{Tab, tab_in_list};
use chrono::Utc;
use satchel_api::{ItemFromApi, SendResponse};
use satchel_core::{Event, SatchelError, SatchelResult};
use serde::Serialize;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MutationOutcome {
    /// Ids touched on the server and in the cache.
    pub ids: Vec<String>,
    /// Inputs skipped because the list already has them.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub already_in_list: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub anomalies: Vec<Anomaly>,
    pub cached_total: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Removal {
    Archive,
    Delete,
}

impl Removal {
    fn as_str(self) -> &'static str {
        match self {
            Self::Archive => "archive",
            Self::Delete => "delete",
        }
    }
}

impl SyncEngine<'_> {
    pub fn add_item(&mut self, item: RawItemToAdd) -> SatchelResult<MutationOutcome> {
        self.add_items(vec![item])
    }

    /// Adds the URLs the list does not have yet. When every URL is already
    /// present nothing is sent and an already-in-list notice goes out.
    pub fn add_items(&mut self, inputs: Vec<RawItemToAdd>) -> SatchelResult<MutationOutcome> {
        let cached = self.items.load_items()?;
        let mut outcome = MutationOutcome::default();

        let mut fresh: Vec<RawItemToAdd> = Vec::with_capacity(inputs.len());
        for input in inputs {
            let url = input.url.trim();
            if url.is_empty() {
                continue;
            }
            if contains(&cached, url) || fresh.iter().any(|pending| pending.url == url) {
                outcome.already_in_list.push(url.to_string());
            } else {
                fresh.push(RawItemToAdd {
                    url: url.to_string(),
                    ..input
                });
            }
        }

        if fresh.is_empty() {
            tracing::info!(urls = outcome.already_in_list.len(), "already in list");
            self.events.emit(Event::AlreadyInList {
                urls: outcome.already_in_list.clone(),
            });
            self.notifier.on_items_changed(&cached);
            outcome.cached_total = cached.len();
            return Ok(outcome);
        }

        self.notifier.on_mutation_started();
        let results = match self.remote_add(&fresh) {
            Ok(results) => results,
            Err(error) => return Err(self.fail("add", error)),
        };

        if results.len() != fresh.len() {
            Anomaly::AddCountMismatch {
                requested: fresh.len(),
                returned: results.len(),
            }
            .report(&mut outcome.anomalies);
        }

        let now = Utc::now().timestamp();
        let mut added: Vec<Item> = Vec::with_capacity(fresh.len());
        let items = self.commit("add", |items| {
            for (input, result) in fresh.iter().zip(results) {
                let Some(raw) = result else {
                    Anomaly::AddRejected {
                        url: input.url.clone(),
                    }
                    .report(&mut outcome.anomalies);
                    continue;
                };

                let title = input
                    .title
                    .as_deref()
                    .map(str::trim)
                    .filter(|title| !title.is_empty());
                let item = match items.iter_mut().find(|known| known.id == raw.item_id) {
                    // Known under another URL form: the cached entry keeps its
                    // tags, favorite flag and timestamps.
                    Some(known) => {
                        if let Some(title) = title {
                            known.title = title.to_string();
                        }
                        known.clone()
                    }
                    None => {
                        let title = title
                            .map(str::to_string)
                            .unwrap_or_else(|| Item::from_api(&raw).title);
                        let item = Item::added(raw.item_id.clone(), input.url.clone(), title, now);
                        items.push(item.clone());
                        item
                    }
                };
                outcome.ids.push(item.id.clone());
                added.push(item);
            }
        })?;
        outcome.cached_total = items.len();

        self.events.emit(Event::AddedItem {
            ids: outcome.ids.clone(),
        });
        self.notifier.on_mutation_succeeded();
        self.notifier.on_items_changed(&items);

        if self.settings.close_tab_on_add {
            for tab_id in fresh.iter().filter_map(|input| input.tab_id) {
                self.tabs.close_tab(tab_id);
            }
        }
        self.refresh_tabs_matching(&added, true);

        Ok(outcome)
    }

    pub fn archive(&mut self, id: &str, tab_id: Option<u64>) -> SatchelResult<MutationOutcome> {
        self.remove(Removal::Archive, id, tab_id)
    }

    pub fn delete(&mut self, id: &str, tab_id: Option<u64>) -> SatchelResult<MutationOutcome> {
        self.remove(Removal::Delete, id, tab_id)
    }

    pub fn favorite(&mut self, id: &str) -> SatchelResult<MutationOutcome> {
        self.set_fav(id, Fav::Faved)
    }

    pub fn unfavorite(&mut self, id: &str) -> SatchelResult<MutationOutcome> {
        self.set_fav(id, Fav::Unfaved)
    }

    /// Replaces the title and the whole tag set of one item.
    pub fn update(&mut self, id: &str, title: &str, tags: &[String]) -> SatchelResult<MutationOutcome> {
        if self.locate(id)?.is_none() {
            return self.not_found(id);
        }
        let tags = normalize_tags(tags);
        let title = title.trim();

        self.notifier.on_mutation_started();
        let token = self.token_or_fail("update")?;
        let result = self.api.update_metadata(&token, id, title, &tags);
        if let Err(error) = confirmed("update", id, result) {
            return Err(self.fail("update", error));
        }

        let outcome = self.apply("update", id, |item| {
            item.title = title.to_string();
            item.tags = tags;
            item.updated_at = Utc::now().timestamp();
        })?;
        self.events.emit(Event::Updated { id: id.to_string() });
        self.notifier.on_mutation_succeeded();
        Ok(outcome)
    }

    fn set_fav(&mut self, id: &str, fav: Fav) -> SatchelResult<MutationOutcome> {
        let operation = if fav.is_faved() { "favorite" } else { "unfavorite" };
        if self.locate(id)?.is_none() {
            return self.not_found(id);
        }

        self.notifier.on_mutation_started();
        let token = self.token_or_fail(operation)?;
        let result = if fav.is_faved() {
            self.api.favorite(&token, id)
        } else {
            self.api.unfavorite(&token, id)
        };
        if let Err(error) = confirmed(operation, id, result) {
            return Err(self.fail(operation, error));
        }

        let outcome = self.apply(operation, id, |item| item.fav = fav)?;
        self.events.emit(if fav.is_faved() {
            Event::Favorited { id: id.to_string() }
        } else {
            Event::Unfavorited { id: id.to_string() }
        });
        self.notifier.on_mutation_succeeded();
        Ok(outcome)
    }

    fn remove(&mut self, kind: Removal, id: &str, tab_id: Option<u64>) -> SatchelResult<MutationOutcome> {
        let Some(removed) = self.locate(id)? else {
            return self.not_found(id);
        };

        self.notifier.on_mutation_started();
        let token = self.token_or_fail(kind.as_str())?;
        let result = match kind {
            Removal::Archive => self.api.archive(&token, id),
            Removal::Delete => self.api.delete(&token, id),
        };
        if let Err(error) = confirmed(kind.as_str(), id, result) {
            return Err(self.fail(kind.as_str(), error));
        }

        let mut outcome = MutationOutcome::default();
        let items = self.commit(kind.as_str(), |items| match position_by_id(items, id) {
            Some(index) => {
                items.remove(index);
            }
            None => Anomaly::MissingForRemoval { id: id.to_string() }.report(&mut outcome.anomalies),
        })?;
        outcome.ids.push(id.to_string());
        outcome.cached_total = items.len();

        self.events.emit(match kind {
            Removal::Archive => Event::MarkedAsRead { id: id.to_string() },
            Removal::Delete => Event::Deleted { id: id.to_string() },
        });
        self.notifier.on_mutation_succeeded();
        self.notifier.on_items_changed(&items);

        let mut closed = None;
        if self.settings.close_tab_on_read
            && let Some(tab_id) = tab_id
            && let Some(tab) = self
                .tabs
                .open_tabs()
                .into_iter()
                .find(|tab| tab.id == tab_id && matches_url(&removed, &tab.url))
        {
            self.tabs.close_tab(tab.id);
            closed = Some(tab.id);
        }
        let tabs: Vec<Tab> = self
            .tabs
            .open_tabs()
            .into_iter()
            .filter(|tab| Some(tab.id) != closed && matches_url(&removed, &tab.url))
            .collect();
        for tab in &tabs {
            self.notifier.refresh_tab(tab, false);
        }

        Ok(outcome)
    }

    fn remote_add(&self, fresh: &[RawItemToAdd]) -> SatchelResult<Vec<Option<ItemFromApi>>> {
        let token = self.items.access_token()?;
        if let [single] = fresh {
            let item = self.api.add(&token, &single.url, single.title.as_deref())?;
            return Ok(vec![Some(item)]);
        }

        let entries: Vec<(String, Option<String>)> = fresh
            .iter()
            .map(|input| (input.url.clone(), input.title.clone()))
            .collect();
        Ok(self.api.add_batch(&token, &entries)?.items())
    }

    /// Read, change, write once the server has accepted the change. A store
    /// failure here is reported the same way as a remote one.
    fn commit(&mut self, operation: &str, change: impl FnOnce(&mut Vec<Item>)) -> SatchelResult<Vec<Item>> {
        let written = self.items.load_items().and_then(|mut items| {
            change(&mut items);
            self.items.save_items(&items).map(|()| items)
        });
        written.map_err(|error| self.fail(operation, error))
    }

    /// Changes one item. The item may have vanished since the remote call
    /// started; that is reported, not fatal.
    fn apply(&mut self, operation: &str, id: &str, change: impl FnOnce(&mut Item)) -> SatchelResult<MutationOutcome> {
        let mut outcome = MutationOutcome::default();
        let items = self.commit(operation, |items| match items.iter_mut().find(|item| item.id == id) {
            Some(item) => change(item),
            None => Anomaly::ItemNotFound { id: id.to_string() }.report(&mut outcome.anomalies),
        })?;
        outcome.ids.push(id.to_string());
        outcome.cached_total = items.len();
        self.notifier.on_items_changed(&items);
        Ok(outcome)
    }

    fn locate(&mut self, id: &str) -> SatchelResult<Option<Item>> {
        let items = self.items.load_items()?;
        Ok(find_by_id(&items, id).cloned())
    }

    /// The item is already gone locally; resync presentation and move on.
    fn not_found(&mut self, id: &str) -> SatchelResult<MutationOutcome> {
        let items = self.items.load_items()?;
        let mut outcome = MutationOutcome {
            cached_total: items.len(),
            ..MutationOutcome::default()
        };
        Anomaly::ItemNotFound { id: id.to_string() }.report(&mut outcome.anomalies);
        self.notifier.on_items_changed(&items);
        Ok(outcome)
    }

    fn token_or_fail(&self, operation: &str) -> SatchelResult<String> {
        self.items
            .access_token()
            .map_err(|error| self.fail(operation, error))
    }

    fn refresh_tabs_matching(&self, items: &[Item], in_list: bool) {
        if items.is_empty() {
            return;
        }
        for tab in self.tabs.open_tabs() {
            if tab_in_list(&tab, items) {
                self.notifier.refresh_tab(&tab, in_list);
            }
        }
    }
}

/// `/v3/send` answers 200 even when an action was refused; the refusal sits
/// in `action_results`.
fn confirmed(operation: &str, id: &str, result: SatchelResult<SendResponse>) -> SatchelResult<()> {
    if result?.all_succeeded() {
        Ok(())
    } else {
        Err(SatchelError::generic(format!(
            "server refused {operation} for item {id}"
        )))
    }
}
