use crate::engine::{SyncEngine, SyncOutcome};
use crate::item::{Item, RawItemToAdd};
use crate::mutations::MutationOutcome;
use crate::query::{filter, paginate};
use satchel_core::{SatchelError, SatchelResult};
use serde::{Deserialize, Serialize};

/// Inbound requests, one per operation the engine exposes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum Command {
    RetrieveItems {
        #[serde(default)]
        force: bool,
    },
    ReadItems {
        #[serde(default)]
        query: String,
        #[serde(default)]
        page: Option<i64>,
        #[serde(default)]
        per_page: Option<usize>,
        #[serde(default)]
        current_url: Option<String>,
    },
    AddItem {
        url: String,
        #[serde(default)]
        title: Option<String>,
        #[serde(default)]
        tab_id: Option<u64>,
    },
    AddItems {
        items: Vec<RawItemToAdd>,
    },
    Archive {
        id: String,
        #[serde(default)]
        tab_id: Option<u64>,
    },
    Delete {
        id: String,
        #[serde(default)]
        tab_id: Option<u64>,
    },
    Favorite {
        id: String,
    },
    Unfavorite {
        id: String,
    },
    Update {
        id: String,
        title: String,
        #[serde(default)]
        tags: Vec<String>,
    },
}

impl Command {
    pub fn parse(raw: &str) -> SatchelResult<Self> {
        serde_json::from_str(raw)
            .map_err(|err| SatchelError::usage(format!("invalid command payload: {err}")))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Reply {
    Synced(SyncOutcome),
    Items { items: Vec<Item>, total: usize },
    Mutated(MutationOutcome),
}

impl SyncEngine<'_> {
    pub fn dispatch(&mut self, command: Command) -> SatchelResult<Reply> {
        tracing::debug!(?command, "dispatching command");
        match command {
            Command::RetrieveItems { force } => self.retrieve_items(force).map(Reply::Synced),
            Command::ReadItems {
                query,
                page,
                per_page,
                current_url,
            } => {
                let (items, total) =
                    self.read_items(&query, page, per_page, current_url.as_deref())?;
                Ok(Reply::Items { items, total })
            }
            Command::AddItem { url, title, tab_id } => self
                .add_item(RawItemToAdd { url, title, tab_id })
                .map(Reply::Mutated),
            Command::AddItems { items } => self.add_items(items).map(Reply::Mutated),
            Command::Archive { id, tab_id } => self.archive(&id, tab_id).map(Reply::Mutated),
            Command::Delete { id, tab_id } => self.delete(&id, tab_id).map(Reply::Mutated),
            Command::Favorite { id } => self.favorite(&id).map(Reply::Mutated),
            Command::Unfavorite { id } => self.unfavorite(&id).map(Reply::Mutated),
            Command::Update { id, title, tags } => {
                self.update(&id, &title, &tags).map(Reply::Mutated)
            }
        }
    }

    /// Filtered page of the cache and the number of matches before paging.
    /// An out-of-range page is empty.
    pub fn read_items(
        &mut self,
        query: &str,
        page: Option<i64>,
        per_page: Option<usize>,
        current_url: Option<&str>,
    ) -> SatchelResult<(Vec<Item>, usize)> {
        let cached = self.cached_items()?;
        let matched = filter(&cached, query, current_url);
        let total = matched.len();
        let items = paginate(&matched, page.unwrap_or(1), per_page).unwrap_or_default();
        Ok((items, total))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_kebab_actions_with_camel_fields() {
        let command = Command::parse(
            r#"{"action":"read-items","query":"is:faved","perPage":20,"currentUrl":"https://a.com"}"#,
        )
        .expect("parse");
        assert_eq!(
            command,
            Command::ReadItems {
                query: "is:faved".to_string(),
                page: None,
                per_page: Some(20),
                current_url: Some("https://a.com".to_string()),
            }
        );

        let command = Command::parse(r#"{"action":"archive","id":"7","tabId":3}"#).expect("parse");
        assert_eq!(
            command,
            Command::Archive {
                id: "7".to_string(),
                tab_id: Some(3),
            }
        );
    }

    #[test]
    fn batch_add_accepts_tab_ids() {
        let command = Command::parse(
            r#"{"action":"add-items","items":[{"url":"https://a.com","title":"A","tabId":1},{"url":"https://b.com"}]}"#,
        )
        .expect("parse");
        let Command::AddItems { items } = command else {
            panic!("expected add-items");
        };
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].tab_id, Some(1));
        assert_eq!(items[1].title, None);
    }

    #[test]
    fn unknown_action_is_a_usage_error() {
        let error = Command::parse(r#"{"action":"explode"}"#).expect_err("unknown");
        assert_eq!(error.kind, satchel_core::ErrorKind::Usage);
    }

    #[test]
    fn retrieve_defaults_to_unforced() {
        assert_eq!(
            Command::parse(r#"{"action":"retrieve-items"}"#).expect("parse"),
            Command::RetrieveItems { force: false }
        );
    }
}
