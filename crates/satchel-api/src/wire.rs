//! Request and response shapes of the Pocket v3 endpoints.
//!
//! The server is loose about types: ids and timestamps arrive as strings or
//! numbers, an empty `list` is sent as `[]` instead of `{}`, and tags are a map
//! keyed by tag name. The deserializers here absorb that so callers only see
//! plain Rust types.

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const STATUS_NORMAL: &str = "0";
pub const STATUS_ARCHIVED: &str = "1";
pub const STATUS_DELETED: &str = "2";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemFromApi {
    #[serde(deserialize_with = "string_or_number")]
    pub item_id: String,
    #[serde(default, deserialize_with = "opt_string_or_number")]
    pub resolved_id: Option<String>,
    #[serde(default)]
    pub given_url: Option<String>,
    #[serde(default)]
    pub resolved_url: Option<String>,
    #[serde(default)]
    pub normal_url: Option<String>,
    #[serde(default)]
    pub given_title: Option<String>,
    #[serde(default)]
    pub resolved_title: Option<String>,
    /// Present on add responses instead of `resolved_title`.
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "opt_string_or_number")]
    pub favorite: Option<String>,
    #[serde(default, deserialize_with = "opt_string_or_number")]
    pub status: Option<String>,
    #[serde(default, deserialize_with = "tag_names")]
    pub tags: Vec<String>,
    #[serde(default, deserialize_with = "opt_timestamp")]
    pub time_added: Option<i64>,
    #[serde(default, deserialize_with = "opt_timestamp")]
    pub time_updated: Option<i64>,
    #[serde(default, deserialize_with = "opt_timestamp")]
    pub sort_id: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemStatus {
    Normal,
    Archived,
    Deleted,
    Unknown(String),
}

impl ItemStatus {
    /// The wire code, e.g. `"1"` for archived.
    pub fn code(&self) -> &str {
        match self {
            Self::Normal => STATUS_NORMAL,
            Self::Archived => STATUS_ARCHIVED,
            Self::Deleted => STATUS_DELETED,
            Self::Unknown(code) => code,
        }
    }
}

impl ItemFromApi {
    /// A missing status is read as normal: add and send responses omit it.
    pub fn status(&self) -> ItemStatus {
        match self.status.as_deref() {
            None | Some(STATUS_NORMAL) => ItemStatus::Normal,
            Some(STATUS_ARCHIVED) => ItemStatus::Archived,
            Some(STATUS_DELETED) => ItemStatus::Deleted,
            Some(other) => ItemStatus::Unknown(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemState {
    Unread,
    All,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Oldest,
}

#[derive(Debug, Clone, Serialize)]
pub struct FetchRequest {
    #[serde(rename = "detailType")]
    pub detail_type: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<ItemState>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub since: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offset: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sort: Option<SortOrder>,
}

impl FetchRequest {
    /// One page of unread items, oldest first.
    pub fn unread_page(offset: usize, count: usize) -> Self {
        Self {
            detail_type: "complete",
            state: Some(ItemState::Unread),
            since: None,
            offset: Some(offset),
            count: Some(count),
            sort: Some(SortOrder::Oldest),
        }
    }

    /// Every change (including archives and deletes) since `since`.
    pub fn changes_since(since: i64) -> Self {
        Self {
            detail_type: "complete",
            state: Some(ItemState::All),
            since: Some(since),
            offset: None,
            count: None,
            sort: None,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FetchResponse {
    #[serde(default, deserialize_with = "item_list")]
    pub list: Vec<ItemFromApi>,
    #[serde(default, deserialize_with = "opt_timestamp")]
    pub since: Option<i64>,
    #[serde(default)]
    pub status: Option<i64>,
}

/// `/v3/add` answers either `{ "item": { .. } }` or the item fields at the
/// top level.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum AddResponse {
    Wrapped { item: ItemFromApi },
    Bare(ItemFromApi),
}

impl AddResponse {
    pub fn into_item(self) -> ItemFromApi {
        match self {
            Self::Wrapped { item } | Self::Bare(item) => item,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Action {
    pub action: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub item_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<String>,
}

impl Action {
    pub fn add(url: impl Into<String>, title: Option<String>) -> Self {
        Self {
            action: "add",
            url: Some(url.into()),
            title,
            ..Self::default()
        }
    }

    pub fn archive(item_id: impl Into<String>) -> Self {
        Self::for_item("archive", item_id)
    }

    pub fn delete(item_id: impl Into<String>) -> Self {
        Self::for_item("delete", item_id)
    }

    pub fn favorite(item_id: impl Into<String>) -> Self {
        Self::for_item("favorite", item_id)
    }

    pub fn unfavorite(item_id: impl Into<String>) -> Self {
        Self::for_item("unfavorite", item_id)
    }

    /// Re-adding an existing item id with a title overwrites the title.
    pub fn retitle(item_id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            ..Self::for_item("add", item_id)
        }
    }

    pub fn tags_replace(item_id: impl Into<String>, tags: &[String]) -> Self {
        if tags.is_empty() {
            return Self::for_item("tags_clear", item_id);
        }

        Self {
            tags: Some(tags.join(",")),
            ..Self::for_item("tags_replace", item_id)
        }
    }

    fn for_item(action: &'static str, item_id: impl Into<String>) -> Self {
        Self {
            action,
            item_id: Some(item_id.into()),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SendResponse {
    #[serde(default)]
    pub action_results: Vec<Value>,
    #[serde(default)]
    pub status: Option<i64>,
}

impl SendResponse {
    /// Per-action results that carry an item. Actions like archive answer
    /// with a bare `true`, which yields `None` at that position.
    pub fn items(&self) -> Vec<Option<ItemFromApi>> {
        self.action_results
            .iter()
            .map(|result| match result {
                Value::Object(_) => serde_json::from_value(result.clone()).ok(),
                _ => None,
            })
            .collect()
    }

    pub fn all_succeeded(&self) -> bool {
        self.action_results
            .iter()
            .all(|result| !matches!(result, Value::Bool(false) | Value::Null))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RequestTokenResponse {
    pub code: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Authorization {
    pub access_token: String,
    #[serde(default)]
    pub username: Option<String>,
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    opt_string_or_number(deserializer)?.ok_or_else(|| de::Error::custom("expected string or number"))
}

fn opt_string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(text)) => Ok(Some(text)),
        Some(Value::Number(number)) => Ok(Some(number.to_string())),
        Some(other) => Err(de::Error::custom(format!(
            "expected string or number, got {other}"
        ))),
    }
}

fn opt_timestamp<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(number)) => Ok(number.as_i64()),
        Some(Value::String(text)) => {
            let trimmed = text.trim();
            if trimmed.is_empty() {
                return Ok(None);
            }
            trimmed
                .parse::<i64>()
                .map(Some)
                .map_err(|err| de::Error::custom(format!("invalid timestamp '{text}': {err}")))
        }
        Some(other) => Err(de::Error::custom(format!(
            "expected timestamp, got {other}"
        ))),
    }
}

fn tag_names<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let names = match Option::<Value>::deserialize(deserializer)? {
        Some(Value::Object(map)) => map.keys().cloned().collect(),
        Some(Value::Array(values)) => values
            .into_iter()
            .filter_map(|value| match value {
                Value::String(tag) => Some(tag),
                Value::Object(map) => map
                    .get("tag")
                    .and_then(|tag| tag.as_str())
                    .map(str::to_string),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    };

    Ok(names)
}

fn item_list<'de, D>(deserializer: D) -> Result<Vec<ItemFromApi>, D::Error>
where
    D: Deserializer<'de>,
{
    let mut items: Vec<ItemFromApi> = match Option::<Value>::deserialize(deserializer)? {
        Some(Value::Object(map)) => map
            .into_iter()
            .map(|(_, raw)| serde_json::from_value(raw).map_err(de::Error::custom))
            .collect::<Result<_, _>>()?,
        Some(Value::Array(values)) => values
            .into_iter()
            .map(|raw| serde_json::from_value(raw).map_err(de::Error::custom))
            .collect::<Result<_, _>>()?,
        _ => Vec::new(),
    };

    // The map carries no order of its own; sort_id is the server's ordering.
    items.sort_by_key(|item| item.sort_id.unwrap_or(i64::MAX));
    Ok(items)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn item_accepts_numeric_ids_and_string_timestamps() {
        let item: ItemFromApi = serde_json::from_value(json!({
            "item_id": 1234,
            "given_url": "https://a.com",
            "favorite": "1",
            "status": "0",
            "time_added": "1700000000",
            "time_updated": 1700000100,
            "tags": {"rust": {"item_id": "1234", "tag": "rust"}}
        }))
        .expect("item");

        assert_eq!(item.item_id, "1234");
        assert_eq!(item.time_added, Some(1_700_000_000));
        assert_eq!(item.time_updated, Some(1_700_000_100));
        assert_eq!(item.tags, vec!["rust".to_string()]);
        assert_eq!(item.status(), ItemStatus::Normal);
    }

    #[test]
    fn fetch_response_accepts_empty_array_list() {
        let response: FetchResponse =
            serde_json::from_value(json!({"status": 2, "list": [], "since": 1700000000}))
                .expect("response");

        assert!(response.list.is_empty());
        assert_eq!(response.since, Some(1_700_000_000));
    }

    #[test]
    fn fetch_response_orders_map_entries_by_sort_id() {
        let response: FetchResponse = serde_json::from_value(json!({
            "list": {
                "b": {"item_id": "b", "sort_id": 1},
                "a": {"item_id": "a", "sort_id": 0}
            },
            "since": "1700000000"
        }))
        .expect("response");

        let ids: Vec<_> = response.list.iter().map(|item| item.item_id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[test]
    fn add_response_accepts_both_shapes() {
        let wrapped: AddResponse =
            serde_json::from_value(json!({"item": {"item_id": "7", "title": "T"}, "status": 1}))
                .expect("wrapped");
        let bare: AddResponse =
            serde_json::from_value(json!({"item_id": "8", "resolved_url": "https://b.com"}))
                .expect("bare");

        assert_eq!(wrapped.into_item().item_id, "7");
        assert_eq!(bare.into_item().item_id, "8");
    }

    #[test]
    fn unknown_status_is_preserved() {
        let item: ItemFromApi =
            serde_json::from_value(json!({"item_id": "1", "status": "5"})).expect("item");
        assert_eq!(item.status(), ItemStatus::Unknown("5".to_string()));
    }

    #[test]
    fn empty_tag_list_clears_instead_of_replacing() {
        assert_eq!(Action::tags_replace("1", &[]).action, "tags_clear");
        let replace = Action::tags_replace("1", &["a".to_string(), "b".to_string()]);
        assert_eq!(replace.action, "tags_replace");
        assert_eq!(replace.tags.as_deref(), Some("a,b"));
    }
}
