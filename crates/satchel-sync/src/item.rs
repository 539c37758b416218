use satchel_api::ItemFromApi;
use serde::{Deserialize, Serialize};

/// Favorite flag, stored as the strings `"0"` / `"1"` so the cached JSON
/// keeps the server's encoding.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Fav {
    #[default]
    #[serde(rename = "0")]
    Unfaved,
    #[serde(rename = "1")]
    Faved,
}

impl Fav {
    pub fn from_flag(flag: Option<&str>) -> Self {
        match flag.map(str::trim) {
            Some("1") => Self::Faved,
            _ => Self::Unfaved,
        }
    }

    pub fn is_faved(self) -> bool {
        self == Self::Faved
    }

    pub fn flipped(self) -> Self {
        match self {
            Self::Faved => Self::Unfaved,
            Self::Unfaved => Self::Faved,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub id: String,
    pub url: String,
    pub title: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub fav: Fav,
    #[serde(default)]
    pub created_at: i64,
    #[serde(default)]
    pub updated_at: i64,
}

/// Input to an add operation. Never persisted as-is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawItemToAdd {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, rename = "tabId", alias = "tab_id", skip_serializing_if = "Option::is_none")]
    pub tab_id: Option<u64>,
}

impl RawItemToAdd {
    pub fn new(url: impl Into<String>, title: Option<String>) -> Self {
        Self {
            url: url.into(),
            title,
            tab_id: None,
        }
    }
}

impl Item {
    /// Normalizes a server item: the user-given URL and title win over the
    /// resolved ones, and a missing title becomes the empty string.
    pub fn from_api(raw: &ItemFromApi) -> Self {
        let url = first_present(&[&raw.given_url, &raw.resolved_url, &raw.normal_url]);
        let title = first_present(&[&raw.given_title, &raw.resolved_title, &raw.title]);
        let created_at = raw.time_added.unwrap_or_default();

        Self {
            id: raw.item_id.clone(),
            url,
            title,
            tags: raw.tags.clone(),
            fav: Fav::from_flag(raw.favorite.as_deref()),
            created_at,
            updated_at: raw.time_updated.unwrap_or(created_at),
        }
    }

    /// A freshly added entry. Tags and server timestamps arrive with the
    /// next sync.
    pub fn added(id: impl Into<String>, url: impl Into<String>, title: String, now: i64) -> Self {
        Self {
            id: id.into(),
            url: url.into(),
            title,
            tags: Vec::new(),
            fav: Fav::Unfaved,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_tagged(&self) -> bool {
        self.tags.iter().any(|tag| !tag.trim().is_empty())
    }

    /// Overwrites this entry with a newer normalized copy of the same item.
    /// Fields the incoming copy lacks keep their cached value, so applying
    /// the same delta twice yields the same entry.
    pub fn merge_from(&mut self, incoming: Item) {
        debug_assert_eq!(self.id, incoming.id);

        if !incoming.url.is_empty() {
            self.url = incoming.url;
        }
        if !incoming.title.is_empty() || self.title.is_empty() {
            self.title = incoming.title;
        }
        self.tags = incoming.tags;
        self.fav = incoming.fav;
        if incoming.created_at != 0 {
            self.created_at = incoming.created_at;
        }
        if incoming.updated_at != 0 {
            self.updated_at = incoming.updated_at;
        }
    }
}

/// Same title and same tag set; tag order is ignored.
pub fn are_same(left: &Item, right: &Item) -> bool {
    if left.title != right.title {
        return false;
    }

    let mut left_tags = left.tags.clone();
    let mut right_tags = right.tags.clone();
    left_tags.sort();
    right_tags.sort();
    left_tags == right_tags
}

pub fn position_by_id(items: &[Item], id: &str) -> Option<usize> {
    items.iter().position(|item| item.id == id)
}

pub fn find_by_id<'a>(items: &'a [Item], id: &str) -> Option<&'a Item> {
    items.iter().find(|item| item.id == id)
}

/// Merges into the entry with the same id, or appends. Keeps ids unique.
pub fn upsert(items: &mut Vec<Item>, item: Item) {
    match position_by_id(items, &item.id) {
        Some(index) => items[index].merge_from(item),
        None => items.push(item),
    }
}

/// Trims, drops empties and duplicates, keeps first-seen order.
pub fn normalize_tags(tags: &[String]) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(tags.len());
    for tag in tags {
        let trimmed = tag.trim();
        if !trimmed.is_empty() && !out.iter().any(|existing| existing == trimmed) {
            out.push(trimmed.to_string());
        }
    }
    out
}

fn first_present(candidates: &[&Option<String>]) -> String {
    candidates
        .iter()
        .filter_map(|candidate| candidate.as_deref())
        .map(str::trim)
        .find(|value| !value.is_empty())
        .unwrap_or_default()
        .to_string()
}
