use crate::item::Item;
use crate::matching::matches_url;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FavFilter {
    Faved,
    Unfaved,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagFilter {
    Tagged,
    Untagged,
}

/// A parsed search query: `is:` predicates plus lowercase free text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Query {
    pub fav: Option<FavFilter>,
    pub tagged: Option<TagFilter>,
    pub text: String,
}

enum Predicate {
    Fav(FavFilter),
    Tag(TagFilter),
}

impl Query {
    /// Predicates are whole words, case-insensitive; when repeated the last
    /// one wins. Everything else, spacing included, is the free text.
    pub fn parse(raw: &str) -> Self {
        let mut query = Self::default();
        let mut text = String::with_capacity(raw.len());

        for piece in raw.split_inclusive(char::is_whitespace) {
            match predicate(piece.trim_end()) {
                Some(Predicate::Fav(filter)) => query.fav = Some(filter),
                Some(Predicate::Tag(filter)) => query.tagged = Some(filter),
                None => text.push_str(piece),
            }
        }

        query.text = text.trim().to_lowercase();
        query
    }

    pub fn matches(&self, item: &Item) -> bool {
        let fav_ok = match self.fav {
            Some(FavFilter::Faved) => item.fav.is_faved(),
            Some(FavFilter::Unfaved) => !item.fav.is_faved(),
            None => true,
        };
        let tag_ok = match self.tagged {
            Some(TagFilter::Tagged) => item.is_tagged(),
            Some(TagFilter::Untagged) => !item.is_tagged(),
            None => true,
        };

        fav_ok && tag_ok && self.matches_text(item)
    }

    fn matches_text(&self, item: &Item) -> bool {
        if self.text.is_empty() {
            return true;
        }

        item.title.to_lowercase().contains(&self.text)
            || searchable_url(&item.url).contains(&self.text)
            || item
                .tags
                .iter()
                .any(|tag| tag.to_lowercase().contains(&self.text))
    }
}

fn predicate(word: &str) -> Option<Predicate> {
    match word.to_ascii_lowercase().as_str() {
        "is:faved" => Some(Predicate::Fav(FavFilter::Faved)),
        "is:unfaved" => Some(Predicate::Fav(FavFilter::Unfaved)),
        "is:tagged" => Some(Predicate::Tag(TagFilter::Tagged)),
        "is:untagged" => Some(Predicate::Tag(TagFilter::Untagged)),
        _ => None,
    }
}

/// Lowercased URL without protocol and leading `www.`.
fn searchable_url(url: &str) -> String {
    let lower = url.to_lowercase();
    let without_scheme = lower
        .strip_prefix("https://")
        .or_else(|| lower.strip_prefix("http://"))
        .unwrap_or(&lower);
    without_scheme
        .strip_prefix("www.")
        .unwrap_or(without_scheme)
        .to_string()
}

/// Items matching `query`, in input order. Items representing
/// `current_url` are left out.
pub fn filter(items: &[Item], query: &str, current_url: Option<&str>) -> Vec<Item> {
    let query = Query::parse(query);
    items
        .iter()
        .filter(|item| current_url.is_none_or(|url| !matches_url(item, url)))
        .filter(|item| query.matches(item))
        .cloned()
        .collect()
}

/// One page of `items` ordered newest first.
///
/// With no page size (or zero), or nothing to page through, every item comes
/// back at once. A page outside `1..=page_count` yields `None`.
pub fn paginate(items: &[Item], page: i64, per_page: Option<usize>) -> Option<Vec<Item>> {
    let mut sorted = items.to_vec();
    sorted.sort_by(|left, right| right.created_at.cmp(&left.created_at));

    let per_page = match per_page {
        Some(size) if size > 0 && !sorted.is_empty() => size,
        _ => return Some(sorted),
    };

    let page_count = sorted.len().div_ceil(per_page);
    let index = match usize::try_from(page) {
        Ok(index) if index >= 1 && index <= page_count => index,
        _ => {
            tracing::warn!(page, page_count, "requested page is out of range");
            return None;
        }
    };

    let start = (index - 1) * per_page;
    let end = (start + per_page).min(sorted.len());
    Some(sorted[start..end].to_vec())
}
