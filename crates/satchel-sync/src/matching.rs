//! URL identity for cached items.
//!
//! A page can be looked at through several wrappers: the raw URL, the
//! browser reader view (`about:reader?url=...`) or the Pocket web reader
//! (`https://app.getpocket.com/read/...`, optionally under a locale
//! segment). All of them resolve to the same cached item. Matching is
//! always exact on the unwrapped value.

use crate::item::Item;
use std::borrow::Cow;

const READER_VIEW_PREFIX: &str = "about:reader?url=";
const READER_HOSTS: &[&str] = &["app.getpocket.com", "getpocket.com"];

#[derive(Debug, Clone, PartialEq, Eq)]
enum Candidate<'a> {
    /// Compared against the item URL.
    Url(Cow<'a, str>),
    /// Target of a web reader link, compared against the item URL or id.
    ReaderTarget(Cow<'a, str>),
}

pub fn matches_url(item: &Item, url: &str) -> bool {
    candidates(url).iter().any(|candidate| match candidate {
        Candidate::Url(value) => !item.url.is_empty() && item.url == *value,
        Candidate::ReaderTarget(value) => {
            (!item.url.is_empty() && item.url == *value) || item.id == *value
        }
    })
}

pub fn contains(items: &[Item], url: &str) -> bool {
    items.iter().any(|item| matches_url(item, url))
}

pub fn find_by_url<'a>(items: &'a [Item], url: &str) -> Option<&'a Item> {
    items.iter().find(|item| matches_url(item, url))
}

fn candidates(url: &str) -> Vec<Candidate<'_>> {
    let url = url.trim();
    if url.is_empty() {
        return Vec::new();
    }

    let mut plain: Vec<Cow<'_, str>> = vec![Cow::Borrowed(url)];
    if let Some(inner) = url.strip_prefix(READER_VIEW_PREFIX) {
        plain.push(Cow::Borrowed(inner));
        if let Ok(decoded) = urlencoding::decode(inner)
            && decoded != inner
        {
            plain.push(Cow::Owned(decoded.into_owned()));
        }
    }

    let mut out = Vec::with_capacity(plain.len() * 2);
    for value in plain {
        if let Some(target) = reader_target(&value) {
            let target = match urlencoding::decode(target) {
                Ok(decoded) if decoded != target => Cow::Owned(decoded.into_owned()),
                _ => Cow::Owned(target.to_string()),
            };
            out.push(Candidate::ReaderTarget(target));
        }
        out.push(Candidate::Url(value));
    }
    out
}

/// `https://app.getpocket.com/read/{target}` or
/// `https://app.getpocket.com/{locale}/read/{target}`.
fn reader_target(url: &str) -> Option<&str> {
    let rest = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"))?;
    let path = READER_HOSTS
        .iter()
        .find_map(|host| rest.strip_prefix(host)?.strip_prefix('/'))?;

    if let Some(target) = path.strip_prefix("read/") {
        return non_empty(target);
    }

    let (locale, tail) = path.split_once('/')?;
    if is_locale(locale) {
        return non_empty(tail.strip_prefix("read/")?);
    }
    None
}

/// Two ASCII letters, optionally followed by `-` and two more (`en`, `pt-BR`).
fn is_locale(segment: &str) -> bool {
    let (language, region) = match segment.split_once('-') {
        Some((language, region)) => (language, Some(region)),
        None => (segment, None),
    };
    let two_letters = |part: &str| part.len() == 2 && part.chars().all(|c| c.is_ascii_alphabetic());

    two_letters(language) && region.is_none_or(two_letters)
}

fn non_empty(value: &str) -> Option<&str> {
    (!value.is_empty()).then_some(value)
}
