//! Local item cache for a Pocket account: retrieval strategy, delta
//! merging, URL matching, search and the mutations that keep the cache and
//! the server in step.

mod command;
mod engine;
mod item;
mod matching;
mod mutations;
mod notifier;
mod query;
mod repository;

pub use command::{Command, Reply};
pub use engine::{
    Anomaly, DEFAULT_PAGE_SIZE, DEFAULT_RETRIEVE_INTERVAL_SECS, Strategy, SyncEngine, SyncOutcome,
    SyncSettings, decide_strategy,
};
pub use item::{Fav, Item, RawItemToAdd, are_same, find_by_id, normalize_tags, upsert};
pub use matching::{contains, find_by_url, matches_url};
pub use mutations::MutationOutcome;
pub use notifier::{
    BadgeState, NoTabs, NoopNotifier, PresentationNotifier, Tab, TabHost, TracingNotifier,
    tab_in_list,
};
pub use query::{FavFilter, Query, TagFilter, filter, paginate};
pub use repository::ItemRepository;
