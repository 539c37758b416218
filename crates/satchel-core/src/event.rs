use crate::error::{ErrorKind, SatchelError};
use serde::Serialize;
use std::sync::Mutex;

/// Outbound notices consumed by whatever front end drives the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "kebab-case")]
pub enum Event {
    RetrievedItems {
        count: usize,
    },
    AddedItem {
        ids: Vec<String>,
    },
    AlreadyInList {
        urls: Vec<String>,
    },
    MarkedAsRead {
        id: String,
    },
    Deleted {
        id: String,
    },
    Favorited {
        id: String,
    },
    Unfavorited {
        id: String,
    },
    Updated {
        id: String,
    },
    Error {
        error: ErrorKind,
        message: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        http_code: Option<u16>,
        #[serde(skip_serializing_if = "Option::is_none")]
        reset_delay: Option<u64>,
    },
}

impl Event {
    pub fn from_error(error: &SatchelError) -> Self {
        Self::Error {
            error: error.kind,
            message: error.message.clone(),
            http_code: error.http_code,
            reset_delay: error.reset_delay,
        }
    }

    pub fn action(&self) -> &'static str {
        match self {
            Self::RetrievedItems { .. } => "retrieved-items",
            Self::AddedItem { .. } => "added-item",
            Self::AlreadyInList { .. } => "already-in-list",
            Self::MarkedAsRead { .. } => "marked-as-read",
            Self::Deleted { .. } => "deleted",
            Self::Favorited { .. } => "favorited",
            Self::Unfavorited { .. } => "unfavorited",
            Self::Updated { .. } => "updated",
            Self::Error { .. } => "error",
        }
    }
}

pub trait EventSink: Send + Sync {
    fn emit(&self, event: Event);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl EventSink for NullSink {
    fn emit(&self, _event: Event) {}
}

/// Keeps every emitted event in order. Used by the CLI to render a run's
/// notices and by tests to assert on them.
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<Event>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<Event> {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn take(&self) -> Vec<Event> {
        std::mem::take(
            &mut *self
                .events
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner()),
        )
    }
}

impl EventSink for RecordingSink {
    fn emit(&self, event: Event) {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(event);
    }
}
