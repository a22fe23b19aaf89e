//! Cache keys and the view state handed to subscribers.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::error::{Error, ErrorKind};
use crate::model::{Filter, ListEntry, MailMessage, MessageId};

/// Identifies one queryable view of the mail store.
///
/// Renders as `list:<filter>` or `detail:<id>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheKey {
    /// A filtered message list.
    List(Filter),
    /// A single message.
    Detail(MessageId),
}

impl CacheKey {
    /// The list keys, one per filter.
    pub const LISTS: [Self; 3] = [
        Self::List(Filter::All),
        Self::List(Filter::Unread),
        Self::List(Filter::Archive),
    ];
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::List(filter) => write!(f, "list:{filter}"),
            Self::Detail(id) => write!(f, "detail:{id}"),
        }
    }
}

/// Error returned when a string is not a valid cache key.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid cache key: {0}")]
pub struct ParseKeyError(String);

impl FromStr for CacheKey {
    type Err = ParseKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ParseKeyError(s.to_string());
        let (kind, arg) = s.split_once(':').ok_or_else(invalid)?;
        match kind {
            "list" => arg.parse().map(Self::List).map_err(|_| invalid()),
            "detail" => arg.parse().map(Self::Detail).map_err(|_| invalid()),
            _ => Err(invalid()),
        }
    }
}

/// Data stored under a cache key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewData {
    /// Entries of a list view, newest first.
    List(Arc<Vec<ListEntry>>),
    /// A full message.
    Message(Arc<MailMessage>),
}

/// Whether a cache entry is known to match the mail store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Freshness {
    /// Matches the store as of the last fetch or write.
    Fresh,
    /// May be out of date.
    #[default]
    Stale,
    /// A fetch is in flight.
    Loading,
}

/// Snapshot of a cache entry as seen by a view.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ViewState {
    /// Last known value, if any.
    pub value: Option<ViewData>,
    /// Freshness at the time of the snapshot.
    pub freshness: Freshness,
    /// Error from the most recent fetch, if it failed.
    pub error: Option<Error>,
}

impl ViewState {
    /// State of a key that has never been fetched.
    #[must_use]
    pub const fn loading() -> Self {
        Self {
            value: None,
            freshness: Freshness::Loading,
            error: None,
        }
    }

    /// State of a message that no longer exists.
    #[must_use]
    pub const fn removed(id: MessageId) -> Self {
        Self {
            value: None,
            freshness: Freshness::Fresh,
            error: Some(Error::NotFound(id)),
        }
    }

    /// Returns whether a fetch is in flight.
    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.freshness == Freshness::Loading
    }

    /// Returns whether the viewed message was deleted.
    #[must_use]
    pub const fn is_removed(&self) -> bool {
        self.value.is_none() && matches!(self.error, Some(Error::NotFound(_)))
    }

    /// Returns the kind of the stored error, if any.
    #[must_use]
    pub fn error_kind(&self) -> Option<ErrorKind> {
        self.error.as_ref().map(Error::kind)
    }

    /// Returns the list entries, if this is a loaded list view.
    #[must_use]
    pub fn list(&self) -> Option<&[ListEntry]> {
        match &self.value {
            Some(ViewData::List(entries)) => Some(entries.as_slice()),
            _ => None,
        }
    }

    /// Returns the message, if this is a loaded detail view.
    #[must_use]
    pub fn message(&self) -> Option<&MailMessage> {
        match &self.value {
            Some(ViewData::Message(message)) => Some(message),
            _ => None,
        }
    }

    /// Returns whether two snapshots show the same value and error, ignoring
    /// freshness.
    #[must_use]
    pub fn same_content(&self, other: &Self) -> bool {
        self.value == other.value && self.error == other.error
    }
}
