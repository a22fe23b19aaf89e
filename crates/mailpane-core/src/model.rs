//! Mail domain models.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Number of body characters kept in a list preview.
pub const PREVIEW_CHARS: usize = 80;

/// Identifier assigned to a message by the mail store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(pub i64);

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for MessageId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse().map(Self)
    }
}

/// Attachment reference carried by a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    /// File name.
    pub name: String,
    /// Human-readable size label (e.g. "2.4 MB").
    #[serde(default)]
    pub size: String,
    /// Download location.
    pub url: String,
}

/// A message as held by the mail store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MailMessage {
    /// Store-assigned identifier.
    pub id: MessageId,
    /// Sender display name.
    pub sender_name: String,
    /// Sender email address.
    pub sender_email: String,
    /// Recipient address.
    pub recipient: String,
    /// Subject line.
    pub subject: String,
    /// Plain text body.
    pub body: String,
    /// Short preview of the body.
    pub preview: String,
    /// When the store created the message.
    pub created_at: DateTime<Utc>,
    /// Whether the message has been read.
    pub is_read: bool,
    /// Whether the message is archived.
    pub archived: bool,
    /// Attachments, in order.
    #[serde(default)]
    pub attachments: Vec<Attachment>,
}

impl MailMessage {
    /// Projects this message into its list representation.
    #[must_use]
    pub fn to_list_entry(&self) -> ListEntry {
        ListEntry::from(self)
    }
}

/// Compact message representation used by list views.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListEntry {
    /// Store-assigned identifier.
    pub id: MessageId,
    /// Sender display name.
    pub sender_name: String,
    /// Sender email address.
    pub sender_email: String,
    /// Subject line.
    pub subject: String,
    /// Short preview of the body.
    pub preview: String,
    /// When the store created the message.
    pub created_at: DateTime<Utc>,
    /// Whether the message has been read.
    pub is_read: bool,
    /// Whether the message is archived.
    pub archived: bool,
}

impl From<&MailMessage> for ListEntry {
    fn from(message: &MailMessage) -> Self {
        Self {
            id: message.id,
            sender_name: message.sender_name.clone(),
            sender_email: message.sender_email.clone(),
            subject: message.subject.clone(),
            preview: message.preview.clone(),
            created_at: message.created_at,
            is_read: message.is_read,
            archived: message.archived,
        }
    }
}

/// Which messages a list view shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Filter {
    /// Every message that is not archived.
    #[default]
    All,
    /// Messages that are neither read nor archived.
    Unread,
    /// Archived messages.
    Archive,
}

impl Filter {
    /// Every filter, in tab order.
    pub const ALL: [Self; 3] = [Self::All, Self::Unread, Self::Archive];

    /// Returns the wire name of the filter.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::All => "all",
            Self::Unread => "unread",
            Self::Archive => "archive",
        }
    }

    /// Returns whether a message with these flags belongs to the filter.
    #[must_use]
    pub const fn admits(self, is_read: bool, archived: bool) -> bool {
        match self {
            Self::All => !archived,
            Self::Unread => !archived && !is_read,
            Self::Archive => archived,
        }
    }

    /// Returns whether the message belongs to the filter.
    #[must_use]
    pub const fn matches(self, message: &MailMessage) -> bool {
        self.admits(message.is_read, message.archived)
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown filter name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown filter: {0}")]
pub struct ParseFilterError(pub String);

impl FromStr for Filter {
    type Err = ParseFilterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "all" => Ok(Self::All),
            "unread" => Ok(Self::Unread),
            "archive" | "archived" => Ok(Self::Archive),
            other => Err(ParseFilterError(other.to_string())),
        }
    }
}

/// Partial update of a message's mutable flags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageUpdate {
    /// New read flag, if changing.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_read: Option<bool>,
    /// New archived flag, if changing.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub archived: Option<bool>,
}

impl MessageUpdate {
    /// Sets the read flag.
    #[must_use]
    pub const fn read(is_read: bool) -> Self {
        Self {
            is_read: Some(is_read),
            archived: None,
        }
    }

    /// Sets the archived flag.
    #[must_use]
    pub const fn archive(archived: bool) -> Self {
        Self {
            is_read: None,
            archived: Some(archived),
        }
    }

    /// Applies the update to a message in place.
    pub const fn apply(&self, message: &mut MailMessage) {
        if let Some(is_read) = self.is_read {
            message.is_read = is_read;
        }
        if let Some(archived) = self.archived {
            message.archived = archived;
        }
    }

    /// Returns the filters whose membership or list projection this update can
    /// change, given the message as it looks afterwards.
    #[must_use]
    pub fn affected_filters(&self, after: &MailMessage) -> Vec<Filter> {
        if self.archived.is_some() {
            return Filter::ALL.to_vec();
        }
        let mut filters = Vec::new();
        if self.is_read.is_some() {
            filters.extend([Filter::All, Filter::Unread]);
            // Archived entries still show their read flag.
            if after.archived {
                filters.push(Filter::Archive);
            }
        }
        filters
    }
}

/// A message to be created by the mail store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewMessage {
    /// Sender display name.
    pub sender_name: String,
    /// Sender email address.
    pub sender_email: String,
    /// Recipient address.
    pub recipient: String,
    /// Subject line.
    pub subject: String,
    /// Plain text body.
    pub body: String,
}

/// The local user's sender identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// Display name.
    pub name: String,
    /// Email address.
    pub email: String,
}

impl Identity {
    /// Creates a new identity.
    #[must_use]
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
        }
    }
}

/// Builds the list preview for a message body.
#[must_use]
pub fn preview_of(body: &str) -> String {
    body.chars().take(PREVIEW_CHARS).collect()
}
