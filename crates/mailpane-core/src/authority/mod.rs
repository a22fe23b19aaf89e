//! The remote mail store as seen by the client.
//!
//! [`MailAuthority`] is the source of truth for every cached view. The HTTP
//! binding lives in the `mailpane-api` crate; [`InMemoryAuthority`] is a
//! process-local store with the same semantics.

mod memory;

use std::future::Future;

use crate::error::Result;
use crate::model::{Filter, ListEntry, MailMessage, MessageId, MessageUpdate, NewMessage};

pub use memory::{CallCounts, InMemoryAuthority};

/// Operations the mail store exposes.
///
/// Implementations report an unknown id as [`crate::Error::NotFound`] and any
/// transport or server failure as [`crate::Error::Network`].
pub trait MailAuthority: Send + Sync + 'static {
    /// Lists messages matching `filter`, newest first.
    fn list_messages(&self, filter: Filter)
    -> impl Future<Output = Result<Vec<ListEntry>>> + Send;

    /// Fetches a single message.
    fn get_message(&self, id: MessageId) -> impl Future<Output = Result<MailMessage>> + Send;

    /// Applies a partial flag update and returns the updated message.
    fn update_message(
        &self,
        id: MessageId,
        update: MessageUpdate,
    ) -> impl Future<Output = Result<MailMessage>> + Send;

    /// Deletes a message.
    fn delete_message(&self, id: MessageId) -> impl Future<Output = Result<()>> + Send;

    /// Creates a message and returns it with its assigned id.
    fn create_message(&self, message: NewMessage)
    -> impl Future<Output = Result<MailMessage>> + Send;
}
