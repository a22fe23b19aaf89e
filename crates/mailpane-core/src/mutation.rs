//! Mutations against the mail store and the cache updates that follow them.
//!
//! Cache changes happen only after the store acknowledged the mutation. A
//! failed call leaves every cache entry untouched.

use std::fmt;
use std::sync::Arc;

use tracing::{info, warn};

use crate::authority::MailAuthority;
use crate::cache::MailCache;
use crate::error::{Error, Result};
use crate::key::{CacheKey, ViewData};
use crate::model::{Filter, MailMessage, MessageId, MessageUpdate, NewMessage};

/// Applies mutations to the mail store and keeps the cache consistent.
pub struct MutationCoordinator<A> {
    cache: MailCache<A>,
}

impl<A> Clone for MutationCoordinator<A> {
    fn clone(&self) -> Self {
        Self {
            cache: self.cache.clone(),
        }
    }
}

impl<A> fmt::Debug for MutationCoordinator<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MutationCoordinator").finish_non_exhaustive()
    }
}

impl<A: MailAuthority> MutationCoordinator<A> {
    /// Creates a coordinator that updates `cache`.
    #[must_use]
    pub const fn new(cache: MailCache<A>) -> Self {
        Self { cache }
    }

    /// Mark a message as read.
    ///
    /// # Errors
    ///
    /// Returns an error if the store rejects the update.
    pub async fn mark_read(&self, id: MessageId) -> Result<MailMessage> {
        self.update(id, MessageUpdate::read(true)).await
    }

    /// Mark a message as unread.
    ///
    /// # Errors
    ///
    /// Returns an error if the store rejects the update.
    pub async fn mark_unread(&self, id: MessageId) -> Result<MailMessage> {
        self.update(id, MessageUpdate::read(false)).await
    }

    /// Move a message to the archive.
    ///
    /// # Errors
    ///
    /// Returns an error if the store rejects the update.
    pub async fn archive(&self, id: MessageId) -> Result<MailMessage> {
        self.update(id, MessageUpdate::archive(true)).await
    }

    /// Move a message back out of the archive.
    ///
    /// # Errors
    ///
    /// Returns an error if the store rejects the update.
    pub async fn unarchive(&self, id: MessageId) -> Result<MailMessage> {
        self.update(id, MessageUpdate::archive(false)).await
    }

    /// Applies a flag update and returns the message as the store now has it.
    ///
    /// On success `detail:<id>` is overwritten with the returned message and
    /// the affected lists are invalidated. If the message no longer exists its
    /// detail entry is removed and every list is invalidated.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] for a deleted message, or the network error.
    pub async fn update(&self, id: MessageId, update: MessageUpdate) -> Result<MailMessage> {
        match self.cache.authority().update_message(id, update).await {
            Ok(message) => {
                info!(%id, ?update, "message updated");
                self.cache.write(
                    CacheKey::Detail(id),
                    ViewData::Message(Arc::new(message.clone())),
                );
                for filter in update.affected_filters(&message) {
                    self.cache.invalidate(CacheKey::List(filter));
                }
                Ok(message)
            }
            Err(Error::NotFound(_)) => {
                warn!(%id, "update of a deleted message");
                self.forget(id);
                Err(Error::NotFound(id))
            }
            Err(err) => {
                warn!(%id, %err, "message update failed");
                Err(err)
            }
        }
    }

    /// Delete a message.
    ///
    /// Deleting a message that is already gone succeeds.
    ///
    /// # Errors
    ///
    /// Returns the network error if the store could not be reached.
    pub async fn delete(&self, id: MessageId) -> Result<()> {
        match self.cache.authority().delete_message(id).await {
            Ok(()) => {
                info!(%id, "message deleted");
                self.forget(id);
                Ok(())
            }
            Err(Error::NotFound(_)) => {
                info!(%id, "message was already deleted");
                self.forget(id);
                Ok(())
            }
            Err(err) => {
                warn!(%id, %err, "message delete failed");
                Err(err)
            }
        }
    }

    /// Send a new message and return its id.
    ///
    /// The body must contain something besides whitespace; this is checked
    /// before any network call.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] for an empty body, or the network error.
    pub async fn send(&self, message: NewMessage) -> Result<MessageId> {
        if message.body.trim().is_empty() {
            return Err(Error::validation("message body is empty"));
        }
        if message.recipient.trim().is_empty() {
            return Err(Error::validation("message has no recipient"));
        }

        let created = match self.cache.authority().create_message(message).await {
            Ok(created) => created,
            Err(err) => {
                warn!(%err, "send failed");
                return Err(err);
            }
        };

        let id = created.id;
        info!(%id, recipient = %created.recipient, "message sent");
        self.cache
            .write(CacheKey::Detail(id), ViewData::Message(Arc::new(created)));
        for filter in [Filter::All, Filter::Unread] {
            self.cache.invalidate(CacheKey::List(filter));
        }
        Ok(id)
    }

    fn forget(&self, id: MessageId) {
        self.cache.remove(CacheKey::Detail(id));
        for key in CacheKey::LISTS {
            self.cache.invalidate(key);
        }
    }
}
