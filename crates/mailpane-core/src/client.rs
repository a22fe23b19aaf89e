//! Entry point for front ends.
//!
//! [`MailClient`] bundles the cache and the mutation coordinator over one
//! mail store. Views read and subscribe through it; user actions go through
//! its mutation methods so the cache stays consistent.

use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::authority::MailAuthority;
use crate::cache::MailCache;
use crate::draft::Draft;
use crate::error::Result;
use crate::key::{CacheKey, ViewData, ViewState};
use crate::model::{Identity, MailMessage, MessageId, NewMessage};
use crate::mutation::MutationCoordinator;
use crate::registry::Subscription;

/// Cache-backed client for a mail store.
///
/// Cheap to clone; clones share one cache.
pub struct MailClient<A> {
    cache: MailCache<A>,
    mutations: MutationCoordinator<A>,
}

impl<A> Clone for MailClient<A> {
    fn clone(&self) -> Self {
        Self {
            cache: self.cache.clone(),
            mutations: self.mutations.clone(),
        }
    }
}

impl<A> fmt::Debug for MailClient<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MailClient")
            .field("cache", &self.cache)
            .finish_non_exhaustive()
    }
}

impl<A: MailAuthority> MailClient<A> {
    /// Creates a client over `authority`.
    #[must_use]
    pub fn new(authority: A) -> Self {
        Self::with_shared(Arc::new(authority))
    }

    /// Creates a client over an authority that is also used elsewhere.
    #[must_use]
    pub fn with_shared(authority: Arc<A>) -> Self {
        let cache = MailCache::new(authority);
        let mutations = MutationCoordinator::new(cache.clone());
        Self { cache, mutations }
    }

    /// The underlying cache.
    #[must_use]
    pub const fn cache(&self) -> &MailCache<A> {
        &self.cache
    }

    /// See [`MailCache::read`].
    pub fn read(&self, key: CacheKey) -> ViewState {
        self.cache.read(key)
    }

    /// See [`MailCache::load`].
    ///
    /// # Errors
    ///
    /// Returns the fetch error.
    pub async fn load(&self, key: CacheKey) -> Result<ViewData> {
        self.cache.load(key).await
    }

    /// See [`MailCache::subscribe`].
    #[must_use = "dropping the handle unsubscribes immediately"]
    pub fn subscribe<F>(&self, key: CacheKey, callback: F) -> Subscription
    where
        F: Fn(&ViewState) + Send + Sync + 'static,
    {
        self.cache.subscribe(key, callback)
    }

    /// See [`MailCache::refresh`].
    pub fn refresh(&self, key: CacheKey) {
        self.cache.refresh(key);
    }

    /// See [`MutationCoordinator::mark_read`].
    ///
    /// # Errors
    ///
    /// Returns an error if the store rejects the update.
    pub async fn mark_read(&self, id: MessageId) -> Result<MailMessage> {
        self.mutations.mark_read(id).await
    }

    /// See [`MutationCoordinator::mark_unread`].
    ///
    /// # Errors
    ///
    /// Returns an error if the store rejects the update.
    pub async fn mark_unread(&self, id: MessageId) -> Result<MailMessage> {
        self.mutations.mark_unread(id).await
    }

    /// See [`MutationCoordinator::archive`].
    ///
    /// # Errors
    ///
    /// Returns an error if the store rejects the update.
    pub async fn archive(&self, id: MessageId) -> Result<MailMessage> {
        self.mutations.archive(id).await
    }

    /// See [`MutationCoordinator::unarchive`].
    ///
    /// # Errors
    ///
    /// Returns an error if the store rejects the update.
    pub async fn unarchive(&self, id: MessageId) -> Result<MailMessage> {
        self.mutations.unarchive(id).await
    }

    /// See [`MutationCoordinator::delete`].
    ///
    /// # Errors
    ///
    /// Returns the network error if the store could not be reached.
    pub async fn delete(&self, id: MessageId) -> Result<()> {
        self.mutations.delete(id).await
    }

    /// See [`MutationCoordinator::send`].
    ///
    /// # Errors
    ///
    /// Returns a validation or network error.
    pub async fn send(&self, message: NewMessage) -> Result<MessageId> {
        self.mutations.send(message).await
    }

    /// Sends `draft` as `identity` and records the outcome on the draft.
    ///
    /// # Errors
    ///
    /// Returns a validation error (the draft is unchanged) or the send error
    /// (the draft is marked failed and keeps its content).
    pub async fn send_draft(&self, draft: &mut Draft, identity: &Identity) -> Result<MessageId> {
        let message = draft.begin_send(identity)?;
        let outcome = self.mutations.send(message).await;
        let status = draft.complete(&outcome);
        debug!(?status, "draft send finished");
        outcome
    }

    /// See [`MailCache::evict_idle`].
    pub fn evict_idle(&self) -> usize {
        self.cache.evict_idle()
    }
}
