//! Process-local mail store.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};

use super::MailAuthority;
use crate::error::{Error, Result};
use crate::model::{
    Filter, ListEntry, MailMessage, MessageId, MessageUpdate, NewMessage, preview_of,
};

/// Number of calls made to each store operation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallCounts {
    /// `list_messages` calls.
    pub list: usize,
    /// `get_message` calls.
    pub get: usize,
    /// `update_message` calls.
    pub update: usize,
    /// `delete_message` calls.
    pub delete: usize,
    /// `create_message` calls.
    pub create: usize,
}

#[derive(Default)]
struct Counters {
    list: AtomicUsize,
    get: AtomicUsize,
    update: AtomicUsize,
    delete: AtomicUsize,
    create: AtomicUsize,
}

struct Store {
    messages: BTreeMap<MessageId, MailMessage>,
    next_id: i64,
}

impl Store {
    fn insert(
        &mut self,
        message: NewMessage,
        created_at: DateTime<Utc>,
        is_read: bool,
        archived: bool,
    ) -> MailMessage {
        let id = MessageId(self.next_id);
        self.next_id += 1;
        let stored = MailMessage {
            id,
            preview: preview_of(&message.body),
            sender_name: message.sender_name,
            sender_email: message.sender_email,
            recipient: message.recipient,
            subject: message.subject,
            body: message.body,
            created_at,
            is_read,
            archived,
            attachments: Vec::new(),
        };
        self.messages.insert(id, stored.clone());
        stored
    }
}

/// In-memory mail store with the same filter and ordering rules as the server.
///
/// Every call can be delayed with [`set_latency`](Self::set_latency) and made
/// to fail with [`set_offline`](Self::set_offline); [`calls`](Self::calls)
/// reports how often each operation ran.
pub struct InMemoryAuthority {
    store: Mutex<Store>,
    counters: Counters,
    latency_ms: AtomicU64,
    offline: AtomicBool,
}

impl Default for InMemoryAuthority {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for InMemoryAuthority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryAuthority")
            .field("messages", &self.lock().messages.len())
            .field("calls", &self.calls())
            .finish_non_exhaustive()
    }
}

impl InMemoryAuthority {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            store: Mutex::new(Store {
                messages: BTreeMap::new(),
                next_id: 1,
            }),
            counters: Counters::default(),
            latency_ms: AtomicU64::new(0),
            offline: AtomicBool::new(false),
        }
    }

    /// Inserts a message directly, bypassing call counting and failure
    /// simulation. Returns the stored message.
    pub fn insert(
        &self,
        message: NewMessage,
        created_at: DateTime<Utc>,
        is_read: bool,
        archived: bool,
    ) -> MailMessage {
        self.lock().insert(message, created_at, is_read, archived)
    }

    /// Removes a message directly, as if another client deleted it.
    pub fn remove(&self, id: MessageId) -> Option<MailMessage> {
        self.lock().messages.remove(&id)
    }

    /// Returns the stored message, bypassing call counting.
    #[must_use]
    pub fn get(&self, id: MessageId) -> Option<MailMessage> {
        self.lock().messages.get(&id).cloned()
    }

    /// Returns how many messages the store holds.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().messages.len()
    }

    /// Returns whether the store is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Delays every subsequent call by `latency`.
    pub fn set_latency(&self, latency: Duration) {
        let millis = u64::try_from(latency.as_millis()).unwrap_or(u64::MAX);
        self.latency_ms.store(millis, Ordering::SeqCst);
    }

    /// Makes every subsequent call fail with a network error while `offline`.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Returns the number of calls made to each operation so far.
    #[must_use]
    pub fn calls(&self) -> CallCounts {
        CallCounts {
            list: self.counters.list.load(Ordering::SeqCst),
            get: self.counters.get.load(Ordering::SeqCst),
            update: self.counters.update.load(Ordering::SeqCst),
            delete: self.counters.delete.load(Ordering::SeqCst),
            create: self.counters.create.load(Ordering::SeqCst),
        }
    }

    /// Answers a call: the response is computed when the call arrives and
    /// delivered after the configured latency.
    async fn respond<T>(
        &self,
        counter: &AtomicUsize,
        compute: impl FnOnce(&mut Store) -> Result<T>,
    ) -> Result<T> {
        counter.fetch_add(1, Ordering::SeqCst);
        let response = if self.offline.load(Ordering::SeqCst) {
            Err(Error::network("mail store unreachable"))
        } else {
            compute(&mut self.lock())
        };
        let latency = self.latency_ms.load(Ordering::SeqCst);
        if latency > 0 {
            tokio::time::sleep(Duration::from_millis(latency)).await;
        }
        response
    }

    fn lock(&self) -> MutexGuard<'_, Store> {
        self.store.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl MailAuthority for InMemoryAuthority {
    async fn list_messages(&self, filter: Filter) -> Result<Vec<ListEntry>> {
        self.respond(&self.counters.list, |store| {
            let mut entries: Vec<ListEntry> = store
                .messages
                .values()
                .filter(|message| filter.matches(message))
                .map(ListEntry::from)
                .collect();
            entries.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
            Ok(entries)
        })
        .await
    }

    async fn get_message(&self, id: MessageId) -> Result<MailMessage> {
        self.respond(&self.counters.get, |store| {
            store.messages.get(&id).cloned().ok_or(Error::NotFound(id))
        })
        .await
    }

    async fn update_message(&self, id: MessageId, update: MessageUpdate) -> Result<MailMessage> {
        self.respond(&self.counters.update, |store| {
            let message = store.messages.get_mut(&id).ok_or(Error::NotFound(id))?;
            update.apply(message);
            Ok(message.clone())
        })
        .await
    }

    async fn delete_message(&self, id: MessageId) -> Result<()> {
        self.respond(&self.counters.delete, |store| {
            store
                .messages
                .remove(&id)
                .map(|_| ())
                .ok_or(Error::NotFound(id))
        })
        .await
    }

    async fn create_message(&self, message: NewMessage) -> Result<MailMessage> {
        self.respond(&self.counters.create, |store| {
            Ok(store.insert(message, Utc::now(), false, false))
        })
        .await
    }
}
