//! View subscription registry.
//!
//! Views register a callback per cache key and are notified when that key's
//! value or error changes. Callbacks run without any registry lock held, so a
//! callback may subscribe, unsubscribe or read the cache.
//!
//! Every notification carries a sequence number taken where the state was
//! produced. A state older than the last one accepted for its key is dropped,
//! and accepted states are delivered one at a time in the order they were
//! accepted, even when several tasks notify the same key at once.

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use tracing::trace;

use crate::key::{CacheKey, ViewState};

/// Callback invoked with the new state of a subscribed key.
pub type Callback = Arc<dyn Fn(&ViewState) + Send + Sync>;

/// Identifier of a single subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// A state to deliver and the callbacks registered when it was taken.
type Delivery = (ViewState, Vec<(SubscriptionId, Callback)>);

#[derive(Default)]
struct KeySubscribers {
    callbacks: Vec<(SubscriptionId, Callback)>,
    /// Last state accepted (or known to the subscribers) for this key.
    last: Option<ViewState>,
    /// Sequence number of `last`.
    last_seq: u64,
    /// Accepted states not yet delivered, oldest first.
    pending: VecDeque<ViewState>,
    /// Whether a caller is draining `pending`.
    delivering: bool,
}

#[derive(Default)]
struct RegistryState {
    next_id: u64,
    keys: HashMap<CacheKey, KeySubscribers>,
}

/// Registry of view callbacks keyed by cache key.
#[derive(Clone, Default)]
pub struct SubscriptionRegistry {
    state: Arc<Mutex<RegistryState>>,
}

impl fmt::Debug for SubscriptionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.lock();
        f.debug_struct("SubscriptionRegistry")
            .field("keys", &state.keys.len())
            .finish_non_exhaustive()
    }
}

impl SubscriptionRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `callback` for `key`.
    ///
    /// `current` is the state the subscriber already knows as of sequence
    /// number `seq` (typically from a read done alongside the subscription); a
    /// later notification carrying the same content, or an older one, is
    /// suppressed.
    ///
    /// The subscription lasts until the returned handle is dropped or
    /// [`Subscription::unsubscribe`] is called.
    #[must_use = "dropping the handle unsubscribes immediately"]
    pub fn subscribe(
        &self,
        key: CacheKey,
        callback: Callback,
        current: Option<ViewState>,
        seq: u64,
    ) -> Subscription {
        let mut state = self.lock();
        let id = SubscriptionId(state.next_id);
        state.next_id += 1;
        let entry = state.keys.entry(key).or_default();
        if entry.callbacks.is_empty() {
            entry.last = current;
            entry.last_seq = seq;
        }
        entry.callbacks.push((id, callback));
        trace!(%key, ?id, "view subscribed");

        Subscription {
            id,
            key,
            registry: Arc::downgrade(&self.state),
        }
    }

    /// Delivers `state`, produced at sequence number `seq`, to every
    /// subscriber of `key` if it is newer than and differs from the last
    /// accepted state.
    ///
    /// If another call is already delivering for `key`, the state is queued
    /// behind it and delivered by that call. Returns the number of callbacks
    /// invoked by this call.
    pub fn notify(&self, key: CacheKey, state: &ViewState, seq: u64) -> usize {
        {
            let mut registry = self.lock();
            let Some(entry) = registry.keys.get_mut(&key) else {
                return 0;
            };
            if seq <= entry.last_seq {
                trace!(%key, seq, last = entry.last_seq, "dropped out-of-order state");
                return 0;
            }
            entry.last_seq = seq;
            if entry.last.as_ref().is_some_and(|last| last.same_content(state)) {
                return 0;
            }
            entry.last = Some(state.clone());
            entry.pending.push_back(state.clone());
            if entry.delivering {
                return 0;
            }
            entry.delivering = true;
        }

        let mut delivered = 0;
        while let Some((state, callbacks)) = self.next_pending(key) {
            for (id, callback) in callbacks {
                // Skip views that unsubscribed while earlier callbacks ran.
                if self.is_active(key, id) {
                    callback(&state);
                    delivered += 1;
                }
            }
        }
        trace!(%key, delivered, "notified views");
        delivered
    }

    /// Pops the oldest undelivered state with the callbacks to run for it, or
    /// ends the delivery run.
    fn next_pending(&self, key: CacheKey) -> Option<Delivery> {
        let mut registry = self.lock();
        let entry = registry.keys.get_mut(&key)?;
        let Some(state) = entry.pending.pop_front() else {
            entry.delivering = false;
            return None;
        };
        let callbacks = entry
            .callbacks
            .iter()
            .map(|(id, callback)| (*id, Arc::clone(callback)))
            .collect();
        Some((state, callbacks))
    }

    /// Returns whether `key` has at least one subscriber.
    #[must_use]
    pub fn has_subscribers(&self, key: CacheKey) -> bool {
        self.lock()
            .keys
            .get(&key)
            .is_some_and(|entry| !entry.callbacks.is_empty())
    }

    /// Returns the number of subscribers of `key`.
    #[must_use]
    pub fn subscriber_count(&self, key: CacheKey) -> usize {
        self.lock()
            .keys
            .get(&key)
            .map_or(0, |entry| entry.callbacks.len())
    }

    fn is_active(&self, key: CacheKey, id: SubscriptionId) -> bool {
        self.lock()
            .keys
            .get(&key)
            .is_some_and(|entry| entry.callbacks.iter().any(|(other, _)| *other == id))
    }

    fn lock(&self) -> MutexGuard<'_, RegistryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn remove(state: &Mutex<RegistryState>, key: CacheKey, id: SubscriptionId) {
    let mut state = state.lock().unwrap_or_else(PoisonError::into_inner);
    if let Some(entry) = state.keys.get_mut(&key) {
        entry.callbacks.retain(|(other, _)| *other != id);
        if entry.callbacks.is_empty() {
            state.keys.remove(&key);
        }
    }
}

/// Handle to an active subscription. Dropping it unsubscribes.
pub struct Subscription {
    id: SubscriptionId,
    key: CacheKey,
    registry: Weak<Mutex<RegistryState>>,
}

impl Subscription {
    /// Returns the subscription's identifier.
    #[must_use]
    pub const fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Returns the key this subscription watches.
    #[must_use]
    pub const fn key(&self) -> CacheKey {
        self.key
    }

    /// Removes the subscription. Equivalent to dropping the handle.
    pub fn unsubscribe(self) {
        drop(self);
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("key", &self.key)
            .finish()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(state) = self.registry.upgrade() {
            remove(&state, self.key, self.id);
            trace!(key = %self.key, id = ?self.id, "view unsubscribed");
        }
    }
}
