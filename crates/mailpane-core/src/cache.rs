//! Keyed view cache over the mail store.
//!
//! Each [`CacheKey`] maps to at most one entry holding the last known value,
//! its freshness and the error of the last failed fetch. Reads answer from the
//! entry immediately and start a background fetch when the entry is absent or
//! stale; fetches for the same key are coalesced.
//!
//! Every write and invalidation moves the entry to a new generation. A fetch
//! that completes for an older generation is superseded: its result is
//! discarded and whoever waits on it fetches again, so data that predates a
//! mutation never replaces data that follows it.

use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, trace, warn};

use crate::authority::MailAuthority;
use crate::coalesce::FetchCoalescer;
use crate::error::{Error, Result};
use crate::key::{CacheKey, Freshness, ViewData, ViewState};
use crate::model::MessageId;
use crate::registry::{Subscription, SubscriptionRegistry};

struct CacheEntry {
    value: Option<ViewData>,
    freshness: Freshness,
    error: Option<Error>,
    generation: u64,
    /// Generation whose fetch failed. Reads do not retry it on their own.
    failed_generation: Option<u64>,
}

impl CacheEntry {
    const fn new(generation: u64) -> Self {
        Self {
            value: None,
            freshness: Freshness::Stale,
            error: None,
            generation,
            failed_generation: None,
        }
    }

    fn snapshot(&self) -> ViewState {
        ViewState {
            value: self.value.clone(),
            freshness: self.freshness,
            error: self.error.clone(),
        }
    }

    fn wants_fetch(&self) -> bool {
        self.freshness == Freshness::Stale && self.failed_generation != Some(self.generation)
    }
}

#[derive(Default)]
struct CacheState {
    entries: HashMap<CacheKey, CacheEntry>,
    /// Messages known to be deleted.
    removed: HashSet<MessageId>,
    next_generation: u64,
    /// Orders the states handed to subscribers.
    next_seq: u64,
}

/// Outcome of a fetch attempt.
enum Completion {
    /// The result was applied to the entry.
    Applied(Option<ViewState>),
    /// The entry moved on, or was dropped, while the fetch was in flight.
    Superseded,
}

impl CacheState {
    const fn bump(&mut self) -> u64 {
        self.next_generation += 1;
        self.next_generation
    }

    /// Sequence number for a state taken under the current lock.
    const fn stamp(&mut self) -> u64 {
        self.next_seq += 1;
        self.next_seq
    }

    fn removed_state(&self, key: CacheKey) -> Option<ViewState> {
        match key {
            CacheKey::Detail(id) if self.removed.contains(&id) => Some(ViewState::removed(id)),
            _ => None,
        }
    }

    /// Returns the current state and whether the caller must start a fetch.
    fn begin_read(&mut self, key: CacheKey) -> (ViewState, bool) {
        if let Some(removed) = self.removed_state(key) {
            return (removed, false);
        }
        let generation = self.next_generation + 1;
        match self.entries.entry(key) {
            Entry::Vacant(slot) => {
                self.next_generation = generation;
                let entry = slot.insert(CacheEntry::new(generation));
                entry.freshness = Freshness::Loading;
                (entry.snapshot(), true)
            }
            Entry::Occupied(mut slot) => {
                let entry = slot.get_mut();
                let fetch = entry.wants_fetch();
                if fetch {
                    entry.freshness = Freshness::Loading;
                }
                (entry.snapshot(), fetch)
            }
        }
    }

    /// Marks the entry as loading and returns the generation being fetched, or
    /// `None` if the message is known to be deleted.
    fn begin_fetch(&mut self, key: CacheKey) -> Option<u64> {
        if self.removed_state(key).is_some() {
            return None;
        }
        if !self.entries.contains_key(&key) {
            let generation = self.bump();
            self.entries.insert(key, CacheEntry::new(generation));
        }
        let entry = self.entries.get_mut(&key)?;
        entry.freshness = Freshness::Loading;
        Some(entry.generation)
    }

    fn finish_fetch(
        &mut self,
        key: CacheKey,
        generation: u64,
        result: &Result<ViewData>,
    ) -> Completion {
        if self.removed_state(key).is_some() {
            return Completion::Applied(None);
        }

        // An entry that was dropped while the fetch ran may have been written
        // or invalidated first, so the result cannot be trusted as current.
        let Some(entry) = self.entries.get(&key) else {
            return Completion::Superseded;
        };
        if entry.generation != generation {
            return Completion::Superseded;
        }

        if let (CacheKey::Detail(id), Err(Error::NotFound(_))) = (key, result) {
            self.entries.remove(&key);
            self.removed.insert(id);
            return Completion::Applied(Some(ViewState::removed(id)));
        }

        let Some(entry) = self.entries.get_mut(&key) else {
            return Completion::Applied(None);
        };
        match result {
            Ok(value) => {
                entry.value = Some(value.clone());
                entry.freshness = Freshness::Fresh;
                entry.error = None;
                entry.failed_generation = None;
            }
            Err(err) => {
                // Keep the last good value visible next to the error.
                entry.freshness = Freshness::Stale;
                entry.error = Some(err.clone());
                entry.failed_generation = Some(generation);
            }
        }
        Completion::Applied(Some(entry.snapshot()))
    }

    fn write(&mut self, key: CacheKey, value: ViewData) -> ViewState {
        if let CacheKey::Detail(id) = key {
            self.removed.remove(&id);
        }
        let generation = self.bump();
        let entry = self
            .entries
            .entry(key)
            .or_insert_with(|| CacheEntry::new(generation));
        entry.value = Some(value);
        entry.freshness = Freshness::Fresh;
        entry.error = None;
        entry.failed_generation = None;
        entry.generation = generation;
        entry.snapshot()
    }

    fn invalidate(&mut self, key: CacheKey) -> bool {
        let generation = self.next_generation + 1;
        let Some(entry) = self.entries.get_mut(&key) else {
            return false;
        };
        self.next_generation = generation;
        entry.generation = generation;
        entry.freshness = Freshness::Stale;
        true
    }

    fn fresh_value(&self, key: CacheKey) -> Option<ViewData> {
        self.entries
            .get(&key)
            .filter(|entry| entry.freshness == Freshness::Fresh)
            .and_then(|entry| entry.value.clone())
    }
}

/// Result shared by every caller attached to one fetch.
#[derive(Clone)]
struct FetchOutcome {
    result: Result<ViewData>,
    superseded: bool,
}

struct Shared<A> {
    authority: Arc<A>,
    state: Mutex<CacheState>,
    fetches: FetchCoalescer<CacheKey, FetchOutcome>,
    registry: SubscriptionRegistry,
}

/// View cache backed by a [`MailAuthority`].
///
/// Cheap to clone; clones share the same entries and subscriptions. Methods
/// that may start a fetch spawn Tokio tasks and must run inside a runtime.
pub struct MailCache<A> {
    shared: Arc<Shared<A>>,
}

impl<A> Clone for MailCache<A> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<A> fmt::Debug for MailCache<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MailCache")
            .field("entries", &self.lock().entries.len())
            .field("registry", &self.shared.registry)
            .finish_non_exhaustive()
    }
}

impl<A> MailCache<A> {
    fn lock(&self) -> MutexGuard<'_, CacheState> {
        self.shared.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<A: MailAuthority> MailCache<A> {
    /// Creates an empty cache over `authority`.
    #[must_use]
    pub fn new(authority: Arc<A>) -> Self {
        Self {
            shared: Arc::new(Shared {
                authority,
                state: Mutex::new(CacheState::default()),
                fetches: FetchCoalescer::new(),
                registry: SubscriptionRegistry::new(),
            }),
        }
    }

    /// Returns the mail store this cache reads from.
    #[must_use]
    pub fn authority(&self) -> &Arc<A> {
        &self.shared.authority
    }

    /// Returns the state of `key` without starting a fetch.
    #[must_use]
    pub fn peek(&self, key: CacheKey) -> Option<ViewState> {
        let state = self.lock();
        state
            .removed_state(key)
            .or_else(|| state.entries.get(&key).map(CacheEntry::snapshot))
    }

    /// Returns the current state of `key` immediately.
    ///
    /// Starts a background fetch when the key has never been fetched or has
    /// been invalidated. A key whose last fetch failed keeps its error and last
    /// good value until [`refresh`](Self::refresh) or an invalidation.
    pub fn read(&self, key: CacheKey) -> ViewState {
        self.read_stamped(key).0
    }

    /// Returns the fresh value of `key`, fetching it (or joining the fetch in
    /// flight) unless the entry is already fresh.
    ///
    /// The fetch runs in its own task, so dropping the returned future does
    /// not cancel it.
    ///
    /// # Errors
    ///
    /// Returns the fetch error; the entry keeps its last good value.
    pub async fn load(&self, key: CacheKey) -> Result<ViewData> {
        let cache = self.clone();
        tokio::spawn(async move { cache.fetch_until_current(key).await })
            .await
            .map_err(|err| Error::network(format!("fetch task failed: {err}")))?
    }

    /// Marks `key` stale and fetches it again, even after a failed fetch.
    pub fn refresh(&self, key: CacheKey) {
        if !self.lock().invalidate(key) {
            trace!(%key, "refresh of absent key");
        }
        let _ = self.read(key);
    }

    /// Replaces the value of `key`, marks it fresh and notifies subscribers.
    pub fn write(&self, key: CacheKey, value: ViewData) {
        let (state, seq) = {
            let mut cache = self.lock();
            let state = cache.write(key, value);
            (state, cache.stamp())
        };
        trace!(%key, seq, "cache write");
        self.shared.registry.notify(key, &state, seq);
    }

    /// Marks `key` stale. Refetches immediately if the key has subscribers,
    /// otherwise on the next read.
    pub fn invalidate(&self, key: CacheKey) {
        let marked = self.lock().invalidate(key);
        debug!(%key, marked, "invalidated");
        if self.shared.registry.has_subscribers(key) {
            let _ = self.read(key);
        }
    }

    /// Drops the entry of `key`.
    ///
    /// For a detail key the message is recorded as deleted: its views are
    /// notified and later reads report the removed state without a fetch.
    pub fn remove(&self, key: CacheKey) {
        let seq = {
            let mut state = self.lock();
            state.entries.remove(&key);
            if let CacheKey::Detail(id) = key {
                state.removed.insert(id);
            }
            state.stamp()
        };
        debug!(%key, "removed");
        if let CacheKey::Detail(id) = key {
            self.shared.registry.notify(key, &ViewState::removed(id), seq);
        }
    }

    /// Subscribes `callback` to changes of `key`.
    ///
    /// Subscribing counts as interest: the key is read (and fetched if needed)
    /// right away. The callback fires once per change of value or error.
    #[must_use = "dropping the handle unsubscribes immediately"]
    pub fn subscribe<F>(&self, key: CacheKey, callback: F) -> Subscription
    where
        F: Fn(&ViewState) + Send + Sync + 'static,
    {
        let (known, known_seq) = {
            let mut state = self.lock();
            let known = state
                .removed_state(key)
                .or_else(|| state.entries.get(&key).map(CacheEntry::snapshot))
                .unwrap_or_else(ViewState::loading);
            (known, state.stamp())
        };
        let subscription =
            self.shared
                .registry
                .subscribe(key, Arc::new(callback), Some(known), known_seq);
        let (state, seq) = self.read_stamped(key);
        // No-op unless the key changed between the peek and the registration.
        self.shared.registry.notify(key, &state, seq);
        subscription
    }

    /// Returns whether `key` has subscribers.
    #[must_use]
    pub fn is_watched(&self, key: CacheKey) -> bool {
        self.shared.registry.has_subscribers(key)
    }

    /// Drops every entry that nobody subscribes to and that is neither
    /// loading nor being fetched. Returns how many entries were evicted.
    ///
    /// Deleted-message records nobody watches are forgotten too; reading such
    /// a message again asks the store, which reports it missing.
    pub fn evict_idle(&self) -> usize {
        let registry = &self.shared.registry;
        let fetches = &self.shared.fetches;
        let mut state = self.lock();
        let before = state.entries.len();
        state.entries.retain(|key, entry| {
            entry.freshness == Freshness::Loading
                || fetches.is_inflight(key)
                || registry.has_subscribers(*key)
        });
        let evicted = before - state.entries.len();
        let tombstones = state.removed.len();
        state
            .removed
            .retain(|id| registry.has_subscribers(CacheKey::Detail(*id)));
        let forgotten = tombstones - state.removed.len();
        drop(state);
        if evicted > 0 || forgotten > 0 {
            debug!(evicted, forgotten, "evicted idle cache entries");
        }
        evicted
    }

    /// Returns the number of messages recorded as deleted.
    #[must_use]
    pub fn removed_count(&self) -> usize {
        self.lock().removed.len()
    }

    /// Returns the number of cached entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    /// Returns whether the cache holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn read_stamped(&self, key: CacheKey) -> (ViewState, u64) {
        let (state, seq, fetch) = {
            let mut cache = self.lock();
            let (state, fetch) = cache.begin_read(key);
            (state, cache.stamp(), fetch)
        };
        if fetch {
            debug!(%key, "read started fetch");
            self.spawn_fetch(key);
        }
        (state, seq)
    }

    /// Answers `key` from the cache when no fetch is needed.
    fn settled(&self, key: CacheKey) -> Option<Result<ViewData>> {
        let state = self.lock();
        if let Some(ViewState {
            error: Some(err), ..
        }) = state.removed_state(key)
        {
            return Some(Err(err));
        }
        state.fresh_value(key).map(Ok)
    }

    fn spawn_fetch(&self, key: CacheKey) {
        let cache = self.clone();
        tokio::spawn(async move {
            if let Err(err) = cache.fetch_until_current(key).await {
                debug!(%key, %err, "background fetch failed");
            }
        });
    }

    async fn fetch_until_current(&self, key: CacheKey) -> Result<ViewData> {
        loop {
            if let Some(settled) = self.settled(key) {
                return settled;
            }
            let outcome = self
                .shared
                .fetches
                .fetch(key, || self.fetch_once(key))
                .await;
            match outcome {
                Ok(FetchOutcome {
                    result,
                    superseded: false,
                }) => return result,
                Ok(FetchOutcome {
                    superseded: true, ..
                })
                | Err(_) => trace!(%key, "fetch superseded"),
            }
        }
    }

    async fn fetch_once(&self, key: CacheKey) -> FetchOutcome {
        let Some(generation) = self.lock().begin_fetch(key) else {
            let result = match key {
                CacheKey::Detail(id) => Err(Error::NotFound(id)),
                CacheKey::List(_) => Err(Error::network("list key cannot be removed")),
            };
            return FetchOutcome {
                result,
                superseded: false,
            };
        };

        debug!(%key, generation, "fetching");
        let result = self.query(key).await;
        if let Err(err) = &result {
            warn!(%key, %err, "fetch failed");
        }

        let (completion, seq) = {
            let mut state = self.lock();
            let completion = state.finish_fetch(key, generation, &result);
            (completion, state.stamp())
        };
        match completion {
            Completion::Applied(state) => {
                if let Some(state) = state {
                    self.shared.registry.notify(key, &state, seq);
                }
                FetchOutcome {
                    result,
                    superseded: false,
                }
            }
            Completion::Superseded => FetchOutcome {
                result,
                superseded: true,
            },
        }
    }

    async fn query(&self, key: CacheKey) -> Result<ViewData> {
        let authority = &self.shared.authority;
        match key {
            CacheKey::List(filter) => authority
                .list_messages(filter)
                .await
                .map(|entries| ViewData::List(Arc::new(entries))),
            CacheKey::Detail(id) => authority
                .get_message(id)
                .await
                .map(|message| ViewData::Message(Arc::new(message))),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use chrono::{TimeZone, Utc};

    use super::*;
    use crate::authority::InMemoryAuthority;
    use crate::error::ErrorKind;
    use crate::model::{Filter, MessageUpdate, NewMessage};

    fn seeded() -> (Arc<InMemoryAuthority>, MailCache<InMemoryAuthority>) {
        let authority = Arc::new(InMemoryAuthority::new());
        for day in 1..=3 {
            authority.insert(
                NewMessage {
                    sender_name: "Jane Doe".into(),
                    sender_email: "jane@example.com".into(),
                    recipient: "me@example.com".into(),
                    subject: format!("Message {day}"),
                    body: "Hello".into(),
                },
                Utc.with_ymd_and_hms(2024, 12, day, 9, 0, 0).unwrap(),
                false,
                false,
            );
        }
        let cache = MailCache::new(Arc::clone(&authority));
        (authority, cache)
    }

    const ALL: CacheKey = CacheKey::List(Filter::All);

    #[tokio::test]
    async fn test_absent_key_reads_as_loading() {
        let (_, cache) = seeded();
        let state = cache.read(ALL);
        assert!(state.is_loading());
        assert!(state.value.is_none());
        assert!(state.error.is_none());
    }

    #[tokio::test]
    async fn test_read_after_load_is_fresh_without_fetch() {
        let (authority, cache) = seeded();
        cache.load(ALL).await.unwrap();

        let state = cache.read(ALL);
        assert_eq!(state.freshness, Freshness::Fresh);
        assert_eq!(state.list().unwrap().len(), 3);
        assert_eq!(authority.calls().list, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_detail_reads_issue_one_call() {
        let (authority, cache) = seeded();
        authority.set_latency(Duration::from_millis(100));
        let key = CacheKey::Detail(MessageId(2));

        assert!(cache.read(key).is_loading());
        assert!(cache.read(key).is_loading());
        let (a, b) = tokio::join!(cache.load(key), cache.load(key));

        assert_eq!(a.unwrap(), b.unwrap());
        assert_eq!(authority.calls().get, 1);
    }

    #[tokio::test]
    async fn test_failed_fetch_keeps_last_good_value() {
        let (authority, cache) = seeded();
        cache.load(ALL).await.unwrap();

        authority.set_offline(true);
        cache.refresh(ALL);
        let err = cache.load(ALL).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NetworkFailure);

        let state = cache.read(ALL);
        assert!(!state.is_loading());
        assert_eq!(state.error_kind(), Some(ErrorKind::NetworkFailure));
        assert_eq!(state.list().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_failed_key_is_not_retried_by_reads() {
        let (authority, cache) = seeded();
        authority.set_offline(true);
        assert!(cache.load(ALL).await.is_err());
        let calls = authority.calls().list;

        authority.set_offline(false);
        let state = cache.read(ALL);
        tokio::task::yield_now().await;
        assert_eq!(state.error_kind(), Some(ErrorKind::NetworkFailure));
        assert_eq!(authority.calls().list, calls);

        cache.refresh(ALL);
        let entries = cache.load(ALL).await.unwrap();
        assert!(matches!(entries, ViewData::List(list) if list.len() == 3));
    }

    #[tokio::test]
    async fn test_invalidate_without_subscribers_defers_fetch() {
        let (authority, cache) = seeded();
        cache.load(ALL).await.unwrap();

        cache.invalidate(ALL);
        tokio::task::yield_now().await;
        assert_eq!(authority.calls().list, 1);
        assert_eq!(cache.peek(ALL).unwrap().freshness, Freshness::Stale);

        assert_eq!(cache.read(ALL).list().unwrap().len(), 3);
        cache.load(ALL).await.unwrap();
        assert_eq!(authority.calls().list, 2);
    }

    #[tokio::test]
    async fn test_invalidate_with_subscriber_refetches_and_notifies() {
        let (authority, cache) = seeded();
        let seen = Arc::new(AtomicUsize::new(0));
        let _sub = {
            let seen = Arc::clone(&seen);
            cache.subscribe(ALL, move |state| {
                if let Some(list) = state.list() {
                    seen.store(list.len(), Ordering::SeqCst);
                }
            })
        };
        cache.load(ALL).await.unwrap();
        assert_eq!(seen.load(Ordering::SeqCst), 3);

        authority.remove(MessageId(1));
        cache.invalidate(ALL);
        cache.load(ALL).await.unwrap();
        assert_eq!(seen.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_unchanged_refetch_does_not_notify() {
        let (_, cache) = seeded();
        let count = Arc::new(AtomicUsize::new(0));
        let _sub = {
            let count = Arc::clone(&count);
            cache.subscribe(ALL, move |_| {
                count.fetch_add(1, Ordering::SeqCst);
            })
        };
        cache.load(ALL).await.unwrap();
        cache.invalidate(ALL);
        cache.load(ALL).await.unwrap();
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_write_during_fetch_is_not_overwritten() {
        let (authority, cache) = seeded();
        authority.set_latency(Duration::from_millis(100));
        let key = CacheKey::Detail(MessageId(1));

        let pending = cache.read(key);
        assert!(pending.is_loading());
        tokio::task::yield_now().await;

        let mut newer = authority.get(MessageId(1)).unwrap();
        newer.is_read = true;
        cache.write(key, ViewData::Message(Arc::new(newer)));

        tokio::time::sleep(Duration::from_millis(200)).await;
        let state = cache.read(key);
        assert!(state.message().unwrap().is_read);
        assert_eq!(state.freshness, Freshness::Fresh);
    }

    #[tokio::test]
    async fn test_removed_detail_reads_as_removed_without_fetch() {
        let (authority, cache) = seeded();
        let key = CacheKey::Detail(MessageId(3));
        cache.load(key).await.unwrap();

        cache.remove(CacheKey::Detail(MessageId(3)));
        let state = cache.read(key);
        assert!(state.is_removed());
        assert_eq!(
            cache.load(key).await.unwrap_err(),
            Error::NotFound(MessageId(3))
        );
        assert_eq!(authority.calls().get, 1);
    }

    #[tokio::test]
    async fn test_not_found_fetch_marks_detail_removed() {
        let (authority, cache) = seeded();
        authority.remove(MessageId(2));
        let key = CacheKey::Detail(MessageId(2));

        assert!(cache.load(key).await.is_err());
        assert!(cache.read(key).is_removed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_unsubscribed_view_still_populates_cache() {
        let (authority, cache) = seeded();
        authority.set_latency(Duration::from_millis(50));
        let count = Arc::new(AtomicUsize::new(0));

        let sub = {
            let count = Arc::clone(&count);
            cache.subscribe(ALL, move |_| {
                count.fetch_add(1, Ordering::SeqCst);
            })
        };
        drop(sub);

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(count.load(Ordering::SeqCst), 0);
        assert_eq!(cache.peek(ALL).unwrap().list().unwrap().len(), 3);
        assert_eq!(authority.calls().list, 1);
    }

    #[tokio::test]
    async fn test_evict_idle_keeps_watched_entries() {
        let (authority, cache) = seeded();
        let _sub = cache.subscribe(ALL, |_| {});
        cache.load(ALL).await.unwrap();
        cache.load(CacheKey::Detail(MessageId(1))).await.unwrap();
        cache.load(CacheKey::List(Filter::Unread)).await.unwrap();

        assert_eq!(cache.evict_idle(), 2);
        assert_eq!(cache.len(), 1);

        // Evicted keys are simply fetched again.
        let detail = cache.load(CacheKey::Detail(MessageId(1))).await.unwrap();
        assert!(matches!(detail, ViewData::Message(m) if m.id == MessageId(1)));
        assert_eq!(authority.calls().get, 2);
    }

    fn list_ids(data: &ViewData) -> Vec<i64> {
        match data {
            ViewData::List(entries) => entries.iter().map(|e| e.id.0).collect(),
            ViewData::Message(message) => vec![message.id.0],
        }
    }

    /// Starts a slow load of the unread list, then marks message 2 read in the
    /// store once the list has been computed but before it arrives.
    async fn load_racing_mark_read(
        authority: &Arc<InMemoryAuthority>,
        cache: &MailCache<InMemoryAuthority>,
    ) -> tokio::task::JoinHandle<Result<ViewData>> {
        let unread = CacheKey::List(Filter::Unread);
        authority.set_latency(Duration::from_millis(300));
        let pending = {
            let cache = cache.clone();
            tokio::spawn(async move { cache.load(unread).await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;

        authority.set_latency(Duration::ZERO);
        authority
            .update_message(MessageId(2), MessageUpdate::read(true))
            .await
            .unwrap();
        pending
    }

    #[tokio::test(start_paused = true)]
    async fn test_evict_during_fetch_does_not_restore_old_list() {
        let (authority, cache) = seeded();
        let unread = CacheKey::List(Filter::Unread);
        let pending = load_racing_mark_read(&authority, &cache).await;

        cache.invalidate(unread);
        assert_eq!(cache.evict_idle(), 0);

        let loaded = pending.await.unwrap().unwrap();
        assert_eq!(list_ids(&loaded), [3, 1]);
        assert_eq!(authority.calls().list, 2);

        let cached = cache.peek(unread).unwrap();
        assert_eq!(cached.freshness, Freshness::Fresh);
        assert_eq!(cached.value, Some(loaded));
    }

    #[tokio::test(start_paused = true)]
    async fn test_entry_dropped_during_fetch_is_refetched() {
        let (authority, cache) = seeded();
        let unread = CacheKey::List(Filter::Unread);
        let pending = load_racing_mark_read(&authority, &cache).await;

        cache.remove(unread);

        let loaded = pending.await.unwrap().unwrap();
        assert_eq!(list_ids(&loaded), [3, 1]);
        assert_eq!(
            cache.peek(unread).unwrap().list().map(<[_]>::len),
            Some(2)
        );
    }

    #[tokio::test]
    async fn test_evict_idle_forgets_unwatched_deletions() {
        let (authority, cache) = seeded();
        let watched = CacheKey::Detail(MessageId(1));
        let _sub = cache.subscribe(watched, |_| {});
        cache.load(watched).await.unwrap();
        cache.remove(watched);
        cache.remove(CacheKey::Detail(MessageId(2)));
        assert_eq!(cache.removed_count(), 2);

        cache.evict_idle();
        assert_eq!(cache.removed_count(), 1);
        assert!(cache.read(watched).is_removed());

        // The store still has message 2, so forgetting it refetches it.
        let detail = cache.load(CacheKey::Detail(MessageId(2))).await.unwrap();
        assert!(matches!(detail, ViewData::Message(m) if m.id == MessageId(2)));
        assert_eq!(authority.calls().get, 2);
    }
}
