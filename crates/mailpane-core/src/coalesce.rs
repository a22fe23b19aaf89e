//! Request coalescing (singleflight) for concurrent fetches of the same key.
//!
//! The first caller for a key becomes the leader and runs the loader; callers
//! arriving while it is outstanding attach to it and receive a clone of the
//! leader's output. The in-flight marker is cleared before the output is
//! published, so a caller arriving after completion starts a new fetch.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::hash::Hash;
use std::sync::{Mutex, PoisonError};

use tokio::sync::watch;
use tracing::trace;

/// Error returned to attached callers when the leader went away without
/// producing an output (its future was dropped or it panicked).
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("in-flight fetch was abandoned before completing")]
pub struct Abandoned;

/// Deduplicates concurrent fetches by key.
pub struct FetchCoalescer<K, T> {
    inflight: Mutex<HashMap<K, watch::Receiver<Option<T>>>>,
}

impl<K, T> Default for FetchCoalescer<K, T> {
    fn default() -> Self {
        Self {
            inflight: Mutex::new(HashMap::new()),
        }
    }
}

impl<K, T> fmt::Debug for FetchCoalescer<K, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FetchCoalescer")
            .field("inflight", &self.lock().len())
            .finish()
    }
}

enum Role<T> {
    Leader(watch::Sender<Option<T>>),
    Joiner(watch::Receiver<Option<T>>),
}

impl<K, T> FetchCoalescer<K, T>
where
    K: Eq + Hash + Clone + fmt::Display,
    T: Clone,
{
    /// Creates an empty coalescer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs `loader` for `key`, or attaches to the fetch already running for it.
    ///
    /// Every caller that attaches to the same fetch observes a clone of the same
    /// output; `loader` is invoked once per fetch.
    ///
    /// # Errors
    ///
    /// Returns [`Abandoned`] to attached callers if the leader stops before
    /// finishing. The leader itself never sees this error.
    pub async fn fetch<F, Fut>(&self, key: K, loader: F) -> Result<T, Abandoned>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let role = {
            let mut inflight = self.lock();
            if let Some(rx) = inflight.get(&key) {
                Role::Joiner(rx.clone())
            } else {
                let (tx, rx) = watch::channel(None);
                inflight.insert(key.clone(), rx);
                Role::Leader(tx)
            }
        };

        match role {
            Role::Joiner(mut rx) => {
                trace!(%key, "joining in-flight fetch");
                let output = rx.wait_for(Option::is_some).await.map_err(|_| Abandoned)?;
                output.clone().ok_or(Abandoned)
            }
            Role::Leader(tx) => {
                let marker = InflightMarker {
                    coalescer: self,
                    key: Some(key),
                };
                let output = loader().await;
                drop(marker);
                tx.send_replace(Some(output.clone()));
                Ok(output)
            }
        }
    }

    /// Returns whether a fetch for `key` is outstanding.
    #[must_use]
    pub fn is_inflight(&self, key: &K) -> bool {
        self.lock().contains_key(key)
    }

    /// Returns the number of outstanding fetches.
    #[must_use]
    pub fn inflight_count(&self) -> usize {
        self.lock().len()
    }
}

impl<K, T> FetchCoalescer<K, T> {
    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<K, watch::Receiver<Option<T>>>> {
        self.inflight.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Clears the in-flight marker when the leader finishes or is dropped.
struct InflightMarker<'a, K: Eq + Hash, T> {
    coalescer: &'a FetchCoalescer<K, T>,
    key: Option<K>,
}

impl<K: Eq + Hash, T> Drop for InflightMarker<'_, K, T> {
    fn drop(&mut self) {
        if let Some(key) = self.key.take() {
            self.coalescer.lock().remove(&key);
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_fetches_share_one_loader_call() {
        let coalescer = Arc::new(FetchCoalescer::<String, u32>::new());
        let calls = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..5 {
            let coalescer = Arc::clone(&coalescer);
            let calls = Arc::clone(&calls);
            handles.push(tokio::spawn(async move {
                coalescer
                    .fetch("detail:42".to_string(), || async {
                        calls.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(50)).await;
                        7
                    })
                    .await
            }));
        }

        for handle in handles {
            assert_eq!(handle.await.unwrap(), Ok(7));
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(coalescer.inflight_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_is_shared() {
        let coalescer = Arc::new(FetchCoalescer::<&'static str, Result<u32, String>>::default());

        let leader = {
            let coalescer = Arc::clone(&coalescer);
            tokio::spawn(async move {
                coalescer
                    .fetch("list:all", || async {
                        tokio::time::sleep(Duration::from_millis(10)).await;
                        Err("offline".to_string())
                    })
                    .await
            })
        };
        tokio::task::yield_now().await;
        assert!(coalescer.is_inflight(&"list:all"));

        let joined = coalescer
            .fetch("list:all", || async { Ok(1) })
            .await
            .unwrap();

        assert_eq!(joined, Err("offline".to_string()));
        assert_eq!(leader.await.unwrap().unwrap(), Err("offline".to_string()));
    }

    #[tokio::test]
    async fn test_sequential_fetches_run_separately() {
        let coalescer = FetchCoalescer::<u8, u8>::new();
        assert_eq!(coalescer.fetch(1, || async { 1 }).await, Ok(1));
        assert_eq!(coalescer.fetch(1, || async { 2 }).await, Ok(2));
        assert!(!coalescer.is_inflight(&1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_abandoned_leader_releases_key() {
        let coalescer = Arc::new(FetchCoalescer::<u8, u8>::new());

        let leader = {
            let coalescer = Arc::clone(&coalescer);
            tokio::spawn(async move {
                coalescer
                    .fetch(1, || async {
                        tokio::time::sleep(Duration::from_secs(60)).await;
                        1
                    })
                    .await
            })
        };
        tokio::task::yield_now().await;

        let joiner = {
            let coalescer = Arc::clone(&coalescer);
            tokio::spawn(async move { coalescer.fetch(1, || async { 2 }).await })
        };
        tokio::task::yield_now().await;

        leader.abort();
        assert_eq!(joiner.await.unwrap(), Err(Abandoned));
        assert!(!coalescer.is_inflight(&1));
        assert_eq!(coalescer.fetch(1, || async { 3 }).await, Ok(3));
    }
}
