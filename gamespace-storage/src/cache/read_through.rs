//! Read-through cache with single-flight fetches.
//!
//! This module implements the core caching logic: fresh entries are served
//! locally, misses and stale entries start one fetch per key, and every
//! completion is checked against the issue sequence before it is stored.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use futures_util::future::{BoxFuture, FutureExt, Shared};
use gamespace_core::{GatewayError, GatewayResult};
use tracing::{debug, trace};

use super::freshness::{CacheEntry, CacheRead, EntryState};
use super::key::CacheKey;
use super::stats::CacheStats;
use super::watermark::{SequenceCounter, Watermark};

type SharedFetch<V> = Shared<BoxFuture<'static, GatewayResult<V>>>;

/// Keyed store of fetched values.
///
/// # Guarantees
///
/// - A `Fresh` entry is returned without calling the fetcher.
/// - Concurrent reads of a key attach to one in-flight fetch and all observe
///   its result, errors included.
/// - A completion is stored only if no fetch issued later has already stored
///   data for the key.
/// - Invalidation keeps the data (see [`ReadCache::peek`]) but forces the
///   next read to fetch; a fetch issued before the invalidation can never
///   make the entry fresh again.
/// - Fetches run as spawned tasks. Dropping every reader does not abort the
///   fetch; its result still lands in the cache.
/// - A fetch issued before [`ReadCache::clear`] is never stored.
///
/// Must be used from within a tokio runtime.
pub struct ReadCache<V> {
    state: Arc<Mutex<CacheState<V>>>,
}

struct CacheState<V> {
    sequence: SequenceCounter,
    slots: HashMap<CacheKey, Slot<V>>,
    stats: CacheStats,
    cleared_at: Watermark,
}

struct Slot<V> {
    data: Option<V>,
    fetched_at: Option<Watermark>,
    invalidated_at: Option<Watermark>,
    in_flight: Option<InFlight<V>>,
}

struct InFlight<V> {
    issued_at: Watermark,
    fetch: SharedFetch<V>,
}

impl<V> Default for Slot<V> {
    fn default() -> Self {
        Self {
            data: None,
            fetched_at: None,
            invalidated_at: None,
            in_flight: None,
        }
    }
}

impl<V> Slot<V> {
    fn state(&self) -> Option<EntryState> {
        if self.in_flight.is_some() {
            return Some(EntryState::Fetching);
        }
        let fetched_at = self.fetched_at?;
        match self.invalidated_at {
            Some(invalidated_at) if invalidated_at.is_newer_than(&fetched_at) => {
                Some(EntryState::Stale)
            }
            _ => Some(EntryState::Fresh),
        }
    }

    fn mark_stale(&mut self, at: Watermark, key: &CacheKey) {
        self.invalidated_at = Some(at);
        if let Some(detached) = self.in_flight.take() {
            debug!(
                key = %key,
                issued_at = detached.issued_at.sequence(),
                "detached in-flight fetch on invalidation"
            );
        }
    }
}

impl<V> ReadCache<V>
where
    V: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(CacheState {
                sequence: SequenceCounter::new(),
                slots: HashMap::new(),
                stats: CacheStats::default(),
                cleared_at: Watermark::ZERO,
            })),
        }
    }

    /// Read `key`, calling `fetcher` only when no fresh entry exists and no
    /// fetch for the key is already in flight.
    ///
    /// `fetcher` is invoked synchronously while the cache is locked; it must
    /// only build the future and must not call back into the cache.
    pub async fn get<F, Fut>(&self, key: &CacheKey, fetcher: F) -> GatewayResult<CacheRead<V>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = GatewayResult<V>> + Send + 'static,
    {
        let (issued_at, fetch, coalesced) = {
            let mut guard = self.lock();
            let CacheState {
                sequence,
                slots,
                stats,
                ..
            } = &mut *guard;
            let slot = slots.entry(key.clone()).or_default();

            if let Some(in_flight) = &slot.in_flight {
                stats.coalesced += 1;
                trace!(key = %key, issued_at = in_flight.issued_at.sequence(), "attached to in-flight fetch");
                (in_flight.issued_at, in_flight.fetch.clone(), true)
            } else {
                if slot.state() == Some(EntryState::Fresh) {
                    if let (Some(data), Some(fetched_at)) = (&slot.data, slot.fetched_at) {
                        stats.hits += 1;
                        trace!(key = %key, "cache hit");
                        return Ok(CacheRead::from_cache(data.clone(), fetched_at));
                    }
                }

                stats.misses += 1;
                let issued_at = sequence.advance();
                debug!(key = %key, issued_at = issued_at.sequence(), "issuing fetch");
                let fetch = spawn_fetch(
                    Arc::downgrade(&self.state),
                    key.clone(),
                    issued_at,
                    fetcher(),
                );
                slot.in_flight = Some(InFlight {
                    issued_at,
                    fetch: fetch.clone(),
                });
                (issued_at, fetch, false)
            }
        };

        let value = fetch.await?;
        Ok(CacheRead::from_fetch(value, issued_at, coalesced))
    }

    /// Mark `key` stale. Returns whether an entry existed.
    ///
    /// Data is kept and no refetch is started; the next [`get`](Self::get)
    /// issues a new fetch.
    pub fn invalidate(&self, key: &CacheKey) -> bool {
        let mut guard = self.lock();
        let at = guard.sequence.advance();
        match guard.slots.get_mut(key) {
            Some(slot) => {
                slot.mark_stale(at, key);
                debug!(key = %key, at = at.sequence(), "invalidated");
                true
            }
            None => false,
        }
    }

    /// Mark every entry whose key starts with `prefix` stale. Returns the
    /// number of entries marked.
    pub fn invalidate_prefix(&self, prefix: &str) -> usize {
        let mut guard = self.lock();
        let at = guard.sequence.advance();
        let mut marked = 0;
        for (key, slot) in guard.slots.iter_mut() {
            if key.starts_with(prefix) {
                slot.mark_stale(at, key);
                marked += 1;
            }
        }
        debug!(prefix, marked, at = at.sequence(), "invalidated prefix");
        marked
    }

    /// Snapshot of the entry for `key`, stale data included.
    pub fn peek(&self, key: &CacheKey) -> Option<CacheEntry<V>> {
        let guard = self.lock();
        let slot = guard.slots.get(key)?;
        let state = slot.state()?;
        Some(CacheEntry {
            key: key.clone(),
            data: slot.data.clone(),
            fetched_at: slot.fetched_at,
            state,
        })
    }

    /// Drop every entry. Fetches still in flight complete but are not stored,
    /// even if a later read has recreated their entry.
    pub fn clear(&self) {
        let mut guard = self.lock();
        let at = guard.sequence.advance();
        guard.cleared_at = at;
        let dropped = guard.slots.len();
        guard.slots.clear();
        debug!(dropped, at = at.sequence(), "cache cleared");
    }

    pub fn stats(&self) -> CacheStats {
        let guard = self.lock();
        let mut stats = guard.stats.clone();
        stats.entry_count = guard
            .slots
            .values()
            .filter(|slot| slot.data.is_some())
            .count() as u64;
        stats
    }

    /// The most recently issued watermark.
    pub fn current_watermark(&self) -> Watermark {
        self.lock().sequence.current()
    }

    fn lock(&self) -> MutexGuard<'_, CacheState<V>> {
        lock_state(&self.state)
    }
}

impl<V> Default for ReadCache<V>
where
    V: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<V> Clone for ReadCache<V> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
        }
    }
}

/// No cache operation can leave the state half-written, so a poisoned lock
/// is still usable.
fn lock_state<V>(state: &Mutex<CacheState<V>>) -> MutexGuard<'_, CacheState<V>> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

fn spawn_fetch<V, Fut>(
    state: Weak<Mutex<CacheState<V>>>,
    key: CacheKey,
    issued_at: Watermark,
    fetch: Fut,
) -> SharedFetch<V>
where
    V: Clone + Send + Sync + 'static,
    Fut: Future<Output = GatewayResult<V>> + Send + 'static,
{
    let task = tokio::spawn(async move {
        let result = fetch.await;
        if let Some(state) = state.upgrade() {
            commit(&state, &key, issued_at, &result);
        }
        result
    });

    async move {
        match task.await {
            Ok(result) => result,
            Err(err) => Err(GatewayError::network(format!(
                "Request was interrupted: {}",
                err
            ))),
        }
    }
    .boxed()
    .shared()
}

fn commit<V: Clone>(
    state: &Mutex<CacheState<V>>,
    key: &CacheKey,
    issued_at: Watermark,
    result: &GatewayResult<V>,
) {
    let mut guard = lock_state(state);
    let CacheState {
        slots,
        stats,
        cleared_at,
        ..
    } = &mut *guard;
    if !issued_at.is_newer_than(cleared_at) {
        stats.discarded += 1;
        debug!(key = %key, issued_at = issued_at.sequence(), "fetch issued before clear; response not stored");
        return;
    }
    let Some(slot) = slots.get_mut(key) else {
        debug!(key = %key, issued_at = issued_at.sequence(), "entry dropped while fetching; response not stored");
        return;
    };

    if slot
        .in_flight
        .as_ref()
        .is_some_and(|in_flight| in_flight.issued_at == issued_at)
    {
        slot.in_flight = None;
    }

    match result {
        Ok(value) => {
            if slot
                .fetched_at
                .is_some_and(|stored| stored.is_newer_than(&issued_at))
            {
                stats.discarded += 1;
                debug!(
                    key = %key,
                    issued_at = issued_at.sequence(),
                    "discarding response older than stored data"
                );
            } else {
                slot.data = Some(value.clone());
                slot.fetched_at = Some(issued_at);
                trace!(key = %key, issued_at = issued_at.sequence(), "stored fetch result");
            }
        }
        Err(err) => {
            debug!(key = %key, error = %err, "fetch failed; previous entry kept");
        }
    }

    if slot.data.is_none() && slot.in_flight.is_none() && slot.invalidated_at.is_none() {
        slots.remove(key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Semaphore;

    fn counted(
        calls: &Arc<AtomicUsize>,
        result: GatewayResult<u32>,
    ) -> impl Future<Output = GatewayResult<u32>> + Send + 'static {
        calls.fetch_add(1, Ordering::SeqCst);
        async move { result }
    }

    fn gated(
        calls: &Arc<AtomicUsize>,
        gate: &Arc<Semaphore>,
        result: GatewayResult<u32>,
    ) -> impl Future<Output = GatewayResult<u32>> + Send + 'static {
        calls.fetch_add(1, Ordering::SeqCst);
        let gate = Arc::clone(gate);
        async move {
            let _permit = gate.acquire().await.expect("gate closed");
            result
        }
    }

    async fn wait_for_state(cache: &ReadCache<u32>, key: &CacheKey, state: EntryState) {
        while cache.peek(key).map(|entry| entry.state) != Some(state) {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn test_miss_then_hit() {
        let cache = ReadCache::new();
        let key = CacheKey::new("game", 1);
        let calls = Arc::new(AtomicUsize::new(0));

        let first = cache.get(&key, || counted(&calls, Ok(5))).await.unwrap();
        let second = cache.get(&key, || counted(&calls, Ok(6))).await.unwrap();

        assert!(first.was_cache_miss());
        assert!(second.was_cache_hit());
        assert_eq!(second.into_value(), 5);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_concurrent_reads_share_one_fetch() {
        let cache = ReadCache::new();
        let key = CacheKey::new("game", 2);
        let calls = Arc::new(AtomicUsize::new(0));
        let gate = Arc::new(Semaphore::new(0));

        let release = async {
            tokio::task::yield_now().await;
            gate.add_permits(1);
        };
        let (a, b, c, ()) = tokio::join!(
            cache.get(&key, || gated(&calls, &gate, Ok(10))),
            cache.get(&key, || gated(&calls, &gate, Ok(20))),
            cache.get(&key, || gated(&calls, &gate, Ok(30))),
            release,
        );

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        let (a, b, c) = (a.unwrap(), b.unwrap(), c.unwrap());
        assert_eq!((*a.value(), *b.value(), *c.value()), (10, 10, 10));
        assert!(!a.was_coalesced());
        assert!(b.was_coalesced() && c.was_coalesced());
        assert_eq!(cache.stats().coalesced, 2);
    }

    #[tokio::test]
    async fn test_coalesced_readers_share_errors() {
        let cache: ReadCache<u32> = ReadCache::new();
        let key = CacheKey::new("game", 3);
        let calls = Arc::new(AtomicUsize::new(0));
        let gate = Arc::new(Semaphore::new(0));

        let release = async {
            tokio::task::yield_now().await;
            gate.add_permits(1);
        };
        let (a, b, ()) = tokio::join!(
            cache.get(&key, || gated(&calls, &gate, Err(GatewayError::server("down")))),
            cache.get(&key, || gated(&calls, &gate, Ok(1))),
            release,
        );

        assert_eq!(a.unwrap_err(), GatewayError::server("down"));
        assert_eq!(b.unwrap_err(), GatewayError::server("down"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(cache.peek(&key).is_none());
    }

    #[tokio::test]
    async fn test_invalidate_keeps_data_and_forces_refetch() {
        let cache = ReadCache::new();
        let key = CacheKey::new("game", 4);
        let calls = Arc::new(AtomicUsize::new(0));

        cache.get(&key, || counted(&calls, Ok(1))).await.unwrap();
        assert!(cache.invalidate(&key));

        let entry = cache.peek(&key).unwrap();
        assert_eq!(entry.state, EntryState::Stale);
        assert_eq!(entry.data, Some(1));
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let read = cache.get(&key, || counted(&calls, Ok(2))).await.unwrap();
        assert!(read.was_cache_miss());
        assert_eq!(read.into_value(), 2);
        assert!(cache.peek(&key).unwrap().is_fresh());
    }

    #[tokio::test]
    async fn test_invalidate_missing_key_is_noop() {
        let cache: ReadCache<u32> = ReadCache::new();
        assert!(!cache.invalidate(&CacheKey::new("game", 99)));
    }

    #[tokio::test]
    async fn test_failed_refetch_keeps_stale_data() {
        let cache = ReadCache::new();
        let key = CacheKey::new("game", 5);
        let calls = Arc::new(AtomicUsize::new(0));

        cache.get(&key, || counted(&calls, Ok(1))).await.unwrap();
        cache.invalidate(&key);
        let err = cache
            .get(&key, || counted(&calls, Err(GatewayError::network("offline"))))
            .await
            .unwrap_err();

        assert_eq!(err, GatewayError::network("offline"));
        let entry = cache.peek(&key).unwrap();
        assert_eq!(entry.state, EntryState::Stale);
        assert_eq!(entry.data, Some(1));
    }

    #[tokio::test]
    async fn test_late_older_response_is_discarded() {
        let cache = ReadCache::new();
        let key = CacheKey::new("game", 6);
        let calls = Arc::new(AtomicUsize::new(0));
        let slow_gate = Arc::new(Semaphore::new(0));

        let slow = {
            let cache = cache.clone();
            let key = key.clone();
            let fetch = gated(&calls, &slow_gate, Ok(1));
            tokio::spawn(async move { cache.get(&key, move || fetch).await })
        };
        wait_for_state(&cache, &key, EntryState::Fetching).await;

        cache.invalidate(&key);
        let fast = cache.get(&key, || counted(&calls, Ok(2))).await.unwrap();
        assert_eq!(fast.into_value(), 2);

        slow_gate.add_permits(1);
        let slow = slow.await.unwrap().unwrap();
        assert_eq!(slow.into_value(), 1);

        let entry = cache.peek(&key).unwrap();
        assert_eq!(entry.data, Some(2));
        assert!(entry.is_fresh());
        assert_eq!(cache.stats().discarded, 1);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_fetch_issued_before_invalidation_stores_stale() {
        let cache = ReadCache::new();
        let key = CacheKey::new("game", 7);
        let calls = Arc::new(AtomicUsize::new(0));
        let gate = Arc::new(Semaphore::new(0));

        let reader = {
            let cache = cache.clone();
            let key = key.clone();
            let fetch = gated(&calls, &gate, Ok(1));
            tokio::spawn(async move { cache.get(&key, move || fetch).await })
        };
        wait_for_state(&cache, &key, EntryState::Fetching).await;

        cache.invalidate(&key);
        gate.add_permits(1);
        reader.await.unwrap().unwrap();

        let entry = cache.peek(&key).unwrap();
        assert_eq!(entry.data, Some(1));
        assert_eq!(entry.state, EntryState::Stale);
    }

    #[tokio::test]
    async fn test_dropped_reader_still_populates_cache() {
        let cache = ReadCache::new();
        let key = CacheKey::new("game", 8);
        let calls = Arc::new(AtomicUsize::new(0));
        let gate = Arc::new(Semaphore::new(0));

        let reader = {
            let cache = cache.clone();
            let key = key.clone();
            let fetch = gated(&calls, &gate, Ok(77));
            tokio::spawn(async move { cache.get(&key, move || fetch).await })
        };
        wait_for_state(&cache, &key, EntryState::Fetching).await;
        reader.abort();

        gate.add_permits(1);
        wait_for_state(&cache, &key, EntryState::Fresh).await;
        assert_eq!(cache.peek(&key).unwrap().data, Some(77));
    }

    #[tokio::test]
    async fn test_invalidate_prefix_only_touches_matching_keys() {
        let cache = ReadCache::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let trending = CacheKey::with_params("catalog", [("trending", "true")]);
        let rpg = CacheKey::with_params("catalog", [("genre", "RPG")]);
        let detail = CacheKey::new("game", 5);

        for key in [&trending, &rpg, &detail] {
            cache.get(key, || counted(&calls, Ok(0))).await.unwrap();
        }

        assert_eq!(cache.invalidate_prefix(&CacheKey::prefix("catalog")), 2);
        assert!(cache.peek(&trending).unwrap().is_stale());
        assert!(cache.peek(&rpg).unwrap().is_stale());
        assert!(cache.peek(&detail).unwrap().is_fresh());
    }

    #[tokio::test]
    async fn test_clear_drops_entries_and_in_flight_results() {
        let cache = ReadCache::new();
        let key = CacheKey::new("library", "me");
        let calls = Arc::new(AtomicUsize::new(0));
        let gate = Arc::new(Semaphore::new(0));

        let reader = {
            let cache = cache.clone();
            let key = key.clone();
            let fetch = gated(&calls, &gate, Ok(3));
            tokio::spawn(async move { cache.get(&key, move || fetch).await })
        };
        wait_for_state(&cache, &key, EntryState::Fetching).await;

        cache.clear();
        gate.add_permits(1);
        assert_eq!(reader.await.unwrap().unwrap().into_value(), 3);
        assert!(cache.peek(&key).is_none());
        assert_eq!(cache.stats().entry_count, 0);
    }

    #[tokio::test]
    async fn test_fetch_from_before_clear_never_lands_in_recreated_entry() {
        let cache = ReadCache::new();
        let key = CacheKey::new("game", 9);
        let calls = Arc::new(AtomicUsize::new(0));
        let old_gate = Arc::new(Semaphore::new(0));
        let new_gate = Arc::new(Semaphore::new(0));

        let old_reader = {
            let cache = cache.clone();
            let key = key.clone();
            let fetch = gated(&calls, &old_gate, Ok(111));
            tokio::spawn(async move { cache.get(&key, move || fetch).await })
        };
        wait_for_state(&cache, &key, EntryState::Fetching).await;

        cache.clear();
        let new_reader = {
            let cache = cache.clone();
            let key = key.clone();
            let fetch = gated(&calls, &new_gate, Err(GatewayError::network("offline")));
            tokio::spawn(async move { cache.get(&key, move || fetch).await })
        };
        wait_for_state(&cache, &key, EntryState::Fetching).await;

        // The old completion lands while the new fetch is still pending,
        // then the new fetch fails.
        old_gate.add_permits(1);
        assert_eq!(old_reader.await.unwrap().unwrap().into_value(), 111);
        new_gate.add_permits(1);
        assert!(new_reader.await.unwrap().is_err());

        assert!(cache.peek(&key).map_or(true, |entry| entry.data.is_none()));
        assert_eq!(cache.stats().discarded, 1);

        let read = cache.get(&key, || counted(&calls, Ok(222))).await.unwrap();
        assert!(read.was_cache_miss());
        assert_eq!(read.into_value(), 222);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
