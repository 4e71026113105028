//! Entry states and read results.
//!
//! Reads return [`CacheRead<T>`], which says whether the value came from the
//! cache or from a network fetch, and which fetch produced it.

use super::key::CacheKey;
use super::watermark::Watermark;

/// Lifecycle state of a cache entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryState {
    /// Data is current; reads are served without a network call.
    Fresh,
    /// A fetch for the key is in flight; reads attach to it.
    Fetching,
    /// Data is known to be outdated but is still displayable.
    Stale,
}

/// Snapshot of one entry, as returned by
/// [`ReadCache::peek`](super::ReadCache::peek).
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry<T> {
    pub key: CacheKey,
    /// Last successfully fetched value; `None` while the first fetch runs.
    pub data: Option<T>,
    /// Issue watermark of the fetch that produced `data`.
    pub fetched_at: Option<Watermark>,
    pub state: EntryState,
}

impl<T> CacheEntry<T> {
    pub fn is_fresh(&self) -> bool {
        self.state == EntryState::Fresh
    }

    pub fn is_stale(&self) -> bool {
        self.state == EntryState::Stale
    }
}

/// Result of a cache read.
#[derive(Debug, Clone)]
pub struct CacheRead<T> {
    value: T,
    /// Issue watermark of the fetch that produced `value`.
    fetched_at: Watermark,
    was_cache_hit: bool,
    /// The read attached to a fetch another caller started.
    was_coalesced: bool,
}

impl<T> CacheRead<T> {
    /// A read served from a fresh entry.
    pub fn from_cache(value: T, fetched_at: Watermark) -> Self {
        Self {
            value,
            fetched_at,
            was_cache_hit: true,
            was_coalesced: false,
        }
    }

    /// A read that waited on a network fetch.
    pub fn from_fetch(value: T, fetched_at: Watermark, was_coalesced: bool) -> Self {
        Self {
            value,
            fetched_at,
            was_cache_hit: false,
            was_coalesced,
        }
    }

    pub fn into_value(self) -> T {
        self.value
    }

    pub fn value(&self) -> &T {
        &self.value
    }

    pub fn fetched_at(&self) -> Watermark {
        self.fetched_at
    }

    pub fn was_cache_hit(&self) -> bool {
        self.was_cache_hit
    }

    pub fn was_cache_miss(&self) -> bool {
        !self.was_cache_hit
    }

    pub fn was_coalesced(&self) -> bool {
        self.was_coalesced
    }

    /// Map the inner value to a new type.
    pub fn map<U, F>(self, f: F) -> CacheRead<U>
    where
        F: FnOnce(T) -> U,
    {
        CacheRead {
            value: f(self.value),
            fetched_at: self.fetched_at,
            was_cache_hit: self.was_cache_hit,
            was_coalesced: self.was_coalesced,
        }
    }
}

impl<T> AsRef<T> for CacheRead<T> {
    fn as_ref(&self) -> &T {
        &self.value
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::watermark::SequenceCounter;

    #[test]
    fn test_cache_read_from_cache() {
        let mut counter = SequenceCounter::new();
        let at = counter.advance();
        let read = CacheRead::from_cache("value".to_string(), at);

        assert!(read.was_cache_hit());
        assert!(!read.was_cache_miss());
        assert!(!read.was_coalesced());
        assert_eq!(read.fetched_at(), at);
        assert_eq!(read.value(), "value");
    }

    #[test]
    fn test_cache_read_from_fetch() {
        let read = CacheRead::from_fetch(42i32, Watermark::ZERO, true);

        assert!(read.was_cache_miss());
        assert!(read.was_coalesced());
        assert_eq!(read.into_value(), 42);
    }

    #[test]
    fn test_cache_read_map() {
        let read = CacheRead::from_fetch(42i32, Watermark::ZERO, false);
        let mapped = read.map(|v| v.to_string());

        assert_eq!(mapped.into_value(), "42");
    }

    #[test]
    fn test_entry_state_helpers() {
        let entry = CacheEntry {
            key: CacheKey::new("game", 1),
            data: Some(1u8),
            fetched_at: Some(Watermark::ZERO),
            state: EntryState::Stale,
        };
        assert!(entry.is_stale());
        assert!(!entry.is_fresh());
    }
}
