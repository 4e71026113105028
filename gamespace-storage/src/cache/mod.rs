//! Read cache with explicit staleness and single-flight fetches.
//!
//! Entries move through [`EntryState::Fresh`], [`EntryState::Fetching`] and
//! [`EntryState::Stale`]. Staleness is never guessed from wall-clock age:
//! an entry becomes stale only when a write tells the cache so through
//! [`ReadCache::invalidate`] or [`ReadCache::invalidate_prefix`].
//!
//! # Example
//!
//! ```ignore
//! let key = CacheKey::new("game", game_id);
//! let read = cache.get(&key, || gateway.fetch_game(game_id)).await?;
//!
//! // After a write that changes the game:
//! cache.invalidate(&key);
//!
//! // The stale value is still displayable while the refetch runs.
//! let shown = cache.peek(&key).and_then(|entry| entry.data);
//! ```

pub mod freshness;
pub mod key;
pub mod read_through;
pub mod stats;
pub mod watermark;

pub use freshness::{CacheEntry, CacheRead, EntryState};
pub use key::CacheKey;
pub use read_through::ReadCache;
pub use stats::CacheStats;
pub use watermark::{SequenceCounter, Watermark};
