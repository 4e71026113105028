//! GameSpace Storage
//!
//! The client-side read cache. Values are owned by the cache; views re-read
//! through it instead of keeping copies that would need to be kept in sync.

pub mod cache;

pub use cache::{
    CacheEntry, CacheKey, CacheRead, CacheStats, EntryState, ReadCache, SequenceCounter,
    Watermark,
};
