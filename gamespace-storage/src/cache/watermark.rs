//! Sequence watermarks for ordering fetches and invalidations.
//!
//! Every fetch issue and every invalidation advances one counter owned by
//! the cache. Comparing watermarks answers both "was this response issued
//! before the data already stored?" and "was this entry invalidated after
//! its data was fetched?".

/// A point in the cache's issue sequence.
///
/// Watermarks are monotonically increasing; a larger watermark was issued
/// later, regardless of when the associated request completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Watermark(u64);

impl Watermark {
    /// The watermark before anything was issued.
    pub const ZERO: Watermark = Watermark(0);

    pub fn sequence(self) -> u64 {
        self.0
    }

    /// Check if this watermark was issued after another.
    pub fn is_newer_than(&self, other: &Watermark) -> bool {
        self.0 > other.0
    }
}

/// The monotonic counter that hands out watermarks.
#[derive(Debug, Default)]
pub struct SequenceCounter {
    current: Watermark,
}

impl SequenceCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Issue the next watermark.
    pub fn advance(&mut self) -> Watermark {
        self.current = Watermark(self.current.0 + 1);
        self.current
    }

    /// The most recently issued watermark.
    pub fn current(&self) -> Watermark {
        self.current
    }
}
