//! Enum types for GameSpace entities

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ============================================================================
// LIBRARY STATUS
// ============================================================================

/// Where a game sits in a user's library.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LibraryStatus {
    Playing,
    Completed,
    Wishlist,
    Dropped,
}

impl LibraryStatus {
    pub const ALL: [LibraryStatus; 4] = [
        LibraryStatus::Playing,
        LibraryStatus::Completed,
        LibraryStatus::Wishlist,
        LibraryStatus::Dropped,
    ];

    /// Wire representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            LibraryStatus::Playing => "PLAYING",
            LibraryStatus::Completed => "COMPLETED",
            LibraryStatus::Wishlist => "WISHLIST",
            LibraryStatus::Dropped => "DROPPED",
        }
    }
}

impl fmt::Display for LibraryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown enum value.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind}: {value}")]
pub struct ParseEnumError {
    pub kind: &'static str,
    pub value: String,
}

impl FromStr for LibraryStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ParseEnumError {
                kind: "library status",
                value: s.to_string(),
            })
    }
}

// ============================================================================
// CATALOG ORDERING
// ============================================================================

/// Sort orders accepted by the catalog listing endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CatalogOrdering {
    #[default]
    NewestFirst,
    OldestFirst,
    HighestRated,
    LowestRated,
    Title,
}

impl CatalogOrdering {
    pub const ALL: [CatalogOrdering; 5] = [
        CatalogOrdering::NewestFirst,
        CatalogOrdering::OldestFirst,
        CatalogOrdering::HighestRated,
        CatalogOrdering::LowestRated,
        CatalogOrdering::Title,
    ];

    /// Value of the `ordering` query parameter.
    pub fn as_param(&self) -> &'static str {
        match self {
            CatalogOrdering::NewestFirst => "-release_date",
            CatalogOrdering::OldestFirst => "release_date",
            CatalogOrdering::HighestRated => "-average_rating",
            CatalogOrdering::LowestRated => "average_rating",
            CatalogOrdering::Title => "title",
        }
    }
}

impl fmt::Display for CatalogOrdering {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_param())
    }
}

impl FromStr for CatalogOrdering {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|ordering| ordering.as_param() == s.trim())
            .ok_or_else(|| ParseEnumError {
                kind: "catalog ordering",
                value: s.to_string(),
            })
    }
}
