//! Entity and request/response types exchanged with the GameSpace service.

use crate::{CatalogOrdering, GameId, LibraryEntryId, LibraryStatus, ReviewId, Timestamp, UserId};
use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

// ============================================================================
// USERS
// ============================================================================

/// The authenticated user as reported by the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSummary {
    pub id: UserId,
    pub username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
}

// ============================================================================
// CATALOG
// ============================================================================

/// A game as returned by the listing and detail endpoints.
///
/// Listing responses omit `user_library_entry` and `reviews`; the detail
/// response carries both.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Game {
    pub id: GameId,
    pub title: String,
    #[serde(default)]
    pub developer: String,
    #[serde(default)]
    pub publisher: String,
    #[serde(default)]
    pub genre: Option<String>,
    #[serde(default)]
    pub release_date: Option<NaiveDate>,
    /// Server-derived; never computed locally.
    #[serde(default, deserialize_with = "deserialize_rating_average")]
    pub average_rating: f64,
    #[serde(default)]
    pub cover_image_url: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(
        default,
        rename = "user_library_entry",
        skip_serializing_if = "Option::is_none"
    )]
    pub library_entry: Option<LibraryEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reviews: Option<Vec<Review>>,
}

/// Accepts the average rating either as a JSON number or as a decimal string.
fn deserialize_rating_average<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum NumberOrString {
        Number(f64),
        Text(String),
        Null,
    }

    match NumberOrString::deserialize(deserializer)? {
        NumberOrString::Number(value) => Ok(value),
        NumberOrString::Text(text) => text.trim().parse().map_err(serde::de::Error::custom),
        NumberOrString::Null => Ok(0.0),
    }
}

/// Filters for the catalog listing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct CatalogQuery {
    pub search: Option<String>,
    pub genre: Option<String>,
    pub ordering: Option<CatalogOrdering>,
    pub trending: bool,
}

impl CatalogQuery {
    /// The listing sorted by popularity.
    pub fn trending() -> Self {
        Self {
            trending: true,
            ..Self::default()
        }
    }

    pub fn with_search(mut self, search: impl Into<String>) -> Self {
        self.search = Some(search.into());
        self
    }

    pub fn with_genre(mut self, genre: impl Into<String>) -> Self {
        self.genre = Some(genre.into());
        self
    }

    pub fn with_ordering(mut self, ordering: CatalogOrdering) -> Self {
        self.ordering = Some(ordering);
        self
    }

    /// Non-empty query parameters, in endpoint order.
    pub fn params(&self) -> Vec<(&'static str, String)> {
        let mut params = Vec::new();
        if let Some(search) = self.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            params.push(("search", search.to_string()));
        }
        if let Some(genre) = self.genre.as_deref().map(str::trim).filter(|g| !g.is_empty()) {
            params.push(("genre", genre.to_string()));
        }
        if let Some(ordering) = self.ordering {
            params.push(("ordering", ordering.as_param().to_string()));
        }
        if self.trending {
            params.push(("trending", "true".to_string()));
        }
        params
    }
}

// ============================================================================
// LIBRARY
// ============================================================================

/// A user's tracking record for one game. At most one per (user, game).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LibraryEntry {
    pub id: LibraryEntryId,
    #[serde(rename = "game", alias = "game_id")]
    pub game_id: GameId,
    #[serde(rename = "user", alias = "user_id")]
    pub user_id: UserId,
    pub status: LibraryStatus,
}

/// Body of `POST /library/`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewLibraryEntry {
    pub game: GameId,
    pub status: LibraryStatus,
}

/// Body of `PATCH /library/{id}/`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LibraryStatusUpdate {
    pub status: LibraryStatus,
}

// ============================================================================
// REVIEWS
// ============================================================================

/// A rating on the 1..=10 scale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "u8")]
pub struct Rating(u8);

impl Rating {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 10;

    pub fn get(self) -> u8 {
        self.0
    }
}

/// Rejected rating input.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Rating must be a whole number between 1 and 10 (got {0})")]
pub struct RatingOutOfRange(pub i64);

impl TryFrom<i64> for Rating {
    type Error = RatingOutOfRange;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        if (i64::from(Self::MIN)..=i64::from(Self::MAX)).contains(&value) {
            Ok(Self(value as u8))
        } else {
            Err(RatingOutOfRange(value))
        }
    }
}

impl From<Rating> for u8 {
    fn from(rating: Rating) -> Self {
        rating.0
    }
}

impl fmt::Display for Rating {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/10", self.0)
    }
}

/// A published review. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Review {
    pub id: ReviewId,
    #[serde(alias = "game")]
    pub game_id: GameId,
    #[serde(rename = "user", alias = "user_id")]
    pub user_id: UserId,
    pub rating: Rating,
    #[serde(default)]
    pub comment: String,
    pub created_at: Timestamp,
}

/// Body of `POST /reviews/`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewReview {
    pub game_id: GameId,
    pub rating: Rating,
    pub comment: String,
}

// ============================================================================
// AUTH
// ============================================================================

/// Role assigned to self-registered accounts.
pub const DEFAULT_ROLE: &str = "GAMER";

/// Body of `POST /auth/register/`.
#[derive(Clone, PartialEq, Eq, Serialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    pub role: String,
}

impl RegisterRequest {
    pub fn new(
        username: impl Into<String>,
        email: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            username: username.into(),
            email: email.into(),
            password: password.into(),
            role: DEFAULT_ROLE.to_string(),
        }
    }
}

impl fmt::Debug for RegisterRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegisterRequest")
            .field("username", &self.username)
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .field("role", &self.role)
            .finish()
    }
}

/// Body of `POST /auth/login/`.
#[derive(Clone, Serialize)]
pub struct LoginRequest<'a> {
    pub username: &'a str,
    pub password: &'a str,
}

/// Token pair issued by `POST /auth/login/`.
#[derive(Debug, Clone, Deserialize)]
pub struct LoginResponse {
    pub access: String,
    #[serde(default)]
    pub refresh: Option<String>,
    #[serde(default)]
    pub user: Option<UserSummary>,
}

/// Body of `POST /auth/refresh/`.
#[derive(Clone, Serialize)]
pub struct RefreshRequest<'a> {
    pub refresh: &'a str,
}

/// Response of `POST /auth/refresh/`.
#[derive(Debug, Clone, Deserialize)]
pub struct RefreshResponse {
    pub access: String,
    #[serde(default)]
    pub refresh: Option<String>,
}
