//! Cached resource values, their cache keys, and their endpoint paths.

use gamespace_core::{CatalogQuery, Game, GameId, GatewayError, LibraryEntry, LibraryEntryId};
use gamespace_storage::CacheKey;

pub const GAME: &str = "game";
pub const CATALOG: &str = "catalog";
pub const LIBRARY: &str = "library";

/// Value stored in the read cache.
#[derive(Debug, Clone, PartialEq)]
pub enum Resource {
    Catalog(Vec<Game>),
    Game(Game),
    Library(Vec<LibraryEntry>),
}

impl Resource {
    pub fn kind(&self) -> &'static str {
        match self {
            Resource::Catalog(_) => CATALOG,
            Resource::Game(_) => GAME,
            Resource::Library(_) => LIBRARY,
        }
    }

    pub fn as_game(&self) -> Option<&Game> {
        match self {
            Resource::Game(game) => Some(game),
            _ => None,
        }
    }

    pub fn as_library(&self) -> Option<&[LibraryEntry]> {
        match self {
            Resource::Library(entries) => Some(entries),
            _ => None,
        }
    }
}

/// `game:{id}`
pub fn game_key(id: GameId) -> CacheKey {
    CacheKey::new(GAME, id)
}

/// `catalog:` followed by the canonical query parameters.
pub fn catalog_key(query: &CatalogQuery) -> CacheKey {
    CacheKey::with_params(CATALOG, query.params())
}

/// `library:me`
pub fn library_key() -> CacheKey {
    CacheKey::new(LIBRARY, "me")
}

pub fn catalog_prefix() -> String {
    CacheKey::prefix(CATALOG)
}

pub const GAMES_PATH: &str = "/games/";
pub const LIBRARY_PATH: &str = "/library/";
pub const REVIEWS_PATH: &str = "/reviews/";

pub fn game_path(id: GameId) -> String {
    format!("/games/{}/", id)
}

pub fn library_entry_path(id: LibraryEntryId) -> String {
    format!("/library/{}/", id)
}

/// Error for a cache entry whose variant does not match its key.
pub(crate) fn mismatch(key: &CacheKey, found: &Resource) -> GatewayError {
    tracing::error!(key = %key, found = found.kind(), "cache entry holds the wrong resource type");
    GatewayError::server("The client cache is inconsistent. Please retry.")
}

#[cfg(test)]
mod tests {
    use super::*;
    use gamespace_core::CatalogOrdering;

    #[test]
    fn test_key_scheme() {
        assert_eq!(game_key(GameId::new(7)).as_str(), "game:7");
        assert_eq!(library_key().as_str(), "library:me");
        assert_eq!(
            catalog_key(&CatalogQuery::trending()).as_str(),
            "catalog:trending=true"
        );
        assert_eq!(
            catalog_key(
                &CatalogQuery::default()
                    .with_ordering(CatalogOrdering::NewestFirst)
                    .with_genre("RPG")
            )
            .as_str(),
            "catalog:genre=RPG&ordering=-release_date"
        );
    }

    #[test]
    fn test_every_catalog_key_falls_under_the_prefix() {
        let keys = [
            catalog_key(&CatalogQuery::default()),
            catalog_key(&CatalogQuery::trending()),
            catalog_key(&CatalogQuery::default().with_search("zelda")),
        ];
        for key in keys {
            assert!(key.starts_with(&catalog_prefix()), "{}", key);
        }
        assert!(!game_key(GameId::new(1)).starts_with(&catalog_prefix()));
    }

    #[test]
    fn test_paths() {
        assert_eq!(game_path(GameId::new(3)), "/games/3/");
        assert_eq!(library_entry_path(LibraryEntryId::new(12)), "/library/12/");
    }
}
