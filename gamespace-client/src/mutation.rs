//! Writes, and the cache invalidation that follows them.
//!
//! Each successful write marks exactly the entries whose server-side value it
//! could have changed. Failed writes leave the cache untouched.

use crate::gateway::GatewayClient;
use crate::resources::{
    catalog_prefix, game_key, game_path, library_entry_path, library_key, mismatch, Resource,
    LIBRARY_PATH, REVIEWS_PATH,
};
use gamespace_core::{
    Game, GameId, GatewayError, GatewayResult, LibraryEntry, LibraryStatus, LibraryStatusUpdate,
    NewLibraryEntry, NewReview, Rating, Review,
};
use gamespace_storage::ReadCache;
use tracing::{debug, info};

#[derive(Clone)]
pub struct MutationCoordinator {
    gateway: GatewayClient,
    cache: ReadCache<Resource>,
}

impl MutationCoordinator {
    pub fn new(gateway: GatewayClient, cache: ReadCache<Resource>) -> Self {
        Self { gateway, cache }
    }

    /// Create or update the caller's library entry for `game_id`.
    ///
    /// Whether to create or update is decided from the cache: the game
    /// detail first, then the library listing when the detail was never
    /// cached. When the cached data is outdated and shows no entry, the
    /// detail is read again through the cache so an entry created since the
    /// last read is never created twice.
    pub async fn upsert_library_entry(
        &self,
        game_id: GameId,
        status: LibraryStatus,
    ) -> GatewayResult<LibraryEntry> {
        let entry: LibraryEntry = match self.known_entry(game_id).await? {
            Some(existing) => {
                debug!(game_id = %game_id, entry_id = %existing.id, %status, "updating library entry");
                self.gateway
                    .patch_json(
                        &library_entry_path(existing.id),
                        &LibraryStatusUpdate { status },
                    )
                    .await?
            }
            None => {
                debug!(game_id = %game_id, %status, "creating library entry");
                self.gateway
                    .post_json(
                        LIBRARY_PATH,
                        &NewLibraryEntry {
                            game: game_id,
                            status,
                        },
                    )
                    .await?
            }
        };

        self.cache.invalidate(&game_key(game_id));
        self.cache.invalidate(&library_key());
        // Trending order counts library entries.
        self.cache.invalidate_prefix(&catalog_prefix());
        info!(game_id = %game_id, entry_id = %entry.id, status = %entry.status, "library entry saved");
        Ok(entry)
    }

    /// Publish a review. `rating` is checked before anything is sent.
    pub async fn create_review(
        &self,
        game_id: GameId,
        rating: i64,
        comment: &str,
    ) -> GatewayResult<Review> {
        let rating = Rating::try_from(rating)
            .map_err(|err| GatewayError::invalid_field("rating", err.to_string()))?;

        let review: Review = self
            .gateway
            .post_json(
                REVIEWS_PATH,
                &NewReview {
                    game_id,
                    rating,
                    comment: comment.to_string(),
                },
            )
            .await?;

        self.cache.invalidate(&game_key(game_id));
        // Average rating feeds both the listing rows and rating order.
        self.cache.invalidate_prefix(&catalog_prefix());
        info!(game_id = %game_id, review_id = %review.id, rating = %review.rating, "review published");
        Ok(review)
    }

    /// Entries are never deleted by this client, so an entry seen in stale
    /// data still exists. Its absence is only trusted from fresh data.
    async fn known_entry(&self, game_id: GameId) -> GatewayResult<Option<LibraryEntry>> {
        let key = game_key(game_id);
        match self.cache.peek(&key) {
            Some(cached) => {
                if let Some(game) = cached.data.as_ref().and_then(Resource::as_game) {
                    if game.library_entry.is_some() || cached.is_fresh() {
                        return Ok(game.library_entry.clone());
                    }
                }
            }
            None => {
                if let Some(listing) = self.cache.peek(&library_key()) {
                    let entries = listing.data.as_ref().and_then(Resource::as_library);
                    let found = entries
                        .and_then(|entries| entries.iter().find(|entry| entry.game_id == game_id));
                    if found.is_some() || (entries.is_some() && listing.is_fresh()) {
                        return Ok(found.cloned());
                    }
                }
            }
        }

        debug!(game_id = %game_id, "re-reading game detail before library write");
        let gateway = self.gateway.clone();
        let read = self
            .cache
            .get(&key, move || async move {
                gateway
                    .get_json::<Game>(&game_path(game_id), Vec::new())
                    .await
                    .map(Resource::Game)
            })
            .await?;
        match read.into_value() {
            Resource::Game(game) => Ok(game.library_entry),
            other => Err(mismatch(&key, &other)),
        }
    }
}
