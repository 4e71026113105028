//! One handle for views: session, cached reads, and writes.

use crate::config::ClientConfig;
use crate::error::ClientResult;
use crate::gateway::{CredentialProvider, GatewayClient};
use crate::mutation::MutationCoordinator;
use crate::persistence::{CredentialStore, FileCredentialStore};
use crate::resources::{
    catalog_key, game_key, game_path, library_key, mismatch, Resource, GAMES_PATH, LIBRARY_PATH,
};
use crate::session::{Access, GuardDecision, SessionManager, SessionState};
use crate::transport::ReqwestTransport;
use gamespace_core::{
    AuthError, CatalogQuery, Game, GameId, GatewayResult, HttpTransport, LibraryEntry,
    LibraryStatus, RegisterRequest, Review, UserSummary,
};
use gamespace_storage::{CacheKey, CacheStats, ReadCache};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::watch;

#[derive(Clone)]
pub struct GameSpaceClient {
    session: Arc<SessionManager>,
    gateway: GatewayClient,
    cache: ReadCache<Resource>,
    mutations: MutationCoordinator,
}

impl GameSpaceClient {
    pub fn new(transport: Arc<dyn HttpTransport>, store: Arc<dyn CredentialStore>) -> Self {
        let session = Arc::new(SessionManager::new(store));
        let provider: Arc<dyn CredentialProvider> = session.clone();
        let gateway = GatewayClient::new(transport, provider);
        let cache = ReadCache::new();
        let mutations = MutationCoordinator::new(gateway.clone(), cache.clone());
        Self {
            session,
            gateway,
            cache,
            mutations,
        }
    }

    /// Client backed by reqwest and the credential file from `config`.
    pub fn from_config(config: &ClientConfig) -> ClientResult<Self> {
        let transport = ReqwestTransport::new(config)?;
        let store = FileCredentialStore::new(&config.credential_path);
        Ok(Self::new(Arc::new(transport), Arc::new(store)))
    }

    pub fn session(&self) -> &Arc<SessionManager> {
        &self.session
    }

    pub fn gateway(&self) -> &GatewayClient {
        &self.gateway
    }

    pub fn cache(&self) -> &ReadCache<Resource> {
        &self.cache
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    // ========================================================================
    // SESSION
    // ========================================================================

    pub async fn resolve(&self) -> SessionState {
        self.session.resolve(&self.gateway).await
    }

    pub async fn login(&self, username: &str, password: &str) -> Result<UserSummary, AuthError> {
        let user = self.session.login(&self.gateway, username, password).await?;
        // Cached details carry the previous user's library entries.
        self.cache.clear();
        Ok(user)
    }

    pub fn logout(&self) {
        self.session.logout();
        self.cache.clear();
    }

    pub async fn register(&self, request: &RegisterRequest) -> GatewayResult<()> {
        self.session.register(&self.gateway, request).await
    }

    pub async fn refresh(&self) -> GatewayResult<()> {
        self.session.refresh(&self.gateway).await
    }

    pub fn access(&self) -> Access {
        self.session.access()
    }

    pub fn guard(&self) -> GuardDecision {
        self.session.guard()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.session.subscribe()
    }

    // ========================================================================
    // READS
    // ========================================================================

    pub async fn catalog(&self, query: &CatalogQuery) -> GatewayResult<Vec<Game>> {
        let key = catalog_key(query);
        let params: Vec<(String, String)> = query
            .params()
            .into_iter()
            .map(|(name, value)| (name.to_string(), value))
            .collect();
        let gateway = self.gateway.clone();
        let resource = self
            .read(&key, move || async move {
                gateway
                    .get_json::<Vec<Game>>(GAMES_PATH, params)
                    .await
                    .map(Resource::Catalog)
            })
            .await?;
        match resource {
            Resource::Catalog(games) => Ok(games),
            other => Err(mismatch(&key, &other)),
        }
    }

    pub async fn trending(&self) -> GatewayResult<Vec<Game>> {
        self.catalog(&CatalogQuery::trending()).await
    }

    pub async fn game(&self, id: GameId) -> GatewayResult<Game> {
        let key = game_key(id);
        let gateway = self.gateway.clone();
        let resource = self
            .read(&key, move || async move {
                gateway
                    .get_json::<Game>(&game_path(id), Vec::new())
                    .await
                    .map(Resource::Game)
            })
            .await?;
        match resource {
            Resource::Game(game) => Ok(game),
            other => Err(mismatch(&key, &other)),
        }
    }

    /// The current user's library.
    pub async fn library(&self) -> GatewayResult<Vec<LibraryEntry>> {
        let key = library_key();
        let gateway = self.gateway.clone();
        let resource = self
            .read(&key, move || async move {
                gateway
                    .get_json::<Vec<LibraryEntry>>(LIBRARY_PATH, Vec::new())
                    .await
                    .map(Resource::Library)
            })
            .await?;
        match resource {
            Resource::Library(entries) => Ok(entries),
            other => Err(mismatch(&key, &other)),
        }
    }

    async fn read<F, Fut>(&self, key: &CacheKey, fetcher: F) -> GatewayResult<Resource>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = GatewayResult<Resource>> + Send + 'static,
    {
        let read = self.cache.get(key, fetcher).await?;
        tracing::trace!(key = %key, hit = read.was_cache_hit(), coalesced = read.was_coalesced(), "read");
        Ok(read.into_value())
    }

    // ========================================================================
    // WRITES
    // ========================================================================

    pub async fn upsert_library_entry(
        &self,
        game_id: GameId,
        status: LibraryStatus,
    ) -> GatewayResult<LibraryEntry> {
        self.mutations.upsert_library_entry(game_id, status).await
    }

    pub async fn create_review(
        &self,
        game_id: GameId,
        rating: i64,
        comment: &str,
    ) -> GatewayResult<Review> {
        self.mutations.create_review(game_id, rating, comment).await
    }
}
