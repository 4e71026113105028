//! GameSpace Test Utilities
//!
//! Shared test infrastructure for the GameSpace workspace:
//! - `ScriptedTransport`, an in-process stand-in for the REST service
//! - Proptest generators for entity and query types
//! - JSON fixtures shaped like real server responses
//! - Assertions for gateway errors and cache state

pub use gamespace_core::{
    CatalogOrdering, CatalogQuery, ErrorKind, Game, GameId, GatewayError, GatewayResult,
    HttpMethod, HttpRequest, HttpResponse, HttpTransport, LibraryEntry, LibraryEntryId,
    LibraryStatus, Rating, Review, ReviewId, TransportError, UserId, UserSummary,
};
pub use gamespace_storage::{CacheKey, EntryState, ReadCache};

use async_trait::async_trait;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::Semaphore;

// ============================================================================
// SCRIPTED TRANSPORT
// ============================================================================

/// How the scripted server answers one request.
#[derive(Debug, Clone)]
pub enum Reply {
    Respond(HttpResponse),
    Fail(TransportError),
    /// Respond once the gate is released.
    Held(Gate, HttpResponse),
}

/// Release handle for a held reply.
#[derive(Debug, Clone)]
pub struct Gate(Arc<Semaphore>);

impl Gate {
    fn new() -> Self {
        Self(Arc::new(Semaphore::new(0)))
    }

    /// Let the held reply through.
    pub fn release(&self) {
        self.0.add_permits(1);
    }

    async fn wait(&self) {
        // A closed semaphore means the test is tearing down; answer anyway.
        let _ = self.0.acquire().await;
    }
}

#[derive(Debug)]
struct Route {
    method: HttpMethod,
    path: String,
    queued: VecDeque<Reply>,
    fallback: Option<Reply>,
}

#[derive(Debug, Default)]
struct Script {
    routes: Vec<Route>,
    requests: Vec<HttpRequest>,
}

/// In-process [`HttpTransport`] that answers from a script and records every
/// request it receives.
///
/// Replies registered with [`reply`](Self::reply) are consumed in order;
/// [`always`](Self::always) sets the answer once the queue for a route is
/// empty. Unscripted requests get a 404.
#[derive(Debug, Default)]
pub struct ScriptedTransport {
    script: Mutex<Script>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue one reply for `method path`.
    pub fn reply(&self, method: HttpMethod, path: &str, reply: Reply) -> &Self {
        self.route(method, path, |route| route.queued.push_back(reply));
        self
    }

    /// Queue one JSON response for `method path`.
    pub fn respond(&self, method: HttpMethod, path: &str, status: u16, body: Value) -> &Self {
        self.reply(method, path, Reply::Respond(json_response(status, &body)))
    }

    /// Answer `method path` with this response whenever nothing is queued.
    pub fn always(&self, method: HttpMethod, path: &str, status: u16, body: Value) -> &Self {
        let response = Reply::Respond(json_response(status, &body));
        self.route(method, path, |route| route.fallback = Some(response));
        self
    }

    /// Queue a transport failure (no response) for `method path`.
    pub fn fail(&self, method: HttpMethod, path: &str, error: TransportError) -> &Self {
        self.reply(method, path, Reply::Fail(error))
    }

    /// Queue a JSON response that is only sent after the returned gate is
    /// released.
    pub fn hold(&self, method: HttpMethod, path: &str, status: u16, body: Value) -> Gate {
        let gate = Gate::new();
        self.reply(
            method,
            path,
            Reply::Held(gate.clone(), json_response(status, &body)),
        );
        gate
    }

    /// Every request received so far, in arrival order.
    pub fn requests(&self) -> Vec<HttpRequest> {
        self.lock().requests.clone()
    }

    /// Requests received for `method path`.
    pub fn requests_to(&self, method: HttpMethod, path: &str) -> Vec<HttpRequest> {
        self.lock()
            .requests
            .iter()
            .filter(|request| request.method == method && request.path == path)
            .cloned()
            .collect()
    }

    pub fn request_count(&self) -> usize {
        self.lock().requests.len()
    }

    /// Suspend until at least `count` requests have arrived.
    pub async fn wait_for_requests(&self, count: usize) {
        while self.request_count() < count {
            tokio::task::yield_now().await;
        }
    }

    fn route(&self, method: HttpMethod, path: &str, apply: impl FnOnce(&mut Route)) {
        let mut script = self.lock();
        let index = match script
            .routes
            .iter()
            .position(|route| route.method == method && route.path == path)
        {
            Some(index) => index,
            None => {
                script.routes.push(Route {
                    method,
                    path: path.to_string(),
                    queued: VecDeque::new(),
                    fallback: None,
                });
                script.routes.len() - 1
            }
        };
        apply(&mut script.routes[index]);
    }

    fn lock(&self) -> MutexGuard<'_, Script> {
        self.script.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl HttpTransport for ScriptedTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let reply = {
            let mut script = self.lock();
            let reply = script
                .routes
                .iter_mut()
                .find(|route| route.method == request.method && route.path == request.path)
                .and_then(|route| route.queued.pop_front().or_else(|| route.fallback.clone()));
            script.requests.push(request.clone());
            reply
        };

        match reply {
            Some(Reply::Respond(response)) => Ok(response),
            Some(Reply::Fail(error)) => Err(error),
            Some(Reply::Held(gate, response)) => {
                gate.wait().await;
                Ok(response)
            }
            None => Ok(json_response(
                404,
                &serde_json::json!({
                    "detail": format!("No scripted response for {} {}", request.method, request.path)
                }),
            )),
        }
    }
}

fn json_response(status: u16, body: &Value) -> HttpResponse {
    if body.is_null() {
        HttpResponse::new(status, "")
    } else {
        HttpResponse::new(status, body.to_string())
    }
}

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for GameSpace types.

    use super::*;
    use proptest::prelude::*;

    pub fn arb_game_id() -> impl Strategy<Value = GameId> {
        (1i64..100_000).prop_map(GameId::new)
    }

    pub fn arb_library_status() -> impl Strategy<Value = LibraryStatus> {
        prop::sample::select(LibraryStatus::ALL.to_vec())
    }

    pub fn arb_catalog_ordering() -> impl Strategy<Value = CatalogOrdering> {
        prop::sample::select(CatalogOrdering::ALL.to_vec())
    }

    pub fn arb_rating() -> impl Strategy<Value = Rating> {
        (1i64..=10).prop_filter_map("in range", |value| Rating::try_from(value).ok())
    }

    /// Integers a user might type that are not valid ratings.
    pub fn arb_out_of_range_rating() -> impl Strategy<Value = i64> {
        prop_oneof![i64::MIN..1i64, 11i64..i64::MAX]
    }

    pub fn arb_catalog_query() -> impl Strategy<Value = CatalogQuery> {
        (
            prop::option::of("[a-zA-Z0-9 ]{0,12}"),
            prop::option::of(prop::sample::select(vec![
                "Action", "RPG", "Strategy", "Indie", "Sports",
            ])),
            prop::option::of(arb_catalog_ordering()),
            any::<bool>(),
        )
            .prop_map(|(search, genre, ordering, trending)| CatalogQuery {
                search,
                genre: genre.map(str::to_string),
                ordering,
                trending,
            })
    }
}

// ============================================================================
// TEST FIXTURES
// ============================================================================

pub mod fixtures {
    //! Response bodies shaped like the service's JSON, plus a few typed
    //! values for tests that never touch the wire.

    use super::*;
    use serde_json::json;

    pub const TEST_USER_ID: i64 = 1;
    pub const TEST_USERNAME: &str = "player_one";
    pub const ACCESS_TOKEN: &str = "access-token-1";
    pub const REFRESH_TOKEN: &str = "refresh-token-1";

    /// `{"success": true, "data": data}`
    pub fn envelope(data: Value) -> Value {
        json!({ "success": true, "data": data })
    }

    /// `{"success": false, "error": error}`
    pub fn error_envelope(error: Value) -> Value {
        json!({ "success": false, "error": error })
    }

    pub fn user_json(id: i64, username: &str) -> Value {
        json!({
            "id": id,
            "username": username,
            "email": format!("{}@example.com", username),
            "role": "GAMER",
        })
    }

    pub fn test_user_json() -> Value {
        user_json(TEST_USER_ID, TEST_USERNAME)
    }

    pub fn test_user() -> UserSummary {
        UserSummary {
            id: UserId::new(TEST_USER_ID),
            username: TEST_USERNAME.to_string(),
            email: Some(format!("{}@example.com", TEST_USERNAME)),
            role: Some("GAMER".to_string()),
        }
    }

    pub fn login_json(access: &str, refresh: &str, user: Option<Value>) -> Value {
        let mut body = json!({ "access": access, "refresh": refresh });
        if let Some(user) = user {
            body["user"] = user;
        }
        body
    }

    /// A listing row: no library entry, no reviews.
    pub fn game_json(id: i64, title: &str, average_rating: &str) -> Value {
        json!({
            "id": id,
            "title": title,
            "developer": "Studio Nine",
            "publisher": "Ninefold",
            "genre": "RPG",
            "release_date": "2023-09-14",
            "average_rating": average_rating,
            "cover_image_url": format!("https://cdn.example.com/covers/{}.jpg", id),
            "description": format!("{} is a game.", title),
        })
    }

    /// A detail response with the caller's library entry and reviews.
    pub fn game_detail_json(
        id: i64,
        average_rating: &str,
        library_entry: Option<Value>,
        reviews: Vec<Value>,
    ) -> Value {
        let mut body = game_json(id, &format!("Game {}", id), average_rating);
        body["user_library_entry"] = library_entry.unwrap_or(Value::Null);
        body["reviews"] = Value::Array(reviews);
        body
    }

    pub fn library_entry_json(id: i64, game: i64, status: LibraryStatus) -> Value {
        json!({
            "id": id,
            "game": game,
            "user": TEST_USER_ID,
            "status": status.as_str(),
        })
    }

    pub fn review_json(id: i64, game: i64, rating: u8, comment: &str) -> Value {
        json!({
            "id": id,
            "game_id": game,
            "user": TEST_USER_ID,
            "rating": rating,
            "comment": comment,
            "created_at": "2024-03-01T12:00:00Z",
        })
    }

    pub fn game(id: i64) -> Game {
        Game {
            id: GameId::new(id),
            title: format!("Game {}", id),
            developer: "Studio Nine".to_string(),
            publisher: "Ninefold".to_string(),
            genre: Some("RPG".to_string()),
            release_date: chrono::NaiveDate::from_ymd_opt(2023, 9, 14),
            average_rating: 0.0,
            cover_image_url: None,
            description: None,
            library_entry: None,
            reviews: None,
        }
    }

    pub fn library_entry(id: i64, game: i64, status: LibraryStatus) -> LibraryEntry {
        LibraryEntry {
            id: LibraryEntryId::new(id),
            game_id: GameId::new(game),
            user_id: UserId::new(TEST_USER_ID),
            status,
        }
    }
}

// ============================================================================
// CUSTOM ASSERTIONS
// ============================================================================

pub mod assertions {
    //! Assertions for gateway results and cache state.

    use super::*;

    /// Assert that a result failed with the given error kind.
    #[track_caller]
    pub fn assert_gateway_kind<T: std::fmt::Debug>(result: &GatewayResult<T>, kind: ErrorKind) {
        match result {
            Err(err) => assert_eq!(err.kind(), kind, "wrong error kind: {:?}", err),
            Ok(value) => panic!("Expected {:?} error, got Ok({:?})", kind, value),
        }
    }

    /// Assert the cache holds an entry for `key` in `state`.
    #[track_caller]
    pub fn assert_entry_state<V>(cache: &ReadCache<V>, key: &CacheKey, state: EntryState)
    where
        V: Clone + Send + Sync + 'static,
    {
        match cache.peek(key) {
            Some(entry) => assert_eq!(entry.state, state, "entry {} in wrong state", key),
            None => panic!("Expected entry {} in state {:?}, found none", key, state),
        }
    }

    /// Assert that exactly `count` requests hit `method path`.
    #[track_caller]
    pub fn assert_request_count(
        transport: &ScriptedTransport,
        method: HttpMethod,
        path: &str,
        count: usize,
    ) {
        let seen = transport.requests_to(method, path).len();
        assert_eq!(
            seen, count,
            "expected {} {} {} time(s), saw {}",
            method, path, count, seen
        );
    }
}

// ============================================================================
// TESTS
// ============================================================================
