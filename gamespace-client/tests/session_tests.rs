//! Session lifecycle against a scripted server.

mod support;

use gamespace_client::{Access, Credential, CredentialProvider, GuardDecision, SessionState};
use gamespace_core::{AuthError, ErrorKind, RegisterRequest};
use gamespace_test_utils::assertions::assert_request_count;
use gamespace_test_utils::fixtures::{self, ACCESS_TOKEN, REFRESH_TOKEN, TEST_USERNAME};
use gamespace_test_utils::{HttpMethod, TransportError};
use serde_json::json;
use support::{harness, harness_with_store, logged_in, stored};

// ============================================================================
// RESOLVE
// ============================================================================

#[tokio::test]
async fn resolve_without_stored_credential_is_anonymous() {
    let h = harness();
    assert_eq!(h.client.resolve().await, SessionState::Anonymous);
    assert_eq!(h.transport.request_count(), 0);
    assert_eq!(h.client.guard(), GuardDecision::RedirectToLogin);
}

#[tokio::test]
async fn resolve_restores_valid_stored_credential() {
    let h = harness_with_store(stored(ACCESS_TOKEN));
    h.transport.respond(
        HttpMethod::Get,
        "/users/me/",
        200,
        fixtures::envelope(fixtures::test_user_json()),
    );

    let state = h.client.resolve().await;

    assert_eq!(state, SessionState::Authenticated(fixtures::test_user()));
    let sent = h.transport.requests_to(HttpMethod::Get, "/users/me/");
    assert_eq!(sent[0].bearer.as_deref(), Some(ACCESS_TOKEN));
    assert_eq!(
        h.client.session().current_credential().map(|c| c.access),
        Some(ACCESS_TOKEN.to_string())
    );
}

#[tokio::test]
async fn resolve_drops_rejected_credential() {
    for status in [401u16, 403] {
        let h = harness_with_store(stored(ACCESS_TOKEN));
        h.transport.respond(
            HttpMethod::Get,
            "/users/me/",
            status,
            fixtures::error_envelope(json!({"detail": "Given token not valid for any token type"})),
        );

        assert_eq!(h.client.resolve().await, SessionState::Anonymous);
        assert_eq!(h.store.stored(), None, "status {}", status);
    }
}

#[tokio::test]
async fn resolve_keeps_credential_when_server_unreachable() {
    let h = harness_with_store(stored(ACCESS_TOKEN));
    h.transport.fail(
        HttpMethod::Get,
        "/users/me/",
        TransportError::new("connection refused"),
    );

    assert_eq!(h.client.resolve().await, SessionState::Anonymous);
    assert!(h.store.stored().is_some());
    assert_request_count(&h.transport, HttpMethod::Get, "/users/me/", 1);
}

#[tokio::test]
async fn resolve_keeps_credential_on_server_error() {
    let h = harness_with_store(stored(ACCESS_TOKEN));
    h.transport
        .respond(HttpMethod::Get, "/users/me/", 502, json!(null));

    assert_eq!(h.client.resolve().await, SessionState::Anonymous);
    assert!(h.store.stored().is_some());
    // Never retried.
    assert_eq!(h.transport.request_count(), 1);
}

#[tokio::test]
async fn protected_view_waits_while_unresolved() {
    let h = harness_with_store(stored(ACCESS_TOKEN));
    let gate = h.transport.hold(
        HttpMethod::Get,
        "/users/me/",
        200,
        fixtures::test_user_json(),
    );

    let resolving = {
        let client = h.client.clone();
        tokio::spawn(async move { client.resolve().await })
    };
    h.transport.wait_for_requests(1).await;

    assert_eq!(h.client.access(), Access::Undetermined);
    assert_eq!(h.client.guard(), GuardDecision::Wait);

    gate.release();
    let state = resolving.await.unwrap();
    assert!(matches!(state, SessionState::Authenticated(_)));
    assert_eq!(
        h.client.guard(),
        GuardDecision::Render(fixtures::test_user())
    );
}

#[tokio::test]
async fn subscribers_see_resolution() {
    let h = harness();
    let mut rx = h.client.subscribe();
    assert_eq!(*rx.borrow(), SessionState::Unresolved);

    h.client.resolve().await;
    rx.changed().await.unwrap();
    assert_eq!(*rx.borrow(), SessionState::Anonymous);
    assert_eq!(
        h.client.session().wait_resolved().await,
        SessionState::Anonymous
    );
}

// ============================================================================
// LOGIN / LOGOUT
// ============================================================================

#[tokio::test]
async fn login_persists_credential_and_authenticates() {
    let h = logged_in(ACCESS_TOKEN).await;

    assert_eq!(
        h.client.session().state(),
        SessionState::Authenticated(fixtures::test_user())
    );
    assert_eq!(
        h.store.stored(),
        Some(Credential::new(ACCESS_TOKEN, Some(REFRESH_TOKEN.to_string())))
    );
    let login = &h.transport.requests_to(HttpMethod::Post, "/auth/login/")[0];
    assert_eq!(login.bearer, None);
    assert_eq!(
        login.body,
        Some(json!({"username": TEST_USERNAME, "password": "hunter22"}))
    );
}

#[tokio::test]
async fn login_fetches_user_when_response_omits_it() {
    let h = harness();
    h.transport
        .respond(
            HttpMethod::Post,
            "/auth/login/",
            200,
            fixtures::login_json("fresh-access", REFRESH_TOKEN, None),
        )
        .respond(
            HttpMethod::Get,
            "/users/me/",
            200,
            fixtures::envelope(fixtures::test_user_json()),
        );

    let user = h.client.login(TEST_USERNAME, "hunter22").await.unwrap();

    assert_eq!(user, fixtures::test_user());
    let me = &h.transport.requests_to(HttpMethod::Get, "/users/me/")[0];
    assert_eq!(me.bearer.as_deref(), Some("fresh-access"));
}

#[tokio::test]
async fn login_with_bad_credentials_is_invalid_credentials() {
    for (status, body) in [
        (401u16, json!({"detail": "No active account found with the given credentials"})),
        (400, json!({"password": ["This field may not be blank."]})),
    ] {
        let h = harness();
        h.transport
            .respond(HttpMethod::Post, "/auth/login/", status, body);

        let err = h.client.login(TEST_USERNAME, "wrong").await.unwrap_err();

        assert_eq!(err, AuthError::InvalidCredentials);
        assert_eq!(err.to_string(), "Invalid username or password.");
        assert_eq!(h.store.stored(), None);
    }
}

#[tokio::test]
async fn login_server_failure_is_passed_through() {
    let h = harness();
    h.transport
        .respond(HttpMethod::Post, "/auth/login/", 500, json!(null));

    match h.client.login(TEST_USERNAME, "hunter22").await {
        Err(AuthError::Gateway(err)) => assert_eq!(err.kind(), ErrorKind::Server),
        other => panic!("expected gateway error, got {:?}", other),
    }
}

#[tokio::test]
async fn logout_clears_memory_and_disk() {
    let h = logged_in(ACCESS_TOKEN).await;

    h.client.logout();

    assert_eq!(h.client.session().state(), SessionState::Anonymous);
    assert_eq!(h.client.session().current_credential(), None);
    assert_eq!(h.store.stored(), None);
}

// ============================================================================
// REGISTER / REFRESH
// ============================================================================

#[tokio::test]
async fn register_sends_default_role_and_keeps_state() {
    let h = harness();
    h.client.resolve().await;
    h.transport.respond(
        HttpMethod::Post,
        "/auth/register/",
        201,
        fixtures::envelope(json!({"username": "newbie", "email": "n@example.com", "role": "GAMER"})),
    );

    h.client
        .register(&RegisterRequest::new("newbie", "n@example.com", "s3cret!!"))
        .await
        .unwrap();

    let sent = &h.transport.requests_to(HttpMethod::Post, "/auth/register/")[0];
    assert_eq!(sent.body.as_ref().unwrap()["role"], json!("GAMER"));
    assert_eq!(sent.bearer, None);
    assert_eq!(h.client.session().state(), SessionState::Anonymous);
}

#[tokio::test]
async fn register_error_message_is_first_field() {
    let h = harness();
    h.transport.respond(
        HttpMethod::Post,
        "/auth/register/",
        400,
        fixtures::error_envelope(json!({
            "username": ["A user with that username already exists."],
            "password": ["This password is too common."]
        })),
    );

    let err = h
        .client
        .register(&RegisterRequest::new("taken", "t@example.com", "password"))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Validation);
    assert_eq!(
        err.message(),
        "username: A user with that username already exists."
    );
}

#[tokio::test]
async fn refresh_replaces_access_token() {
    let h = logged_in(ACCESS_TOKEN).await;
    h.transport.respond(
        HttpMethod::Post,
        "/auth/refresh/",
        200,
        json!({"access": "access-token-2"}),
    );

    h.client.refresh().await.unwrap();

    let sent = &h.transport.requests_to(HttpMethod::Post, "/auth/refresh/")[0];
    assert_eq!(sent.body, Some(json!({"refresh": REFRESH_TOKEN})));
    let current = h.client.session().current_credential().unwrap();
    assert_eq!(current.access, "access-token-2");
    assert_eq!(current.refresh.as_deref(), Some(REFRESH_TOKEN));
    assert_eq!(h.store.stored(), Some(current));
}

#[tokio::test]
async fn refresh_without_session_is_unauthorized() {
    let h = harness();
    let err = h.client.refresh().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Unauthorized);
    assert_eq!(h.transport.request_count(), 0);
}
