//! Session lifecycle: who is logged in, and whether we know yet.
//!
//! The session starts `Unresolved` and moves to `Authenticated` or
//! `Anonymous` exactly once through [`SessionManager::resolve`]. After that,
//! login, logout, refresh, and a rejected credential are the only writers.
//! Views observe the state through [`SessionManager::subscribe`] or gate
//! themselves with [`SessionManager::guard`].

use crate::gateway::{Attach, CredentialProvider, GatewayClient};
use crate::persistence::CredentialStore;
use gamespace_core::{
    AuthError, GatewayError, GatewayResult, LoginRequest, LoginResponse, RefreshRequest,
    RefreshResponse, RegisterRequest, UserSummary,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::watch;
use tracing::{debug, info, warn};

pub const ME_PATH: &str = "/users/me/";
pub const LOGIN_PATH: &str = "/auth/login/";
pub const REGISTER_PATH: &str = "/auth/register/";
pub const REFRESH_PATH: &str = "/auth/refresh/";

// ============================================================================
// TYPES
// ============================================================================

/// Bearer token pair issued at login.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    pub access: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh: Option<String>,
}

impl Credential {
    pub fn new(access: impl Into<String>, refresh: Option<String>) -> Self {
        Self {
            access: access.into(),
            refresh,
        }
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("access", &"<redacted>")
            .field("refresh", &self.refresh.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    /// Stored credentials have not been checked yet.
    Unresolved,
    Authenticated(UserSummary),
    Anonymous,
}

impl SessionState {
    pub fn is_resolved(&self) -> bool {
        !matches!(self, SessionState::Unresolved)
    }

    pub fn user(&self) -> Option<&UserSummary> {
        match self {
            SessionState::Authenticated(user) => Some(user),
            _ => None,
        }
    }
}

/// Answer to "is there a session?".
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Access {
    /// Resolution has not finished; do not decide yet.
    Undetermined,
    Granted(UserSummary),
    Denied,
}

/// What a protected view should do right now.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardDecision {
    /// Show a loading indicator. Neither render nor redirect.
    Wait,
    Render(UserSummary),
    RedirectToLogin,
}

impl From<&SessionState> for Access {
    fn from(state: &SessionState) -> Self {
        match state {
            SessionState::Unresolved => Access::Undetermined,
            SessionState::Authenticated(user) => Access::Granted(user.clone()),
            SessionState::Anonymous => Access::Denied,
        }
    }
}

impl From<Access> for GuardDecision {
    fn from(access: Access) -> Self {
        match access {
            Access::Undetermined => GuardDecision::Wait,
            Access::Granted(user) => GuardDecision::Render(user),
            Access::Denied => GuardDecision::RedirectToLogin,
        }
    }
}

// ============================================================================
// SESSION MANAGER
// ============================================================================

pub struct SessionManager {
    credential: Mutex<Option<Credential>>,
    state: watch::Sender<SessionState>,
    store: Arc<dyn CredentialStore>,
}

impl SessionManager {
    pub fn new(store: Arc<dyn CredentialStore>) -> Self {
        let (state, _rx) = watch::channel(SessionState::Unresolved);
        Self {
            credential: Mutex::new(None),
            state,
            store,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    /// Suspend until the session leaves `Unresolved`.
    pub async fn wait_resolved(&self) -> SessionState {
        let mut rx = self.subscribe();
        let resolved = rx.wait_for(SessionState::is_resolved).await;
        match resolved {
            Ok(state) => state.clone(),
            // The sender lives in `self`, so the channel cannot close here.
            Err(_) => self.state(),
        }
    }

    pub fn access(&self) -> Access {
        Access::from(&*self.state.borrow())
    }

    pub fn guard(&self) -> GuardDecision {
        GuardDecision::from(self.access())
    }

    /// Validate the stored credential, if any, against `GET /users/me/`.
    ///
    /// Always ends resolved and never retries. A rejected credential is
    /// deleted; one that could not be checked is kept for the next start.
    pub async fn resolve(&self, gateway: &GatewayClient) -> SessionState {
        if self.state.borrow().is_resolved() {
            return self.state();
        }

        let stored = match self.store.load() {
            Ok(stored) => stored,
            Err(err) => {
                warn!(error = %err, "could not read stored credential");
                None
            }
        };

        let Some(credential) = stored else {
            debug!("no stored credential");
            return self.finish_resolve(None);
        };

        match gateway
            .get_json_as::<UserSummary>(ME_PATH, Attach::Explicit(&credential))
            .await
        {
            Ok(user) => {
                info!(user_id = %user.id, username = %user.username, "restored session");
                self.finish_resolve(Some((credential, user)))
            }
            Err(err @ (GatewayError::Unauthorized { .. } | GatewayError::Forbidden { .. })) => {
                info!(kind = ?err.kind(), "stored credential rejected; discarding it");
                self.clear_store();
                self.finish_resolve(None)
            }
            Err(err) => {
                warn!(error = %err, kind = ?err.kind(), "could not validate stored credential; continuing anonymously");
                self.finish_resolve(None)
            }
        }
    }

    fn finish_resolve(&self, restored: Option<(Credential, UserSummary)>) -> SessionState {
        let mut credential = self.lock_credential();
        // A login that finished first already resolved the session.
        if self.state.borrow().is_resolved() {
            return self.state();
        }
        let next = match restored {
            Some((restored, user)) => {
                *credential = Some(restored);
                SessionState::Authenticated(user)
            }
            None => SessionState::Anonymous,
        };
        self.state.send_replace(next.clone());
        next
    }

    /// `POST /auth/login/`, then adopt the issued credential.
    pub async fn login(
        &self,
        gateway: &GatewayClient,
        username: &str,
        password: &str,
    ) -> Result<UserSummary, AuthError> {
        let response: LoginResponse = gateway
            .post_json_as(LOGIN_PATH, &LoginRequest { username, password }, Attach::None)
            .await
            .map_err(|err| match err {
                GatewayError::Unauthorized { .. } | GatewayError::Validation { .. } => {
                    AuthError::InvalidCredentials
                }
                other => AuthError::Gateway(other),
            })?;

        let credential = Credential::new(response.access, response.refresh);
        let user = match response.user {
            Some(user) => user,
            None => {
                gateway
                    .get_json_as::<UserSummary>(ME_PATH, Attach::Explicit(&credential))
                    .await?
            }
        };

        if let Err(err) = self.store.save(&credential) {
            warn!(error = %err, "could not persist credential; session will not survive restart");
        }
        {
            let mut current = self.lock_credential();
            *current = Some(credential);
            self.state
                .send_replace(SessionState::Authenticated(user.clone()));
        }
        info!(user_id = %user.id, username = %user.username, "logged in");
        Ok(user)
    }

    /// Drop the credential from memory and disk. Requests already in flight
    /// keep the credential they were sent with.
    pub fn logout(&self) {
        {
            let mut current = self.lock_credential();
            *current = None;
            self.state.send_replace(SessionState::Anonymous);
        }
        self.clear_store();
        info!("logged out");
    }

    /// `POST /auth/register/`. Does not log in.
    pub async fn register(
        &self,
        gateway: &GatewayClient,
        request: &RegisterRequest,
    ) -> GatewayResult<()> {
        gateway
            .post_json_as::<Value, _>(REGISTER_PATH, request, Attach::None)
            .await?;
        info!(username = %request.username, role = %request.role, "registered account");
        Ok(())
    }

    /// Exchange the refresh token for a new access token.
    pub async fn refresh(&self, gateway: &GatewayClient) -> GatewayResult<()> {
        let Some(current) = self.current_credential() else {
            return Err(GatewayError::unauthorized("You are not logged in."));
        };
        let Some(refresh_token) = current.refresh.clone() else {
            return Err(GatewayError::unauthorized(
                "This session cannot be refreshed. Please log in again.",
            ));
        };

        let response: RefreshResponse = gateway
            .post_json_as(
                REFRESH_PATH,
                &RefreshRequest {
                    refresh: &refresh_token,
                },
                Attach::None,
            )
            .await?;

        let renewed = Credential::new(response.access, response.refresh.or(Some(refresh_token)));
        {
            let mut stored = self.lock_credential();
            // Logged out or replaced while the refresh was in flight.
            if stored.as_ref() != Some(&current) {
                debug!("session changed during refresh; discarding renewed credential");
                return Ok(());
            }
            *stored = Some(renewed.clone());
        }
        if let Err(err) = self.store.save(&renewed) {
            warn!(error = %err, "could not persist refreshed credential");
        }
        debug!("access token refreshed");
        Ok(())
    }

    fn clear_store(&self) {
        if let Err(err) = self.store.clear() {
            warn!(error = %err, "could not delete stored credential");
        }
    }

    fn lock_credential(&self) -> MutexGuard<'_, Option<Credential>> {
        self.credential
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl CredentialProvider for SessionManager {
    fn current_credential(&self) -> Option<Credential> {
        self.lock_credential().clone()
    }

    /// Only the credential currently in use can end the session; a 401 for
    /// one that a newer login already replaced is ignored.
    fn credential_rejected(&self, credential: &Credential) {
        {
            let mut current = self.lock_credential();
            if current.as_ref() != Some(credential) {
                debug!("ignoring rejection of a credential no longer in use");
                return;
            }
            *current = None;
            self.state.send_replace(SessionState::Anonymous);
        }
        self.clear_store();
        info!("credential rejected by server; session ended");
    }
}

// ============================================================================
// TESTS
// ============================================================================
