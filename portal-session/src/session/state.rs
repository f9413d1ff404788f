//! In-memory session and its lifecycle.
//!
//! ```text
//! Uninitialized  -> Initializing
//! Initializing   -> Authenticated | Anonymous
//! Anonymous      -> Authenticating
//! Authenticating -> Authenticated | Anonymous
//! Authenticated  -> Anonymous
//! ```
//!
//! A login started while signed in keeps the current session until the new
//! credentials arrive; only then is the old session cleared and replaced, in one
//! step. Such a re-login is pending rather than `Authenticating`.
//!
//! Every logout bumps a generation counter. Work that started before a logout
//! (a login, a boot check, a token refresh) carries the generation it saw and is
//! discarded if it no longer matches.

use super::error::SessionError;
use crate::credentials::CredentialStore;
use crate::models::SessionUser;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Uninitialized,
    Initializing,
    Anonymous,
    Authenticating,
    Authenticated,
}

impl SessionPhase {
    pub fn can_transition_to(self, next: SessionPhase) -> bool {
        use SessionPhase::*;
        matches!(
            (self, next),
            (Uninitialized, Initializing)
                | (Initializing, Authenticated)
                | (Initializing, Anonymous)
                | (Anonymous, Authenticating)
                | (Authenticating, Authenticated)
                | (Authenticating, Anonymous)
                | (Authenticated, Anonymous)
        )
    }

    /// The session is indeterminate while booting or logging in.
    pub fn is_loading(self) -> bool {
        matches!(self, SessionPhase::Initializing | SessionPhase::Authenticating)
    }
}

/// Point-in-time copy of the session.
#[derive(Clone, PartialEq)]
pub struct SessionSnapshot {
    pub phase: SessionPhase,
    pub user: Option<SessionUser>,
    pub token: Option<String>,
    pub loading: bool,
}

impl fmt::Debug for SessionSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionSnapshot")
            .field("phase", &self.phase)
            .field("user", &self.user)
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .field("loading", &self.loading)
            .finish()
    }
}

struct Inner {
    phase: SessionPhase,
    user: Option<SessionUser>,
    token: Option<String>,
    generation: u64,
    relogin_pending: bool,
}

impl Inner {
    fn is_loading(&self) -> bool {
        self.phase.is_loading() || self.relogin_pending
    }

    fn transition(&mut self, next: SessionPhase) {
        debug_assert!(
            self.phase.can_transition_to(next),
            "illegal session transition {:?} -> {:?}",
            self.phase,
            next
        );
        debug!(from = ?self.phase, to = ?next, "Session phase changed");
        self.phase = next;
    }
}

pub struct SessionState {
    credentials: Arc<CredentialStore>,
    inner: RwLock<Inner>,
}

impl SessionState {
    pub fn new(credentials: Arc<CredentialStore>) -> Self {
        Self {
            credentials,
            inner: RwLock::new(Inner {
                phase: SessionPhase::Uninitialized,
                user: None,
                token: None,
                generation: 0,
                relogin_pending: false,
            }),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, Inner> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Inner> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn credentials(&self) -> &CredentialStore {
        &self.credentials
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let inner = self.read();
        SessionSnapshot {
            phase: inner.phase,
            user: inner.user.clone(),
            token: inner.token.clone(),
            loading: inner.is_loading(),
        }
    }

    pub fn phase(&self) -> SessionPhase {
        self.read().phase
    }

    pub fn is_loading(&self) -> bool {
        self.read().is_loading()
    }

    pub fn is_authenticated(&self) -> bool {
        self.read().user.is_some()
    }

    /// Exact, case-sensitive match against the user's role.
    pub fn is_authorized(&self, role: &str) -> bool {
        self.read()
            .user
            .as_ref()
            .is_some_and(|user| user.has_role(role))
    }

    pub fn user(&self) -> Option<SessionUser> {
        self.read().user.clone()
    }

    pub fn token(&self) -> Option<String> {
        self.read().token.clone()
    }

    pub fn generation(&self) -> u64 {
        self.read().generation
    }

    /// Drop the user and every stored credential. Never fails; safe to repeat.
    pub fn logout(&self) {
        let mut inner = self.write();
        self.clear_locked(&mut inner);
        info!("Session cleared");
    }

    fn clear_locked(&self, inner: &mut Inner) {
        inner.generation += 1;
        inner.relogin_pending = false;
        inner.user = None;
        inner.token = None;
        // Boot settles itself once its identity check returns.
        if matches!(
            inner.phase,
            SessionPhase::Authenticated | SessionPhase::Authenticating
        ) {
            inner.transition(SessionPhase::Anonymous);
        }
        self.credentials.clear_all();
    }

    pub(crate) fn begin_initialization(&self) -> Result<u64, SessionError> {
        let mut inner = self.write();
        if inner.phase != SessionPhase::Uninitialized {
            return Err(SessionError::AlreadyInitialized);
        }
        inner.transition(SessionPhase::Initializing);
        Ok(inner.generation)
    }

    pub(crate) fn finish_initialization(&self) {
        let mut inner = self.write();
        if inner.phase == SessionPhase::Initializing {
            inner.transition(SessionPhase::Anonymous);
        }
    }

    /// Start a login. When a user is signed in their session stays in place until
    /// [`authenticate`](Self::authenticate) replaces it.
    pub(crate) fn begin_login(&self) -> Result<u64, SessionError> {
        let mut inner = self.write();
        if inner.relogin_pending {
            return Err(SessionError::Busy);
        }
        match inner.phase {
            SessionPhase::Uninitialized => return Err(SessionError::NotInitialized),
            SessionPhase::Initializing | SessionPhase::Authenticating => {
                return Err(SessionError::Busy)
            }
            SessionPhase::Authenticated => {
                debug!("Re-login requested, keeping current session until it succeeds");
                inner.relogin_pending = true;
            }
            SessionPhase::Anonymous => inner.transition(SessionPhase::Authenticating),
        }
        Ok(inner.generation)
    }

    /// End the login of `generation` if it is still pending. A failed login from
    /// `Anonymous` returns there; a failed re-login leaves the prior session as is.
    pub(crate) fn finish_login(&self, generation: u64) {
        let mut inner = self.write();
        if inner.generation != generation {
            return;
        }
        inner.relogin_pending = false;
        if inner.phase == SessionPhase::Authenticating {
            inner.transition(SessionPhase::Anonymous);
        }
    }

    /// Install `user` and `token` unless a logout happened since `generation`.
    ///
    /// A prior session is cleared first. Clearing and `persist` run under the state
    /// lock so a concurrent logout cannot interleave with the credential writes.
    pub(crate) fn authenticate(
        &self,
        generation: u64,
        user: SessionUser,
        token: String,
        persist: impl FnOnce(&CredentialStore),
    ) -> bool {
        let mut inner = self.write();
        if inner.generation != generation || !inner.is_loading() {
            return false;
        }

        if inner.relogin_pending {
            info!("Replacing current session");
            inner.relogin_pending = false;
            inner.user = None;
            inner.token = None;
            self.credentials.clear_all();
            inner.transition(SessionPhase::Anonymous);
            inner.transition(SessionPhase::Authenticating);
        }

        persist(&self.credentials);
        inner.user = Some(user);
        inner.token = Some(token);
        inner.transition(SessionPhase::Authenticated);
        true
    }

    /// Store a refreshed access token (and rotated refresh token) unless a logout
    /// happened since `generation`.
    pub(crate) fn apply_refresh(
        &self,
        generation: u64,
        access_token: &str,
        refresh_token: Option<&str>,
    ) -> bool {
        let mut inner = self.write();
        if inner.generation != generation {
            return false;
        }

        self.credentials.replace_access_token(access_token);
        if let Some(refresh_token) = refresh_token {
            self.credentials.rotate_refresh_token(refresh_token);
        }
        if inner.token.is_some() {
            inner.token = Some(access_token.to_string());
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn state() -> SessionState {
        SessionState::new(Arc::new(CredentialStore::in_memory()))
    }

    fn student() -> SessionUser {
        serde_json::from_value(serde_json::json!({"id": 1, "role": "student"})).unwrap()
    }

    fn sign_in(state: &SessionState) {
        state.begin_initialization().unwrap();
        state.finish_initialization();
        let generation = state.begin_login().unwrap();
        assert!(state.authenticate(generation, student(), "T1".into(), |c| {
            c.write_access_token("T1", true);
            c.write_refresh_token("R1", Duration::days(7));
        }));
    }

    #[test]
    fn transition_graph_is_closed() {
        use SessionPhase::*;
        assert!(Uninitialized.can_transition_to(Initializing));
        assert!(Authenticated.can_transition_to(Anonymous));
        assert!(!Authenticated.can_transition_to(Authenticating));
        assert!(!Anonymous.can_transition_to(Authenticated));
        assert!(!Uninitialized.can_transition_to(Anonymous));
    }

    #[test]
    fn logout_is_idempotent_when_anonymous() {
        let state = state();
        state.begin_initialization().unwrap();
        state.finish_initialization();

        state.logout();
        state.logout();

        let snapshot = state.snapshot();
        assert_eq!(snapshot.phase, SessionPhase::Anonymous);
        assert!(snapshot.user.is_none() && snapshot.token.is_none());
        assert!(state.credentials().read_access_token().is_none());
    }

    #[test]
    fn logout_clears_memory_and_stores() {
        let state = state();
        sign_in(&state);
        assert!(state.is_authorized("student"));
        assert!(!state.is_authorized("Student"));

        state.logout();
        assert!(!state.is_authenticated());
        assert!(state.credentials().read_access_token().is_none());
        assert!(state.credentials().read_refresh_token().is_none());
    }

    #[test]
    fn login_before_boot_is_rejected() {
        let state = state();
        assert!(matches!(
            state.begin_login(),
            Err(SessionError::NotInitialized)
        ));
    }

    #[test]
    fn second_login_while_pending_is_busy() {
        let state = state();
        state.begin_initialization().unwrap();
        state.finish_initialization();

        state.begin_login().unwrap();
        assert!(state.is_loading());
        assert!(matches!(state.begin_login(), Err(SessionError::Busy)));
    }

    #[test]
    fn relogin_keeps_session_until_it_succeeds() {
        let state = state();
        sign_in(&state);

        let generation = state.begin_login().unwrap();
        assert_eq!(state.phase(), SessionPhase::Authenticated);
        assert!(state.is_loading());
        assert!(state.is_authenticated());
        assert_eq!(state.credentials().read_access_token().as_deref(), Some("T1"));
        assert!(matches!(state.begin_login(), Err(SessionError::Busy)));

        let teacher: SessionUser =
            serde_json::from_value(serde_json::json!({"id": 2, "role": "teacher"})).unwrap();
        assert!(state.authenticate(generation, teacher, "T2".into(), |c| {
            c.write_access_token("T2", false)
        }));
        assert!(state.is_authorized("teacher"));
        assert!(!state.is_loading());
        // The old refresh cookie went with the old session.
        assert!(state.credentials().read_refresh_token().is_none());
        assert_eq!(
            state.credentials().access_token_durability(),
            Some(crate::credentials::Durability::Session)
        );
    }

    #[test]
    fn failed_relogin_leaves_session_intact() {
        let state = state();
        sign_in(&state);

        let generation = state.begin_login().unwrap();
        state.finish_login(generation);

        assert_eq!(state.phase(), SessionPhase::Authenticated);
        assert!(!state.is_loading());
        assert!(state.is_authorized("student"));
        assert_eq!(state.token().as_deref(), Some("T1"));
        assert_eq!(state.credentials().read_refresh_token().as_deref(), Some("R1"));
    }

    #[test]
    fn logout_during_relogin_wins() {
        let state = state();
        sign_in(&state);

        let generation = state.begin_login().unwrap();
        state.logout();
        assert!(!state.is_loading());

        assert!(!state.authenticate(generation, student(), "T2".into(), |c| {
            c.write_access_token("T2", true)
        }));
        state.finish_login(generation);
        assert_eq!(state.phase(), SessionPhase::Anonymous);
        assert!(state.credentials().read_access_token().is_none());
    }

    #[test]
    fn logout_discards_a_pending_login() {
        let state = state();
        state.begin_initialization().unwrap();
        state.finish_initialization();

        let generation = state.begin_login().unwrap();
        state.logout();

        let accepted = state.authenticate(generation, student(), "T1".into(), |c| {
            c.write_access_token("T1", true)
        });
        assert!(!accepted);
        assert!(state.credentials().read_access_token().is_none());

        state.finish_login(generation);
        assert_eq!(state.phase(), SessionPhase::Anonymous);
    }

    #[test]
    fn refresh_after_logout_is_discarded() {
        let state = state();
        sign_in(&state);
        let generation = state.generation();
        state.logout();

        assert!(!state.apply_refresh(generation, "T2", Some("R2")));
        assert!(state.credentials().read_access_token().is_none());
        assert!(state.credentials().read_refresh_token().is_none());
    }

    #[test]
    fn refresh_updates_in_memory_token() {
        let state = state();
        sign_in(&state);

        assert!(state.apply_refresh(state.generation(), "T2", None));
        assert_eq!(state.token().as_deref(), Some("T2"));
        assert_eq!(state.credentials().read_refresh_token().as_deref(), Some("R1"));
    }

    #[test]
    fn snapshot_debug_redacts_token() {
        let state = state();
        sign_in(&state);
        let rendered = format!("{:?}", state.snapshot());
        assert!(!rendered.contains("T1"));
        assert!(rendered.contains("<redacted>"));
    }
}
