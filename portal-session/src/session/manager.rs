use super::error::SessionError;
use super::state::SessionState;
use crate::config::{RefreshTokenPolicy, SessionSettings};
use crate::models::{LoginResponse, SessionUser};
use crate::services::{ApiClient, AuthClient};
use secrecy::Secret;
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// Drives the session lifecycle: boot, login, logout.
pub(crate) struct SessionManager {
    state: Arc<SessionState>,
    client: Arc<ApiClient>,
    auth: AuthClient,
    settings: SessionSettings,
}

/// Leaves the loading phase on every exit path, including cancellation.
struct SettleOnDrop<'a> {
    state: &'a SessionState,
    pending: Pending,
}

enum Pending {
    Initialization,
    Login(u64),
}

impl Drop for SettleOnDrop<'_> {
    fn drop(&mut self) {
        match self.pending {
            Pending::Initialization => self.state.finish_initialization(),
            Pending::Login(generation) => self.state.finish_login(generation),
        }
    }
}

impl SessionManager {
    pub fn new(state: Arc<SessionState>, client: Arc<ApiClient>, settings: SessionSettings) -> Self {
        Self {
            auth: AuthClient::new(client.clone()),
            state,
            client,
            settings,
        }
    }

    pub fn state(&self) -> &Arc<SessionState> {
        &self.state
    }

    pub fn client(&self) -> &Arc<ApiClient> {
        &self.client
    }

    pub fn auth(&self) -> &AuthClient {
        &self.auth
    }

    /// Restore the session from stored credentials.
    ///
    /// A stored token is checked against `/auth/me`; any failure there is a silent
    /// logout. Only calling this twice is an error.
    #[instrument(skip(self))]
    pub async fn init_session(&self) -> Result<(), SessionError> {
        let generation = self.state.begin_initialization()?;
        let _settle = SettleOnDrop {
            state: &self.state,
            pending: Pending::Initialization,
        };

        if self.state.credentials().read_access_token().is_none() {
            info!("No stored credentials, starting anonymous");
            return Ok(());
        }

        match self.auth.current_user().await {
            Ok(user) => {
                // Re-read: the identity check may have refreshed the token.
                let Some(token) = self.state.credentials().read_access_token() else {
                    warn!("Stored credentials vanished during boot");
                    return Ok(());
                };
                let user_id = user.id.clone();
                if self.state.authenticate(generation, user, token, |_| {}) {
                    info!(user_id = %user_id, "Session restored");
                }
            }
            Err(e) => {
                warn!(error = %e, kind = ?e.kind, "Stored credentials rejected, clearing session");
                self.state.logout();
            }
        }

        Ok(())
    }

    #[instrument(skip(self, email, password))]
    pub async fn login(
        &self,
        email: &str,
        password: &str,
        remember_me: bool,
    ) -> Result<SessionUser, SessionError> {
        let password = Secret::new(password.to_string());
        let generation = self.state.begin_login()?;
        let _settle = SettleOnDrop {
            state: &self.state,
            pending: Pending::Login(generation),
        };

        let LoginResponse {
            access_token,
            refresh_token,
            user,
            ..
        } = self.auth.login(email, &password).await.map_err(|e| {
            warn!(error = %e, status = ?e.status, "Login rejected");
            e
        })?;

        let ttl = self.state.credentials().refresh_ttl();
        let persistent_refresh = match self.settings.refresh_token_policy {
            RefreshTokenPolicy::Independent => true,
            RefreshTokenPolicy::FollowRememberMe => remember_me,
        };

        let accepted =
            self.state
                .authenticate(generation, user.clone(), access_token.clone(), |credentials| {
                    credentials.write_access_token(&access_token, remember_me);
                    if persistent_refresh {
                        credentials.write_refresh_token(&refresh_token, ttl);
                    } else {
                        credentials.write_session_refresh_token(&refresh_token, ttl);
                    }
                });

        if !accepted {
            warn!("Login resolved after a logout, discarding credentials");
            return Err(SessionError::Superseded);
        }

        info!(user_id = %user.id, role = %user.role, "Login succeeded");
        Ok(user)
    }

    pub fn logout(&self) {
        self.state.logout();
    }
}
