use super::error::SessionError;
use super::facade::SessionFacade;
use super::manager::SessionManager;
use super::state::SessionState;
use crate::config::{get_configuration, Settings};
use crate::credentials::CredentialStore;
use crate::models::SessionUser;
use crate::navigation::{LogNavigator, Navigator};
use crate::services::{ApiClient, AuthClient, Resource};
use std::sync::Arc;

/// Owner of one session.
///
/// Each provider has its own credential store, state and API client, so any
/// number of independent sessions can coexist. Dropping the provider ends the
/// session scope: facades handed out earlier then fail with
/// [`SessionError::ProviderUnavailable`].
pub struct SessionProvider {
    manager: Arc<SessionManager>,
}

impl SessionProvider {
    pub fn new(
        settings: &Settings,
        credentials: CredentialStore,
        navigator: Arc<dyn Navigator>,
    ) -> Result<Self, SessionError> {
        let state = Arc::new(SessionState::new(Arc::new(credentials)));
        let client = Arc::new(ApiClient::new(settings, state.clone(), navigator)?);
        let manager = SessionManager::new(state, client, settings.session.clone());

        Ok(Self {
            manager: Arc::new(manager),
        })
    }

    /// Stores under `storage.directory` when configured, in memory otherwise.
    pub fn from_settings(settings: &Settings) -> Result<Self, SessionError> {
        let credentials = CredentialStore::from_settings(&settings.storage, &settings.session);
        Self::new(settings, credentials, Arc::new(LogNavigator))
    }

    /// Build from `config/base.yaml` and `APP_*` environment variables.
    pub fn from_environment() -> Result<Self, SessionError> {
        let settings = get_configuration()?;
        Self::from_settings(&settings)
    }

    /// Construct and immediately restore any stored session.
    pub async fn start(
        settings: &Settings,
        credentials: CredentialStore,
        navigator: Arc<dyn Navigator>,
    ) -> Result<Self, SessionError> {
        let provider = Self::new(settings, credentials, navigator)?;
        provider.init_session().await?;
        Ok(provider)
    }

    pub fn facade(&self) -> SessionFacade {
        SessionFacade::new(Arc::downgrade(&self.manager))
    }

    pub fn state(&self) -> &Arc<SessionState> {
        self.manager.state()
    }

    pub fn client(&self) -> &Arc<ApiClient> {
        self.manager.client()
    }

    pub fn auth(&self) -> &AuthClient {
        self.manager.auth()
    }

    pub fn resource(&self, name: impl Into<String>) -> Resource {
        Resource::new(self.manager.client().clone(), name)
    }

    pub async fn init_session(&self) -> Result<(), SessionError> {
        self.manager.init_session().await
    }

    pub async fn login(
        &self,
        email: &str,
        password: &str,
        remember_me: bool,
    ) -> Result<SessionUser, SessionError> {
        self.manager.login(email, password, remember_me).await
    }

    pub fn logout(&self) {
        self.manager.logout()
    }
}
