use super::error::SessionError;
use super::manager::SessionManager;
use super::state::SessionSnapshot;
use crate::models::{Role, SessionUser};
use std::sync::{Arc, Weak};

/// Outcome of a role-gated check, for routing decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    /// Session still loading; render nothing role-specific yet.
    Pending,
    /// Nobody is signed in.
    Anonymous,
    Granted,
    /// Signed in with another role; `landing` is that role's dashboard if known.
    Denied { landing: Option<&'static str> },
}

/// Cloneable handle UI code uses to talk to the session.
///
/// Holds only a weak reference: once the owning [`SessionProvider`] is dropped,
/// every call fails with [`SessionError::ProviderUnavailable`].
///
/// [`SessionProvider`]: super::SessionProvider
#[derive(Clone)]
pub struct SessionFacade {
    manager: Weak<SessionManager>,
}

impl SessionFacade {
    pub(crate) fn new(manager: Weak<SessionManager>) -> Self {
        Self { manager }
    }

    fn manager(&self) -> Result<Arc<SessionManager>, SessionError> {
        self.manager
            .upgrade()
            .ok_or(SessionError::ProviderUnavailable)
    }

    pub async fn login(
        &self,
        email: &str,
        password: &str,
        remember_me: bool,
    ) -> Result<SessionUser, SessionError> {
        self.manager()?.login(email, password, remember_me).await
    }

    pub fn logout(&self) -> Result<(), SessionError> {
        self.manager()?.logout();
        Ok(())
    }

    pub fn is_authenticated(&self) -> Result<bool, SessionError> {
        Ok(self.manager()?.state().is_authenticated())
    }

    pub fn is_authorized(&self, role: &str) -> Result<bool, SessionError> {
        Ok(self.manager()?.state().is_authorized(role))
    }

    pub fn is_loading(&self) -> Result<bool, SessionError> {
        Ok(self.manager()?.state().is_loading())
    }

    pub fn user(&self) -> Result<Option<SessionUser>, SessionError> {
        Ok(self.manager()?.state().user())
    }

    pub fn token(&self) -> Result<Option<String>, SessionError> {
        Ok(self.manager()?.state().token())
    }

    pub fn snapshot(&self) -> Result<SessionSnapshot, SessionError> {
        Ok(self.manager()?.state().snapshot())
    }

    /// Route guard: may the current user see a page restricted to `allowed`?
    ///
    /// Roles are compared case-insensitively here, unlike [`is_authorized`].
    ///
    /// [`is_authorized`]: SessionFacade::is_authorized
    pub fn check_access(&self, allowed: &[Role]) -> Result<Access, SessionError> {
        let snapshot = self.snapshot()?;
        if snapshot.loading {
            return Ok(Access::Pending);
        }

        let Some(user) = snapshot.user else {
            return Ok(Access::Anonymous);
        };

        let role = user.normalized_role();
        Ok(match role {
            Some(role) if allowed.contains(&role) => Access::Granted,
            _ => Access::Denied {
                landing: role.map(|r| r.landing_path()),
            },
        })
    }
}
