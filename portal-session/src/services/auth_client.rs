use super::api_client::ApiClient;
use super::error::ApiError;
use super::request::ApiRequest;
use crate::models::{ChangePasswordRequest, ForgotPasswordRequest, LoginResponse, SessionUser};
use secrecy::{ExposeSecret, Secret};
use std::sync::Arc;

pub const LOGIN_PATH: &str = "/auth/login";
pub const ME_PATH: &str = "/auth/me";
pub const REFRESH_PATH: &str = "/auth/refresh";
pub const CHANGE_PASSWORD_PATH: &str = "/auth/change-password";
pub const FORGOT_PASSWORD_PATH: &str = "/auth/forgot-password";

/// Typed calls to the portal's `/auth` endpoints.
#[derive(Clone)]
pub struct AuthClient {
    api: Arc<ApiClient>,
}

impl AuthClient {
    pub fn new(api: Arc<ApiClient>) -> Self {
        Self { api }
    }

    /// Exchange credentials for a token pair.
    ///
    /// Sent unsigned and never refreshed: a 401 here means bad credentials, not an
    /// expired session.
    pub async fn login(
        &self,
        email: &str,
        password: &Secret<String>,
    ) -> Result<LoginResponse, ApiError> {
        let request = ApiRequest::post(LOGIN_PATH)
            .form([
                ("username", email),
                ("password", password.expose_secret().as_str()),
            ])
            .unsigned()
            .without_refresh();

        self.api.send_json(request).await
    }

    /// Resolve the user behind the current access token.
    pub async fn current_user(&self) -> Result<SessionUser, ApiError> {
        self.api.get_json(ME_PATH).await
    }

    pub async fn change_password(
        &self,
        old_password: &Secret<String>,
        new_password: &Secret<String>,
    ) -> Result<(), ApiError> {
        let body = ChangePasswordRequest {
            old_password: old_password.expose_secret().clone(),
            new_password: new_password.expose_secret().clone(),
        };
        let request = ApiRequest::post(CHANGE_PASSWORD_PATH).json(&body)?;

        self.api.send(request).await.map(|_| ())
    }

    pub async fn forgot_password(&self, email: &str) -> Result<(), ApiError> {
        let body = ForgotPasswordRequest {
            email: email.to_string(),
        };
        let request = ApiRequest::post(FORGOT_PASSWORD_PATH)
            .json(&body)?
            .unsigned()
            .without_refresh();

        self.api.send(request).await.map(|_| ())
    }
}
