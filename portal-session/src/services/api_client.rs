//! Signed HTTP client for the portal API with one-shot token refresh.
//!
//! Every request reads the access token at send time. A 401 on a signed request
//! triggers at most one refresh (`POST /auth/refresh` with the refresh token as
//! bearer) followed by a replay. When the refresh cannot happen the session is
//! cleared, the navigator is sent to the login page, and the caller gets the
//! original 401. However many requests fail together, the session is cleared and
//! redirected once; the others find it already ended and just surface their 401.

use super::auth_client::REFRESH_PATH;
use super::error::ApiError;
use super::request::{ApiRequest, ApiResponse, RequestBody};
use crate::config::Settings;
use crate::models::RefreshResponse;
use crate::navigation::Navigator;
use crate::session::SessionState;
use reqwest::header::HeaderMap;
use reqwest::Client;
use serde::de::DeserializeOwned;
use service_core::observability::inject_trace_headers;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

/// Refreshes a single request may trigger before its 401 is surfaced.
const MAX_REFRESH_ATTEMPTS: u32 = 1;

pub struct ApiClient {
    http: Client,
    base_url: String,
    state: Arc<SessionState>,
    navigator: Arc<dyn Navigator>,
    login_path: String,
    // Concurrent 401s queue here so only one of them talks to /auth/refresh.
    refresh_lock: Mutex<()>,
}

impl ApiClient {
    pub fn new(
        settings: &Settings,
        state: Arc<SessionState>,
        navigator: Arc<dyn Navigator>,
    ) -> Result<Self, ApiError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(settings.api.timeout_secs))
            .build()
            .map_err(ApiError::from_transport)?;

        Ok(Self {
            http,
            base_url: settings.api.base_url.trim_end_matches('/').to_string(),
            state,
            navigator,
            login_path: settings.session.login_path.clone(),
            refresh_lock: Mutex::new(()),
        })
    }

    /// Send a request, refreshing the access token once if it is rejected.
    #[instrument(skip(self, request), fields(method = %request.method, path = %request.path))]
    pub async fn send(&self, request: ApiRequest) -> Result<ApiResponse, ApiError> {
        let mut refresh_attempts = 0;

        loop {
            let generation = self.state.generation();
            let token = if request.signed {
                self.state.credentials().read_access_token()
            } else {
                None
            };

            match self.dispatch(&request, token.as_deref()).await {
                Err(rejected)
                    if rejected.is_unauthorized()
                        && request.signed
                        && request.refresh_on_unauthorized
                        && refresh_attempts < MAX_REFRESH_ATTEMPTS =>
                {
                    refresh_attempts += 1;

                    if let Err(e) = self.recover(token.as_deref(), generation).await {
                        debug!(error = %e, "Surfacing 401 without replay");
                        return Err(rejected);
                    }

                    debug!("Replaying request with refreshed token");
                }
                outcome => return outcome,
            }
        }
    }

    pub async fn send_json<T: DeserializeOwned>(&self, request: ApiRequest) -> Result<T, ApiError> {
        self.send(request).await?.json()
    }

    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        self.send_json(ApiRequest::get(path)).await
    }

    /// Obtain a fresh access token for a request rejected while carrying `rejected`
    /// in session `generation`.
    ///
    /// If another request already replaced that token while this one waited for the
    /// lock, no refresh is made and the caller simply replays. If the session ended
    /// meanwhile, nothing is refreshed and nothing is expired again. A failed refresh
    /// expires the session before the lock is released.
    #[instrument(skip_all)]
    async fn recover(&self, rejected: Option<&str>, generation: u64) -> Result<(), ApiError> {
        let _refreshing = self.refresh_lock.lock().await;
        let credentials = self.state.credentials();

        if self.state.generation() != generation {
            return Err(ApiError::session_expired("Session ended before token refresh"));
        }

        let current = credentials.read_access_token();
        if current.is_some() && current.as_deref() != rejected {
            debug!("Access token already refreshed by a concurrent request");
            return Ok(());
        }

        let refreshed = match credentials.read_refresh_token() {
            Some(refresh_token) => self.request_refresh(&refresh_token).await,
            None => Err(ApiError::session_expired("No refresh token available")),
        };
        let refreshed = match refreshed {
            Ok(refreshed) => refreshed,
            Err(e) => {
                warn!(error = %e, kind = ?e.kind, "Token refresh failed, ending session");
                self.expire_session();
                return Err(e);
            }
        };
        let rotated = refreshed.refresh_token.as_deref();

        if !self
            .state
            .apply_refresh(generation, &refreshed.access_token, rotated)
        {
            return Err(ApiError::session_expired("Session ended during token refresh"));
        }

        info!(rotated = rotated.is_some(), "Access token refreshed");
        Ok(())
    }

    async fn request_refresh(&self, refresh_token: &str) -> Result<RefreshResponse, ApiError> {
        let request = ApiRequest::post(REFRESH_PATH)
            .json_value(serde_json::json!({}))
            .unsigned()
            .without_refresh();

        self.dispatch(&request, Some(refresh_token))
            .await?
            .json::<RefreshResponse>()
    }

    fn expire_session(&self) {
        self.state.logout();
        self.navigator.redirect(&self.login_path);
    }

    /// One raw round trip: no token lookup, no refresh.
    async fn dispatch(
        &self,
        request: &ApiRequest,
        bearer: Option<&str>,
    ) -> Result<ApiResponse, ApiError> {
        let url = format!("{}{}", self.base_url, request.path);

        let mut headers = HeaderMap::new();
        let request_id = Uuid::new_v4().to_string();
        inject_trace_headers(&mut headers, &request_id);

        let mut builder = self
            .http
            .request(request.method.clone(), &url)
            .headers(headers);

        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }

        builder = match &request.body {
            RequestBody::Empty => builder,
            RequestBody::Json(body) => builder.json(body),
            RequestBody::Form(fields) => builder.form(fields),
        };

        if let Some(token) = bearer {
            builder = builder.bearer_auth(token);
        }

        let response = builder.send().await.map_err(|e| {
            error!(url = %url, request_id = %request_id, error = %e, "Portal API request failed");
            ApiError::from_transport(e)
        })?;

        let status = response.status();
        let body = response.bytes().await.map_err(ApiError::from_transport)?;

        if status.is_success() {
            Ok(ApiResponse::new(status, body.to_vec()))
        } else {
            debug!(status = status.as_u16(), request_id = %request_id, "Portal API returned an error");
            Err(ApiError::from_status(status, &body))
        }
    }
}
