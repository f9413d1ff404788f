//! Shared harness for portal-session integration tests.
//!
//! Every test gets its own wiremock server and its own in-memory stores, so the
//! tests run in parallel without sharing a session.

#![allow(dead_code)]

use chrono::Duration;
use portal_session::config::{ApiSettings, SessionSettings, Settings, StorageSettings};
use portal_session::credentials::{
    CookieJar, KeyValueStore, MemoryStore, ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY,
};
use portal_session::{CredentialStore, Navigator, RefreshTokenPolicy, SessionProvider};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Navigator that remembers every redirect.
#[derive(Clone, Default)]
pub struct RecordingNavigator {
    redirects: Arc<Mutex<Vec<String>>>,
}

impl RecordingNavigator {
    pub fn redirects(&self) -> Vec<String> {
        self.redirects.lock().unwrap().clone()
    }
}

impl Navigator for RecordingNavigator {
    fn redirect(&self, path: &str) {
        self.redirects.lock().unwrap().push(path.to_string());
    }
}

pub struct TestSession {
    pub server: MockServer,
    pub durable: Arc<MemoryStore>,
    pub session: Arc<MemoryStore>,
    pub cookie_backing: Arc<MemoryStore>,
    pub navigator: RecordingNavigator,
    pub provider: SessionProvider,
}

pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("portal_session=debug")
        .with_test_writer()
        .try_init();
}

pub fn settings_for(server: &MockServer) -> Settings {
    Settings {
        api: ApiSettings {
            base_url: server.uri(),
            timeout_secs: 5,
        },
        session: SessionSettings::default(),
        storage: StorageSettings::default(),
    }
}

impl TestSession {
    pub async fn new() -> Self {
        let server = MockServer::start().await;
        let settings = settings_for(&server);
        Self::with_settings(server, settings)
    }

    pub async fn with_policy(policy: RefreshTokenPolicy) -> Self {
        let server = MockServer::start().await;
        let mut settings = settings_for(&server);
        settings.session.refresh_token_policy = policy;
        Self::with_settings(server, settings)
    }

    pub async fn with_timeout(timeout_secs: u64) -> Self {
        let server = MockServer::start().await;
        let mut settings = settings_for(&server);
        settings.api.timeout_secs = timeout_secs;
        Self::with_settings(server, settings)
    }

    pub fn with_settings(server: MockServer, settings: Settings) -> Self {
        init_test_tracing();

        let durable = Arc::new(MemoryStore::new());
        let session = Arc::new(MemoryStore::new());
        let cookie_backing = Arc::new(MemoryStore::new());
        let credentials = CredentialStore::new(
            durable.clone(),
            session.clone(),
            CookieJar::new(cookie_backing.clone()),
            Duration::days(settings.session.refresh_token_ttl_days),
        );
        let navigator = RecordingNavigator::default();
        let provider = SessionProvider::new(&settings, credentials, Arc::new(navigator.clone()))
            .expect("Failed to build session provider");

        Self {
            server,
            durable,
            session,
            cookie_backing,
            navigator,
            provider,
        }
    }

    pub fn credentials(&self) -> &CredentialStore {
        self.provider.state().credentials()
    }

    pub fn durable_token(&self) -> Option<String> {
        self.durable.get(ACCESS_TOKEN_KEY)
    }

    pub fn session_token(&self) -> Option<String> {
        self.session.get(ACCESS_TOKEN_KEY)
    }

    pub fn refresh_token(&self) -> Option<String> {
        self.credentials().read_refresh_token()
    }

    pub fn refresh_cookie_is_persistent(&self) -> bool {
        self.cookie_backing.contains(REFRESH_TOKEN_KEY)
    }

    /// Seed stores as a previous run would have left them.
    pub fn seed(&self, access_token: &str, durable: bool, refresh_token: Option<&str>) {
        self.credentials().write_access_token(access_token, durable);
        if let Some(refresh_token) = refresh_token {
            self.credentials()
                .write_refresh_token(refresh_token, Duration::days(7));
        }
    }

    /// Boot with empty stores and log in through a mocked `/auth/login`.
    pub async fn sign_in(&self, access_token: &str, refresh_token: &str, remember_me: bool) {
        Mock::given(method("POST"))
            .and(path("/auth/login"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(login_body(
                    access_token,
                    refresh_token,
                    student(),
                )),
            )
            .up_to_n_times(1)
            .mount(&self.server)
            .await;

        self.provider
            .init_session()
            .await
            .expect("Failed to initialize session");
        self.provider
            .login("a@x.edu", "secret", remember_me)
            .await
            .expect("Failed to log in");
    }

    /// Number of requests the mock server saw for `path`.
    pub async fn hits(&self, path: &str) -> usize {
        self.server
            .received_requests()
            .await
            .unwrap_or_default()
            .iter()
            .filter(|request| request.url.path() == path)
            .count()
    }
}

pub fn student() -> Value {
    json!({
        "id": 1,
        "role": "student",
        "first_name": "Asha",
        "last_name": "Rao",
        "email": "a@x.edu"
    })
}

pub fn login_body(access_token: &str, refresh_token: &str, user: Value) -> Value {
    json!({
        "access_token": access_token,
        "refresh_token": refresh_token,
        "token_type": "bearer",
        "user": user
    })
}
