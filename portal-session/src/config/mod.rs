use serde::Deserialize;
use service_core::config::load_settings;
use std::path::PathBuf;

#[derive(Deserialize, Clone, Debug, Default)]
pub struct Settings {
    #[serde(default)]
    pub api: ApiSettings,
    #[serde(default)]
    pub session: SessionSettings,
    #[serde(default)]
    pub storage: StorageSettings,
}

#[derive(Deserialize, Clone, Debug)]
pub struct ApiSettings {
    /// Root of the portal REST API, without a trailing slash.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Budget for every outbound request; elapsed requests fail as timeouts.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_base_url() -> String {
    "http://localhost:8000/api".to_string()
}

fn default_timeout_secs() -> u64 {
    15
}

#[derive(Deserialize, Clone, Debug)]
pub struct SessionSettings {
    /// Where the navigator is sent when the session can no longer be recovered.
    #[serde(default = "default_login_path")]
    pub login_path: String,
    #[serde(default = "default_refresh_token_ttl_days")]
    pub refresh_token_ttl_days: i64,
    #[serde(default)]
    pub refresh_token_policy: RefreshTokenPolicy,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            login_path: default_login_path(),
            refresh_token_ttl_days: default_refresh_token_ttl_days(),
            refresh_token_policy: RefreshTokenPolicy::default(),
        }
    }
}

fn default_login_path() -> String {
    "/login".to_string()
}

fn default_refresh_token_ttl_days() -> i64 {
    7
}

/// How the refresh token is persisted relative to the "remember me" choice.
#[derive(Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RefreshTokenPolicy {
    /// Always a persistent cookie, even when the access token is session-scoped.
    #[default]
    Independent,
    /// Session-only cookie unless the user asked to be remembered.
    FollowRememberMe,
}

#[derive(Deserialize, Clone, Debug, Default)]
pub struct StorageSettings {
    /// Directory for the durable token file and the cookie file.
    /// When unset every store lives in memory.
    #[serde(default)]
    pub directory: Option<PathBuf>,
}

pub fn get_configuration() -> Result<Settings, config::ConfigError> {
    let base_path =
        std::env::current_dir().map_err(|e| config::ConfigError::Foreign(Box::new(e)))?;

    // Check if we're already in portal-session directory or need to navigate to it
    let configuration_directory = if base_path.ends_with("portal-session") {
        base_path.join("config")
    } else {
        base_path.join("portal-session").join("config")
    };

    load_settings(&configuration_directory)
}
