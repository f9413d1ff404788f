use crate::services::ApiError;

/// Fallback shown when a failed login carries no backend detail.
pub const LOGIN_FAILED_MESSAGE: &str = "Login failed";

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error(transparent)]
    Api(#[from] ApiError),

    #[error("Session provider is no longer available")]
    ProviderUnavailable,

    #[error("Session has not been initialized")]
    NotInitialized,

    #[error("Session is already initialized")]
    AlreadyInitialized,

    #[error("Another session operation is in progress")]
    Busy,

    #[error("Login was superseded by a logout")]
    Superseded,

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),
}

impl SessionError {
    /// Text suitable for showing next to a login form.
    pub fn user_message(&self) -> String {
        match self {
            SessionError::Api(error) => error.user_message(LOGIN_FAILED_MESSAGE),
            _ => LOGIN_FAILED_MESSAGE.to_string(),
        }
    }
}
