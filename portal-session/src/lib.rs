//! Session and token lifecycle for the campus portal.
//!
//! A [`SessionProvider`] owns one session: the stored credentials, the in-memory
//! user, and an [`ApiClient`] that signs every request and recovers from an expired
//! access token with a single refresh-and-retry. UI code talks to the session through
//! the cloneable [`SessionFacade`].
pub mod config;
pub mod credentials;
pub mod models;
pub mod navigation;
pub mod services;
pub mod session;

pub use self::config::{get_configuration, RefreshTokenPolicy, Settings};
pub use credentials::{CredentialStore, Durability};
pub use models::{Role, SessionUser, UserId};
pub use navigation::{LogNavigator, Navigator};
pub use services::{
    ApiClient, ApiError, ApiErrorKind, ApiRequest, ApiResponse, AuthClient, Resource,
};
pub use session::{
    Access, SessionError, SessionFacade, SessionPhase, SessionProvider, SessionSnapshot,
    SessionState,
};
