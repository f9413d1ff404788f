pub mod auth;
pub mod user;

pub use auth::{ChangePasswordRequest, ForgotPasswordRequest, LoginResponse, RefreshResponse};
pub use user::{Role, SessionUser, UserId};
