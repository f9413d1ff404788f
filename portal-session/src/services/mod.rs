pub mod api_client;
pub mod auth_client;
pub mod error;
pub mod request;
pub mod resource_client;

pub use api_client::ApiClient;
pub use auth_client::AuthClient;
pub use error::{ApiError, ApiErrorKind};
pub use request::{ApiRequest, ApiResponse, RequestBody};
pub use resource_client::Resource;
