use super::api_client::ApiClient;
use super::error::ApiError;
use super::request::ApiRequest;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt::Display;
use std::sync::Arc;

/// Generic CRUD access to one REST collection, e.g. `subjects` or
/// `admin/teacher-assignments`. Every call is signed and refresh-protected.
#[derive(Clone)]
pub struct Resource {
    api: Arc<ApiClient>,
    name: String,
}

impl Resource {
    pub fn new(api: Arc<ApiClient>, name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            api,
            name: name.trim_matches('/').to_string(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn collection_path(&self) -> String {
        format!("/{}", self.name)
    }

    fn item_path(&self, id: impl Display) -> String {
        format!("/{}/{}", self.name, id)
    }

    pub async fn list<T: DeserializeOwned>(&self, params: &[(&str, &str)]) -> Result<T, ApiError> {
        let request = ApiRequest::get(self.collection_path()).query(params.iter().copied());
        self.api.send_json(request).await
    }

    pub async fn get<T: DeserializeOwned>(&self, id: impl Display) -> Result<T, ApiError> {
        self.api.get_json(&self.item_path(id)).await
    }

    pub async fn create<B, T>(&self, body: &B) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let request = ApiRequest::post(self.collection_path()).json(body)?;
        self.api.send_json(request).await
    }

    pub async fn update<B, T>(&self, id: impl Display, body: &B) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let request = ApiRequest::put(self.item_path(id)).json(body)?;
        self.api.send_json(request).await
    }

    pub async fn delete(&self, id: impl Display) -> Result<(), ApiError> {
        self.api
            .send(ApiRequest::delete(self.item_path(id)))
            .await
            .map(|_| ())
    }
}
