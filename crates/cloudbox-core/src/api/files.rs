//! Sandbox filesystem endpoints.

use chrono::{DateTime, Utc};
use reqwest::Method;
use serde::{Deserialize, Serialize};

use super::client::{ApiClient, RequestBody};
use super::error::{ApiError, ApiResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    File,
    Dir,
    Symlink,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryInfo {
    pub name: String,
    pub path: String,
    #[serde(rename = "type")]
    pub kind: EntryKind,
    #[serde(default)]
    pub size: Option<u64>,
    #[serde(default)]
    pub modified_at: Option<DateTime<Utc>>,
}

pub struct Files<'a> {
    client: &'a ApiClient,
}

impl ApiClient {
    pub fn files(&self) -> Files<'_> {
        Files { client: self }
    }
}

impl Files<'_> {
    fn url(&self, id: &str, suffix: &str, path: &str) -> ApiResult<url::Url> {
        if path.is_empty() {
            return Err(ApiError::InvalidRequest("path cannot be empty".into()));
        }
        self.client
            .url_with_query(&format!("sandboxes/{id}/{suffix}"), &[("path", path)])
    }

    pub async fn list(&self, id: &str, path: &str) -> ApiResult<Vec<EntryInfo>> {
        self.client.get_json(self.url(id, "files", path)?).await
    }

    pub async fn read(&self, id: &str, path: &str) -> ApiResult<Vec<u8>> {
        let url = self.url(id, "files/content", path)?;
        let response = self
            .client
            .send(Method::GET, url, RequestBody::Empty)
            .await?;
        response
            .bytes()
            .await
            .map(|bytes| bytes.to_vec())
            .map_err(|e| ApiError::from_transport(e).0)
    }

    pub async fn write(&self, id: &str, path: &str, data: Vec<u8>) -> ApiResult<()> {
        let url = self.url(id, "files/content", path)?;
        let body = RequestBody::Bytes {
            data,
            content_type: "application/octet-stream",
        };
        self.client.execute(Method::PUT, url, body).await
    }

    pub async fn remove(&self, id: &str, path: &str) -> ApiResult<()> {
        let url = self.url(id, "files", path)?;
        self.client
            .execute(Method::DELETE, url, RequestBody::Empty)
            .await
    }

    pub async fn make_dir(&self, id: &str, path: &str) -> ApiResult<()> {
        let url = self.url(id, "files/dir", path)?;
        self.client
            .execute(Method::POST, url, RequestBody::Empty)
            .await
    }
}
