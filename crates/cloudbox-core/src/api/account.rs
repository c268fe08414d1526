//! Account information for the authenticated caller.

use serde::{Deserialize, Serialize};

use super::client::ApiClient;
use super::error::ApiResult;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserInfo {
    pub id: String,
    pub email: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub team: Option<String>,
}

impl ApiClient {
    /// `GET /auth/me`
    pub async fn whoami(&self) -> ApiResult<UserInfo> {
        self.get_json(self.url("auth/me")?).await
    }
}
