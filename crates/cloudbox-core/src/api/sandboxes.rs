//! Sandbox lifecycle endpoints.

use chrono::{DateTime, Utc};
use reqwest::Method;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use super::client::{ApiClient, RequestBody};
use super::error::ApiResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SandboxState {
    Running,
    Paused,
    Stopped,
    #[serde(other)]
    Unknown,
}

impl SandboxState {
    pub fn as_str(self) -> &'static str {
        match self {
            SandboxState::Running => "running",
            SandboxState::Paused => "paused",
            SandboxState::Stopped => "stopped",
            SandboxState::Unknown => "unknown",
        }
    }
}

impl fmt::Display for SandboxState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parameters for `POST /sandboxes`.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CreateSandbox {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub template: Option<String>,
    /// Lifetime in seconds before the service stops the sandbox
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub env_vars: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sandbox {
    #[serde(alias = "sandbox_id")]
    pub id: String,
    #[serde(default, alias = "template_id")]
    pub template: Option<String>,
    pub state: SandboxState,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub end_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub cpu_count: Option<u32>,
    #[serde(default)]
    pub memory_mb: Option<u64>,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SandboxHealth {
    pub status: String,
    #[serde(default)]
    pub checks: BTreeMap<String, String>,
}

impl SandboxHealth {
    pub fn is_healthy(&self) -> bool {
        matches!(self.status.as_str(), "ok" | "healthy")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSample {
    pub timestamp: DateTime<Utc>,
    pub cpu_pct: f64,
    pub memory_used_bytes: u64,
    pub memory_total_bytes: u64,
    #[serde(default)]
    pub disk_used_bytes: Option<u64>,
}

pub struct Sandboxes<'a> {
    client: &'a ApiClient,
}

impl ApiClient {
    pub fn sandboxes(&self) -> Sandboxes<'_> {
        Sandboxes { client: self }
    }
}

fn sandbox_path(id: &str) -> String {
    format!("sandboxes/{id}")
}

impl Sandboxes<'_> {
    pub async fn create(&self, params: &CreateSandbox) -> ApiResult<Sandbox> {
        self.client
            .post_json(self.client.url("sandboxes")?, params)
            .await
    }

    pub async fn list(&self, state: Option<SandboxState>) -> ApiResult<Vec<Sandbox>> {
        let url = match state {
            Some(state) => self
                .client
                .url_with_query("sandboxes", &[("state", state.as_str())])?,
            None => self.client.url("sandboxes")?,
        };
        self.client.get_json(url).await
    }

    pub async fn get(&self, id: &str) -> ApiResult<Sandbox> {
        self.client.get_json(self.client.url(&sandbox_path(id))?).await
    }

    pub async fn pause(&self, id: &str) -> ApiResult<()> {
        let url = self.client.url(&format!("{}/pause", sandbox_path(id)))?;
        self.client
            .execute(Method::POST, url, RequestBody::Empty)
            .await
    }

    pub async fn resume(&self, id: &str) -> ApiResult<Sandbox> {
        let url = self.client.url(&format!("{}/resume", sandbox_path(id)))?;
        self.client.post_json(url, &serde_json::json!({})).await
    }

    pub async fn kill(&self, id: &str) -> ApiResult<()> {
        let url = self.client.url(&sandbox_path(id))?;
        self.client
            .execute(Method::DELETE, url, RequestBody::Empty)
            .await
    }

    pub async fn health(&self, id: &str) -> ApiResult<SandboxHealth> {
        let url = self.client.url(&format!("{}/health", sandbox_path(id)))?;
        self.client.get_json(url).await
    }

    pub async fn metrics(&self, id: &str) -> ApiResult<Vec<MetricSample>> {
        let url = self.client.url(&format!("{}/metrics", sandbox_path(id)))?;
        self.client.get_json(url).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_state_does_not_fail_decoding() {
        let sandbox: Sandbox =
            serde_json::from_str(r#"{"sandbox_id":"sbx_1","state":"hibernating"}"#).unwrap();
        assert_eq!(sandbox.id, "sbx_1");
        assert_eq!(sandbox.state, SandboxState::Unknown);
    }

    #[test]
    fn create_omits_empty_fields() {
        let body = serde_json::to_value(CreateSandbox {
            template: Some("base".into()),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(body, serde_json::json!({"template": "base"}));
    }
}
