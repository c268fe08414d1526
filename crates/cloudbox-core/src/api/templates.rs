//! Template listing and builds.
//!
//! A build is started with [`Templates::start_build`], the packed context is
//! uploaded with [`Templates::upload_context`], and progress is polled with
//! [`Templates::wait_for_build`].

use chrono::{DateTime, Utc};
use flate2::Compression;
use flate2::write::GzEncoder;
use reqwest::Method;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

use super::client::{ApiClient, RequestBody};
use super::error::{ApiError, ApiResult};

/// Directories left out of a packed build context.
const IGNORED_DIRS: [&str; 3] = [".git", "node_modules", "target"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Template {
    #[serde(alias = "template_id")]
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub public: bool,
    #[serde(default)]
    pub build_status: Option<String>,
    #[serde(default)]
    pub cpu_count: Option<u32>,
    #[serde(default)]
    pub memory_mb: Option<u64>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StartBuild {
    /// Existing template to rebuild; a new one is created when absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub template_id: Option<String>,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dockerfile: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_cmd: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cpu_count: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memory_mb: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildInfo {
    pub template_id: String,
    pub build_id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildState {
    Waiting,
    Building,
    Ready,
    Error,
}

impl BuildState {
    pub fn is_terminal(self) -> bool {
        matches!(self, BuildState::Ready | BuildState::Error)
    }
}

impl fmt::Display for BuildState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BuildState::Waiting => "waiting",
            BuildState::Building => "building",
            BuildState::Ready => "ready",
            BuildState::Error => "error",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildStatus {
    pub template_id: String,
    pub build_id: String,
    pub status: BuildState,
    /// Log lines starting at the requested offset
    #[serde(default)]
    pub logs: Vec<String>,
    #[serde(default)]
    pub reason: Option<String>,
}

/// Pack a directory into a gzipped tarball for upload.
pub fn pack_context(dir: &Path) -> ApiResult<Vec<u8>> {
    if !dir.is_dir() {
        return Err(ApiError::InvalidRequest(format!(
            "build context {} is not a directory",
            dir.display()
        )));
    }

    let io_err = |e: std::io::Error| {
        ApiError::InvalidRequest(format!("failed to pack {}: {e}", dir.display()))
    };

    let encoder = GzEncoder::new(Vec::new(), Compression::default());
    let mut archive = tar::Builder::new(encoder);
    append_dir(&mut archive, dir, Path::new("")).map_err(io_err)?;
    let encoder = archive.into_inner().map_err(io_err)?;
    let bytes = encoder.finish().map_err(io_err)?;
    debug!(path = %dir.display(), bytes = bytes.len(), "Packed build context");
    Ok(bytes)
}

fn append_dir<W: std::io::Write>(
    archive: &mut tar::Builder<W>,
    dir: &Path,
    prefix: &Path,
) -> std::io::Result<()> {
    let mut entries = std::fs::read_dir(dir)?.collect::<Result<Vec<_>, _>>()?;
    entries.sort_by_key(|entry| entry.file_name());

    for entry in entries {
        let name = entry.file_name();
        let path = entry.path();
        let archive_path = prefix.join(&name);
        let file_type = entry.file_type()?;

        if file_type.is_dir() {
            if IGNORED_DIRS.iter().any(|ignored| name == *ignored) {
                continue;
            }
            archive.append_dir(&archive_path, &path)?;
            append_dir(archive, &path, &archive_path)?;
        } else if file_type.is_file() {
            archive.append_path_with_name(&path, &archive_path)?;
        }
    }
    Ok(())
}

pub struct Templates<'a> {
    client: &'a ApiClient,
}

impl ApiClient {
    pub fn templates(&self) -> Templates<'_> {
        Templates { client: self }
    }
}

impl Templates<'_> {
    pub async fn list(&self) -> ApiResult<Vec<Template>> {
        self.client.get_json(self.client.url("templates")?).await
    }

    pub async fn delete(&self, template_id: &str) -> ApiResult<()> {
        let url = self.client.url(&format!("templates/{template_id}"))?;
        self.client
            .execute(Method::DELETE, url, RequestBody::Empty)
            .await
    }

    pub async fn start_build(&self, params: &StartBuild) -> ApiResult<BuildInfo> {
        if params.name.trim().is_empty() {
            return Err(ApiError::InvalidRequest(
                "template name cannot be empty".into(),
            ));
        }
        self.client
            .post_json(self.client.url("templates")?, params)
            .await
    }

    pub async fn upload_context(&self, build: &BuildInfo, context: Vec<u8>) -> ApiResult<()> {
        let url = self.client.url(&format!(
            "templates/{}/builds/{}/context",
            build.template_id, build.build_id
        ))?;
        let body = RequestBody::Bytes {
            data: context,
            content_type: "application/gzip",
        };
        self.client.execute(Method::POST, url, body).await
    }

    pub async fn build_status(
        &self,
        build: &BuildInfo,
        log_offset: usize,
    ) -> ApiResult<BuildStatus> {
        let offset = log_offset.to_string();
        let url = self.client.url_with_query(
            &format!(
                "templates/{}/builds/{}/status",
                build.template_id, build.build_id
            ),
            &[("log_offset", offset.as_str())],
        )?;
        self.client.get_json(url).await
    }

    /// Poll until the build is `ready` or `error`, passing new log lines on.
    pub async fn wait_for_build<F>(
        &self,
        build: &BuildInfo,
        poll_interval: Duration,
        mut on_log: F,
    ) -> ApiResult<BuildStatus>
    where
        F: FnMut(&str),
    {
        let mut offset = 0;
        loop {
            let status = self.build_status(build, offset).await?;
            for line in &status.logs {
                on_log(line);
            }
            offset += status.logs.len();

            if status.status.is_terminal() {
                info!(
                    build_id = %build.build_id,
                    status = %status.status,
                    "Template build finished"
                );
                return Ok(status);
            }
            debug!(build_id = %build.build_id, status = %status.status, "Build in progress");
            tokio::time::sleep(poll_interval).await;
        }
    }
}
