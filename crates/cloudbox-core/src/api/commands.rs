//! Command execution inside a sandbox, buffered or streamed over WebSocket.

use chrono::{DateTime, Utc};
use futures::{SinkExt, StreamExt};
use reqwest::Method;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tracing::{debug, warn};

use super::client::{ApiClient, RequestBody};
use super::error::{ApiError, ApiResult};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunCommand {
    pub cmd: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cwd: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub env: BTreeMap<String, String>,
    /// Seconds before the service kills the command
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,
}

impl RunCommand {
    pub fn new(cmd: impl Into<String>) -> Self {
        Self {
            cmd: cmd.into(),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandResult {
    pub exit_code: i32,
    #[serde(default)]
    pub stdout: String,
    #[serde(default)]
    pub stderr: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessInfo {
    pub pid: u32,
    pub cmd: String,
    #[serde(default)]
    pub cwd: Option<String>,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
}

/// Frames sent by the server on the command stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StreamEvent {
    Stdout { data: String },
    Stderr { data: String },
    Exit { exit_code: i32 },
    Error { message: String },
}

pub struct Commands<'a> {
    client: &'a ApiClient,
}

impl ApiClient {
    pub fn commands(&self) -> Commands<'_> {
        Commands { client: self }
    }
}

impl Commands<'_> {
    pub async fn run(&self, id: &str, command: &RunCommand) -> ApiResult<CommandResult> {
        validate(command)?;
        let url = self.client.url(&format!("sandboxes/{id}/commands"))?;
        self.client.post_json(url, command).await
    }

    pub async fn list_processes(&self, id: &str) -> ApiResult<Vec<ProcessInfo>> {
        let url = self.client.url(&format!("sandboxes/{id}/processes"))?;
        self.client.get_json(url).await
    }

    pub async fn kill_process(&self, id: &str, pid: u32) -> ApiResult<()> {
        let url = self.client.url(&format!("sandboxes/{id}/processes/{pid}"))?;
        self.client
            .execute(Method::DELETE, url, RequestBody::Empty)
            .await
    }

    /// Run a command and deliver output frames as they arrive.
    ///
    /// Returns the exit code from the final `exit` frame. An `error` frame or a
    /// connection that closes before `exit` is a [`ApiError::Stream`].
    pub async fn stream<F>(
        &self,
        id: &str,
        command: &RunCommand,
        mut on_event: F,
    ) -> ApiResult<i32>
    where
        F: FnMut(&StreamEvent),
    {
        validate(command)?;
        let url = self
            .client
            .ws_url(&format!("sandboxes/{id}/commands/stream"))?;

        let mut request = url
            .as_str()
            .into_client_request()
            .map_err(|e| ApiError::InvalidRequest(e.to_string()))?;
        if let Some((name, value)) = self.client.auth().header() {
            let value = HeaderValue::from_str(&value)
                .map_err(|e| ApiError::InvalidRequest(format!("auth header: {e}")))?;
            request.headers_mut().insert(name, value);
        }

        debug!(sandbox = id, "Opening command stream");
        let (ws_stream, _) = tokio_tungstenite::connect_async(request)
            .await
            .map_err(|e| ApiError::Stream(format!("failed to connect: {e}")))?;
        let (mut ws_write, mut ws_read) = ws_stream.split();

        let first_frame =
            serde_json::to_string(command).map_err(|e| ApiError::InvalidRequest(e.to_string()))?;
        ws_write
            .send(Message::Text(first_frame.into()))
            .await
            .map_err(|e| ApiError::Stream(format!("failed to send command: {e}")))?;

        while let Some(msg_result) = ws_read.next().await {
            let msg = msg_result.map_err(|e| ApiError::Stream(e.to_string()))?;
            let text = match msg {
                Message::Text(text) => text,
                Message::Close(_) => break,
                _ => continue,
            };

            let event: StreamEvent = match serde_json::from_str(text.as_str()) {
                Ok(event) => event,
                Err(e) => {
                    warn!(error = %e, "Ignoring unrecognized stream frame");
                    continue;
                }
            };

            on_event(&event);
            match event {
                StreamEvent::Exit { exit_code } => {
                    let _ = ws_write.send(Message::Close(None)).await;
                    return Ok(exit_code);
                }
                StreamEvent::Error { message } => return Err(ApiError::Stream(message)),
                StreamEvent::Stdout { .. } | StreamEvent::Stderr { .. } => {}
            }
        }

        Err(ApiError::Stream(
            "connection closed before the command exited".into(),
        ))
    }
}

fn validate(command: &RunCommand) -> ApiResult<()> {
    if command.cmd.trim().is_empty() {
        return Err(ApiError::InvalidRequest("command cannot be empty".into()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stream_frames_decode_by_type() {
        let frames = [
            (r#"{"type":"stdout","data":"hi"}"#, StreamEvent::Stdout { data: "hi".into() }),
            (r#"{"type":"stderr","data":"oops"}"#, StreamEvent::Stderr { data: "oops".into() }),
            (r#"{"type":"exit","exit_code":3}"#, StreamEvent::Exit { exit_code: 3 }),
            (
                r#"{"type":"error","message":"no such sandbox"}"#,
                StreamEvent::Error { message: "no such sandbox".into() },
            ),
        ];
        for (raw, expected) in frames {
            assert_eq!(serde_json::from_str::<StreamEvent>(raw).unwrap(), expected);
        }
    }

    #[test]
    fn empty_command_is_rejected() {
        assert!(validate(&RunCommand::new("  ")).is_err());
        assert!(validate(&RunCommand::new("ls")).is_ok());
    }
}
