//! One-shot loopback listener for the OAuth redirect.
//!
//! The listener services exactly one `GET /callback`, validates it against the
//! state issued for this login attempt and hands the outcome to the waiting
//! flow through a oneshot channel. It is shut down on every exit path,
//! including drop.

use axum::{
    Router,
    extract::{Query, State},
    response::Html,
    routing::get,
};
use parking_lot::Mutex;
use serde::Deserialize;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::error::{FlowFailure, OAuthError};

/// How long shutdown waits for in-flight connections before aborting.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

pub type CallbackOutcome = Result<String, FlowFailure>;

/// Query parameters of the provider redirect.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

impl CallbackParams {
    /// Validate a redirect against the state we issued and return the code.
    ///
    /// An `error` parameter wins over everything else. A state mismatch is
    /// fatal even when a code is present.
    pub fn validate(self, expected_state: &str) -> CallbackOutcome {
        if let Some(error) = self.error {
            return Err(FlowFailure::Provider {
                error,
                description: self.error_description.filter(|d| !d.is_empty()),
            });
        }
        if self.state.as_deref() != Some(expected_state) {
            return Err(FlowFailure::StateMismatch);
        }
        match self.code {
            Some(code) if !code.is_empty() => Ok(code),
            _ => Err(FlowFailure::MissingCode),
        }
    }
}

struct CallbackState {
    expected_state: String,
    outcome_tx: Mutex<Option<oneshot::Sender<CallbackOutcome>>>,
}

/// Running callback listener bound to `127.0.0.1:<port>`.
pub struct CallbackListener {
    port: u16,
    outcome_rx: Option<oneshot::Receiver<CallbackOutcome>>,
    shutdown_tx: Option<oneshot::Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl CallbackListener {
    /// Bind the loopback port and start serving in a background task.
    pub async fn bind(port: u16, expected_state: String) -> Result<Self, OAuthError> {
        let addr = SocketAddr::from(([127, 0, 0, 1], port));
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|err| match err.kind() {
                std::io::ErrorKind::AddrInUse => OAuthError::PortInUse { port },
                _ => OAuthError::Listener(err),
            })?;

        let (outcome_tx, outcome_rx) = oneshot::channel();
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

        let state = Arc::new(CallbackState {
            expected_state,
            outcome_tx: Mutex::new(Some(outcome_tx)),
        });

        let app = Router::new()
            .route("/callback", get(handle_callback))
            .with_state(state);

        info!("Callback listener started on http://{}", addr);

        let server = axum::serve(listener, app).with_graceful_shutdown(async move {
            let _ = shutdown_rx.await;
            debug!("Callback listener shutting down");
        });

        let handle = tokio::spawn(async move {
            if let Err(e) = server.await {
                warn!("Callback listener error: {}", e);
            }
        });

        Ok(Self {
            port,
            outcome_rx: Some(outcome_rx),
            shutdown_tx: Some(shutdown_tx),
            handle: Some(handle),
        })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Redirect URI registered with the provider for this port.
    pub fn redirect_uri(&self) -> String {
        redirect_uri(self.port)
    }

    /// Wait for the single redirect, or fail with [`OAuthError::Timeout`].
    pub async fn wait(&mut self, timeout: Duration) -> Result<String, OAuthError> {
        let Some(outcome_rx) = self.outcome_rx.take() else {
            return Err(OAuthError::Listener(std::io::Error::other(
                "callback outcome already consumed",
            )));
        };

        tokio::select! {
            outcome = outcome_rx => match outcome {
                Ok(result) => result.map_err(OAuthError::Flow),
                Err(_) => Err(OAuthError::Listener(std::io::Error::other(
                    "callback listener stopped before a redirect arrived",
                ))),
            },
            _ = tokio::time::sleep(timeout) => Err(OAuthError::Timeout(timeout)),
        }
    }

    /// Signal graceful shutdown and wait a bounded time for the task to end.
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(mut handle) = self.handle.take()
            && tokio::time::timeout(SHUTDOWN_GRACE, &mut handle).await.is_err()
        {
            debug!("Callback listener did not stop in time; aborting");
            handle.abort();
            let _ = handle.await;
        }
    }
}

impl Drop for CallbackListener {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

pub fn redirect_uri(port: u16) -> String {
    format!("http://127.0.0.1:{port}/callback")
}

async fn handle_callback(
    State(state): State<Arc<CallbackState>>,
    Query(params): Query<CallbackParams>,
) -> Html<String> {
    let Some(outcome_tx) = state.outcome_tx.lock().take() else {
        debug!("Ignoring repeated callback request");
        return Html(already_handled_html());
    };

    let outcome = params.validate(&state.expected_state);
    let page = match &outcome {
        Ok(_) => {
            info!("Received OAuth callback with authorization code");
            success_html()
        }
        Err(failure) => {
            warn!("Rejected OAuth callback: {}", failure);
            error_html(&failure.to_string())
        }
    };

    let _ = outcome_tx.send(outcome);
    Html(page)
}

fn page(title: &str, body: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
<head><meta charset="utf-8"><title>Cloudbox - {title}</title></head>
<body style="font-family: system-ui, sans-serif; text-align: center; padding-top: 4rem;">
<h1>{title}</h1>
{body}
</body>
</html>"#
    )
}

fn success_html() -> String {
    page(
        "Login Successful",
        "<p>You can close this window and return to the terminal.</p>",
    )
}

fn error_html(error: &str) -> String {
    page(
        "Login Failed",
        &format!("<p>{}</p>", escape_html(error)),
    )
}

fn already_handled_html() -> String {
    page(
        "Already Handled",
        "<p>This login attempt has already been processed.</p>",
    )
}

fn escape_html(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(code: Option<&str>, state: Option<&str>) -> CallbackParams {
        CallbackParams {
            code: code.map(String::from),
            state: state.map(String::from),
            ..Default::default()
        }
    }

    #[test]
    fn accepts_matching_state_with_code() {
        let outcome = params(Some("abc123"), Some("s1")).validate("s1");
        assert_eq!(outcome, Ok("abc123".to_string()));
    }

    #[test]
    fn rejects_state_mismatch_even_with_code() {
        let outcome = params(Some("abc123"), Some("other")).validate("s1");
        assert_eq!(outcome, Err(FlowFailure::StateMismatch));

        let outcome = params(Some("abc123"), None).validate("s1");
        assert_eq!(outcome, Err(FlowFailure::StateMismatch));
    }

    #[test]
    fn provider_error_takes_precedence() {
        let outcome = CallbackParams {
            error: Some("access_denied".into()),
            error_description: Some("user said no".into()),
            ..Default::default()
        }
        .validate("s1");

        let failure = outcome.unwrap_err();
        let message = failure.to_string();
        assert!(message.contains("access_denied"));
        assert!(message.contains("user said no"));
    }

    #[test]
    fn missing_code_is_rejected() {
        let outcome = params(None, Some("s1")).validate("s1");
        assert_eq!(outcome, Err(FlowFailure::MissingCode));
    }

    #[test]
    fn error_page_escapes_markup() {
        let html = error_html("<script>");
        assert!(html.contains("&lt;script&gt;"));
        assert!(!html.contains("<script>"));
    }

    #[tokio::test]
    async fn bind_reports_port_in_use() {
        let held = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = held.local_addr().unwrap().port();

        let result = CallbackListener::bind(port, "s".into()).await;
        assert!(matches!(result, Err(OAuthError::PortInUse { port: p }) if p == port));
    }

    #[tokio::test]
    async fn second_request_gets_already_handled_page() {
        let spare = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = spare.local_addr().unwrap().port();
        drop(spare);

        let mut listener = CallbackListener::bind(port, "s1".into()).await.unwrap();
        let url = format!("{}?code=c&state=s1", listener.redirect_uri());

        let first = reqwest::get(&url).await.unwrap().text().await.unwrap();
        assert!(first.contains("Login Successful"));
        let second = reqwest::get(&url).await.unwrap().text().await.unwrap();
        assert!(second.contains("Already Handled"));

        let code = listener.wait(Duration::from_secs(1)).await.unwrap();
        assert_eq!(code, "c");
        listener.shutdown().await;
    }
}
