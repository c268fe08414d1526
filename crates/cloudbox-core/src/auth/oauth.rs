//! Browser-based OAuth login.
//!
//! `start_login` drives the loopback flow:
//! `Idle -> Listening -> AwaitingRedirect -> CodeReceived -> Exchanging -> Done`,
//! with `ErrorReceived`, `TimedOut` and `ExchangeFailed` as terminal failures.
//! `begin_headless` covers machines without a browser: the user opens the URL
//! elsewhere and pastes the redirect back.

use rand::RngExt;
use rand::distr::Alphanumeric;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

use super::callback::{CallbackListener, CallbackParams, redirect_uri};
use super::error::{FlowFailure, OAuthError};
use super::refresh::{BackendAuthClient, CodeExchanger};
use super::types::{OAuthProvider, TokenBundle};

pub const DEFAULT_CALLBACK_PORT: u16 = 19285;
pub const DEFAULT_LOGIN_TIMEOUT: Duration = Duration::from_secs(120);
pub const DEFAULT_AUTHORIZE_URL: &str = "https://api.workos.com/user_management/authorize";
pub const DEFAULT_CLIENT_ID: &str = "client_cloudbox_cli";

pub const CLIENT_ID_ENV: &str = "CLOUDBOX_OAUTH_CLIENT_ID";
pub const AUTHORIZE_URL_ENV: &str = "CLOUDBOX_AUTHORIZE_URL";

const STATE_LEN: usize = 43;

/// Endpoints and identifiers used by the login flow.
#[derive(Debug, Clone)]
pub struct OAuthConfig {
    pub client_id: String,
    pub authorize_url: String,
    /// Base URL of the Cloudbox API, which hosts the token exchange.
    pub backend_url: String,
    pub callback_port: u16,
}

impl OAuthConfig {
    pub fn new(backend_url: impl Into<String>) -> Self {
        Self {
            client_id: DEFAULT_CLIENT_ID.to_string(),
            authorize_url: DEFAULT_AUTHORIZE_URL.to_string(),
            backend_url: backend_url.into(),
            callback_port: DEFAULT_CALLBACK_PORT,
        }
    }

    /// Apply `CLOUDBOX_OAUTH_CLIENT_ID` and `CLOUDBOX_AUTHORIZE_URL`.
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(client_id) = std::env::var(CLIENT_ID_ENV)
            && !client_id.trim().is_empty()
        {
            self.client_id = client_id;
        }
        if let Ok(url) = std::env::var(AUTHORIZE_URL_ENV)
            && !url.trim().is_empty()
        {
            self.authorize_url = url;
        }
        self
    }

    pub fn with_callback_port(mut self, port: u16) -> Self {
        self.callback_port = port;
        self
    }
}

/// Progress of one login attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginState {
    Idle,
    Listening,
    AwaitingRedirect,
    CodeReceived,
    ErrorReceived,
    TimedOut,
    Exchanging,
    Done,
    ExchangeFailed,
}

impl fmt::Display for LoginState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

fn transition(state: &mut LoginState, next: LoginState) {
    debug!(from = %state, to = %next, "Login state transition");
    *state = next;
}

/// Opens the authorize URL for the user.
pub trait BrowserOpener: Send + Sync {
    fn open(&self, url: &str) -> std::io::Result<()>;

    /// Called when `open` fails so the user can open the URL manually.
    fn fallback(&self, url: &str) {
        eprintln!("Open this URL in your browser to continue:\n\n  {url}\n");
    }
}

/// Launches the system default browser.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemBrowser;

impl BrowserOpener for SystemBrowser {
    fn open(&self, url: &str) -> std::io::Result<()> {
        webbrowser::open(url)
    }
}

/// Generate a CSRF state token from the OS-seeded thread RNG.
pub fn generate_state() -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(STATE_LEN)
        .map(char::from)
        .collect()
}

/// OAuth login client.
pub struct OAuthClient {
    config: OAuthConfig,
    exchanger: Arc<dyn CodeExchanger>,
    opener: Arc<dyn BrowserOpener>,
}

impl OAuthClient {
    pub fn new(config: OAuthConfig) -> Self {
        let exchanger = Arc::new(BackendAuthClient::new(config.backend_url.clone()));
        Self {
            config,
            exchanger,
            opener: Arc::new(SystemBrowser),
        }
    }

    pub fn with_exchanger(mut self, exchanger: Arc<dyn CodeExchanger>) -> Self {
        self.exchanger = exchanger;
        self
    }

    pub fn with_opener(mut self, opener: Arc<dyn BrowserOpener>) -> Self {
        self.opener = opener;
        self
    }

    pub fn config(&self) -> &OAuthConfig {
        &self.config
    }

    /// Build the provider authorize URL for one attempt.
    pub fn authorize_url(
        &self,
        provider: OAuthProvider,
        state: &str,
        redirect_uri: &str,
    ) -> Result<String, OAuthError> {
        let mut url = Url::parse(&self.config.authorize_url).map_err(|e| {
            OAuthError::InvalidConfig(format!(
                "authorize URL '{}': {e}",
                self.config.authorize_url
            ))
        })?;
        url.query_pairs_mut()
            .append_pair("client_id", &self.config.client_id)
            .append_pair("redirect_uri", redirect_uri)
            .append_pair("response_type", "code")
            .append_pair("provider", provider.as_str())
            .append_pair("state", state);
        Ok(url.into())
    }

    /// Run the full browser login and return the exchanged tokens.
    ///
    /// Nothing is persisted here; callers store the bundle on success.
    pub async fn start_login(
        &self,
        provider: &str,
        timeout: Duration,
    ) -> Result<TokenBundle, OAuthError> {
        let provider: OAuthProvider = provider.parse()?;
        let mut state = LoginState::Idle;

        let csrf_state = generate_state();
        let mut listener =
            CallbackListener::bind(self.config.callback_port, csrf_state.clone()).await?;
        transition(&mut state, LoginState::Listening);

        let redirect_uri = listener.redirect_uri();
        let url = self.authorize_url(provider, &csrf_state, &redirect_uri)?;
        info!(%provider, port = listener.port(), "Starting browser login");
        if let Err(e) = self.opener.open(&url) {
            warn!(error = %e, "Failed to launch browser");
            self.opener.fallback(&url);
        }
        transition(&mut state, LoginState::AwaitingRedirect);

        let outcome = listener.wait(timeout).await;
        listener.shutdown().await;

        let code = match outcome {
            Ok(code) => {
                transition(&mut state, LoginState::CodeReceived);
                code
            }
            Err(err @ OAuthError::Timeout(_)) => {
                transition(&mut state, LoginState::TimedOut);
                return Err(err);
            }
            Err(err) => {
                transition(&mut state, LoginState::ErrorReceived);
                return Err(err);
            }
        };

        transition(&mut state, LoginState::Exchanging);
        match self.exchanger.exchange(&code, &redirect_uri).await {
            Ok(bundle) => {
                transition(&mut state, LoginState::Done);
                Ok(bundle)
            }
            Err(err) => {
                transition(&mut state, LoginState::ExchangeFailed);
                Err(err)
            }
        }
    }

    /// Prepare a login that completes from pasted input instead of a listener.
    pub fn begin_headless(&self, provider: &str) -> Result<HeadlessLogin, OAuthError> {
        let provider: OAuthProvider = provider.parse()?;
        let state = generate_state();
        let redirect_uri = redirect_uri(self.config.callback_port);
        let authorize_url = self.authorize_url(provider, &state, &redirect_uri)?;
        info!(%provider, "Starting headless login");

        Ok(HeadlessLogin {
            authorize_url,
            state,
            redirect_uri,
            exchanger: self.exchanger.clone(),
        })
    }
}

/// Login in progress on a machine without a usable browser.
pub struct HeadlessLogin {
    authorize_url: String,
    state: String,
    redirect_uri: String,
    exchanger: Arc<dyn CodeExchanger>,
}

impl HeadlessLogin {
    /// URL the user opens on any device.
    pub fn authorize_url(&self) -> &str {
        &self.authorize_url
    }

    pub fn state(&self) -> &str {
        &self.state
    }

    /// Extract the authorization code from what the user pasted.
    ///
    /// A redirect URL (or bare query string) is validated exactly like the
    /// listener does. Anything else is taken as the code itself.
    pub fn parse_input(&self, pasted: &str) -> Result<String, OAuthError> {
        let pasted = pasted.trim();
        if pasted.is_empty() {
            return Err(FlowFailure::InvalidCallback("nothing was pasted".into()).into());
        }

        let query = if pasted.starts_with("http://") || pasted.starts_with("https://") {
            let url = Url::parse(pasted)
                .map_err(|e| FlowFailure::InvalidCallback(format!("not a valid URL: {e}")))?;
            Some(url.query().unwrap_or_default().to_string())
        } else if pasted.contains('=') {
            Some(pasted.trim_start_matches('?').to_string())
        } else {
            None
        };

        let Some(query) = query else {
            debug!("Treating pasted input as a bare authorization code");
            return Ok(pasted.to_string());
        };

        let mut params = CallbackParams::default();
        for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
            let value = Some(value.into_owned());
            match key.as_ref() {
                "code" => params.code = value,
                "state" => params.state = value,
                "error" => params.error = value,
                "error_description" => params.error_description = value,
                _ => {}
            }
        }
        params.validate(&self.state).map_err(OAuthError::Flow)
    }

    /// Validate the pasted value and exchange the code.
    pub async fn complete(self, pasted: &str) -> Result<TokenBundle, OAuthError> {
        let code = self.parse_input(pasted)?;
        self.exchanger.exchange(&code, &self.redirect_uri).await
    }
}
