use cloudbox_core::auth::{
    BrowserOpener, FlowFailure, OAuthClient, OAuthConfig, OAuthError, OAuthProvider, TokenBundle,
};
use parking_lot::Mutex;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use url::Url;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn free_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind spare port");
    listener.local_addr().unwrap().port()
}

/// What the simulated provider sends back to the callback.
#[derive(Clone)]
enum Redirect {
    Code(&'static str),
    WrongState(&'static str),
    Error(&'static str, &'static str),
    Nothing,
}

/// Browser stand-in that records the authorize URL and fires the redirect.
struct SimulatedBrowser {
    port: u16,
    redirect: Redirect,
    opened: Mutex<Vec<String>>,
}

impl SimulatedBrowser {
    fn new(port: u16, redirect: Redirect) -> Arc<Self> {
        Arc::new(Self {
            port,
            redirect,
            opened: Mutex::new(Vec::new()),
        })
    }

    fn last_url(&self) -> Url {
        let opened = self.opened.lock();
        Url::parse(opened.last().expect("browser was opened")).unwrap()
    }
}

fn query_values(url: &Url, key: &str) -> Vec<String> {
    url.query_pairs()
        .filter(|(k, _)| k == key)
        .map(|(_, v)| v.into_owned())
        .collect()
}

impl BrowserOpener for SimulatedBrowser {
    fn open(&self, url: &str) -> std::io::Result<()> {
        self.opened.lock().push(url.to_string());
        let parsed = Url::parse(url).unwrap();
        let state = query_values(&parsed, "state").pop().unwrap_or_default();

        let query = match &self.redirect {
            Redirect::Code(code) => format!("code={code}&state={state}"),
            Redirect::WrongState(code) => format!("code={code}&state=forged-{state}"),
            Redirect::Error(error, description) => {
                format!("error={error}&error_description={description}&state={state}")
            }
            Redirect::Nothing => return Ok(()),
        };
        let callback = format!("http://127.0.0.1:{}/callback?{query}", self.port);
        tokio::spawn(async move {
            let _ = reqwest::get(callback).await;
        });
        Ok(())
    }

    fn fallback(&self, _url: &str) {}
}

fn client(server: &MockServer, browser: Arc<SimulatedBrowser>) -> OAuthClient {
    let config = OAuthConfig::new(server.uri()).with_callback_port(browser.port);
    OAuthClient::new(config).with_opener(browser)
}

#[tokio::test]
async fn google_login_exchanges_code_end_to_end() {
    let server = MockServer::start().await;
    let port = free_port();

    Mock::given(method("POST"))
        .and(path("/auth/workos-callback"))
        .and(body_partial_json(json!({
            "code": "abc123",
            "source": "cli",
            "redirect_uri": format!("http://127.0.0.1:{port}/callback"),
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "access-xyz",
            "refresh_token": "refresh-xyz",
            "expires_at": 1_900_000_000,
        })))
        .expect(1)
        .mount(&server)
        .await;

    let browser = SimulatedBrowser::new(port, Redirect::Code("abc123"));
    let token = client(&server, browser.clone())
        .start_login("GoogleOAuth", Duration::from_secs(10))
        .await
        .expect("login succeeds");

    assert_eq!(
        token,
        TokenBundle {
            access_token: "access-xyz".into(),
            refresh_token: Some("refresh-xyz".into()),
            expires_at: Some(1_900_000_000),
        }
    );
    assert_eq!(query_values(&browser.last_url(), "provider"), ["GoogleOAuth"]);
}

#[tokio::test]
async fn every_provider_sends_exactly_one_state() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/workos-callback"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"access_token": "t"})))
        .mount(&server)
        .await;

    for provider in OAuthProvider::ALL {
        let browser = SimulatedBrowser::new(free_port(), Redirect::Code("c"));
        let result = client(&server, browser.clone())
            .start_login(provider.as_str(), Duration::from_secs(10))
            .await;
        assert!(result.is_ok(), "{provider}: {result:?}");

        let url = browser.last_url();
        let states = query_values(&url, "state");
        assert_eq!(states.len(), 1, "{provider}: {url}");
        assert!(!states[0].is_empty());
        assert_eq!(query_values(&url, "provider"), [provider.as_str()]);
        assert_eq!(query_values(&url, "response_type"), ["code"]);
    }
}

#[tokio::test]
async fn state_mismatch_is_rejected_without_exchange() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/workos-callback"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"access_token": "t"})))
        .expect(0)
        .mount(&server)
        .await;

    let browser = SimulatedBrowser::new(free_port(), Redirect::WrongState("abc123"));
    let result = client(&server, browser)
        .start_login("GitHubOAuth", Duration::from_secs(10))
        .await;

    assert!(matches!(
        result,
        Err(OAuthError::Flow(FlowFailure::StateMismatch))
    ));
}

#[tokio::test]
async fn provider_error_is_reported_with_description() {
    let server = MockServer::start().await;
    let browser = SimulatedBrowser::new(
        free_port(),
        Redirect::Error("access_denied", "User%20cancelled%20login"),
    );

    let err = client(&server, browser)
        .start_login("MicrosoftOAuth", Duration::from_secs(10))
        .await
        .unwrap_err();

    assert!(err.is_flow_error());
    let message = err.to_string();
    assert!(message.contains("access_denied"), "{message}");
    assert!(message.contains("User cancelled login"), "{message}");
}

#[tokio::test]
async fn invalid_provider_fails_before_binding() {
    let server = MockServer::start().await;
    let held = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = held.local_addr().unwrap().port();

    let browser = SimulatedBrowser::new(port, Redirect::Code("c"));
    let result = client(&server, browser.clone())
        .start_login("FacebookOAuth", Duration::from_secs(1))
        .await;

    assert!(matches!(result, Err(OAuthError::InvalidProvider(p)) if p == "FacebookOAuth"));
    assert!(browser.opened.lock().is_empty());
    drop(held);
}

#[tokio::test]
async fn timeout_releases_the_port() {
    let server = MockServer::start().await;
    let port = free_port();
    let browser = SimulatedBrowser::new(port, Redirect::Nothing);
    let client = client(&server, browser);

    for _ in 0..2 {
        let result = client
            .start_login("GoogleOAuth", Duration::from_millis(200))
            .await;
        assert!(matches!(result, Err(OAuthError::Timeout(_))), "{result:?}");
    }
}

#[tokio::test]
async fn busy_port_is_reported() {
    let server = MockServer::start().await;
    let held = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = held.local_addr().unwrap().port();

    let browser = SimulatedBrowser::new(port, Redirect::Code("c"));
    let result = client(&server, browser)
        .start_login("GoogleOAuth", Duration::from_secs(1))
        .await;

    assert!(matches!(result, Err(OAuthError::PortInUse { port: p }) if p == port));
}

#[tokio::test]
async fn exchange_without_access_token_fails() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/workos-callback"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"refresh_token": "r"})))
        .expect(1)
        .mount(&server)
        .await;

    let browser = SimulatedBrowser::new(free_port(), Redirect::Code("abc123"));
    let result = client(&server, browser)
        .start_login("GoogleOAuth", Duration::from_secs(10))
        .await;

    assert!(matches!(result, Err(OAuthError::ExchangeFailed(_))));
}

#[tokio::test]
async fn exchange_server_error_is_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/workos-callback"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .expect(1)
        .mount(&server)
        .await;

    let browser = SimulatedBrowser::new(free_port(), Redirect::Code("abc123"));
    let err = client(&server, browser)
        .start_login("GoogleOAuth", Duration::from_secs(10))
        .await
        .unwrap_err();

    assert!(matches!(err, OAuthError::ExchangeFailed(ref m) if m.contains("500")));
}

#[tokio::test]
async fn headless_login_completes_from_pasted_url() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/workos-callback"))
        .and(body_partial_json(json!({"code": "pasted-code", "source": "cli"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"access_token": "t"})))
        .expect(1)
        .mount(&server)
        .await;

    let oauth = OAuthClient::new(OAuthConfig::new(server.uri()));
    let login = oauth.begin_headless("GitHubOAuth").unwrap();
    let authorize = Url::parse(login.authorize_url()).unwrap();
    assert_eq!(query_values(&authorize, "state"), [login.state()]);

    let pasted = format!(
        "http://127.0.0.1:19285/callback?code=pasted-code&state={}",
        login.state()
    );
    let token = login.complete(&pasted).await.unwrap();
    assert_eq!(token.access_token, "t");
}
