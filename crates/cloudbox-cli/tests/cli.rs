use assert_cmd::Command;
use predicates::prelude::PredicateBooleanExt;
use predicates::str::{contains, starts_with};
use tempfile::TempDir;
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// A command isolated from the user's real config and keychain.
fn cloudbox(home: &TempDir) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("cloudbox"));
    cmd.env("CLOUDBOX_DIR", home.path())
        .env("CLOUDBOX_NO_KEYRING", "1")
        .env_remove("CLOUDBOX_API_KEY")
        .env_remove("CLOUDBOX_PROFILE")
        .env_remove("CLOUDBOX_BASE_URL")
        .env_remove("CLOUDBOX_TEMPLATE")
        .env_remove("CLOUDBOX_TIMEOUT")
        .env_remove("CLOUDBOX_OUTPUT");
    cmd
}

#[test]
fn test_cli_help() {
    let home = TempDir::new().unwrap();
    cloudbox(&home)
        .arg("--help")
        .assert()
        .success()
        .stdout(contains("Cloudbox"));
}

#[test]
fn test_cli_version() {
    let home = TempDir::new().unwrap();
    cloudbox(&home).arg("--version").assert().success();
}

#[test]
fn test_cli_completions() {
    let home = TempDir::new().unwrap();
    cloudbox(&home)
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(starts_with("_cloudbox"));
}

#[test]
fn config_set_then_get() {
    let home = TempDir::new().unwrap();
    cloudbox(&home)
        .args(["config", "set", "base-url", "http://localhost:9999/"])
        .assert()
        .success();

    cloudbox(&home)
        .args(["config", "get", "base_url"])
        .assert()
        .success()
        .stdout("http://localhost:9999\n");

    assert!(home.path().join("config.yaml").exists());
}

#[test]
fn config_rejects_unknown_key_and_bad_values() {
    let home = TempDir::new().unwrap();
    cloudbox(&home)
        .args(["config", "set", "colour", "blue"])
        .assert()
        .code(1)
        .stderr(contains("Error:").and(contains("unknown config key")));

    cloudbox(&home)
        .args(["config", "set", "timeout", "0"])
        .assert()
        .code(1)
        .stderr(contains("invalid value for timeout"));
}

#[test]
fn profiles_can_be_created_and_activated() {
    let home = TempDir::new().unwrap();
    cloudbox(&home)
        .args(["profile", "create", "staging"])
        .assert()
        .success();
    cloudbox(&home)
        .args(["profile", "use", "staging"])
        .assert()
        .success();

    cloudbox(&home)
        .args(["profile", "list", "--format", "plain"])
        .assert()
        .success()
        .stdout(contains("default\t\n").and(contains("staging\tactive\n")));

    cloudbox(&home)
        .args(["profile", "delete", "staging"])
        .assert()
        .success()
        .stdout(contains("Active profile is now 'default'"));
}

#[test]
fn unknown_profile_is_reported() {
    let home = TempDir::new().unwrap();
    cloudbox(&home)
        .args(["config", "list", "--profile", "nope"])
        .assert()
        .code(1)
        .stderr(contains("profile 'nope' not found").and(contains("cloudbox profile list")));
}

#[test]
fn stored_api_key_is_masked_in_status() {
    let home = TempDir::new().unwrap();
    cloudbox(&home)
        .args(["auth", "set-key", "sk_live_1234567890"])
        .assert()
        .success()
        .stdout(contains("sk_l...7890"));

    cloudbox(&home)
        .args(["auth", "status", "--format", "json"])
        .assert()
        .success()
        .stdout(
            contains("\"method\": \"api key (stored)\"")
                .and(contains("sk_l...7890"))
                .and(contains("1234567890").not()),
        );

    cloudbox(&home)
        .args(["auth", "clear-key"])
        .assert()
        .success()
        .stdout(contains("Removed API key"));

    cloudbox(&home)
        .args(["auth", "status", "--format", "plain"])
        .assert()
        .success()
        .stdout("default\tnot authenticated\n");
}

#[test]
fn login_with_unknown_provider_fails_fast() {
    let home = TempDir::new().unwrap();
    cloudbox(&home)
        .args(["login", "--provider", "FacebookOAuth", "--timeout", "1"])
        .assert()
        .code(1)
        .stderr(contains("invalid provider 'FacebookOAuth'").and(contains("GitHubOAuth")));
}

#[test]
fn set_key_rejects_unknown_profile() {
    let home = TempDir::new().unwrap();
    cloudbox(&home)
        .args(["auth", "set-key", "sk_live_1234567890", "--profile", "typo"])
        .assert()
        .code(1)
        .stderr(contains("profile 'typo' not found"));

    assert!(!home.path().join("credentials.yaml").exists());
}

#[tokio::test(flavor = "multi_thread")]
async fn headless_login_failure_stores_nothing() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/workos-callback"))
        .and(body_partial_json(serde_json::json!({"code": "abc123", "source": "cli"})))
        .respond_with(ResponseTemplate::new(500).set_body_string("upstream exploded"))
        .expect(1)
        .mount(&server)
        .await;

    let uri = server.uri();
    let home = TempDir::new().unwrap();
    let credentials = home.path().join("credentials.yaml");
    let output = tokio::task::spawn_blocking(move || {
        let output = cloudbox(&home)
            .args(["login", "--no-browser", "--base-url", uri.as_str()])
            .write_stdin("abc123\n")
            .output()
            .unwrap();
        (output, home)
    })
    .await
    .unwrap();
    let (output, _home) = output;

    assert_eq!(output.status.code(), Some(1), "{output:?}");
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("login failed"), "{stderr}");
    assert!(stderr.contains("Try again or use the web console"), "{stderr}");
    assert!(!credentials.exists());
}

#[tokio::test(flavor = "multi_thread")]
async fn headless_login_stores_exchanged_token() {
    let server = MockServer::start().await;
    let expires_at = chrono::Utc::now().timestamp() + 3600;
    Mock::given(method("POST"))
        .and(path("/auth/workos-callback"))
        .and(body_partial_json(serde_json::json!({"code": "abc123", "source": "cli"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "access_token": "tok123",
            "refresh_token": "ref456",
            "expires_at": expires_at
        })))
        .expect(1)
        .mount(&server)
        .await;

    let uri = server.uri();
    let home = TempDir::new().unwrap();
    let credentials = home.path().join("credentials.yaml");
    let output = tokio::task::spawn_blocking(move || {
        let output = cloudbox(&home)
            .args(["login", "--no-browser", "--base-url", uri.as_str()])
            .write_stdin("abc123\n")
            .output()
            .unwrap();
        (output, home)
    })
    .await
    .unwrap();
    let (output, _home) = output;

    assert!(output.status.success(), "{output:?}");
    assert!(String::from_utf8_lossy(&output.stdout).contains("Logged in (profile: default)"));
    let stored = std::fs::read_to_string(&credentials).unwrap();
    assert!(stored.contains("tok123"), "{stored}");
    assert!(stored.contains("ref456"), "{stored}");
}

#[test]
fn api_commands_require_credentials() {
    let home = TempDir::new().unwrap();
    cloudbox(&home)
        .args(["sandbox", "list"])
        .assert()
        .code(1)
        .stderr(contains("not authenticated").and(contains("cloudbox login")));
}

#[test]
fn exec_requires_a_command() {
    let home = TempDir::new().unwrap();
    cloudbox(&home)
        .args(["exec", "sb-1"])
        .assert()
        .failure();
}

#[tokio::test(flavor = "multi_thread")]
async fn sandbox_list_uses_api_key_flag() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/sandboxes"))
        .and(query_param("state", "running"))
        .and(header("x-api-key", "sk_test_key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
            {"sandbox_id": "sb-1", "template_id": "base", "state": "running"},
            {"sandbox_id": "sb-2", "state": "running"}
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let uri = server.uri();
    let output = tokio::task::spawn_blocking(move || {
        let home = TempDir::new().unwrap();
        cloudbox(&home)
            .args([
                "sandbox",
                "list",
                "--state",
                "running",
                "--format",
                "plain",
                "--base-url",
                uri.as_str(),
                "--api-key",
                "sk_test_key",
            ])
            .output()
            .unwrap()
    })
    .await
    .unwrap();

    assert!(output.status.success(), "{output:?}");
    assert_eq!(
        String::from_utf8_lossy(&output.stdout),
        "sb-1\trunning\tbase\nsb-2\trunning\t\n"
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn exec_exits_with_remote_exit_code() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/sandboxes/sb-1/commands"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "exit_code": 3,
            "stdout": "partial\n",
            "stderr": "boom\n"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let uri = server.uri();
    let output = tokio::task::spawn_blocking(move || {
        let home = TempDir::new().unwrap();
        cloudbox(&home)
            .args(["exec", "sb-1", "--base-url", uri.as_str(), "--api-key", "k"])
            .args(["--", "sh", "-c", "exit 3"])
            .output()
            .unwrap()
    })
    .await
    .unwrap();

    assert_eq!(output.status.code(), Some(3));
    assert_eq!(String::from_utf8_lossy(&output.stdout), "partial\n");
    assert_eq!(String::from_utf8_lossy(&output.stderr), "boom\n");
}
