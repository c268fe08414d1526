use anyhow::{Context, Result, anyhow, bail};
use chrono::Utc;
use cloudbox_core::auth::{DEFAULT_LOGIN_TIMEOUT, OAuthError, OAuthProvider, mask_secret};
use cloudbox_core::{CredentialRecord, OAuthClient};
use serde::Serialize;
use std::io::BufRead;
use std::time::Duration;
use tracing::info;

use super::utils::{format_epoch, or_dash};
use crate::cli::{AuthCommands, LoginArgs};
use crate::output::table::{key_value_table, print_table};
use crate::output::{OutputFormat, json::print_json, plain::print_rows};
use crate::setup::CliContext;

pub async fn run(ctx: &CliContext, command: AuthCommands, format: OutputFormat) -> Result<()> {
    match command {
        AuthCommands::Status => status(ctx, format).await,
        AuthCommands::SetKey { key } => set_key(ctx, key, format),
        AuthCommands::ClearKey => clear_key(ctx, format),
    }
}

/// Configuration problems are reported as-is; everything else is a failed login.
fn login_error(err: OAuthError) -> anyhow::Error {
    match err {
        OAuthError::InvalidProvider(_) | OAuthError::InvalidConfig(_) => anyhow!(err),
        other => anyhow!(other).context("login failed"),
    }
}

fn read_pasted_line() -> Result<String> {
    let mut line = String::new();
    std::io::stdin()
        .lock()
        .read_line(&mut line)
        .context("failed to read from stdin")?;
    Ok(line.trim().to_string())
}

pub async fn login(ctx: &CliContext, args: LoginArgs, format: OutputFormat) -> Result<()> {
    let timeout = match args.timeout {
        Some(0) => bail!("--timeout must be at least one second"),
        Some(secs) => Duration::from_secs(secs),
        None => DEFAULT_LOGIN_TIMEOUT,
    };

    // Reject unknown providers before printing anything or binding a port
    let _: OAuthProvider = args.provider.parse().map_err(login_error)?;

    let mut config = ctx.oauth_config()?;
    if let Some(port) = args.port {
        config = config.with_callback_port(port);
    }
    let client = OAuthClient::new(config);

    let token = if args.no_browser {
        let pending = client.begin_headless(&args.provider).map_err(login_error)?;
        eprintln!(
            "Open this URL on any device and sign in:\n\n  {}\n",
            pending.authorize_url()
        );
        eprintln!("Then paste the URL you were redirected to (or just the code):");
        let pasted = read_pasted_line()?;
        pending.complete(&pasted).await.map_err(login_error)?
    } else {
        eprintln!(
            "Opening your browser to log in with {}. Waiting up to {}s...",
            args.provider,
            timeout.as_secs()
        );
        client
            .start_login(&args.provider, timeout)
            .await
            .map_err(login_error)?
    };

    let manager = ctx.token_manager()?;
    let expires_at = token.expires_at;
    manager
        .save_login(token)
        .context("login succeeded but the token could not be saved")?;
    info!(profile = manager.profile(), "Login complete");

    if format.is_json() {
        return print_json(&serde_json::json!({
            "profile": manager.profile(),
            "expires_at": expires_at,
        }));
    }

    println!("Logged in (profile: {})", manager.profile());
    Ok(())
}

pub fn logout(ctx: &CliContext, format: OutputFormat) -> Result<()> {
    let manager = ctx.token_manager()?;
    let removed = manager.logout().context("failed to remove stored token")?;

    if format.is_json() {
        return print_json(&serde_json::json!({
            "profile": manager.profile(),
            "logged_out": removed,
        }));
    }

    if removed {
        println!("Logged out (profile: {})", manager.profile());
    } else {
        println!("Not logged in (profile: {})", manager.profile());
    }
    Ok(())
}

pub async fn whoami(ctx: &CliContext, format: OutputFormat) -> Result<()> {
    let client = ctx.client().await?;
    let user = client.whoami().await?;

    if format.is_json() {
        return print_json(&user);
    }
    if format.is_plain() {
        return print_rows([[
            user.id.as_str(),
            user.email.as_str(),
            user.name.as_deref().unwrap_or(""),
            user.team.as_deref().unwrap_or(""),
        ]]);
    }

    print_table(key_value_table([
        ("ID", user.id),
        ("Email", user.email),
        ("Name", user.name.unwrap_or_else(|| "-".into())),
        ("Team", user.team.unwrap_or_else(|| "-".into())),
    ]))
}

#[derive(Serialize)]
struct AuthStatus {
    profile: String,
    base_url: String,
    /// Which credential requests will use
    method: &'static str,
    api_key: Option<String>,
    token_expires_at: Option<i64>,
    token_needs_refresh: Option<bool>,
}

async fn status(ctx: &CliContext, format: OutputFormat) -> Result<()> {
    let resolved = ctx.resolved()?;
    let manager = ctx.token_manager()?;
    let record = manager
        .stored()
        .context("failed to read stored credentials")?
        .unwrap_or_default();

    let method = if ctx.has_api_key_flag() {
        "api key (flag or environment)"
    } else if record.api_key.is_some() {
        "api key (stored)"
    } else if manager.access_token().await.is_some() {
        "login token"
    } else {
        "not authenticated"
    };
    // access_token() may have refreshed and persisted a new bundle
    let record = manager.stored()?.unwrap_or(record);
    let token = record.oauth_token.as_ref();

    let status = AuthStatus {
        profile: resolved.profile,
        base_url: resolved.base_url,
        method,
        api_key: record.api_key.as_deref().map(mask_secret),
        token_expires_at: token.and_then(|t| t.expires_at),
        token_needs_refresh: token.map(|t| t.needs_refresh(Utc::now().timestamp())),
    };

    if format.is_json() {
        return print_json(&status);
    }
    if format.is_plain() {
        return print_rows([[status.profile.as_str(), status.method]]);
    }

    let expires = match status.token_expires_at {
        Some(_) => format_epoch(status.token_expires_at),
        None if token.is_some() => "never".to_string(),
        None => "-".to_string(),
    };
    print_table(key_value_table([
        ("Profile", status.profile.clone()),
        ("Base URL", status.base_url.clone()),
        ("Authenticated with", status.method.to_string()),
        ("Stored API key", or_dash(status.api_key.clone())),
        ("Token expires", expires),
    ]))
}

fn set_key(ctx: &CliContext, key: Option<String>, format: OutputFormat) -> Result<()> {
    let key = match key {
        Some(key) => key,
        None => rpassword::prompt_password("API key: ").context("failed to read API key")?,
    };
    let key = key.trim().to_string();
    if key.is_empty() {
        bail!("API key cannot be empty");
    }

    let profile = ctx.profile()?;
    let store = ctx.credentials();
    let mut record = store.load(&profile)?.unwrap_or_default();
    record.api_key = Some(key.clone());
    store.store(&profile, &record)?;
    info!(profile = %profile, key = %mask_secret(&key), "Stored API key");

    if format.is_json() {
        return print_json(&serde_json::json!({
            "profile": profile,
            "api_key": mask_secret(&key),
        }));
    }

    println!("Saved API key {} for profile '{profile}'", mask_secret(&key));
    Ok(())
}

fn clear_key(ctx: &CliContext, format: OutputFormat) -> Result<()> {
    let profile = ctx.profile()?;
    let store = ctx.credentials();
    let removed = match store.load(&profile)? {
        Some(CredentialRecord {
            api_key: Some(_),
            oauth_token,
        }) => {
            if oauth_token.is_some() {
                store.store(&profile, &CredentialRecord { api_key: None, oauth_token })?;
            } else {
                store.delete(&profile)?;
            }
            true
        }
        _ => false,
    };

    if format.is_json() {
        return print_json(&serde_json::json!({
            "profile": profile,
            "removed": removed,
        }));
    }

    if removed {
        println!("Removed API key for profile '{profile}'");
    } else {
        println!("No API key stored for profile '{profile}'");
    }
    Ok(())
}
