//! CLI authentication: sign in, sign out, session resolution

use anyhow::{bail, Result};
use shared::{AuthResponse, LoginRequest, RegisterRequest, Role, SessionState, UserInfo};
use std::io::{BufRead, Write};
use std::time::Duration;

use crate::client::{ApiClient, ClientError};
use crate::config::Config;

/// How long `resolve_session` waits for the server before giving up
pub const SESSION_CHECK_TIMEOUT: Duration = Duration::from_secs(10);

/// Read a password from stdin when it was not given on the command line
pub fn read_password(given: Option<String>) -> Result<String> {
    if let Some(password) = given {
        return Ok(password);
    }

    eprint!("Password: ");
    std::io::stderr().flush()?;
    let mut line = String::new();
    std::io::stdin().lock().read_line(&mut line)?;
    let password = line.trim_end_matches(['\r', '\n']).to_string();
    if password.is_empty() {
        bail!("No password given");
    }
    Ok(password)
}

pub async fn login(client: &ApiClient, config: &mut Config, email: &str, password: &str) -> Result<()> {
    let resp: AuthResponse = client
        .post(
            "/auth/login",
            &LoginRequest {
                email: email.to_string(),
                password: password.to_string(),
            },
        )
        .await?;
    store_session(config, resp)
}

pub async fn register(
    client: &ApiClient,
    config: &mut Config,
    email: &str,
    password: &str,
    display_name: &str,
    role: Option<Role>,
) -> Result<()> {
    let resp: AuthResponse = client
        .post(
            "/auth/register",
            &RegisterRequest {
                email: email.to_string(),
                password: password.to_string(),
                display_name: display_name.to_string(),
                role,
                department: None,
            },
        )
        .await?;
    store_session(config, resp)
}

fn store_session(config: &mut Config, resp: AuthResponse) -> Result<()> {
    config.remote.token = Some(resp.token);
    config.save()?;

    println!("\x1b[1;32m✅ Signed in as {}\x1b[0m", resp.user.email);
    println!("\x1b[90mRole: {} · Account: {}\x1b[0m", resp.user.role, resp.user.status);
    Ok(())
}

/// Revoke the token on the server and forget it locally
pub async fn logout(client: &ApiClient, config: &mut Config) -> Result<()> {
    if client.has_token() {
        match client.post_empty::<serde_json::Value>("/auth/logout").await {
            Ok(_) | Err(ClientError::Unauthorized(_)) => {}
            Err(e) => tracing::warn!("Server-side logout failed: {}", e),
        }
    }
    config.remote.token = None;
    config.save()?;
    println!("\x1b[32m✅ Logged out successfully\x1b[0m");
    Ok(())
}

/// Ask the server who the token belongs to.
///
/// Stays `Loading` if the server does not answer in time; the in-flight
/// check is dropped and its eventual answer discarded.
pub async fn resolve_session(client: &ApiClient, wait: Duration) -> Result<SessionState> {
    if !client.has_token() {
        return Ok(SessionState::Unauthenticated);
    }

    match tokio::time::timeout(wait, client.get::<UserInfo>("/auth/me")).await {
        Err(_) => {
            tracing::warn!("Session check timed out after {:?}", wait);
            Ok(SessionState::Loading)
        }
        Ok(Ok(user)) => Ok(SessionState::authenticated(user.session_user())),
        Ok(Err(ClientError::Unauthorized(reason))) => {
            tracing::debug!("Session rejected: {}", reason);
            Ok(SessionState::Unauthenticated)
        }
        Ok(Err(e)) => Err(e.into()),
    }
}

pub async fn whoami(client: &ApiClient, server_url: &str) -> Result<()> {
    match resolve_session(client, SESSION_CHECK_TIMEOUT).await? {
        SessionState::Authenticated { user } => {
            println!("\x1b[32m✓ Logged in\x1b[0m");
            println!("Server: {}", server_url);
            println!("User:   {} <{}>", user.display_name, user.email);
            println!("Role:   {}", user.role);
        }
        SessionState::Unauthenticated => {
            println!("\x1b[33m✗ Not logged in\x1b[0m");
            println!("Run '\x1b[1mvmg login <email>\x1b[0m' to authenticate");
        }
        SessionState::Loading => {
            println!("\x1b[33m… Server at {} did not answer\x1b[0m", server_url);
        }
    }
    Ok(())
}
