use crate::core::config::AppConfig;
use crate::core::{ApiError, Credential, CredentialStore, TokenStore};
use crate::providers::finanzguru::FinanzguruClient;
use anyhow::{Context, Result};
use console::style;
use std::sync::Arc;
use tracing::{error, info};

/// What the user hands over to start a session.
#[derive(Debug, Clone)]
pub enum LoginCredentials {
    RefreshToken(String),
    Password(String),
}

/// Exchanges `credentials` for a session and proves it works with one
/// accounts fetch. Nothing is stored here.
pub async fn validate(config: &AppConfig, credentials: &LoginCredentials) -> Result<Arc<Credential>, ApiError> {
    let client = FinanzguruClient::with_timeout(
        &config.base_url,
        TokenStore::empty(),
        config.request_timeout(),
    )?;

    let credential = match credentials {
        LoginCredentials::RefreshToken(token) => {
            client.login_with_refresh_token(token.trim()).await?
        }
        LoginCredentials::Password(password) => {
            client
                .login_with_password(config.email.trim(), password)
                .await?
        }
    };
    client.get_bank_accounts().await?;
    Ok(credential)
}

/// Validates the credentials and stores the session for the configured
/// connection, replacing any previous one.
pub async fn run(
    config: &AppConfig,
    store: Arc<dyn CredentialStore>,
    credentials: LoginCredentials,
) -> Result<()> {
    let credential = match validate(config, &credentials).await {
        Ok(credential) => credential,
        Err(e @ ApiError::Authentication(_)) => {
            anyhow::bail!("Invalid credentials for {}: {e}", config.email)
        }
        Err(e @ ApiError::Transient(_)) => {
            error!(error = %e, "Finanzguru login failed");
            anyhow::bail!("Cannot connect to Finanzguru: {e}")
        }
    };

    let connection_id = config.connection_id();
    let reauth = store.load(&connection_id).await?.is_some();
    store
        .save(&connection_id, &credential)
        .await
        .context("Failed to store credential")?;
    info!(connection_id, reauth, "Stored credential");

    let action = if reauth { "Re-authenticated" } else { "Logged in" };
    println!("{} {action} as {}", style("✓").green().bold(), config.email);
    Ok(())
}
