pub mod login;
pub mod logout;
pub mod setup;
pub mod status;
pub mod ui;
pub mod watch;

use crate::core::config::AppConfig;
use crate::core::{BoundSink, CredentialSink, CredentialStore, TokenStore};
use crate::providers::finanzguru::FinanzguruClient;
use anyhow::Result;
use std::sync::Arc;
use tracing::debug;

/// Builds a client for the configured connection from its stored credential.
///
/// Refreshed credentials are written back to `store` under the same id.
pub async fn open_connection(
    config: &AppConfig,
    store: Arc<dyn CredentialStore>,
) -> Result<Arc<FinanzguruClient>> {
    let connection_id = config.connection_id();
    let Some(credential) = store.load(&connection_id).await? else {
        anyhow::bail!(
            "No credential stored for {}; run `finanzguru login` first",
            config.email
        );
    };
    debug!(connection_id, expires_at = %credential.expires_at, "Loaded stored credential");

    let sink: Arc<dyn CredentialSink> = Arc::new(BoundSink::new(store, connection_id));
    let tokens = TokenStore::new(Some(credential), Some(sink));
    let client = FinanzguruClient::with_timeout(&config.base_url, tokens, config.request_timeout())?;
    Ok(Arc::new(client))
}
