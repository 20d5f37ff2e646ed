use crate::core::CredentialStore;
use crate::core::config::AppConfig;
use anyhow::Result;
use std::sync::Arc;
use tracing::info;

/// Forgets the stored credential of the configured connection.
pub async fn run(config: &AppConfig, store: Arc<dyn CredentialStore>) -> Result<()> {
    let connection_id = config.connection_id();
    if store.remove(&connection_id).await? {
        info!(connection_id, "Removed connection");
        println!("Removed stored credential for {}", config.email);
    } else {
        println!("No stored credential for {}", config.email);
    }
    Ok(())
}
