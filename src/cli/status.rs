use super::{open_connection, ui};
use crate::coordinator::Coordinator;
use crate::core::config::AppConfig;
use crate::core::{ApiError, CredentialStore};
use anyhow::Result;
use std::sync::Arc;

/// Turns a failed cycle into the message the user acts on.
pub(crate) fn describe_failure(error: &ApiError) -> anyhow::Error {
    match error {
        ApiError::Authentication(_) => {
            anyhow::anyhow!("Re-authentication required ({error}); run `finanzguru login`")
        }
        ApiError::Transient(_) => anyhow::anyhow!("Update failed: {error}"),
    }
}

/// Fetches one snapshot and prints it.
pub async fn run(config: &AppConfig, store: Arc<dyn CredentialStore>, json: bool) -> Result<()> {
    let client = open_connection(config, store).await?;
    let coordinator = Coordinator::new(client, config.update_interval(), &config.currency);

    let pb = ui::new_spinner("Fetching overview...");
    let result = coordinator.first_refresh().await;
    pb.finish_and_clear();

    let snapshot = result.map_err(|e| describe_failure(&e))?;
    if json {
        println!("{}", serde_json::to_string_pretty(snapshot.as_ref())?);
    } else {
        println!("{}", ui::render_snapshot(&snapshot, &config.currency));
    }
    Ok(())
}
