use super::{open_connection, ui};
use crate::coordinator::{Coordinator, UpdateStatus};
use crate::core::config::AppConfig;
use crate::core::CredentialStore;
use anyhow::Result;
use std::sync::Arc;
use tracing::info;

/// Polls until Ctrl-C or until the session needs a new login.
pub async fn run(config: &AppConfig, store: Arc<dyn CredentialStore>) -> Result<()> {
    let client = open_connection(config, store).await?;
    let coordinator = Coordinator::new(client, config.update_interval(), &config.currency);
    let mut updates = coordinator.subscribe();
    info!(
        interval_minutes = config.update_interval_minutes,
        "Watching Finanzguru overview"
    );

    let printer = async {
        while updates.changed().await.is_ok() {
            let state = updates.borrow_and_update().clone();
            match (&state.status, &state.snapshot) {
                (UpdateStatus::Ok, Some(snapshot)) => {
                    println!("{}", ui::render_snapshot(snapshot, &config.currency));
                }
                (UpdateStatus::UpdateFailed(message), _) => {
                    let line = format!("Update failed, retrying next cycle: {message}");
                    eprintln!("{}", ui::style_text(&line, ui::StyleType::Error));
                }
                _ => {}
            }
        }
    };
    let shutdown = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    let status = tokio::select! {
        status = coordinator.run_until(shutdown) => status,
        _ = printer => coordinator.state().status,
    };

    match status {
        UpdateStatus::ReauthRequired(message) => {
            anyhow::bail!("Re-authentication required ({message}); run `finanzguru login`")
        }
        _ => Ok(()),
    }
}
