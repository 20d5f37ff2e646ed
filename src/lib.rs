pub mod cli;
pub mod coordinator;
pub mod core;
pub mod providers;
pub mod store;

use crate::cli::login::LoginCredentials;
use crate::core::CredentialStore;
use crate::core::config::AppConfig;
use crate::store::disk::FjallCredentialStore;
use anyhow::Result;
use std::sync::Arc;
use tracing::debug;

pub enum AppCommand {
    Status { json: bool },
    Watch,
    Login(LoginCredentials),
    Logout,
}

pub async fn run_command(command: AppCommand, config_path: Option<&str>) -> Result<()> {
    let config = match config_path {
        Some(path) => AppConfig::load_from_path(path)?,
        None => AppConfig::load()?,
    };
    debug!("Loaded config: {config:#?}");

    let data_path = config.default_data_path()?;
    let store: Arc<dyn CredentialStore> =
        Arc::new(FjallCredentialStore::open(&data_path)?);

    match command {
        AppCommand::Status { json } => cli::status::run(&config, store, json).await,
        AppCommand::Watch => cli::watch::run(&config, store).await,
        AppCommand::Login(credentials) => cli::login::run(&config, store, credentials).await,
        AppCommand::Logout => cli::logout::run(&config, store).await,
    }
}
