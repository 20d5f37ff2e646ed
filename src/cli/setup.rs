use crate::core::config::AppConfig;
use anyhow::{Context, Result};
use console::style;
use std::path::{Path, PathBuf};
use tracing::info;

const EXAMPLE_CONFIG: &str = include_str!("../../docs/example_config.yaml");
const EXAMPLE_EMAIL: &str = "jane.doe@example.org";

/// Writes a starter config to `config_path`, or to the platform config dir
/// when none is given. Returns where the file went.
pub fn setup(config_path: Option<&str>, email: Option<&str>) -> Result<PathBuf> {
    let path = match config_path {
        Some(path) => PathBuf::from(path),
        None => AppConfig::default_config_path()?,
    };
    write_config(&path, &render_config(email))?;

    println!(
        "{} Created configuration at {}",
        style("✓").green().bold(),
        path.display()
    );
    println!("Next: run `finanzguru login` to connect the account.");
    Ok(path)
}

/// The example config, with `email` in place of the placeholder address.
pub fn render_config(email: Option<&str>) -> String {
    match email.map(str::trim).filter(|email| !email.is_empty()) {
        Some(email) => EXAMPLE_CONFIG.replacen(
            &format!("\"{EXAMPLE_EMAIL}\""),
            &format!("{email:?}"),
            1,
        ),
        None => EXAMPLE_CONFIG.to_string(),
    }
}

fn write_config(path: &Path, content: &str) -> Result<()> {
    if path.exists() {
        anyhow::bail!("Configuration file already exists at {}", path.display());
    }

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }
    std::fs::write(path, content)
        .with_context(|| format!("Failed to write config file to {}", path.display()))?;

    info!(path = %path.display(), "Created default configuration");
    Ok(())
}
