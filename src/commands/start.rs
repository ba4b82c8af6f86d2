use anyhow::Result;
use colored::Colorize;
use std::path::Path;
use tracing::info;
use webtrack::{config, server};

/// Execute the start command: load configuration and run the server until
/// a shutdown signal arrives.
pub async fn execute(config_path: &Path) -> Result<()> {
    println!("{}", "Starting webtrack...".green());

    let cfg = config::load_config(config_path)?;
    info!("Configuration loaded from {}", config_path.display());

    // Blocks until shutdown
    server::start_server(cfg).await?;

    Ok(())
}
