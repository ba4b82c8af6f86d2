use anyhow::Result;
use colored::Colorize;
use std::path::Path;
use webtrack::config;

/// Execute the config show command
pub fn show(config_path: &Path) -> Result<()> {
    let cfg = config::load_config(config_path)?;

    println!("{}", "Current Configuration:".green().bold());
    println!();
    println!("{}", toml::to_string_pretty(&cfg)?);

    Ok(())
}

/// Execute the config validate command
pub fn validate(config_path: &Path) -> Result<()> {
    let cfg = config::load_config(config_path)?;

    println!("{}", "✓ Configuration is valid".green());
    println!();
    println!("{}", "Summary:".bold());
    println!("  Listen: {}:{}", cfg.server.host, cfg.server.port);
    println!(
        "  Rotation interval: {} min",
        cfg.tracking.rotation_interval_minutes
    );
    println!("  Log directory: {}", cfg.tracking.log_directory.display());
    println!("  Whitelist file: {}", cfg.whitelist.path.display());

    Ok(())
}
