use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// One year, in minutes: the upper bound for the rotation interval.
pub const MAX_ROTATION_INTERVAL_MINUTES: u32 = 525_600;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub server: ServerConfig,
    pub tracking: TrackingConfig,
    pub whitelist: WhitelistConfig,
    pub metrics: MetricsConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub log_format: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TrackingConfig {
    /// Directory the rotated log files are written to.
    pub log_directory: PathBuf,
    /// Log file name prefix, e.g. "tracking-".
    pub file_prefix: String,
    /// Active file age at which the writer rotates, in minutes.
    pub rotation_interval_minutes: u32,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WhitelistConfig {
    /// Persisted whitelist file: one canonical subnet per line.
    pub path: PathBuf,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MetricsConfig {
    pub enabled: bool,
    pub endpoint: String,
}

/// Load configuration from the given TOML file plus `WEBTRACK__`-prefixed
/// environment overrides, then validate it. Validation failures are fatal:
/// the service refuses to start on an invalid rotation interval.
pub fn load_config(path: &Path) -> anyhow::Result<Config> {
    let config = config::Config::builder()
        .add_source(config::File::from(path))
        .add_source(config::Environment::with_prefix("WEBTRACK").separator("__"))
        .build()?;

    let cfg: Config = config.try_deserialize()?;
    validate_config(&cfg)?;

    Ok(cfg)
}

fn validate_config(cfg: &Config) -> anyhow::Result<()> {
    if cfg.tracking.rotation_interval_minutes == 0 {
        anyhow::bail!("tracking.rotation_interval_minutes must be positive");
    }
    if cfg.tracking.rotation_interval_minutes > MAX_ROTATION_INTERVAL_MINUTES {
        anyhow::bail!(
            "tracking.rotation_interval_minutes cannot exceed one year ({} minutes)",
            MAX_ROTATION_INTERVAL_MINUTES
        );
    }
    if cfg.tracking.file_prefix.is_empty() {
        anyhow::bail!("tracking.file_prefix cannot be empty");
    }
    if cfg.whitelist.path.as_os_str().is_empty() {
        anyhow::bail!("whitelist.path cannot be empty");
    }

    Ok(())
}
