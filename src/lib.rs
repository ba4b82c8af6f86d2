pub mod config;
pub mod entry;
pub mod error;
pub mod gate;
pub mod handlers;
pub mod metrics;
pub mod server;
pub mod signals;
pub mod subnet;
pub mod whitelist;
pub mod writer;

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Initialize tracing/logging
///
/// Note: this can only be called once per process.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true))
        .init();
}
