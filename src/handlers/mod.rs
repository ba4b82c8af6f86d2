pub mod status;
pub mod track;
pub mod whitelist;

use std::sync::Arc;

use crate::{whitelist::WhitelistStore, writer::LogWriter};

/// Shared state for the request handlers
#[derive(Clone)]
pub struct AppState {
    pub whitelist: Arc<WhitelistStore>,
    pub writer: LogWriter,
}
