//! IP whitelist access gate.
//!
//! Runs before any other handling of a gated request. The only input is the
//! peer address supplied by the transport layer (`ConnectInfo`); a missing
//! address or any lookup failure is treated as not whitelisted
//! (fail-closed). There is no retry and no state beyond the whitelist
//! lookup.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::{ConnectInfo, Request, State},
    middleware::Next,
    response::Response,
};
use tracing::{debug, warn};

use crate::{error::AppError, metrics, whitelist::WhitelistStore};

/// Access gate middleware: forward whitelisted peers unchanged, reject the
/// rest with 403 before they reach downstream handling.
pub async fn access_gate(
    State(whitelist): State<Arc<WhitelistStore>>,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let peer = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|info| info.0.ip());

    match peer {
        Some(addr) if whitelist.contains(&addr) => {
            debug!(peer = %addr, "Request from whitelisted address");
            Ok(next.run(req).await)
        }
        Some(addr) => {
            warn!(peer = %addr, "Forbidden request from non-whitelisted address");
            metrics::record_rejected(&addr.to_string());
            Err(AppError::NotWhitelisted(addr.to_string()))
        }
        None => {
            // No transport address available: fail closed.
            warn!("Forbidden request with no peer address");
            metrics::record_rejected("unknown");
            Err(AppError::NotWhitelisted("unknown peer".to_string()))
        }
    }
}
