use anyhow::Result;
use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post},
    Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::{net::SocketAddr, sync::Arc};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::{
    config::Config,
    gate,
    handlers::{self, AppState},
    metrics,
    signals::setup_signal_handlers,
    whitelist::WhitelistStore,
    writer::LogWriter,
};

/// Start the tracking server
///
/// This function:
/// 1. Initializes metrics
/// 2. Loads the whitelist and spawns the log writer
/// 3. Sets up signal handlers (SIGTERM/SIGINT shutdown, SIGHUP whitelist reload)
/// 4. Serves requests with graceful shutdown, then drains the writer
pub async fn start_server(config: Config) -> Result<()> {
    info!("Initializing Prometheus metrics...");
    let metrics_handle = Arc::new(metrics::init_metrics());

    let whitelist = Arc::new(WhitelistStore::load(&config.whitelist.path)?);
    let (writer, writer_guard) = LogWriter::spawn(&config.tracking);

    let (shutdown_tx, signal_handle) = setup_signal_handlers(whitelist.clone());
    let mut shutdown_rx = shutdown_tx.subscribe();

    let app_state = AppState {
        whitelist: whitelist.clone(),
        writer,
    };

    let app = create_router(&config, app_state, whitelist, metrics_handle);

    let addr = SocketAddr::from((
        config.server.host.parse::<std::net::IpAddr>()?,
        config.server.port,
    ));

    info!("Starting webtrack on {}", addr);
    info!(
        "Configuration: rotation every {} min into {}, whitelist at {}",
        config.tracking.rotation_interval_minutes,
        config.tracking.log_directory.display(),
        config.whitelist.path.display(),
    );

    let listener = tokio::net::TcpListener::bind(addr).await?;

    // ConnectInfo supplies the peer address the access gate reads.
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async move {
        let _ = shutdown_rx.recv().await;
        info!("Shutdown signal received, draining connections...");
    })
    .await?;

    // One final synchronous drain: everything already enqueued reaches disk.
    writer_guard.shutdown().await;

    signal_handle.await?;
    info!("Server stopped gracefully");

    Ok(())
}

/// Create the axum router with all routes and middleware
///
/// Every tracking/admin route sits behind the IP whitelist gate; only the
/// health and metrics endpoints are public.
pub fn create_router(
    config: &Config,
    app_state: AppState,
    whitelist: Arc<WhitelistStore>,
    metrics_handle: Arc<PrometheusHandle>,
) -> Router {
    let gated_routes = Router::new()
        .route("/track", post(handlers::track::ingest))
        .route("/whitelist", get(handlers::whitelist::list))
        .route("/whitelist/add", post(handlers::whitelist::add))
        .route("/whitelist/remove", post(handlers::whitelist::remove))
        .layer(middleware::from_fn_with_state(whitelist, gate::access_gate))
        .with_state(app_state);

    let mut app = Router::new()
        .route("/health", get(handlers::status::health_check))
        .merge(gated_routes);

    if config.metrics.enabled {
        app = app.merge(
            Router::new()
                .route(
                    config.metrics.endpoint.as_str(),
                    get(handlers::status::metrics),
                )
                .with_state(metrics_handle),
        );
    }

    app
        // Tracking payloads are small; anything bigger is abuse.
        .layer(DefaultBodyLimit::max(64 * 1024))
        .layer(TraceLayer::new_for_http())
}
