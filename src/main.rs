use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::info;

use roomd::config::Config;
use roomd::engine::Engine;
use roomd::http::{self, AppState};
use roomd::{compactor, observability};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let config = Config::from_env();
    observability::init(config.metrics_port);

    // Ensure data directory exists
    std::fs::create_dir_all(&config.data_dir)?;

    let engine = Arc::new(Engine::new(config.wal_path())?);
    info!("replayed {} schedules", engine.schedule_count());

    tokio::spawn(compactor::run_compactor(engine.clone(), config.compact_threshold));

    let app = http::router(AppState::new(engine, config.environment));

    let addr = config.addr();
    let listener = TcpListener::bind(&addr).await?;
    info!("roomd listening on {addr}");
    info!("  data_dir: {}", config.data_dir.display());
    info!("  environment: {:?}", config.environment);
    info!(
        "  metrics: {}",
        config
            .metrics_port
            .map_or("disabled".to_string(), |p| format!("http://0.0.0.0:{p}/metrics"))
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("roomd stopped");
    Ok(())
}

/// Resolves on ctrl-c or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("failed to listen for ctrl-c: {e}");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("failed to register SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
    info!("shutdown signal received, draining requests");
}
