//! Server startup and graceful shutdown

use anyhow::Result;
use axum::Router;
use rowlens_core::Config;

/// Bind the listener and serve until the process is told to stop. Shutdown
/// is graceful: in-flight requests, including open SSE streams, get to run
/// to completion before the server returns.
pub async fn start_server(config: &Config, app: Router) -> Result<()> {
    let addr = format!("0.0.0.0:{}", config.server_port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!(
        addr = %addr,
        max_file_size_mb = config.max_file_size_mb(),
        upload_folder = %config.upload_folder.display(),
        "Server ready and accepting connections"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let signal = wait_for_termination().await;
            tracing::info!(signal, "Shutdown signal received, draining connections");
        })
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

/// Resolve once a termination request arrives: SIGINT (Ctrl+C) everywhere,
/// SIGTERM additionally on Unix. Returns the signal name for the shutdown
/// log line.
///
/// Handler registration happens once at startup; if it fails there is no
/// safe way to stop the process later, so that error is fatal.
async fn wait_for_termination() -> &'static str {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigterm =
            signal(SignalKind::terminate()).expect("SIGTERM handler registration failed");

        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                result.expect("SIGINT handler registration failed");
                "SIGINT"
            }
            _ = sigterm.recv() => "SIGTERM",
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c()
            .await
            .expect("Ctrl+C handler registration failed");
        "ctrl-c"
    }
}
