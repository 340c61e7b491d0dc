use edu_models::ServerConfig;
use tokio::runtime::{Builder, Runtime};
use tokio::signal;
use tracing::{info, warn};

/// Multi-threaded runtime sized by `server.workers`.
pub fn build_runtime(server: &ServerConfig) -> std::io::Result<Runtime> {
    Builder::new_multi_thread()
        .worker_threads(server.workers.max(1))
        .thread_name("educonnect-worker")
        .enable_all()
        .build()
}

/// Resolves on Ctrl+C or, on Unix, SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            warn!("Unable to listen for Ctrl+C: {}", err);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                warn!("Unable to listen for SIGTERM: {}", err);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("Received shutdown signal");
}
