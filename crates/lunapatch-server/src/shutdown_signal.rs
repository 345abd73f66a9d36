//! Signal handling for graceful shutdown.

use tokio::signal;
use tracing::info;

/// Resolves on Ctrl+C or SIGTERM, whichever arrives first.
pub(super) async fn shutdown_signal() {
    let ctrl_c = async {
        if signal::ctrl_c().await.is_err() {
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    let source = tokio::select! {
        _ = ctrl_c => "ctrl-c",
        _ = terminate => "terminate",
    };
    info!(source, "shutdown requested");
}
