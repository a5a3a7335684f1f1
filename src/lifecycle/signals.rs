//! OS signal handling.

/// Resolve on Ctrl+C (SIGINT).
///
/// If the handler cannot be installed the error is logged and the future
/// never resolves, leaving shutdown to other triggers.
pub async fn wait_for_shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("Ctrl+C received, shutting down"),
        Err(e) => {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    }
}
