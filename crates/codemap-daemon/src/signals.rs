//! Signal handling for graceful shutdown.

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
pub async fn wait_for_shutdown() {
    tokio::select! {
        _ = wait_for_sigint() => {
            tracing::info!("Received SIGINT");
        }
        _ = wait_for_sigterm() => {
            tracing::info!("Received SIGTERM");
        }
    }
}

async fn wait_for_sigint() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "Failed to listen for SIGINT");
        std::future::pending::<()>().await;
    }
}

/// Wait for SIGTERM signal
#[cfg(unix)]
async fn wait_for_sigterm() {
    use tokio::signal::unix::{signal, SignalKind};

    match signal(SignalKind::terminate()) {
        Ok(mut sigterm) => {
            sigterm.recv().await;
        }
        Err(e) => {
            tracing::warn!(error = %e, "Failed to register SIGTERM handler");
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_sigterm() {
    // On non-Unix platforms, just wait forever
    std::future::pending::<()>().await;
}
