use std::future::{Future, IntoFuture};
use std::time::Duration;

use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tracing::{info, warn};

/// Serves `app` until `signal` resolves, then lets in-flight requests drain
/// for at most `grace` before returning.
pub async fn serve<S>(
    listener: TcpListener,
    app: Router,
    signal: S,
    grace: Duration,
) -> std::io::Result<()>
where
    S: Future<Output = ()> + Send + 'static,
{
    let (draining_tx, mut draining_rx) = oneshot::channel();
    let server = axum::serve(listener, app).with_graceful_shutdown(async move {
        signal.await;
        let _ = draining_tx.send(());
    });
    let mut server = std::pin::pin!(server.into_future());

    tokio::select! {
        result = &mut server => return result,
        Ok(()) = &mut draining_rx => {
            info!(grace_secs = grace.as_secs(), "Shutdown signal received, draining connections");
        }
    }

    match tokio::time::timeout(grace, server).await {
        Ok(result) => result,
        Err(_) => {
            warn!("In-flight requests did not finish in time, shutting down anyway");
            Ok(())
        }
    }
}

/// Resolves on Ctrl-C, or SIGTERM on Unix.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl-C: {err}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                warn!("Failed to listen for SIGTERM: {err}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl-C"),
        _ = terminate => info!("Received SIGTERM"),
    }
}
