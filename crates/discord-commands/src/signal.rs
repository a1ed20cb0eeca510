//! Shutdown notification: the caller's cancellation token or an OS signal,
//! whichever fires first, consumed once.

use std::future::Future;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Which source asked the bot to stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownReason {
    Cancelled,
    Signal,
}

/// Wait until `token` is cancelled or `signal` resolves.
///
/// A token cancelled before the call wins even if the signal is also ready.
pub async fn shutdown_requested(
    token: &CancellationToken,
    signal: impl Future<Output = ()>,
) -> ShutdownReason {
    tokio::select! {
        biased;
        _ = token.cancelled() => ShutdownReason::Cancelled,
        _ = signal => ShutdownReason::Signal,
    }
}

/// Resolves on SIGINT or, on Unix, SIGTERM.
///
/// A source whose handler cannot be installed never resolves; the other one
/// and the caller's token still end the wait.
pub async fn os_signal() {
    let interrupt = async {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("signal received: SIGINT"),
            Err(error) => {
                warn!(error = %error, "Failed to install SIGINT handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
                info!("signal received: SIGTERM");
            }
            Err(error) => {
                warn!(error = %error, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = interrupt => {}
        _ = terminate => {}
    }
}
