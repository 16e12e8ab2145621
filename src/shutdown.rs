//! Termination signal handling.
//!
//! A background task turns SIGINT / SIGTERM into a cancelled
//! [`CancellationToken`]; everything that must stop on shutdown watches a clone
//! of that token.

use tokio::signal;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// Spawn the signal listener. It cancels `token` on the first signal and exits
/// quietly if the token is cancelled by someone else first.
pub fn spawn_signal_listener(token: CancellationToken) -> JoinHandle<()> {
    let handle = tokio::spawn(async move {
        tokio::select! {
            name = wait_for_signal() => {
                info!(signal = name, "Received signal, initiating shutdown");
                token.cancel();
            }
            _ = token.cancelled() => {
                debug!("Token cancelled, exiting signal listener");
            }
        }
    });

    debug!("Signal listener set up");
    handle
}

/// Resolves with the signal name once SIGINT or SIGTERM arrives
async fn wait_for_signal() -> &'static str {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => "SIGINT",
            Err(e) => {
                error!("Failed to listen for SIGINT: {}", e);
                std::future::pending().await
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                "SIGTERM"
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending().await
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<&'static str>();

    tokio::select! {
        name = ctrl_c => name,
        name = terminate => name,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_listener_exits_when_token_cancelled() {
        let token = CancellationToken::new();
        let handle = spawn_signal_listener(token.clone());

        token.cancel();

        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("listener should stop after cancellation")
            .expect("listener task should not panic");
    }

    #[tokio::test]
    async fn test_listener_keeps_running_without_signal() {
        let token = CancellationToken::new();
        let handle = spawn_signal_listener(token.clone());

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!handle.is_finished());
        assert!(!token.is_cancelled());

        handle.abort();
    }
}
