//! OS signal handling.
//!
//! - SIGINT / SIGTERM → graceful shutdown
//! - SIGHUP → reopen the ASN database (after an external refresh)

use tokio::sync::mpsc;

use crate::lifecycle::{ReloadSignal, Shutdown};

/// Translate OS signals into shutdown and reload events until shutdown.
pub async fn listen(shutdown: Shutdown, reload_tx: mpsc::UnboundedSender<ReloadSignal>) {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let (mut term, mut hup) = match (signal(SignalKind::terminate()), signal(SignalKind::hangup())) {
            (Ok(term), Ok(hup)) => (term, hup),
            (Err(e), _) | (_, Err(e)) => {
                tracing::error!(error = %e, "Failed to install signal handlers, only Ctrl+C is handled");
                ctrl_c().await;
                shutdown.trigger();
                return;
            }
        };

        loop {
            tokio::select! {
                _ = ctrl_c() => break,
                _ = term.recv() => break,
                _ = hup.recv() => {
                    tracing::info!("SIGHUP received, reloading ASN database");
                    let _ = reload_tx.send(ReloadSignal::Database);
                }
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = reload_tx;
        ctrl_c().await;
    }

    tracing::info!("Shutdown signal received");
    shutdown.trigger();
}

async fn ctrl_c() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for Ctrl+C");
        std::future::pending::<()>().await;
    }
}
