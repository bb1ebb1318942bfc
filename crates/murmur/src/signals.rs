//! Shutdown signal handling.

use tokio::signal;
use tracing::info;

/// Returns once SIGINT or SIGTERM (Ctrl+C on Windows) is received.
pub async fn wait_for_shutdown() -> Result<(), Box<dyn std::error::Error>> {
    #[cfg(unix)]
    {
        use signal::unix::{signal, SignalKind};

        let mut sigint = signal(SignalKind::interrupt())?;
        let mut sigterm = signal(SignalKind::terminate())?;

        tokio::select! {
            _ = sigint.recv() => {
                info!("📡 Received SIGINT");
            }
            _ = sigterm.recv() => {
                info!("📡 Received SIGTERM");
            }
        }
    }

    #[cfg(windows)]
    {
        signal::ctrl_c().await?;
        info!("📡 Received Ctrl+C");
    }

    Ok(())
}
