use std::io;
use tracing::warn;

/// Shutdown signals, registered when constructed so a signal that arrives
/// before [`ShutdownSignal::recv`] is awaited is not lost.
pub struct ShutdownSignal {
    #[cfg(unix)]
    interrupt: tokio::signal::unix::Signal,
    #[cfg(unix)]
    terminate: tokio::signal::unix::Signal,
}

impl ShutdownSignal {
    #[cfg(unix)]
    pub fn install() -> io::Result<Self> {
        use tokio::signal::unix::{signal, SignalKind};

        Ok(Self {
            interrupt: signal(SignalKind::interrupt())?,
            terminate: signal(SignalKind::terminate())?,
        })
    }

    #[cfg(not(unix))]
    pub fn install() -> io::Result<Self> {
        Ok(Self {})
    }

    /// Waits for SIGINT or SIGTERM.
    #[cfg(unix)]
    pub async fn recv(&mut self) -> io::Result<()> {
        tokio::select! {
            _ = self.interrupt.recv() => warn!("SIGINT received, initiating graceful shutdown"),
            _ = self.terminate.recv() => warn!("SIGTERM received, initiating graceful shutdown"),
        }
        Ok(())
    }

    /// Waits for Ctrl+C.
    #[cfg(not(unix))]
    pub async fn recv(&mut self) -> io::Result<()> {
        tokio::signal::ctrl_c().await?;
        warn!("Ctrl+C received, initiating graceful shutdown");
        Ok(())
    }
}
