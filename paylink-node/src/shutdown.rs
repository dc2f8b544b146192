//! Shutdown signaling.

use tokio::sync::broadcast;

/// Broadcast-based shutdown signal shared by node tasks.
///
/// Cloning hands out another trigger handle; subscribe before triggering,
/// the signal is not replayed to late subscribers.
#[derive(Clone)]
pub struct Shutdown {
    tx: broadcast::Sender<()>,
}

impl Shutdown {
    /// Create an untriggered shutdown signal.
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1);
        Self { tx }
    }

    /// Request shutdown. A no-op when nothing is listening yet.
    pub fn trigger(&self) {
        let _ = self.tx.send(());
    }

    /// Obtain a receiver that resolves once shutdown is requested.
    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.tx.subscribe()
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

/// Resolve when the process receives SIGINT or SIGTERM.
pub async fn os_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut interrupt =
            signal(SignalKind::interrupt()).expect("SIGINT handler installation failed");
        let mut terminate =
            signal(SignalKind::terminate()).expect("SIGTERM handler installation failed");

        let name = tokio::select! {
            _ = interrupt.recv() => "SIGINT",
            _ = terminate.recv() => "SIGTERM",
        };
        tracing::info!(signal = name, "shutdown signal received");
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c()
            .await
            .expect("ctrl-c handler installation failed");
        tracing::info!(signal = "ctrl-c", "shutdown signal received");
    }
}
