//! Shutdown coordination for the proxy.

use std::fmt;

use tokio::sync::broadcast;

/// Why the proxy is stopping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownReason {
    /// SIGINT / Ctrl-C.
    Interrupt,
    /// SIGTERM.
    Terminate,
    /// Stopped from code (tests, embedding).
    Requested,
}

impl fmt::Display for ShutdownReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ShutdownReason::Interrupt => "interrupt",
            ShutdownReason::Terminate => "terminate",
            ShutdownReason::Requested => "requested",
        })
    }
}

/// Coordinator for graceful shutdown.
///
/// Cloneable; every clone triggers the same set of [`ShutdownSignal`]s.
#[derive(Clone)]
pub struct Shutdown {
    tx: broadcast::Sender<ShutdownReason>,
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1);
        Self { tx }
    }

    /// A one-shot signal that resolves on the next trigger.
    pub fn signal(&self) -> ShutdownSignal {
        ShutdownSignal {
            rx: self.tx.subscribe(),
        }
    }

    /// Stop the server for an explicit, non-signal reason.
    pub fn trigger(&self) {
        self.trigger_with(ShutdownReason::Requested);
    }

    pub fn trigger_with(&self, reason: ShutdownReason) {
        let _ = self.tx.send(reason);
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

/// Receiving side handed to the HTTP server.
pub struct ShutdownSignal {
    rx: broadcast::Receiver<ShutdownReason>,
}

impl ShutdownSignal {
    /// Wait for the trigger. A dropped coordinator counts as `Requested`.
    pub async fn recv(mut self) -> ShutdownReason {
        self.rx.recv().await.unwrap_or(ShutdownReason::Requested)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_trigger_reaches_every_signal() {
        let shutdown = Shutdown::new();
        let a = shutdown.signal();
        let b = shutdown.clone().signal();

        shutdown.trigger_with(ShutdownReason::Terminate);

        assert_eq!(a.recv().await, ShutdownReason::Terminate);
        assert_eq!(b.recv().await, ShutdownReason::Terminate);
    }

    #[tokio::test]
    async fn test_dropped_coordinator_releases_signal() {
        let shutdown = Shutdown::new();
        let signal = shutdown.signal();
        drop(shutdown);

        assert_eq!(signal.recv().await, ShutdownReason::Requested);
    }

    #[test]
    fn test_trigger_without_signals_is_harmless() {
        Shutdown::new().trigger();
    }
}
