/// Shutdown coordination
///
/// The server's main task parks here until the process is asked to
/// terminate. SIGINT and SIGTERM end the wait; SIGHUP is logged and
/// otherwise ignored. No draining happens: the caller exits the process
/// and in-flight calls are abandoned.

use std::fmt;
use tokio::sync::mpsc;
use tracing::{info, warn};

/// Exit status of a server stopped by a termination signal
pub const TERMINATED_EXIT_CODE: i32 = 1;

/// Signals the server reacts to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessSignal {
    /// SIGINT (Ctrl+C)
    Interrupt,
    /// SIGTERM
    Terminate,
    /// SIGHUP
    Hangup,
}

impl ProcessSignal {
    /// Whether the signal ends the process
    pub fn is_termination(self) -> bool {
        matches!(self, Self::Interrupt | Self::Terminate)
    }
}

impl fmt::Display for ProcessSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Interrupt => "SIGINT",
            Self::Terminate => "SIGTERM",
            Self::Hangup => "SIGHUP",
        };
        f.write_str(name)
    }
}

/// Register the signal handlers and forward every delivery into a channel
#[cfg(unix)]
pub fn forward_signals() -> std::io::Result<mpsc::Receiver<ProcessSignal>> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sighup = signal(SignalKind::hangup())?;

    let (tx, rx) = mpsc::channel(8);
    tokio::spawn(async move {
        loop {
            let received = tokio::select! {
                _ = sigterm.recv() => ProcessSignal::Terminate,
                _ = sigint.recv() => ProcessSignal::Interrupt,
                _ = sighup.recv() => ProcessSignal::Hangup,
            };
            if tx.send(received).await.is_err() {
                break;
            }
        }
    });

    info!("Signal handlers registered (SIGTERM, SIGINT, SIGHUP)");
    Ok(rx)
}

/// Fallback for non-Unix systems: only Ctrl+C is available
#[cfg(not(unix))]
pub fn forward_signals() -> std::io::Result<mpsc::Receiver<ProcessSignal>> {
    let (tx, rx) = mpsc::channel(8);
    tokio::spawn(async move {
        loop {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("Failed to listen for Ctrl+C: {}", e);
                break;
            }
            if tx.send(ProcessSignal::Interrupt).await.is_err() {
                break;
            }
        }
    });

    info!("Signal handler registered (Ctrl+C only on this platform)");
    Ok(rx)
}

/// Wait for the first terminating signal from `signals`
///
/// Returns `None` if the source closes first.
pub async fn next_termination(
    signals: &mut mpsc::Receiver<ProcessSignal>,
) -> Option<ProcessSignal> {
    while let Some(signal) = signals.recv().await {
        if signal.is_termination() {
            info!("Received {}, shutting down", signal);
            return Some(signal);
        }
        info!("Received {}, ignoring", signal);
    }

    warn!("Signal source closed");
    None
}

/// Block until `signals` delivers SIGINT or SIGTERM
///
/// `signals` comes from [`forward_signals`], registered before anything
/// is hosted so that an early SIGHUP cannot kill the process.
pub async fn wait_for_termination(
    signals: &mut mpsc::Receiver<ProcessSignal>,
) -> std::io::Result<ProcessSignal> {
    next_termination(signals)
        .await
        .ok_or_else(|| std::io::Error::other("signal handlers stopped"))
}
