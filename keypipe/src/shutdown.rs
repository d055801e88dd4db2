//! Pipeline-wide shutdown.
//!
//! Every worker's blocking point selects on one shared [`CancellationToken`]. The
//! first trigger records a [`ShutdownMode`]; graceful mode restores the terminal
//! before the token is cancelled, abrupt mode leaves it in raw mode.

use std::sync::{Arc, OnceLock};

pub use tokio_util::sync::CancellationToken;

use crate::terminal::TerminalMode;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownMode {
    /// Terminate sentinel or a termination signal. Terminal mode is restored.
    Graceful,
    /// Force-terminate sentinel. Terminal mode is deliberately left altered.
    Abrupt,
}

impl ShutdownMode {
    pub fn restores_terminal(&self) -> bool {
        matches!(self, Self::Graceful)
    }

    /// Line printed to stdout once the pipeline has stopped.
    pub fn notice(&self) -> &'static str {
        match self {
            Self::Graceful => {
                "\rDefault linux terminal processing has been restored... exiting program\n\r"
            }
            Self::Abrupt => "\rAbnormal interruption detected!",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Graceful => "graceful",
            Self::Abrupt => "abrupt",
        }
    }
}

/// Shared handle that stops all workers.
#[derive(Clone)]
pub struct Shutdown {
    token: CancellationToken,
    mode: Arc<OnceLock<ShutdownMode>>,
    terminal: Arc<dyn TerminalMode>,
}

impl Shutdown {
    pub fn new(terminal: Arc<dyn TerminalMode>) -> Self {
        Self {
            token: CancellationToken::new(),
            mode: Arc::new(OnceLock::new()),
            terminal,
        }
    }

    /// Stop the pipeline with the given mode.
    ///
    /// Returns false if a mode was already recorded; the first trigger wins.
    pub fn trigger(&self, mode: ShutdownMode) -> bool {
        if self.mode.set(mode).is_err() {
            tracing::debug!(mode = mode.as_str(), "Shutdown already triggered");
            return false;
        }

        tracing::info!(mode = mode.as_str(), "Shutting down pipeline");

        if mode.restores_terminal()
            && let Err(e) = self.terminal.restore()
        {
            tracing::error!(error = %e, "Failed to restore terminal mode");
        }

        self.token.cancel();
        true
    }

    /// Stop the pipeline without recording a mode (worker failure).
    pub fn abort(&self) {
        self.token.cancel();
    }

    pub fn mode(&self) -> Option<ShutdownMode> {
        self.mode.get().copied()
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }
}
