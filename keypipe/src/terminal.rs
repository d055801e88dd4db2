//! Terminal mode collaborator.
//!
//! The pipeline never configures the terminal itself. The caller enables raw mode
//! before starting it, and the graceful shutdown path calls back into
//! [`TerminalMode::restore`].

use std::io::{self, IsTerminal};
use std::os::fd::AsFd;
use std::sync::{Arc, Mutex};

use nix::sys::termios::{self, InputFlags, SetArg, Termios};

use crate::error::TerminalError;

/// Switches the controlling terminal between raw and its original mode.
pub trait TerminalMode: Send + Sync {
    /// Disable line buffering, local echo, and CR translation.
    fn enable_raw(&self) -> Result<(), TerminalError>;

    /// Restore the attributes saved by `enable_raw`. No-op if raw mode was never enabled.
    fn restore(&self) -> Result<(), TerminalError>;
}

/// Raw mode on stdin via termios.
///
/// Applies `cfmakeraw` plus `IGNCR`: no canonical mode, no echo, no signal keys,
/// no output post-processing, and carriage returns dropped on input.
#[derive(Debug, Default)]
pub struct RawTerminal {
    original: Mutex<Option<Termios>>,
}

impl RawTerminal {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TerminalMode for RawTerminal {
    fn enable_raw(&self) -> Result<(), TerminalError> {
        let stdin = io::stdin();
        let mut attrs = termios::tcgetattr(stdin.as_fd()).map_err(TerminalError::GetAttributes)?;

        {
            let mut original = self.original.lock().map_err(|_| TerminalError::Poisoned)?;
            if original.is_none() {
                *original = Some(attrs.clone());
            }
        }

        termios::cfmakeraw(&mut attrs);
        attrs.input_flags.insert(InputFlags::IGNCR);

        termios::tcsetattr(stdin.as_fd(), SetArg::TCSANOW, &attrs)
            .map_err(TerminalError::SetAttributes)?;

        tracing::debug!("Raw terminal mode enabled");
        Ok(())
    }

    fn restore(&self) -> Result<(), TerminalError> {
        let original = self.original.lock().map_err(|_| TerminalError::Poisoned)?;

        if let Some(ref attrs) = *original {
            termios::tcsetattr(io::stdin().as_fd(), SetArg::TCSANOW, attrs)
                .map_err(TerminalError::SetAttributes)?;
            tracing::debug!("Terminal mode restored");
        }
        Ok(())
    }
}

/// Used when stdin is not a terminal (piped input, tests).
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopTerminal;

impl TerminalMode for NoopTerminal {
    fn enable_raw(&self) -> Result<(), TerminalError> {
        Ok(())
    }

    fn restore(&self) -> Result<(), TerminalError> {
        Ok(())
    }
}

/// Pick the collaborator for this process's stdin.
pub fn for_stdin() -> Arc<dyn TerminalMode> {
    if io::stdin().is_terminal() {
        Arc::new(RawTerminal::new())
    } else {
        tracing::debug!("stdin is not a terminal, leaving its mode alone");
        Arc::new(NoopTerminal)
    }
}
