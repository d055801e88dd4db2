//! Translator - the edit buffer state machine and the worker that drives it.
//!
//! Sentinel bytes:
//!
//! | Byte | Effect |
//! |------|--------|
//! | `a`  | write `z` |
//! | `X`  | backspace (floor at 0) |
//! | `K`  | clear, then seed with `K` |
//! | `E`  | write `E`, commit, clear |
//! | `T`  | graceful shutdown |
//! | 0x0B | abrupt shutdown |
//!
//! Any other byte is written literally.

use tokio::io::{AsyncRead, AsyncWrite};

use crate::bridge::protocol::{MESSAGE_SIZE, Message};
use crate::bridge::transport::{ChannelReceiver, ChannelSender};
use crate::error::PipelineError;
use crate::shutdown::{Shutdown, ShutdownMode};

pub const REPLACE_FROM: u8 = b'a';
pub const REPLACE_TO: u8 = b'z';
pub const BACKSPACE: u8 = b'X';
pub const KILL: u8 = b'K';
pub const COMMIT: u8 = b'E';
pub const TERMINATE: u8 = b'T';
/// Ctrl-K.
pub const FORCE_TERMINATE: u8 = 0x0b;

/// Smallest capacity that can hold the kill seed with the cursor still in range.
pub const MIN_CAPACITY: usize = 2;

/// A literal write was refused because the cursor would reach capacity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("edit buffer full ({capacity} bytes), dropped {byte:#04x}")]
pub struct BufferFull {
    pub byte: u8,
    pub capacity: usize,
}

/// Ordered bytes plus a write cursor.
///
/// The cursor is always the content length and stays in `0..capacity`, so the
/// commit sentinel always has room.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditBuffer {
    bytes: Vec<u8>,
    capacity: usize,
}

impl Default for EditBuffer {
    fn default() -> Self {
        Self::new(MESSAGE_SIZE)
    }
}

impl EditBuffer {
    /// Capacity is clamped to `MIN_CAPACITY..=MESSAGE_SIZE`.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.clamp(MIN_CAPACITY, MESSAGE_SIZE);
        Self {
            bytes: Vec::with_capacity(capacity),
            capacity,
        }
    }

    pub fn cursor(&self) -> usize {
        self.bytes.len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn contents(&self) -> &[u8] {
        &self.bytes
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Write at the cursor and advance it.
    pub fn write(&mut self, byte: u8) -> Result<(), BufferFull> {
        if self.bytes.len() + 1 >= self.capacity {
            return Err(BufferFull {
                byte,
                capacity: self.capacity,
            });
        }
        self.bytes.push(byte);
        Ok(())
    }

    /// Clear the byte before the cursor and step back. No-op at 0.
    pub fn backspace(&mut self) {
        self.bytes.pop();
    }

    /// Drop everything and leave exactly `seed` with the cursor at 1.
    pub fn kill(&mut self, seed: u8) {
        self.bytes.clear();
        self.bytes.push(seed);
    }

    /// Write `terminator` at the cursor, hand back the contents, and reset to empty.
    pub fn commit(&mut self, terminator: u8) -> Vec<u8> {
        self.bytes.push(terminator);
        let committed = std::mem::replace(&mut self.bytes, Vec::with_capacity(self.capacity));
        debug_assert!(committed.len() <= self.capacity);
        committed
    }
}

/// Outcome of feeding one byte to the [`Translator`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// A byte was written (literal or replaced).
    Wrote(u8),
    /// Backspace applied.
    Erased,
    /// Buffer reset to the kill seed.
    Killed,
    /// Write refused, buffer unchanged.
    Rejected(BufferFull),
    /// Buffer committed; send this content downstream.
    Commit(Vec<u8>),
    /// Stop the pipeline.
    Shutdown(ShutdownMode),
    /// A shutdown sentinel was already processed; input ignored.
    Halted,
}

/// The translation state machine.
///
/// Owns the edit buffer outright; the only way to mutate it is [`Translator::apply`].
#[derive(Debug, Default)]
pub struct Translator {
    buffer: EditBuffer,
    halted: Option<ShutdownMode>,
}

impl Translator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buffer: EditBuffer::new(capacity),
            halted: None,
        }
    }

    pub fn buffer(&self) -> &EditBuffer {
        &self.buffer
    }

    pub fn halted(&self) -> Option<ShutdownMode> {
        self.halted
    }

    /// Process exactly one input byte.
    pub fn apply(&mut self, byte: u8) -> Transition {
        if self.halted.is_some() {
            return Transition::Halted;
        }

        match byte {
            REPLACE_FROM => self.write(REPLACE_TO),
            BACKSPACE => {
                self.buffer.backspace();
                Transition::Erased
            }
            KILL => {
                self.buffer.kill(KILL);
                Transition::Killed
            }
            COMMIT => Transition::Commit(self.buffer.commit(COMMIT)),
            TERMINATE => self.halt(ShutdownMode::Graceful),
            FORCE_TERMINATE => self.halt(ShutdownMode::Abrupt),
            other => self.write(other),
        }
    }

    fn write(&mut self, byte: u8) -> Transition {
        match self.buffer.write(byte) {
            Ok(()) => Transition::Wrote(byte),
            Err(full) => Transition::Rejected(full),
        }
    }

    fn halt(&mut self, mode: ShutdownMode) -> Transition {
        self.halted = Some(mode);
        Transition::Shutdown(mode)
    }
}

/// Worker that feeds raw characters through a [`Translator`] and ships commits.
pub struct TranslatorWorker<R, W> {
    translator: Translator,
    input: ChannelReceiver<R>,
    commits: ChannelSender<W>,
}

impl<R, W> TranslatorWorker<R, W>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    pub fn new(
        translator: Translator,
        input: ChannelReceiver<R>,
        commits: ChannelSender<W>,
    ) -> Self {
        Self {
            translator,
            input,
            commits,
        }
    }

    /// Run until a shutdown sentinel, cancellation, or the input channel closes.
    ///
    /// A shutdown sentinel triggers `shutdown` with its mode and stops reading
    /// immediately; nothing after it is consumed.
    pub async fn run(mut self, shutdown: Shutdown) -> Result<Translator, PipelineError> {
        let cancel = shutdown.token();

        loop {
            let byte = tokio::select! {
                biased;

                _ = cancel.cancelled() => {
                    tracing::debug!("Translator cancelled");
                    break;
                }

                received = self.input.receive_raw_char() => match received? {
                    Some(byte) => byte,
                    None => {
                        tracing::debug!("Translator input closed");
                        break;
                    }
                },
            };

            match self.translator.apply(byte) {
                Transition::Commit(content) => {
                    tracing::debug!(len = content.len(), "Committing buffer");
                    tokio::select! {
                        biased;

                        _ = cancel.cancelled() => break,
                        sent = self.commits.send(Message::commit(content)) => sent?,
                    }
                }
                Transition::Rejected(full) => {
                    tracing::warn!(error = %full, "Edit buffer overflow, write rejected");
                }
                Transition::Shutdown(mode) => {
                    shutdown.trigger(mode);
                    break;
                }
                Transition::Halted => break,
                other => {
                    tracing::trace!(
                        transition = ?other,
                        cursor = self.translator.buffer().cursor(),
                        "Applied input"
                    );
                }
            }
        }

        Ok(self.translator)
    }
}
