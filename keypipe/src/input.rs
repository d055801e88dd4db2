//! Input reader - pulls one byte at a time off the terminal and fans it out.

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite};

use crate::bridge::protocol::Message;
use crate::bridge::transport::ChannelSender;
use crate::error::PipelineError;
use crate::shutdown::CancellationToken;

pub struct InputReader<I, W1, W2> {
    terminal: I,
    to_render: ChannelSender<W1>,
    to_translate: ChannelSender<W2>,
}

impl<I, W1, W2> InputReader<I, W1, W2>
where
    I: AsyncRead + Unpin,
    W1: AsyncWrite + Unpin,
    W2: AsyncWrite + Unpin,
{
    pub fn new(terminal: I, to_render: ChannelSender<W1>, to_translate: ChannelSender<W2>) -> Self {
        Self {
            terminal,
            to_render,
            to_translate,
        }
    }

    /// Read and forward until cancelled.
    ///
    /// Each byte goes to the renderer first, then the translator, before the next
    /// read. End of input returns [`PipelineError::InputClosed`] and drops both
    /// senders, so downstream workers drain what they already have and stop.
    pub async fn run(mut self, cancel: CancellationToken) -> Result<(), PipelineError> {
        let mut byte = [0u8; 1];

        loop {
            let n = tokio::select! {
                biased;

                _ = cancel.cancelled() => {
                    tracing::debug!("Input reader cancelled");
                    return Ok(());
                }

                read = self.terminal.read(&mut byte) => read.map_err(PipelineError::TerminalRead)?,
            };

            if n == 0 {
                tracing::debug!("Terminal input reached end of file");
                return Err(PipelineError::InputClosed);
            }

            let msg = Message::raw_char(byte[0]);
            tracing::trace!(byte = byte[0], "Read keystroke");

            tokio::select! {
                biased;

                _ = cancel.cancelled() => return Ok(()),
                sent = self.to_render.send(msg.clone()) => sent?,
            }
            tokio::select! {
                biased;

                _ = cancel.cancelled() => return Ok(()),
                sent = self.to_translate.send(msg) => sent?,
            }
        }
    }
}
