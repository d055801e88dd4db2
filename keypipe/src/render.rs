//! Renderer - echoes raw keystrokes and prints committed buffers.

use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};

use crate::bridge::transport::ChannelReceiver;
use crate::error::{ChannelError, PipelineError};
use crate::shutdown::CancellationToken;
use crate::translator::COMMIT;

const HIGHLIGHT: &str = "\x1b[32;1m";
const RESET: &str = "\x1b[0m";
pub const TRANSLATED_PREFIX: &str = "Translated message: ";

/// Format one committed buffer as a highlighted line.
///
/// Content stops at the first zero byte, the same view a fixed-record peer gets.
pub fn format_commit(content: &[u8]) -> Vec<u8> {
    let end = content
        .iter()
        .position(|&b| b == 0)
        .unwrap_or(content.len());

    let mut line = Vec::with_capacity(end + 40);
    line.extend_from_slice(b"\n\r");
    line.extend_from_slice(HIGHLIGHT.as_bytes());
    line.extend_from_slice(TRANSLATED_PREFIX.as_bytes());
    line.extend_from_slice(&content[..end]);
    line.extend_from_slice(RESET.as_bytes());
    line.extend_from_slice(b"\n\r");
    line
}

pub struct Renderer<R1, R2, O> {
    raw: ChannelReceiver<R1>,
    commits: ChannelReceiver<R2>,
    output: O,
}

impl<R1, R2, O> Renderer<R1, R2, O>
where
    R1: AsyncRead + Unpin,
    R2: AsyncRead + Unpin,
    O: AsyncWrite + Unpin,
{
    pub fn new(raw: ChannelReceiver<R1>, commits: ChannelReceiver<R2>, output: O) -> Self {
        Self {
            raw,
            commits,
            output,
        }
    }

    /// Echo until cancelled or the raw channel closes. Returns the output surface.
    ///
    /// After echoing the commit sentinel the renderer blocks on the commit channel
    /// until the translator's matching buffer arrives.
    pub async fn run(mut self, cancel: CancellationToken) -> Result<O, PipelineError> {
        loop {
            let byte = tokio::select! {
                biased;

                _ = cancel.cancelled() => {
                    tracing::debug!("Renderer cancelled");
                    break;
                }

                received = self.raw.receive_raw_char() => match received? {
                    Some(byte) => byte,
                    None => {
                        tracing::debug!("Renderer input closed");
                        break;
                    }
                },
            };

            if byte != 0 {
                self.output
                    .write_all(&[byte])
                    .await
                    .map_err(PipelineError::Output)?;
            }

            if byte == COMMIT {
                let content = tokio::select! {
                    biased;

                    _ = cancel.cancelled() => break,
                    received = self.commits.receive_commit() => received?,
                };
                let content = content.ok_or(ChannelError::Closed {
                    channel: self.commits.id(),
                })?;
                tracing::debug!(len = content.len(), "Rendering committed buffer");
                self.output
                    .write_all(&format_commit(&content))
                    .await
                    .map_err(PipelineError::Output)?;
            }

            self.output.flush().await.map_err(PipelineError::Output)?;
        }

        self.output.flush().await.map_err(PipelineError::Output)?;
        Ok(self.output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::codec::Framing;
    use crate::bridge::protocol::{ChannelId, Message};
    use crate::bridge::transport::ChannelSender;

    #[test]
    fn commit_line_format() {
        let line = String::from_utf8(format_commit(b"zbE")).unwrap();
        insta::assert_snapshot!(
            line.escape_debug().to_string(),
            @r"\n\r\u{1b}[32;1mTranslated message: zbE\u{1b}[0m\n\r"
        );
    }

    #[test]
    fn commit_line_stops_at_zero() {
        let line = format_commit(b"ab\0cd");
        assert!(line.windows(2).any(|w| w == b"ab"));
        assert!(!line.windows(2).any(|w| w == b"cd"));
    }

    #[tokio::test]
    async fn echoes_and_prints_commit() {
        let (raw_w, raw_r) = tokio::io::duplex(64 * 1024);
        let (commit_w, commit_r) = tokio::io::duplex(64 * 1024);
        let framing = Framing::FixedRecord;
        let mut raw_tx = ChannelSender::new(ChannelId::RawToRender, raw_w, framing);
        let mut commit_tx = ChannelSender::new(ChannelId::TranslateToRender, commit_w, framing);

        for &b in b"abaXE" {
            raw_tx.send(Message::raw_char(b)).await.unwrap();
        }
        commit_tx
            .send(Message::commit(b"zbE".to_vec()))
            .await
            .unwrap();
        drop(raw_tx);

        let renderer = Renderer::new(
            ChannelReceiver::new(ChannelId::RawToRender, raw_r, framing),
            ChannelReceiver::new(ChannelId::TranslateToRender, commit_r, framing),
            Vec::new(),
        );
        let output = renderer.run(CancellationToken::new()).await.unwrap();

        let mut expected = b"abaXE".to_vec();
        expected.extend(format_commit(b"zbE"));
        assert_eq!(output, expected);
    }

    #[tokio::test]
    async fn missing_commit_is_an_error() {
        let (raw_w, raw_r) = tokio::io::duplex(1024);
        let (commit_w, commit_r) = tokio::io::duplex(1024);
        let framing = Framing::LengthDelimited;
        let mut raw_tx = ChannelSender::new(ChannelId::RawToRender, raw_w, framing);

        raw_tx.send(Message::raw_char(COMMIT)).await.unwrap();
        drop(commit_w);

        let renderer = Renderer::new(
            ChannelReceiver::new(ChannelId::RawToRender, raw_r, framing),
            ChannelReceiver::new(ChannelId::TranslateToRender, commit_r, framing),
            Vec::new(),
        );
        let err = renderer.run(CancellationToken::new()).await.unwrap_err();
        assert!(matches!(
            err,
            PipelineError::Channel(ChannelError::Closed {
                channel: ChannelId::TranslateToRender
            })
        ));
    }

    #[tokio::test]
    async fn cancellation_unblocks_commit_wait() {
        let (raw_w, raw_r) = tokio::io::duplex(1024);
        let (_commit_w, commit_r) = tokio::io::duplex(1024);
        let framing = Framing::LengthDelimited;
        let mut raw_tx = ChannelSender::new(ChannelId::RawToRender, raw_w, framing);
        raw_tx.send(Message::raw_char(COMMIT)).await.unwrap();

        let renderer = Renderer::new(
            ChannelReceiver::new(ChannelId::RawToRender, raw_r, framing),
            ChannelReceiver::new(ChannelId::TranslateToRender, commit_r, framing),
            Vec::new(),
        );

        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(50)).await;
            trigger.cancel();
        });

        let output = renderer.run(cancel).await.unwrap();
        assert_eq!(output, b"E");
    }
}
