//! Channel transport between pipeline workers.
//!
//! A channel is a framed writer on one end and a framed reader on the other.
//! [`pipe_channel`] builds one over an OS pipe; the ends are generic so tests can
//! run them over in-memory streams.

use futures::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::unix::pipe;
use tokio_util::codec::{FramedRead, FramedWrite};

use super::codec::{Framing, MessageCodec};
use super::protocol::{ChannelId, Message, MessageKind};
use crate::error::ChannelError;

/// Producer end of a channel.
pub struct ChannelSender<W> {
    id: ChannelId,
    writer: FramedWrite<W, MessageCodec>,
}

impl<W: AsyncWrite + Unpin> ChannelSender<W> {
    pub fn new(id: ChannelId, writer: W, framing: Framing) -> Self {
        Self {
            id,
            writer: FramedWrite::new(writer, MessageCodec::new(framing, id.kind())),
        }
    }

    pub fn id(&self) -> ChannelId {
        self.id
    }

    /// Write one message and flush it.
    pub async fn send(&mut self, msg: Message) -> Result<(), ChannelError> {
        if msg.kind() != self.id.kind() {
            return Err(ChannelError::UnexpectedMessage {
                channel: self.id,
                expected: self.id.kind(),
                got: msg.kind(),
            });
        }

        self.writer
            .send(msg)
            .await
            .map_err(|source| ChannelError::Io {
                channel: self.id,
                source,
            })
    }
}

/// Consumer end of a channel.
pub struct ChannelReceiver<R> {
    id: ChannelId,
    reader: FramedRead<R, MessageCodec>,
}

impl<R: AsyncRead + Unpin> ChannelReceiver<R> {
    pub fn new(id: ChannelId, reader: R, framing: Framing) -> Self {
        Self {
            id,
            reader: FramedRead::new(reader, MessageCodec::new(framing, id.kind())),
        }
    }

    pub fn id(&self) -> ChannelId {
        self.id
    }

    /// Read one message. `None` means every writer has closed the channel.
    pub async fn receive(&mut self) -> Result<Option<Message>, ChannelError> {
        match self.reader.next().await {
            Some(Ok(msg)) if msg.kind() == self.id.kind() => Ok(Some(msg)),
            Some(Ok(msg)) => Err(ChannelError::UnexpectedMessage {
                channel: self.id,
                expected: self.id.kind(),
                got: msg.kind(),
            }),
            Some(Err(source)) => Err(ChannelError::Io {
                channel: self.id,
                source,
            }),
            None => Ok(None),
        }
    }

    pub async fn receive_raw_char(&mut self) -> Result<Option<u8>, ChannelError> {
        match self.receive().await? {
            Some(Message::RawChar { byte }) => Ok(Some(byte)),
            Some(other) => Err(self.unexpected(MessageKind::RawChar, &other)),
            None => Ok(None),
        }
    }

    pub async fn receive_commit(&mut self) -> Result<Option<Vec<u8>>, ChannelError> {
        match self.receive().await? {
            Some(Message::CommitBuffer { content }) => Ok(Some(content)),
            Some(other) => Err(self.unexpected(MessageKind::CommitBuffer, &other)),
            None => Ok(None),
        }
    }

    fn unexpected(&self, expected: MessageKind, got: &Message) -> ChannelError {
        ChannelError::UnexpectedMessage {
            channel: self.id,
            expected,
            got: got.kind(),
        }
    }
}

pub type PipeSender = ChannelSender<pipe::Sender>;
pub type PipeReceiver = ChannelReceiver<pipe::Receiver>;

/// Create a channel over an anonymous OS pipe.
///
/// Must be called from within a tokio runtime.
pub fn pipe_channel(
    id: ChannelId,
    framing: Framing,
) -> Result<(PipeSender, PipeReceiver), ChannelError> {
    let (tx, rx) = pipe::pipe().map_err(|source| ChannelError::Create {
        channel: id,
        source,
    })?;

    tracing::debug!(channel = %id, ?framing, "Created pipe channel");

    Ok((
        ChannelSender::new(id, tx, framing),
        ChannelReceiver::new(id, rx, framing),
    ))
}
