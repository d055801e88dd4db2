use std::io;

use thiserror::Error;

use crate::bridge::protocol::{ChannelId, MessageKind};

/// Failures on a pipeline channel.
#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("{channel} channel creation failed: {source}")]
    Create {
        channel: ChannelId,
        #[source]
        source: io::Error,
    },

    #[error("{channel} channel I/O failed: {source}")]
    Io {
        channel: ChannelId,
        #[source]
        source: io::Error,
    },

    #[error("{channel} channel carries {expected} messages, got {got}")]
    UnexpectedMessage {
        channel: ChannelId,
        expected: MessageKind,
        got: MessageKind,
    },

    #[error("{channel} channel closed while awaiting a message")]
    Closed { channel: ChannelId },
}

/// Failures of the terminal mode collaborator.
#[derive(Debug, Error)]
pub enum TerminalError {
    #[error("failed to read terminal attributes: {0}")]
    GetAttributes(#[source] nix::errno::Errno),

    #[error("failed to set terminal attributes: {0}")]
    SetAttributes(#[source] nix::errno::Errno),

    #[error("terminal settings lock poisoned")]
    Poisoned,
}

/// Failures that end the pipeline without a shutdown sentinel.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Channel(#[from] ChannelError),

    #[error("terminal read failed: {0}")]
    TerminalRead(#[source] io::Error),

    #[error("output write failed: {0}")]
    Output(#[source] io::Error),

    #[error("terminal input closed")]
    InputClosed,

    #[error("worker task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

pub type Result<T> = std::result::Result<T, PipelineError>;
