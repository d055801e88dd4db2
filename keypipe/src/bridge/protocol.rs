//! Wire protocol types for the keystroke pipeline.
//!
//! Three channels, all one-directional:
//! - **raw→render** and **raw→translate**: one `RawChar` per keystroke
//! - **translate→render**: one `CommitBuffer` per commit sentinel

use serde::{Deserialize, Serialize};

/// Size of one record in the fixed-record framing.
///
/// Also the upper bound on a committed buffer, so either framing can carry it.
pub const MESSAGE_SIZE: usize = 255;

/// A message on any of the three channels.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Message {
    /// One keystroke, forwarded unchanged by the input reader.
    RawChar { byte: u8 },

    /// The translator's edit buffer at commit time, commit sentinel included.
    CommitBuffer { content: Vec<u8> },
}

impl Message {
    pub fn raw_char(byte: u8) -> Self {
        Self::RawChar { byte }
    }

    pub fn commit(content: impl Into<Vec<u8>>) -> Self {
        Self::CommitBuffer {
            content: content.into(),
        }
    }

    pub fn kind(&self) -> MessageKind {
        match self {
            Self::RawChar { .. } => MessageKind::RawChar,
            Self::CommitBuffer { .. } => MessageKind::CommitBuffer,
        }
    }
}

/// Payload kind a channel is declared to carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    RawChar,
    CommitBuffer,
}

impl std::fmt::Display for MessageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::RawChar => f.write_str("raw_char"),
            Self::CommitBuffer => f.write_str("commit_buffer"),
        }
    }
}

/// The three channels of the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelId {
    RawToRender,
    RawToTranslate,
    TranslateToRender,
}

impl ChannelId {
    /// Payload kind carried on this channel.
    pub fn kind(&self) -> MessageKind {
        match self {
            Self::RawToRender | Self::RawToTranslate => MessageKind::RawChar,
            Self::TranslateToRender => MessageKind::CommitBuffer,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RawToRender => "raw->render",
            Self::RawToTranslate => "raw->translate",
            Self::TranslateToRender => "translate->render",
        }
    }
}

impl std::fmt::Display for ChannelId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
