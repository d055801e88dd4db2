//! Framed codecs for pipeline channels.
//!
//! Two framings over any AsyncRead/AsyncWrite:
//! - **LengthDelimited**: LengthDelimitedCodec + serde_json, one tagged [`Message`] per frame
//! - **FixedRecord**: 255-byte zero-padded records with no length prefix, bit-compatible
//!   with peers that read fixed-size records off a pipe

use std::io;
use std::marker::PhantomData;
use std::str::FromStr;

use serde::{Serialize, de::DeserializeOwned};
use tokio_util::bytes::{BufMut, Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder, LengthDelimitedCodec};

use super::protocol::{MESSAGE_SIZE, Message, MessageKind};

/// How messages are framed on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Framing {
    /// 4-byte length prefix, JSON body. Does not depend on pipe write atomicity.
    #[default]
    LengthDelimited,
    /// Fixed [`MESSAGE_SIZE`] records, zero-padded, untagged.
    FixedRecord,
}

impl FromStr for Framing {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "length" | "length-delimited" => Ok(Self::LengthDelimited),
            "fixed" | "fixed-record" => Ok(Self::FixedRecord),
            other => Err(format!(
                "unknown framing '{other}', expected 'length' or 'fixed'"
            )),
        }
    }
}

/// Codec that frames messages with length prefix and serializes with JSON.
///
/// Wraps LengthDelimitedCodec and adds serde_json serialization.
pub struct JsonCodec<T> {
    inner: LengthDelimitedCodec,
    _phantom: PhantomData<T>,
}

impl<T> Default for JsonCodec<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> JsonCodec<T> {
    pub fn new() -> Self {
        Self {
            inner: LengthDelimitedCodec::builder()
                .length_field_length(4)
                .new_codec(),
            _phantom: PhantomData,
        }
    }
}

impl<T: DeserializeOwned> Decoder for JsonCodec<T> {
    type Item = T;
    type Error = io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match self.inner.decode(src)? {
            Some(bytes) => {
                let item = serde_json::from_slice(&bytes)
                    .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
                Ok(Some(item))
            }
            None => Ok(None),
        }
    }
}

impl<T: Serialize> Encoder<T> for JsonCodec<T> {
    type Error = io::Error;

    fn encode(&mut self, item: T, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let json =
            serde_json::to_vec(&item).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        tracing::trace!(json_size_bytes = json.len(), "Encoding frame");
        self.inner.encode(Bytes::from(json), dst)
    }
}

/// Fixed-size record codec.
///
/// The record carries no tag, so the decoder must be told which payload kind the
/// channel holds. A raw character lives in byte 0. A commit buffer is the record
/// up to its first zero byte.
#[derive(Debug, Clone, Copy)]
pub struct FixedRecordCodec {
    kind: MessageKind,
}

impl FixedRecordCodec {
    pub fn new(kind: MessageKind) -> Self {
        Self { kind }
    }
}

impl Decoder for FixedRecordCodec {
    type Item = Message;
    type Error = io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if src.len() < MESSAGE_SIZE {
            src.reserve(MESSAGE_SIZE - src.len());
            return Ok(None);
        }

        let record = src.split_to(MESSAGE_SIZE);
        let msg = match self.kind {
            MessageKind::RawChar => Message::raw_char(record[0]),
            MessageKind::CommitBuffer => {
                let end = record.iter().position(|&b| b == 0).unwrap_or(MESSAGE_SIZE);
                Message::commit(&record[..end])
            }
        };
        Ok(Some(msg))
    }
}

impl Encoder<Message> for FixedRecordCodec {
    type Error = io::Error;

    fn encode(&mut self, item: Message, dst: &mut BytesMut) -> Result<(), Self::Error> {
        dst.reserve(MESSAGE_SIZE);
        match item {
            Message::RawChar { byte } => {
                dst.put_u8(byte);
                dst.put_bytes(0, MESSAGE_SIZE - 1);
            }
            Message::CommitBuffer { content } => {
                if content.len() > MESSAGE_SIZE {
                    return Err(io::Error::new(
                        io::ErrorKind::InvalidInput,
                        format!(
                            "commit buffer of {} bytes exceeds record size {}",
                            content.len(),
                            MESSAGE_SIZE
                        ),
                    ));
                }
                dst.put_slice(&content);
                dst.put_bytes(0, MESSAGE_SIZE - content.len());
            }
        }
        Ok(())
    }
}

/// Codec used by every channel, selected by [`Framing`].
pub enum MessageCodec {
    LengthDelimited(JsonCodec<Message>),
    FixedRecord(FixedRecordCodec),
}

impl MessageCodec {
    pub fn new(framing: Framing, kind: MessageKind) -> Self {
        match framing {
            Framing::LengthDelimited => Self::LengthDelimited(JsonCodec::new()),
            Framing::FixedRecord => Self::FixedRecord(FixedRecordCodec::new(kind)),
        }
    }
}

impl Decoder for MessageCodec {
    type Item = Message;
    type Error = io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match self {
            Self::LengthDelimited(codec) => codec.decode(src),
            Self::FixedRecord(codec) => codec.decode(src),
        }
    }
}

impl Encoder<Message> for MessageCodec {
    type Error = io::Error;

    fn encode(&mut self, item: Message, dst: &mut BytesMut) -> Result<(), Self::Error> {
        match self {
            Self::LengthDelimited(codec) => codec.encode(item, dst),
            Self::FixedRecord(codec) => codec.encode(item, dst),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_codec_roundtrip_commit() {
        let mut codec = JsonCodec::<Message>::new();
        let mut buf = BytesMut::new();

        codec
            .encode(Message::commit(b"zbE".to_vec()), &mut buf)
            .unwrap();
        let decoded = codec.decode(&mut buf).unwrap().unwrap();

        assert_eq!(decoded, Message::commit(b"zbE".to_vec()));
        assert!(buf.is_empty());
    }

    #[test]
    fn json_codec_waits_for_full_frame() {
        let mut codec = JsonCodec::<Message>::new();
        let mut buf = BytesMut::new();
        codec.encode(Message::raw_char(b'q'), &mut buf).unwrap();

        let mut partial = buf.split_to(buf.len() - 1);
        assert!(codec.decode(&mut partial).unwrap().is_none());

        partial.unsplit(buf);
        assert_eq!(
            codec.decode(&mut partial).unwrap(),
            Some(Message::raw_char(b'q'))
        );
    }

    #[test]
    fn json_codec_rejects_garbage_body() {
        let mut codec = JsonCodec::<Message>::new();
        let mut buf = BytesMut::new();
        buf.put_u32(3);
        buf.put_slice(b"{{{");

        let err = codec.decode(&mut buf).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn fixed_record_raw_char_is_zero_padded() {
        let mut codec = FixedRecordCodec::new(MessageKind::RawChar);
        let mut buf = BytesMut::new();

        codec.encode(Message::raw_char(b'a'), &mut buf).unwrap();

        assert_eq!(buf.len(), MESSAGE_SIZE);
        assert_eq!(buf[0], b'a');
        assert!(buf[1..].iter().all(|&b| b == 0));
    }

    #[test]
    fn fixed_record_commit_stops_at_first_zero() {
        let mut codec = FixedRecordCodec::new(MessageKind::CommitBuffer);
        let mut buf = BytesMut::new();
        codec
            .encode(Message::commit(b"KE".to_vec()), &mut buf)
            .unwrap();

        let decoded = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(decoded, Message::commit(b"KE".to_vec()));
        assert!(buf.is_empty());
    }

    #[test]
    fn fixed_record_full_commit_fits() {
        let mut codec = FixedRecordCodec::new(MessageKind::CommitBuffer);
        let mut buf = BytesMut::new();
        let content = vec![b'q'; MESSAGE_SIZE];

        codec
            .encode(Message::commit(content.clone()), &mut buf)
            .unwrap();
        assert_eq!(buf.len(), MESSAGE_SIZE);
        assert_eq!(
            codec.decode(&mut buf).unwrap(),
            Some(Message::commit(content))
        );
    }

    #[test]
    fn fixed_record_rejects_oversized_commit() {
        let mut codec = FixedRecordCodec::new(MessageKind::CommitBuffer);
        let mut buf = BytesMut::new();

        let err = codec
            .encode(Message::commit(vec![b'q'; MESSAGE_SIZE + 1]), &mut buf)
            .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
        assert!(buf.is_empty());
    }

    #[test]
    fn fixed_record_needs_whole_record() {
        let mut codec = FixedRecordCodec::new(MessageKind::RawChar);
        let mut buf = BytesMut::from(&[b'x'; MESSAGE_SIZE - 1][..]);
        assert!(codec.decode(&mut buf).unwrap().is_none());

        buf.put_u8(0);
        assert_eq!(
            codec.decode(&mut buf).unwrap(),
            Some(Message::raw_char(b'x'))
        );
    }

    #[test]
    fn fixed_record_decodes_back_to_back_records() {
        let mut codec = FixedRecordCodec::new(MessageKind::RawChar);
        let mut buf = BytesMut::new();
        for byte in *b"ab" {
            codec.encode(Message::raw_char(byte), &mut buf).unwrap();
        }

        assert_eq!(
            codec.decode(&mut buf).unwrap(),
            Some(Message::raw_char(b'a'))
        );
        assert_eq!(
            codec.decode(&mut buf).unwrap(),
            Some(Message::raw_char(b'b'))
        );
        assert_eq!(codec.decode(&mut buf).unwrap(), None);
    }

    #[test]
    fn framing_parses() {
        assert_eq!("length".parse::<Framing>(), Ok(Framing::LengthDelimited));
        assert_eq!("fixed".parse::<Framing>(), Ok(Framing::FixedRecord));
        assert!("smoke-signals".parse::<Framing>().is_err());
    }
}
