//! IPC bridge between the pipeline workers.
//!
//! This module provides the wire protocol, codecs, and channel ends that connect
//! the input reader, translator, and renderer.
//!
//! # Architecture
//!
//! - **protocol**: Message types (RawChar, CommitBuffer) and channel identities
//! - **codec**: Length-delimited JSON and fixed-record framings
//! - **transport**: Typed sender/receiver ends over pipes or any AsyncRead/AsyncWrite

pub mod codec;
pub mod protocol;
pub mod transport;
