//! RTP Redundant Audio Data (RED) encoder, RFC 2198.
//!
//! Wraps each media frame together with an earlier frame's payload so a
//! receiver can recover a lost packet from the one that follows it.
//!
//! - [`HistoryBuffer`] retains the last `distance` payloads.
//! - [`RedEncoder`] selects a redundant block, builds the RED packet and
//!   announces payload format changes to a [`RedSink`].
//!
//! The encoder never fails a frame: when no block fits the wire format it
//! falls back to a bare RED packet or forwards the frame unchanged.

pub mod block;
pub mod config;
pub mod encoder;
pub mod format;
pub mod history;
pub mod sink;

pub use block::{RedBlockHeader, RED_BLOCK_LENGTH_MAX, RED_BLOCK_TIMESTAMP_OFFSET_MAX};
pub use config::RedundancyConfig;
pub use encoder::{RedEncoder, RedEncoderStats};
pub use format::{OutputMode, PayloadFormat};
pub use history::{HistoryBuffer, HistoryItem};
pub use sink::{RedSink, SinkEvent};
