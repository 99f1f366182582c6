//! RED packet assembler.
//!
//! For each media frame the encoder picks a redundant block from its history
//! (or none), builds an RFC 2198 packet around it, and tells downstream when
//! the payload mapping changes between plain and RED framing.
//!
//! Nothing here fails: a candidate that violates the wire limits is treated
//! as missing, and without a block the frame is either sent as bare RED or
//! forwarded unchanged.

use anyhow::Result;
use bytes::{Bytes, BytesMut};
use rtp_red_common::rtp::{RTP_HEADER_LEN, RTP_VERSION};
use rtp_red_common::RtpPacket;
use tracing::{debug, warn};

use crate::block::{
    RedBlockHeader, RED_BLOCK_HEADER_LEN, RED_BLOCK_LENGTH_MAX, RED_BLOCK_TIMESTAMP_OFFSET_MAX,
    RED_PRIMARY_HEADER_LEN,
};
use crate::config::{validate_payload_type, RedundancyConfig};
use crate::format::{OutputMode, PayloadFormat};
use crate::history::{HistoryBuffer, HistoryItem};
use crate::sink::RedSink;

/// Counters describing what the encoder decided so far.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RedEncoderStats {
    // ---
    /// RED packets emitted (with or without a redundant block)
    pub red_packets: u64,

    /// RED packets that carried a redundant block
    pub redundant_blocks: u64,

    /// RED packets carrying only the primary block
    pub bare_red_packets: u64,

    /// Frames forwarded without RED framing
    pub passthrough_packets: u64,

    /// Candidates whose timestamp was ahead of the current frame
    pub rejected_offset_negative: u64,

    /// Candidates too far back for the 14-bit offset field
    pub rejected_offset_too_large: u64,

    /// Candidates longer than the 10-bit length field allows
    pub rejected_block_too_large: u64,

    /// Payload format announcements pushed downstream
    pub announcements: u64,

    /// Header extensions dropped while building RED packets
    pub extensions_dropped: u64,
}

/// Why a history candidate could not be used.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Rejection {
    OffsetNegative(i32),
    OffsetTooLarge(i32),
    BlockTooLarge(usize),
}

/// RFC 2198 encoder.
///
/// Single owner, synchronous: every call processes one input completely
/// before returning. Configuration setters take effect on the next frame.
///
/// # Example
///
/// ```
/// use rtp_red::{RedEncoder, RedundancyConfig, SinkEvent};
/// use rtp_red_common::RtpPacket;
///
/// let config = RedundancyConfig::new(63, 1, false).unwrap();
/// let mut encoder = RedEncoder::new(config);
/// let mut out: Vec<SinkEvent> = Vec::new();
///
/// encoder.push_frame(RtpPacket::new(111, 1, 100, 0x1234, &b"A"[..]), &mut out);
/// encoder.push_frame(RtpPacket::new(111, 2, 160, 0x1234, &b"B"[..]), &mut out);
///
/// assert_eq!(encoder.sent(), 1);
/// ```
#[derive(Debug)]
pub struct RedEncoder {
    // ---
    config: RedundancyConfig,
    history: HistoryBuffer,

    /// Framing described by the last announcement
    mode: OutputMode,

    /// Re-announce even if the mode is unchanged (RED payload type changed)
    announce_pending: bool,

    /// Last format received from upstream
    upstream_format: Option<PayloadFormat>,

    /// Payload type of the last media frame seen
    media_payload_type: Option<u8>,

    /// RED packets sent, wraps at `u32::MAX`
    sent: u32,

    stats: RedEncoderStats,
}

impl RedEncoder {
    // ---
    /// Creates an encoder in plain mode with empty history.
    pub fn new(config: RedundancyConfig) -> Self {
        // ---
        Self {
            config,
            history: HistoryBuffer::new(),
            mode: OutputMode::Plain,
            announce_pending: false,
            upstream_format: None,
            media_payload_type: None,
            sent: 0,
            stats: RedEncoderStats::default(),
        }
    }

    /// Current configuration.
    pub fn config(&self) -> &RedundancyConfig {
        // ---
        &self.config
    }

    /// Number of RED packets emitted, wrapping at `u32::MAX`.
    pub fn sent(&self) -> u32 {
        // ---
        self.sent
    }

    /// Decision counters.
    pub fn stats(&self) -> RedEncoderStats {
        // ---
        self.stats
    }

    /// Framing of the last announcement.
    pub fn mode(&self) -> OutputMode {
        // ---
        self.mode
    }

    /// Number of payloads currently retained.
    pub fn history_len(&self) -> usize {
        // ---
        self.history.len()
    }

    /// Read-only view of the retained payloads.
    pub fn history(&self) -> &HistoryBuffer {
        // ---
        &self.history
    }

    /// Last upstream payload format, if any was announced.
    pub fn upstream_format(&self) -> Option<&PayloadFormat> {
        // ---
        self.upstream_format.as_ref()
    }

    /// Changes the RED payload type.
    ///
    /// If RED output is already flowing under the old payload type, the next
    /// packet is preceded by a fresh announcement.
    ///
    /// # Errors
    ///
    /// Returns error if `payload_type` does not fit in 7 bits.
    pub fn set_payload_type(&mut self, payload_type: u8) -> Result<()> {
        // ---
        validate_payload_type(payload_type)?;
        let previous = self.config.payload_type;
        self.config.payload_type = payload_type;
        self.announce_pending = payload_type != previous && self.mode.is_red();
        Ok(())
    }

    /// Changes the redundancy distance. History beyond the new distance is
    /// discarded before the next frame looks for a candidate.
    pub fn set_distance(&mut self, distance: u32) {
        // ---
        self.config.distance = distance;
    }

    /// Allows or forbids RED packets without a redundant block.
    pub fn set_allow_bare_red(&mut self, allow_bare_red: bool) {
        // ---
        self.config.allow_bare_red = allow_bare_red;
    }

    /// Processes one parsed media frame.
    pub fn push_frame<S: RedSink>(&mut self, frame: RtpPacket, sink: &mut S) {
        // ---
        self.process(frame, None, sink);
    }

    /// Processes one frame given as wire bytes.
    ///
    /// Frames forwarded without RED framing keep their original bytes.
    /// Input that does not parse as RTP is forwarded as-is under the current
    /// framing.
    pub fn push_raw<S: RedSink>(&mut self, data: Bytes, sink: &mut S) {
        // ---
        let config = self.config;
        self.history.trim(config.history_bound());

        if !config.red_enabled() {
            let media_pt = raw_payload_type(&data);
            self.stats.passthrough_packets += 1;
            self.announce(OutputMode::Plain, media_pt, sink);
            sink.push_raw(data);
            return;
        }

        match RtpPacket::deserialize(&data) {
            Ok(frame) => self.process(frame, Some(data), sink),
            Err(e) => {
                warn!("Forwarding unparseable frame ({} bytes): {:#}", data.len(), e);
                self.stats.passthrough_packets += 1;
                self.announce(self.mode, None, sink);
                sink.push_raw(data);
            }
        }
    }

    /// Handles a payload format announcement from upstream.
    ///
    /// While RED output is active (or bare RED is allowed, which makes every
    /// frame RED), the announced payload type is replaced with the RED one.
    pub fn push_upstream_format<S: RedSink>(&mut self, format: PayloadFormat, sink: &mut S) {
        // ---
        let rewrite = self.mode.is_red() || self.config.allow_bare_red;
        self.upstream_format = Some(format.clone());
        self.stats.announcements += 1;

        if rewrite {
            debug!(
                "Upstream format {} announced as RED payload type {}",
                format, self.config.payload_type
            );
            sink.push_format(format.with_payload_type(self.config.payload_type));
            self.mode = OutputMode::Red;
            self.announce_pending = false;
        } else {
            debug!("Upstream format {} forwarded unchanged", format);
            sink.push_format(format);
        }
    }

    fn process<S: RedSink>(&mut self, frame: RtpPacket, wire: Option<Bytes>, sink: &mut S) {
        // ---
        let config = self.config;
        let bound = config.history_bound();

        // distance may have shrunk since the previous frame
        self.history.trim(bound);

        if !config.red_enabled() {
            self.forward_plain(frame, wire, sink);
            return;
        }

        let block = self.select_redundant_block(frame.timestamp, config.distance);
        if block.is_none() && !config.allow_bare_red {
            self.history
                .push(frame.payload_type, frame.timestamp, frame.payload.clone(), bound);
            self.forward_plain(frame, wire, sink);
            return;
        }

        let red = self.build_red_packet(&frame, block.as_ref());
        self.history
            .push(frame.payload_type, frame.timestamp, frame.payload, bound);

        self.sent = self.sent.wrapping_add(1);
        self.stats.red_packets += 1;
        if block.is_some() {
            self.stats.redundant_blocks += 1;
        } else {
            self.stats.bare_red_packets += 1;
        }

        self.announce(OutputMode::Red, Some(frame.payload_type), sink);
        sink.push_packet(red);
    }

    fn forward_plain<S: RedSink>(&mut self, frame: RtpPacket, wire: Option<Bytes>, sink: &mut S) {
        // ---
        self.stats.passthrough_packets += 1;
        self.announce(OutputMode::Plain, Some(frame.payload_type), sink);
        match wire {
            Some(data) => sink.push_raw(data),
            None => sink.push_packet(frame),
        }
    }

    /// Picks the history entry to carry as redundant block, if it fits.
    fn select_redundant_block(&mut self, timestamp: u32, distance: u32) -> Option<HistoryItem> {
        // ---
        if distance == 0 {
            return None;
        }
        let candidate = self.history.oldest()?;

        if let Err(rejection) = check_candidate(candidate, timestamp) {
            match rejection {
                Rejection::OffsetTooLarge(offset) => {
                    self.stats.rejected_offset_too_large += 1;
                    warn!(
                        "Can't create redundant block with distance {}, timestamp offset is too large {} ({} - {}) > {}",
                        distance, offset, timestamp, candidate.timestamp, RED_BLOCK_TIMESTAMP_OFFSET_MAX
                    );
                }
                Rejection::OffsetNegative(offset) => {
                    self.stats.rejected_offset_negative += 1;
                    warn!(
                        "Can't create redundant block with distance {}, timestamp offset is negative {} ({} - {})",
                        distance, offset, timestamp, candidate.timestamp
                    );
                }
                Rejection::BlockTooLarge(len) => {
                    self.stats.rejected_block_too_large += 1;
                    warn!(
                        "Can't create redundant block with distance {}, red block is too large {} > {}",
                        distance, len, RED_BLOCK_LENGTH_MAX
                    );
                }
            }
            return None;
        }

        if self.history.len() < self.config.history_bound() {
            debug!(
                "Not enough history yet, adding redundant block with distance {} and timestamp {}",
                self.history.len(),
                candidate.timestamp
            );
        }
        Some(candidate.clone())
    }

    fn build_red_packet(&mut self, frame: &RtpPacket, block: Option<&HistoryItem>) -> RtpPacket {
        // ---
        if frame.has_extension() {
            self.stats.extensions_dropped += 1;
            warn!(
                "Dropping RTP header extension of seq={}, RED packets carry none",
                frame.sequence
            );
        }

        let header_len =
            RED_PRIMARY_HEADER_LEN + block.map_or(0, |_| RED_BLOCK_HEADER_LEN);
        let block_len = block.map_or(0, |b| b.payload.len());
        let mut body = BytesMut::with_capacity(header_len + block_len + frame.payload.len());

        if let Some(block) = block {
            RedBlockHeader::Redundant {
                payload_type: block.payload_type,
                timestamp_offset: frame.timestamp.wrapping_sub(block.timestamp),
                length: block.payload.len(),
            }
            .write_to(&mut body);
        }
        RedBlockHeader::Primary {
            payload_type: frame.payload_type,
        }
        .write_to(&mut body);

        if let Some(block) = block {
            body.extend_from_slice(&block.payload);
        }
        body.extend_from_slice(&frame.payload);

        RtpPacket {
            payload_type: self.config.payload_type,
            marker: frame.marker,
            sequence: frame.sequence,
            timestamp: frame.timestamp,
            ssrc: frame.ssrc,
            csrc: frame.csrc.clone(),
            extension: None,
            payload: body.freeze(),
        }
    }

    /// Announces the payload mapping for `mode` if downstream has not seen it.
    ///
    /// `media_pt` is the payload type of the frame about to be sent; it names
    /// the plain mapping when upstream never announced one. If no mapping can
    /// be named at all, the mode is left as it was so the next frame that
    /// does carry a payload type gets announced.
    fn announce<S: RedSink>(&mut self, mode: OutputMode, media_pt: Option<u8>, sink: &mut S) {
        // ---
        if media_pt.is_some() {
            self.media_payload_type = media_pt;
        }
        if !self.announce_pending && mode == self.mode {
            return;
        }

        let format = match (mode, &self.upstream_format) {
            (OutputMode::Red, Some(upstream)) => {
                Some(upstream.with_payload_type(self.config.payload_type))
            }
            (OutputMode::Red, None) => Some(PayloadFormat::bare(self.config.payload_type)),
            (OutputMode::Plain, Some(upstream)) => Some(upstream.clone()),
            (OutputMode::Plain, None) => self.media_payload_type.map(PayloadFormat::bare),
        };

        let Some(format) = format else {
            debug!("No payload type known yet, {:?} output not announced", mode);
            return;
        };

        debug!("Announcing {:?} output as {}", mode, format);
        self.stats.announcements += 1;
        sink.push_format(format);
        self.mode = mode;
        self.announce_pending = false;
    }
}

/// Payload type of wire bytes that at least look like an RTP header.
fn raw_payload_type(data: &[u8]) -> Option<u8> {
    // ---
    if data.len() < RTP_HEADER_LEN || data[0] >> 6 != RTP_VERSION {
        return None;
    }
    Some(data[1] & 0x7F)
}

/// Validates a candidate against the RED header field widths.
fn check_candidate(candidate: &HistoryItem, timestamp: u32) -> Result<(), Rejection> {
    // ---
    let offset = timestamp.wrapping_sub(candidate.timestamp) as i32;
    if offset > RED_BLOCK_TIMESTAMP_OFFSET_MAX as i32 {
        return Err(Rejection::OffsetTooLarge(offset));
    }
    if offset < 0 {
        return Err(Rejection::OffsetNegative(offset));
    }
    if candidate.payload.len() > RED_BLOCK_LENGTH_MAX {
        return Err(Rejection::BlockTooLarge(candidate.payload.len()));
    }
    Ok(())
}
