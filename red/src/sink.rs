//! Downstream interface of the encoder.
//!
//! Output is two channels: payload format announcements and data. The
//! encoder guarantees an announcement reaches the sink before the first
//! packet it describes.

use bytes::Bytes;
use rtp_red_common::RtpPacket;

use crate::format::PayloadFormat;

/// Receives everything the encoder emits, in order.
pub trait RedSink {
    /// A new payload mapping applies to the packets that follow.
    fn push_format(&mut self, format: PayloadFormat);

    /// A parsed RTP packet, either RED-framed or forwarded unchanged.
    fn push_packet(&mut self, packet: RtpPacket);

    /// Wire bytes forwarded verbatim: frames passed through from raw input,
    /// including input that could not be parsed as RTP.
    fn push_raw(&mut self, data: Bytes);
}

/// One item of encoder output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinkEvent {
    Format(PayloadFormat),
    Packet(RtpPacket),
    Raw(Bytes),
}

impl SinkEvent {
    // ---
    /// The packet, if this is a data event with a parsed packet.
    pub fn as_packet(&self) -> Option<&RtpPacket> {
        // ---
        match self {
            SinkEvent::Packet(packet) => Some(packet),
            _ => None,
        }
    }

    /// The format, if this is an announcement.
    pub fn as_format(&self) -> Option<&PayloadFormat> {
        // ---
        match self {
            SinkEvent::Format(format) => Some(format),
            _ => None,
        }
    }
}

/// Collects output for later delivery, e.g. by an async transport.
impl RedSink for Vec<SinkEvent> {
    fn push_format(&mut self, format: PayloadFormat) {
        self.push(SinkEvent::Format(format));
    }

    fn push_packet(&mut self, packet: RtpPacket) {
        self.push(SinkEvent::Packet(packet));
    }

    fn push_raw(&mut self, data: Bytes) {
        self.push(SinkEvent::Raw(data));
    }
}
