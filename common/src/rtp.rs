//! RTP packet structure and serialization.
//!
//! Implements the RFC 3550 packet format including the CSRC list and the
//! optional header extension. Payloads are held as shared `Bytes` so a
//! payload can be forwarded and retained elsewhere without copying.

use anyhow::{Context, Result};
use bytes::Bytes;

/// RTP packet version 2 (as per RFC 3550)
pub const RTP_VERSION: u8 = 2;

/// Size of the fixed RTP header in bytes
pub const RTP_HEADER_LEN: usize = 12;

/// Highest value the 7-bit payload type field can carry
pub const MAX_PAYLOAD_TYPE: u8 = 0x7F;

/// Maximum number of contributing sources (4-bit CC field)
pub const MAX_CSRC_COUNT: usize = 15;

/// RTP header extension (RFC 3550 §5.3.1).
///
/// `data` holds the extension body without the 4-byte profile/length
/// preamble and must be a whole number of 32-bit words.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderExtension {
    // ---
    /// Profile-defined identifier
    pub profile: u16,

    /// Extension body
    pub data: Bytes,
}

/// RTP packet as seen by the media pipeline.
///
/// # Protocol Details
///
/// - Version: Always 2 (RFC 3550)
/// - Payload Type: 7 bits, dynamic range 96-127 for codecs like Opus
/// - Sequence: Increments by 1 for each packet, wraps at 65535
/// - Timestamp: Media clock units (48kHz for Opus)
/// - CSRC: Up to 15 contributing sources
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RtpPacket {
    // ---
    /// Payload type (7 bits)
    pub payload_type: u8,

    /// Marker bit
    pub marker: bool,

    /// Packet sequence number (wraps at 65535)
    pub sequence: u16,

    /// RTP timestamp in media clock units
    pub timestamp: u32,

    /// Synchronization source identifier
    pub ssrc: u32,

    /// Contributing source identifiers
    pub csrc: Vec<u32>,

    /// Optional header extension
    pub extension: Option<HeaderExtension>,

    /// Packet payload, padding removed
    pub payload: Bytes,
}

impl RtpPacket {
    // ---
    /// Creates a new RTP packet with no marker, CSRCs or extension.
    ///
    /// # Arguments
    ///
    /// * `payload_type` - 7-bit payload type
    /// * `sequence` - Packet sequence number
    /// * `timestamp` - RTP timestamp (in media clock units)
    /// * `ssrc` - Synchronization source identifier
    /// * `payload` - Encoded media data
    pub fn new(
        payload_type: u8,
        sequence: u16,
        timestamp: u32,
        ssrc: u32,
        payload: impl Into<Bytes>,
    ) -> Self {
        // ---
        Self {
            payload_type,
            marker: false,
            sequence,
            timestamp,
            ssrc,
            csrc: Vec::new(),
            extension: None,
            payload: payload.into(),
        }
    }

    /// Sets the marker bit.
    pub fn with_marker(mut self, marker: bool) -> Self {
        // ---
        self.marker = marker;
        self
    }

    /// Replaces the contributing source list.
    pub fn with_csrc(mut self, csrc: Vec<u32>) -> Self {
        // ---
        self.csrc = csrc;
        self
    }

    /// Attaches a header extension.
    pub fn with_extension(mut self, extension: HeaderExtension) -> Self {
        // ---
        self.extension = Some(extension);
        self
    }

    /// Returns whether the packet carries a header extension.
    pub fn has_extension(&self) -> bool {
        // ---
        self.extension.is_some()
    }

    /// Size of the serialized packet in bytes.
    pub fn wire_len(&self) -> usize {
        // ---
        let ext_len = self.extension.as_ref().map_or(0, |ext| 4 + ext.data.len());
        RTP_HEADER_LEN + 4 * self.csrc.len() + ext_len + self.payload.len()
    }

    /// Serializes the RTP packet into wire format.
    ///
    /// # Wire Format
    ///
    /// ```text
    ///  0                   1                   2                   3
    ///  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
    /// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
    /// |V=2|P|X|  CC   |M|     PT      |       sequence number         |
    /// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
    /// |                           timestamp                           |
    /// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
    /// |           synchronization source (SSRC) identifier            |
    /// +=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+
    /// |            contributing source (CSRC) identifiers             |
    /// |                             ....                              |
    /// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
    /// |      defined by profile       |           length              |
    /// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
    /// |                   header extension / payload                  |
    /// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
    /// ```
    ///
    /// Padding is never emitted.
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - Payload type does not fit in 7 bits
    /// - More than 15 CSRCs are present
    /// - Extension data is not a whole number of 32-bit words or is too long
    pub fn serialize(&self) -> Result<Vec<u8>> {
        // ---
        if self.payload_type > MAX_PAYLOAD_TYPE {
            anyhow::bail!("payload type {} does not fit in 7 bits", self.payload_type);
        }
        if self.csrc.len() > MAX_CSRC_COUNT {
            anyhow::bail!("too many CSRCs: {} > {}", self.csrc.len(), MAX_CSRC_COUNT);
        }

        let mut buf = Vec::with_capacity(self.wire_len());

        // Byte 0: V(2) | P(1) | X(1) | CC(4)
        let x_bit = if self.extension.is_some() { 0x10 } else { 0 };
        buf.push((RTP_VERSION << 6) | x_bit | self.csrc.len() as u8);

        // Byte 1: M(1) | PT(7)
        let m_bit = if self.marker { 0x80 } else { 0 };
        buf.push(m_bit | self.payload_type);

        buf.extend_from_slice(&self.sequence.to_be_bytes());
        buf.extend_from_slice(&self.timestamp.to_be_bytes());
        buf.extend_from_slice(&self.ssrc.to_be_bytes());

        for csrc in &self.csrc {
            buf.extend_from_slice(&csrc.to_be_bytes());
        }

        if let Some(ext) = &self.extension {
            if ext.data.len() % 4 != 0 {
                anyhow::bail!(
                    "header extension length {} is not a multiple of 4",
                    ext.data.len()
                );
            }
            let words = u16::try_from(ext.data.len() / 4)
                .context("header extension too long")?;
            buf.extend_from_slice(&ext.profile.to_be_bytes());
            buf.extend_from_slice(&words.to_be_bytes());
            buf.extend_from_slice(&ext.data);
        }

        buf.extend_from_slice(&self.payload);

        Ok(buf)
    }

    /// Deserializes an RTP packet from wire format.
    ///
    /// Parses the fixed header, CSRC list and header extension, and strips
    /// trailing padding. Payload type is not validated against any codec.
    ///
    /// # Arguments
    ///
    /// * `data` - Raw bytes received from network
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - Packet is smaller than minimum header size (12 bytes)
    /// - RTP version is not 2
    /// - CSRC list or header extension is truncated
    /// - Padding length is zero or exceeds the remaining payload
    pub fn deserialize(data: &[u8]) -> Result<Self> {
        // ---
        if data.len() < RTP_HEADER_LEN {
            anyhow::bail!("packet too small: {} bytes", data.len());
        }

        let version = (data[0] >> 6) & 0x03;
        if version != RTP_VERSION {
            anyhow::bail!("invalid RTP version: {}", version);
        }

        let has_padding = data[0] & 0x20 != 0;
        let has_extension = data[0] & 0x10 != 0;
        let csrc_count = (data[0] & 0x0F) as usize;
        let marker = data[1] & 0x80 != 0;
        let payload_type = data[1] & MAX_PAYLOAD_TYPE;

        let sequence = u16::from_be_bytes([data[2], data[3]]);
        let timestamp = u32::from_be_bytes([data[4], data[5], data[6], data[7]]);
        let ssrc = u32::from_be_bytes([data[8], data[9], data[10], data[11]]);

        let mut offset = RTP_HEADER_LEN;
        if data.len() < offset + 4 * csrc_count {
            anyhow::bail!(
                "packet truncated: {} CSRCs need {} bytes, have {}",
                csrc_count,
                offset + 4 * csrc_count,
                data.len()
            );
        }
        let csrc = data[offset..offset + 4 * csrc_count]
            .chunks_exact(4)
            .map(|c| u32::from_be_bytes([c[0], c[1], c[2], c[3]]))
            .collect();
        offset += 4 * csrc_count;

        let extension = if has_extension {
            if data.len() < offset + 4 {
                anyhow::bail!("packet truncated: missing header extension preamble");
            }
            let profile = u16::from_be_bytes([data[offset], data[offset + 1]]);
            let words = u16::from_be_bytes([data[offset + 2], data[offset + 3]]) as usize;
            offset += 4;
            if data.len() < offset + 4 * words {
                anyhow::bail!(
                    "packet truncated: header extension of {} words exceeds packet",
                    words
                );
            }
            let ext_data = Bytes::copy_from_slice(&data[offset..offset + 4 * words]);
            offset += 4 * words;
            Some(HeaderExtension {
                profile,
                data: ext_data,
            })
        } else {
            None
        };

        let mut end = data.len();
        if has_padding {
            let pad = data[end - 1] as usize;
            if pad == 0 || offset + pad > end {
                anyhow::bail!("invalid padding length: {}", pad);
            }
            end -= pad;
        }

        Ok(Self {
            payload_type,
            marker,
            sequence,
            timestamp,
            ssrc,
            csrc,
            extension,
            payload: Bytes::copy_from_slice(&data[offset..end]),
        })
    }
}
