//! RED block headers (RFC 2198 §3).
//!
//! ```text
//!  0                   1                   2                   3
//!  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |F|   block PT  |  timestamp offset         |   block length    |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//!
//!  0 1 2 3 4 5 6 7
//! +-+-+-+-+-+-+-+-+
//! |0|   Block PT  |
//! +-+-+-+-+-+-+-+-+
//! ```
//!
//! Every block except the last uses the 4-byte form with `F = 1`. The last
//! (primary) block uses the 1-byte form with `F = 0`.

use bytes::{BufMut, BytesMut};

/// Length of a redundant (non-final) block header.
pub const RED_BLOCK_HEADER_LEN: usize = 4;

/// Length of the final (primary) block header.
pub const RED_PRIMARY_HEADER_LEN: usize = 1;

/// Width of the timestamp offset field in bits.
pub const RED_BLOCK_TIMESTAMP_OFFSET_BITS: u32 = 14;

/// Width of the block length field in bits.
pub const RED_BLOCK_LENGTH_BITS: u32 = 10;

/// Largest timestamp offset a redundant block header can carry.
pub const RED_BLOCK_TIMESTAMP_OFFSET_MAX: u32 = (1 << RED_BLOCK_TIMESTAMP_OFFSET_BITS) - 1;

/// Largest payload length a redundant block header can carry.
pub const RED_BLOCK_LENGTH_MAX: usize = (1 << RED_BLOCK_LENGTH_BITS) - 1;

const F_BIT: u8 = 0x80;
const PT_MASK: u8 = 0x7F;

/// One RED block header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedBlockHeader {
    /// Header of a redundant block; its payload follows the primary header.
    Redundant {
        payload_type: u8,
        timestamp_offset: u32,
        length: usize,
    },

    /// Header of the final block, carrying the current payload.
    Primary { payload_type: u8 },
}

impl RedBlockHeader {
    // ---
    /// Encoded size of this header.
    pub fn encoded_len(&self) -> usize {
        // ---
        match self {
            RedBlockHeader::Redundant { .. } => RED_BLOCK_HEADER_LEN,
            RedBlockHeader::Primary { .. } => RED_PRIMARY_HEADER_LEN,
        }
    }

    /// Whether the `F` bit is set.
    pub fn is_redundant(&self) -> bool {
        // ---
        matches!(self, RedBlockHeader::Redundant { .. })
    }

    /// Appends the encoded header to `buf`.
    ///
    /// Fields wider than their wire slot are masked; callers validate
    /// against [`RED_BLOCK_TIMESTAMP_OFFSET_MAX`] and [`RED_BLOCK_LENGTH_MAX`]
    /// before building a header.
    pub fn write_to(&self, buf: &mut BytesMut) {
        // ---
        match *self {
            RedBlockHeader::Redundant {
                payload_type,
                timestamp_offset,
                length,
            } => {
                buf.put_u8(F_BIT | (payload_type & PT_MASK));

                // offset(14) | length(10), big-endian in the remaining 24 bits
                let offset = timestamp_offset & RED_BLOCK_TIMESTAMP_OFFSET_MAX;
                let length = (length & RED_BLOCK_LENGTH_MAX) as u32;
                let packed = (offset << RED_BLOCK_LENGTH_BITS) | length;
                buf.put_slice(&packed.to_be_bytes()[1..]);
            }
            RedBlockHeader::Primary { payload_type } => {
                buf.put_u8(payload_type & PT_MASK);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;

    fn encode(header: RedBlockHeader) -> Vec<u8> {
        let mut buf = BytesMut::new();
        header.write_to(&mut buf);
        buf.to_vec()
    }

    #[test]
    fn test_limits_match_field_widths() {
        // ---
        assert_eq!(RED_BLOCK_TIMESTAMP_OFFSET_MAX, 16383);
        assert_eq!(RED_BLOCK_LENGTH_MAX, 1023);
    }

    #[test]
    fn test_primary_header_is_one_byte() {
        // ---
        let header = RedBlockHeader::Primary { payload_type: 111 };
        assert_eq!(header.encoded_len(), 1);
        assert!(!header.is_redundant());
        assert_eq!(encode(header), vec![111]);
    }

    #[test]
    fn test_redundant_header_layout() {
        // ---
        // PT 0, offset 0x1234, length 0x155
        let header = RedBlockHeader::Redundant {
            payload_type: 0,
            timestamp_offset: 0x1234,
            length: 0x155,
        };
        let bytes = encode(header);

        assert_eq!(bytes.len(), RED_BLOCK_HEADER_LEN);
        assert_eq!(bytes[0], 0x80);
        let packed = u32::from_be_bytes([0, bytes[1], bytes[2], bytes[3]]);
        assert_eq!(packed >> 10, 0x1234);
        assert_eq!(packed & 0x3FF, 0x155);
    }

    #[test]
    fn test_redundant_header_at_field_maximums() {
        // ---
        let header = RedBlockHeader::Redundant {
            payload_type: 127,
            timestamp_offset: RED_BLOCK_TIMESTAMP_OFFSET_MAX,
            length: RED_BLOCK_LENGTH_MAX,
        };
        assert_eq!(encode(header), vec![0xFF, 0xFF, 0xFF, 0xFF]);
    }

    #[test]
    fn test_payload_type_high_bit_is_masked() {
        // ---
        let header = RedBlockHeader::Primary { payload_type: 0xFF };
        assert_eq!(encode(header), vec![0x7F]);
    }
}
