//! Payload format announcements and output framing mode.

use std::fmt;

/// Negotiated payload mapping announced alongside the media stream.
///
/// Only the payload type is rewritten by the encoder; the remaining fields
/// describe the media and pass through untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PayloadFormat {
    // ---
    /// RTP payload type the mapping applies to
    pub payload_type: u8,

    /// Encoding name, e.g. `OPUS`
    pub encoding_name: Option<String>,

    /// RTP clock rate in Hz
    pub clock_rate: Option<u32>,

    /// Channel count
    pub channels: Option<u16>,
}

impl PayloadFormat {
    // ---
    /// A format known only by its payload type.
    pub fn bare(payload_type: u8) -> Self {
        // ---
        Self {
            payload_type,
            encoding_name: None,
            clock_rate: None,
            channels: None,
        }
    }

    /// A fully described format.
    pub fn new(payload_type: u8, encoding_name: impl Into<String>, clock_rate: u32) -> Self {
        // ---
        Self {
            payload_type,
            encoding_name: Some(encoding_name.into()),
            clock_rate: Some(clock_rate),
            channels: None,
        }
    }

    /// Sets the channel count.
    pub fn with_channels(mut self, channels: u16) -> Self {
        // ---
        self.channels = Some(channels);
        self
    }

    /// Copy of this format with the payload type replaced.
    pub fn with_payload_type(&self, payload_type: u8) -> Self {
        // ---
        Self {
            payload_type,
            ..self.clone()
        }
    }
}

/// Renders like an SDP `a=rtpmap` value: `96 OPUS/48000/2`.
impl fmt::Display for PayloadFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.payload_type)?;
        if let Some(name) = &self.encoding_name {
            write!(f, " {name}")?;
            if let Some(rate) = self.clock_rate {
                write!(f, "/{rate}")?;
                if let Some(channels) = self.channels {
                    write!(f, "/{channels}")?;
                }
            }
        }
        Ok(())
    }
}

/// Framing of the packets currently flowing downstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputMode {
    /// Frames forwarded as received
    #[default]
    Plain,

    /// RFC 2198 RED packets
    Red,
}

impl OutputMode {
    // ---
    pub fn is_red(self) -> bool {
        // ---
        self == OutputMode::Red
    }
}
