//! Opus encoding of PCM frames.
//!
//! Opus RTP streams always run a 48kHz clock (RFC 7587), whatever rate the
//! encoder is fed, so the timestamp step per frame is fixed.

use anyhow::{Context, Result};
use bytes::Bytes;
use opus::{Application, Channels, Encoder};

/// RTP clock rate for Opus
pub const RTP_CLOCK_RATE: u32 = 48_000;

/// Frame duration in milliseconds
pub const FRAME_DURATION_MS: u32 = 20;

/// RTP timestamp advance per frame (960 at 48kHz)
pub const RTP_TIMESTAMP_STEP: u32 = RTP_CLOCK_RATE / 1000 * FRAME_DURATION_MS;

/// Default dynamic payload type for Opus
pub const DEFAULT_OPUS_PAYLOAD_TYPE: u8 = 96;

/// Target bitrate in bits per second
pub const BITRATE: i32 = 24_000;

/// Input rates libopus accepts
pub const SUPPORTED_SAMPLE_RATES: [u32; 5] = [8_000, 12_000, 16_000, 24_000, 48_000];

/// Largest Opus packet for a single frame (RFC 6716 §3.4)
const MAX_OPUS_PACKET: usize = 1275;

/// Mono Opus encoder producing one payload per 20ms frame.
///
/// # Example
///
/// ```no_run
/// use red_sender::codec::OpusFrameEncoder;
///
/// let mut encoder = OpusFrameEncoder::new(16_000).unwrap();
/// let silence = vec![0i16; encoder.samples_per_frame()];
/// let payload = encoder.encode(&silence).unwrap();
/// ```
pub struct OpusFrameEncoder {
    // ---
    encoder: Encoder,
    sample_rate: u32,
    scratch: Vec<u8>,
}

impl OpusFrameEncoder {
    // ---
    /// Creates a VOIP-tuned encoder for `sample_rate` input.
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - `sample_rate` is not one of [`SUPPORTED_SAMPLE_RATES`]
    /// - Opus encoder initialization or bitrate setting fails
    pub fn new(sample_rate: u32) -> Result<Self> {
        // ---
        if !SUPPORTED_SAMPLE_RATES.contains(&sample_rate) {
            anyhow::bail!(
                "unsupported sample rate {}Hz (Opus accepts {:?})",
                sample_rate,
                SUPPORTED_SAMPLE_RATES
            );
        }

        let mut encoder = Encoder::new(sample_rate, Channels::Mono, Application::Voip)
            .context("failed to create Opus encoder")?;
        encoder
            .set_bitrate(opus::Bitrate::Bits(BITRATE))
            .context("failed to set bitrate")?;

        Ok(Self {
            encoder,
            sample_rate,
            scratch: vec![0u8; MAX_OPUS_PACKET],
        })
    }

    /// Input sample rate.
    pub fn sample_rate(&self) -> u32 {
        // ---
        self.sample_rate
    }

    /// PCM samples consumed per frame.
    pub fn samples_per_frame(&self) -> usize {
        // ---
        (self.sample_rate / 1000 * FRAME_DURATION_MS) as usize
    }

    /// Encodes exactly one frame of PCM.
    ///
    /// # Errors
    ///
    /// Returns error if the frame has the wrong length or Opus fails.
    pub fn encode(&mut self, pcm: &[i16]) -> Result<Bytes> {
        // ---
        if pcm.len() != self.samples_per_frame() {
            anyhow::bail!(
                "invalid frame size: expected {}, got {}",
                self.samples_per_frame(),
                pcm.len()
            );
        }

        let len = self
            .encoder
            .encode(pcm, &mut self.scratch)
            .context("Opus encoding failed")?;

        Ok(Bytes::copy_from_slice(&self.scratch[..len]))
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use rtp_red::RED_BLOCK_LENGTH_MAX;

    #[test]
    fn test_timestamp_step_is_20ms_at_48k() {
        // ---
        assert_eq!(RTP_TIMESTAMP_STEP, 960);
    }

    #[test]
    fn test_rejects_unsupported_rate() {
        // ---
        assert!(OpusFrameEncoder::new(44_100).is_err());
    }

    #[test]
    fn test_samples_per_frame_follows_rate() {
        // ---
        let encoder = OpusFrameEncoder::new(16_000).expect("encoder creation failed");
        assert_eq!(encoder.samples_per_frame(), 320);

        let encoder = OpusFrameEncoder::new(48_000).expect("encoder creation failed");
        assert_eq!(encoder.samples_per_frame(), 960);
    }

    #[test]
    fn test_encode_invalid_frame_size() {
        // ---
        let mut encoder = OpusFrameEncoder::new(16_000).expect("encoder creation failed");
        assert!(encoder.encode(&[0i16; 160]).is_err());
    }

    #[test]
    fn test_encoded_tone_fits_red_block() {
        // ---
        let mut encoder = OpusFrameEncoder::new(16_000).expect("encoder creation failed");
        let tone: Vec<i16> = (0..encoder.samples_per_frame())
            .map(|i| {
                let phase = i as f32 * 2.0 * std::f32::consts::PI * 440.0 / 16_000.0;
                (phase.sin() * 16_000.0) as i16
            })
            .collect();

        let encoded = encoder.encode(&tone).expect("encoding failed");
        assert!(!encoded.is_empty());
        assert!(encoded.len() <= RED_BLOCK_LENGTH_MAX);
    }
}
