//! WAV loading.
//!
//! Produces mono 16-bit PCM at the file's own rate; the Opus encoder decides
//! whether that rate is usable.

use anyhow::{Context, Result};
use hound::{SampleFormat, WavReader};
use std::path::Path;
use tracing::info;

/// Mono PCM clip.
#[derive(Debug, Clone)]
pub struct PcmClip {
    // ---
    /// PCM samples as 16-bit signed integers
    pub samples: Vec<i16>,

    /// Sample rate in Hz
    pub sample_rate: u32,
}

impl PcmClip {
    // ---
    pub fn new(samples: Vec<i16>, sample_rate: u32) -> Self {
        // ---
        Self {
            samples,
            sample_rate,
        }
    }

    /// Iterates over frames of `frame_len` samples, zero-padding the last.
    pub fn frames(&self, frame_len: usize) -> impl Iterator<Item = Vec<i16>> + '_ {
        // ---
        self.samples.chunks(frame_len).map(move |chunk| {
            let mut frame = chunk.to_vec();
            frame.resize(frame_len, 0);
            frame
        })
    }

    /// Number of frames of `frame_len` samples, counting a partial tail.
    pub fn frame_count(&self, frame_len: usize) -> usize {
        // ---
        self.samples.len().div_ceil(frame_len)
    }

    /// Duration in seconds.
    pub fn duration_secs(&self) -> f64 {
        // ---
        self.samples.len() as f64 / self.sample_rate as f64
    }
}

/// Reads a WAV file as mono PCM.
///
/// Accepts 16-bit integer and 32-bit float samples; multi-channel input is
/// averaged down to mono.
///
/// # Errors
///
/// Returns error if the file cannot be read or uses another sample format.
pub fn read_wav<P: AsRef<Path>>(path: P) -> Result<PcmClip> {
    // ---
    let path = path.as_ref();
    let mut reader = WavReader::open(path)
        .with_context(|| format!("failed to open WAV file: {}", path.display()))?;

    let spec = reader.spec();
    info!(
        "WAV format: {}Hz, {} channels, {} bits",
        spec.sample_rate, spec.channels, spec.bits_per_sample
    );

    let interleaved: Vec<i16> = match (spec.sample_format, spec.bits_per_sample) {
        (SampleFormat::Int, 16) => reader
            .samples::<i16>()
            .collect::<Result<_, _>>()
            .context("failed to read 16-bit PCM samples")?,
        (SampleFormat::Float, 32) => reader
            .samples::<f32>()
            .map(|s| s.map(|v| (v.clamp(-1.0, 1.0) * i16::MAX as f32) as i16))
            .collect::<Result<_, _>>()
            .context("failed to read 32-bit float samples")?,
        (format, bits) => {
            anyhow::bail!(
                "unsupported WAV sample format: {:?} {}-bit (need 16-bit int or 32-bit float)",
                format,
                bits
            );
        }
    };

    Ok(PcmClip::new(
        downmix(&interleaved, spec.channels as usize),
        spec.sample_rate,
    ))
}

/// Averages interleaved channels into one.
fn downmix(interleaved: &[i16], channels: usize) -> Vec<i16> {
    // ---
    if channels <= 1 {
        return interleaved.to_vec();
    }
    interleaved
        .chunks_exact(channels)
        .map(|frame| {
            let sum: i32 = frame.iter().map(|&s| s as i32).sum();
            (sum / channels as i32) as i16
        })
        .collect()
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;

    #[test]
    fn test_downmix_stereo() {
        // ---
        assert_eq!(downmix(&[100, 200, 300, 400], 2), vec![150, 350]);
    }

    #[test]
    fn test_downmix_mono_is_identity() {
        // ---
        assert_eq!(downmix(&[1, 2, 3], 1), vec![1, 2, 3]);
    }

    #[test]
    fn test_frames_pad_last() {
        // ---
        let clip = PcmClip::new(vec![1i16; 500], 16_000);
        let frames: Vec<_> = clip.frames(320).collect();

        assert_eq!(clip.frame_count(320), 2);
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[1].len(), 320);
        assert_eq!(frames[1][179], 1);
        assert_eq!(frames[1][180], 0);
    }

    #[test]
    fn test_read_wav_roundtrip() {
        // ---
        let path = std::env::temp_dir().join(format!("red-sender-{}.wav", std::process::id()));
        let spec = hound::WavSpec {
            channels: 2,
            sample_rate: 16_000,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(&path, spec).expect("create wav");
        for s in [10i16, 20, 30, 40] {
            writer.write_sample(s).expect("write sample");
        }
        writer.finalize().expect("finalize wav");

        let clip = read_wav(&path).expect("read wav");
        std::fs::remove_file(&path).ok();

        assert_eq!(clip.sample_rate, 16_000);
        assert_eq!(clip.samples, vec![15, 35]);
        assert!((clip.duration_secs() - 2.0 / 16_000.0).abs() < 1e-9);
    }
}
