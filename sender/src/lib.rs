//! RTP RED Sender Library
//!
//! Streams a WAV file as Opus over RTP with RFC 2198 redundancy: every
//! packet can carry an earlier frame's payload so a single loss is
//! recoverable from the packet that follows.

pub mod audio;
pub mod codec;
pub mod network;

pub use audio::{read_wav, PcmClip};
pub use codec::OpusFrameEncoder;
pub use network::RtpSender;
pub use rtp_red::{PayloadFormat, RedEncoder, RedEncoderStats, RedundancyConfig, SinkEvent};
pub use rtp_red_common::RtpPacket;

use anyhow::{Context, Result};
use rtp_red_common::observability::{
    REJECT_REASON_BLOCK_TOO_LARGE, REJECT_REASON_OFFSET_NEGATIVE, REJECT_REASON_OFFSET_TOO_LARGE,
};
use rtp_red_common::MetricsContext;
use std::time::{Duration, Instant};
use tracing::info;

use codec::{RTP_CLOCK_RATE, RTP_TIMESTAMP_STEP};

/// Per-session stream parameters.
#[derive(Debug, Clone)]
pub struct StreamOptions {
    // ---
    /// Synchronization source identifier
    pub ssrc: u32,

    /// Payload type of the Opus frames before RED framing
    pub media_payload_type: u8,

    /// Pause between frames; zero sends as fast as possible
    pub interval: Duration,

    /// Replay the clip until the task is cancelled
    pub loop_audio: bool,
}

/// Totals for one `stream_red` run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StreamSummary {
    // ---
    pub frames: u64,
    pub packets_sent: u64,
    pub bytes_sent: u64,
}

/// The upstream format announced for the Opus stream (RFC 7587 rtpmap).
pub fn opus_format(payload_type: u8) -> PayloadFormat {
    // ---
    PayloadFormat::new(payload_type, "OPUS", RTP_CLOCK_RATE).with_channels(2)
}

/// Streams `clip` through the Opus encoder and the RED encoder to `sender`.
///
/// The Opus format is announced first so the RED encoder can rewrite it;
/// format announcements are logged since plain UDP has no signaling path.
///
/// # Errors
///
/// Returns error if Opus encoding or packet serialization fails.
pub async fn stream_red(
    clip: &PcmClip,
    opus: &mut OpusFrameEncoder,
    red: &mut RedEncoder,
    sender: &mut RtpSender,
    metrics: &MetricsContext,
    options: &StreamOptions,
) -> Result<StreamSummary> {
    // ---
    let mut sequence: u16 = rand::random();
    let mut timestamp: u32 = rand::random();
    let mut summary = StreamSummary::default();
    let mut last_stats = red.stats();
    let frame_len = opus.samples_per_frame();

    let mut events: Vec<SinkEvent> = Vec::new();
    red.push_upstream_format(opus_format(options.media_payload_type), &mut events);

    loop {
        for pcm in clip.frames(frame_len) {
            let started = Instant::now();
            let payload = opus
                .encode(&pcm)
                .with_context(|| format!("failed to encode frame {}", summary.frames))?;
            metrics
                .encode_seconds
                .observe(started.elapsed().as_secs_f64());

            let frame = RtpPacket::new(
                options.media_payload_type,
                sequence,
                timestamp,
                options.ssrc,
                payload,
            )
            .with_marker(summary.frames == 0);
            red.push_frame(frame, &mut events);

            deliver(&mut events, sender, metrics, &mut summary).await?;
            publish_stats(metrics, &last_stats, &red.stats());
            last_stats = red.stats();
            metrics.red_history_depth.set(red.history_len() as i64);

            sequence = sequence.wrapping_add(1);
            timestamp = timestamp.wrapping_add(RTP_TIMESTAMP_STEP);
            summary.frames += 1;

            if !options.interval.is_zero() {
                tokio::time::sleep(options.interval).await;
            }
        }

        if !options.loop_audio {
            break;
        }
        info!("Looping audio after {} frames", summary.frames);
    }

    info!(
        "Streamed {} frames, {} RED packets sent",
        summary.frames,
        red.sent()
    );
    Ok(summary)
}

/// Sends everything the RED encoder produced for one frame.
async fn deliver(
    events: &mut Vec<SinkEvent>,
    sender: &mut RtpSender,
    metrics: &MetricsContext,
    summary: &mut StreamSummary,
) -> Result<()> {
    // ---
    for event in events.drain(..) {
        let bytes = match event {
            SinkEvent::Format(format) => {
                info!("Payload format now: a=rtpmap:{}", format);
                continue;
            }
            SinkEvent::Packet(packet) => sender.send(&packet).await?,
            SinkEvent::Raw(data) => sender.send_raw(&data).await,
        };
        if bytes > 0 {
            summary.packets_sent += 1;
            summary.bytes_sent += bytes as u64;
            metrics.packets_sent_total.inc();
            metrics.bytes_sent_total.inc_by(bytes as u64);
        }
    }
    Ok(())
}

/// Mirrors encoder counter deltas into Prometheus.
pub fn publish_stats(metrics: &MetricsContext, before: &RedEncoderStats, after: &RedEncoderStats) {
    // ---
    metrics
        .red_packets_total
        .inc_by(after.red_packets - before.red_packets);
    metrics
        .red_redundant_blocks_total
        .inc_by(after.redundant_blocks - before.redundant_blocks);
    metrics
        .red_bare_packets_total
        .inc_by(after.bare_red_packets - before.bare_red_packets);
    metrics
        .passthrough_packets_total
        .inc_by(after.passthrough_packets - before.passthrough_packets);
    metrics
        .format_announcements_total
        .inc_by(after.announcements - before.announcements);
    metrics
        .extensions_dropped_total
        .inc_by(after.extensions_dropped - before.extensions_dropped);

    let rejections = [
        (
            REJECT_REASON_OFFSET_NEGATIVE,
            after.rejected_offset_negative - before.rejected_offset_negative,
        ),
        (
            REJECT_REASON_OFFSET_TOO_LARGE,
            after.rejected_offset_too_large - before.rejected_offset_too_large,
        ),
        (
            REJECT_REASON_BLOCK_TOO_LARGE,
            after.rejected_block_too_large - before.rejected_block_too_large,
        ),
    ];
    for (reason, delta) in rejections {
        if delta > 0 {
            metrics
                .red_candidates_rejected_total
                .with_label_values(&[reason])
                .inc_by(delta);
        }
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;

    #[test]
    fn test_opus_format_rtpmap() {
        // ---
        assert_eq!(opus_format(96).to_string(), "96 OPUS/48000/2");
    }

    #[test]
    fn test_publish_stats_applies_deltas() {
        // ---
        let metrics = MetricsContext::new("test").expect("metrics");
        let before = RedEncoderStats {
            red_packets: 2,
            ..Default::default()
        };
        let after = RedEncoderStats {
            red_packets: 5,
            redundant_blocks: 3,
            rejected_block_too_large: 1,
            ..Default::default()
        };

        publish_stats(&metrics, &before, &after);

        assert_eq!(metrics.red_packets_total.get(), 3);
        assert_eq!(metrics.red_redundant_blocks_total.get(), 3);
        assert_eq!(
            metrics
                .red_candidates_rejected_total
                .with_label_values(&[REJECT_REASON_BLOCK_TOO_LARGE])
                .get(),
            1
        );
    }
}
