//! RTP RED sender - CLI binary.
//!
//! Reads a WAV file, encodes it to Opus, wraps each frame in an RFC 2198
//! RED packet carrying earlier frames, and transmits via UDP.

use anyhow::{Context, Result};
use clap::Parser;
use std::time::Duration;
use tracing::info;

use red_sender::codec::DEFAULT_OPUS_PAYLOAD_TYPE;
use red_sender::{
    read_wav, stream_red, OpusFrameEncoder, RedEncoder, RedundancyConfig, RtpSender, StreamOptions,
};
use rtp_red_common::{init_tracing, ColorWhen, MetricsContext, MetricsServerConfig};

/// RTP RED Sender - Stream audio with redundant Opus frames
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    // ---
    /// Input audio file (WAV format)
    #[arg(short, long)]
    input: String,

    /// Remote address (IP:port) to send to
    #[arg(short, long, default_value = "127.0.0.1:5004")]
    remote: String,

    /// Packet transmission interval in milliseconds
    #[arg(short = 't', long, default_value = "20")]
    interval_ms: u64,

    /// Replay input audio continuously (default). Use `--no-loop` to play once and exit.
    #[arg(long = "no-loop", default_value_t = true, action = clap::ArgAction::SetFalse)]
    loop_audio: bool,

    /// Payload type of outgoing RED packets (0-127)
    #[arg(long, default_value_t = 63)]
    red_pt: u8,

    /// How many frames back the redundant block reaches; 0 disables RED
    #[arg(short, long, default_value_t = 1)]
    distance: u32,

    /// Send RED packets even when no redundant block is available
    #[arg(long)]
    allow_bare_red: bool,

    /// Payload type of the Opus frames inside the RED packets
    #[arg(long, default_value_t = DEFAULT_OPUS_PAYLOAD_TYPE)]
    media_pt: u8,

    /// Prometheus metrics bind address (serves `GET /metrics`).
    #[arg(long, default_value = "127.0.0.1:9100")]
    metrics_bind: String,

    /// Coloring: auto, always or never
    #[arg(long, default_value = "auto")]
    color: ColorWhen,

    /// Debug-level logs for the RED encoder and sender
    #[arg(short, long)]
    verbose: bool,
}

/// Capture version number from Cargo.toml
const VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    // ---
    let args = Args::parse();

    init_tracing(args.color, args.verbose)?;

    info!("Starting RTP RED sender v{VERSION}");
    info!("Input file: {}", args.input);
    info!("Remote address: {}", args.remote);
    info!(
        "RED: pt={} distance={} allow_bare_red={}",
        args.red_pt, args.distance, args.allow_bare_red
    );

    let config = RedundancyConfig::new(args.red_pt, args.distance, args.allow_bare_red)
        .context("invalid RED settings")?;
    if args.media_pt > 127 {
        anyhow::bail!("invalid media payload type {} (must be 0-127)", args.media_pt);
    }

    let metrics = MetricsContext::new("red-sender")?;
    let metrics_bind = args.metrics_bind.parse().context("invalid metrics bind")?;
    let _metrics_task = metrics.spawn_metrics_server(MetricsServerConfig::new(metrics_bind));

    info!("Reading audio file...");
    let input_path = args.input.clone();
    let clip = tokio::task::spawn_blocking(move || read_wav(input_path))
        .await
        .context("audio reading task failed")??;

    let mut opus = OpusFrameEncoder::new(clip.sample_rate).context("failed to create encoder")?;
    info!(
        "Loaded {:.2}s of audio ({} frames)",
        clip.duration_secs(),
        clip.frame_count(opus.samples_per_frame())
    );

    let mut red = RedEncoder::new(config);
    let mut sender = RtpSender::new(&args.remote)
        .await
        .context("failed to create sender")?;

    let options = StreamOptions {
        ssrc: rand::random::<u32>(),
        media_payload_type: args.media_pt,
        interval: Duration::from_millis(args.interval_ms),
        loop_audio: args.loop_audio,
    };
    info!("Session SSRC: 0x{:08X}", options.ssrc);

    info!("Starting transmission...");
    let summary = stream_red(&clip, &mut opus, &mut red, &mut sender, &metrics, &options).await?;

    let stats = red.stats();
    info!(
        "Transmission complete: {} packets, {} bytes ({} RED, {} redundant blocks, {} passthrough, {} send errors)",
        summary.packets_sent,
        summary.bytes_sent,
        stats.red_packets,
        stats.redundant_blocks,
        stats.passthrough_packets,
        sender.send_errors()
    );

    Ok(())
}
