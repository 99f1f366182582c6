//! Common RTP utilities shared by the RED encoder and the sender.
//!
//! This crate provides the RTP packet model and wire codec, plus the
//! tracing, CLI color and metrics setup used by the binaries.

pub mod cli;
pub mod observability;
pub mod rtp;

pub use cli::ColorWhen;
pub use observability::{init_tracing, MetricsContext, MetricsServerConfig};
pub use rtp::{HeaderExtension, RtpPacket};
