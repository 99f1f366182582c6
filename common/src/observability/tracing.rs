//! Tracing initialization.
//!
//! Centralizes tracing config so every binary behaves the same.

use crate::ColorWhen;
use anyhow::Result;
use tracing_subscriber::{fmt, EnvFilter};

/// Default filter when `RUST_LOG` is unset.
pub const DEFAULT_FILTER: &str = "info";

/// Filter used for `--verbose`: per-frame RED decisions become visible.
pub const VERBOSE_FILTER: &str = "info,rtp_red=debug,red_sender=debug";

/// Initialize tracing subscriber.
///
/// - `RUST_LOG` wins when set; otherwise `verbose` picks between
///   [`DEFAULT_FILTER`] and [`VERBOSE_FILTER`].
/// - ANSI color controlled by `ColorWhen`.
///
/// # Errors
///
/// Returns error if a global subscriber is already installed.
pub fn init_tracing(color: ColorWhen, verbose: bool) -> Result<()> {
    // ---
    let fallback = if verbose { VERBOSE_FILTER } else { DEFAULT_FILTER };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));

    fmt()
        .with_env_filter(env_filter)
        .with_ansi(color.should_color_stderr())
        .with_target(verbose)
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to install tracing subscriber: {e}"))?;

    Ok(())
}
