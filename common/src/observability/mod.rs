//! Observability utilities (metrics + tracing).

mod metrics;
mod tracing;

pub use metrics::{
    MetricsContext, MetricsServerConfig, REJECT_REASON_BLOCK_TOO_LARGE,
    REJECT_REASON_OFFSET_NEGATIVE, REJECT_REASON_OFFSET_TOO_LARGE,
};
pub use tracing::{init_tracing, DEFAULT_FILTER, VERBOSE_FILTER};
