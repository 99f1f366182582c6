//! Prometheus metrics (Rust `prometheus` crate).
//!
//! One `MetricsContext` per process. Counters mirror what the RED encoder
//! decides per frame so redundancy overhead and fallbacks are visible.

use anyhow::Result;
use hyper::service::{make_service_fn, service_fn};
use hyper::{Body, Method, Request, Response, Server, StatusCode};
use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::task::JoinHandle;

/// Label values for `red_candidates_rejected_total{reason=...}`.
pub const REJECT_REASON_OFFSET_NEGATIVE: &str = "offset_negative";
pub const REJECT_REASON_OFFSET_TOO_LARGE: &str = "offset_too_large";
pub const REJECT_REASON_BLOCK_TOO_LARGE: &str = "block_too_large";

/// Configuration for the built-in Prometheus scrape endpoint.
#[derive(Debug, Clone)]
pub struct MetricsServerConfig {
    // ---
    /// Address to bind, e.g. `127.0.0.1:9100`.
    pub bind: SocketAddr,
}

impl MetricsServerConfig {
    // ---
    pub fn new(bind: SocketAddr) -> Self {
        // ---
        Self { bind }
    }
}

/// Prometheus metrics registry + handles.
#[derive(Clone)]
pub struct MetricsContext {
    // ---
    registry: Registry,

    // Network counters
    pub packets_sent_total: IntCounter,
    pub bytes_sent_total: IntCounter,

    // RED framing counters
    pub red_packets_total: IntCounter,
    pub red_redundant_blocks_total: IntCounter,
    pub red_bare_packets_total: IntCounter,
    pub passthrough_packets_total: IntCounter,
    pub red_candidates_rejected_total: IntCounterVec,
    pub format_announcements_total: IntCounter,
    pub extensions_dropped_total: IntCounter,

    // History gauge
    pub red_history_depth: IntGauge,

    // Latency histograms (seconds)
    pub encode_seconds: Histogram,
}

impl MetricsContext {
    // ---
    /// Create a new registry and register the standard metrics.
    ///
    /// `process_name` is applied as a constant label (`process=<name>`).
    pub fn new(process_name: &str) -> Result<Self> {
        // ---
        let registry = Registry::new_custom(
            Some("rtp_red".into()),
            Some(prometheus::labels! { "process".to_string() => process_name.to_string() }),
        )?;

        let packets_sent_total = IntCounter::with_opts(Opts::new(
            "rtp_packets_sent_total",
            "Total RTP packets sent (RED and plain)",
        ))?;
        let bytes_sent_total = IntCounter::with_opts(Opts::new(
            "rtp_bytes_sent_total",
            "Total RTP bytes sent",
        ))?;

        let red_packets_total = IntCounter::with_opts(Opts::new(
            "red_packets_total",
            "RED-framed packets emitted",
        ))?;
        let red_redundant_blocks_total = IntCounter::with_opts(Opts::new(
            "red_redundant_blocks_total",
            "Redundant blocks carried inside RED packets",
        ))?;
        let red_bare_packets_total = IntCounter::with_opts(Opts::new(
            "red_bare_packets_total",
            "RED packets carrying only the primary block",
        ))?;
        let passthrough_packets_total = IntCounter::with_opts(Opts::new(
            "red_passthrough_packets_total",
            "Frames forwarded without RED framing",
        ))?;
        let red_candidates_rejected_total = IntCounterVec::new(
            Opts::new(
                "red_candidates_rejected_total",
                "History candidates rejected by wire-format limits",
            ),
            &["reason"],
        )?;
        let format_announcements_total = IntCounter::with_opts(Opts::new(
            "red_format_announcements_total",
            "Payload format announcements sent downstream",
        ))?;
        let extensions_dropped_total = IntCounter::with_opts(Opts::new(
            "red_extensions_dropped_total",
            "RTP header extensions dropped while building RED packets",
        ))?;

        let red_history_depth = IntGauge::with_opts(Opts::new(
            "red_history_depth",
            "Payloads currently retained for redundancy",
        ))?;

        let encode_seconds = Histogram::with_opts(HistogramOpts::new(
            "opus_encode_seconds",
            "Opus encode duration in seconds",
        ))?;

        registry.register(Box::new(packets_sent_total.clone()))?;
        registry.register(Box::new(bytes_sent_total.clone()))?;
        registry.register(Box::new(red_packets_total.clone()))?;
        registry.register(Box::new(red_redundant_blocks_total.clone()))?;
        registry.register(Box::new(red_bare_packets_total.clone()))?;
        registry.register(Box::new(passthrough_packets_total.clone()))?;
        registry.register(Box::new(red_candidates_rejected_total.clone()))?;
        registry.register(Box::new(format_announcements_total.clone()))?;
        registry.register(Box::new(extensions_dropped_total.clone()))?;
        registry.register(Box::new(red_history_depth.clone()))?;
        registry.register(Box::new(encode_seconds.clone()))?;

        Ok(Self {
            registry,
            packets_sent_total,
            bytes_sent_total,
            red_packets_total,
            red_redundant_blocks_total,
            red_bare_packets_total,
            passthrough_packets_total,
            red_candidates_rejected_total,
            format_announcements_total,
            extensions_dropped_total,
            red_history_depth,
            encode_seconds,
        })
    }

    /// Gather metric families from this registry.
    pub fn gather(&self) -> Vec<prometheus::proto::MetricFamily> {
        // ---
        self.registry.gather()
    }

    /// Renders the registry in the Prometheus text exposition format.
    pub fn render(&self) -> Result<Vec<u8>> {
        // ---
        encode_registry(&self.registry)
    }

    /// Spawns a minimal HTTP server that serves `GET /metrics`.
    pub fn spawn_metrics_server(&self, cfg: MetricsServerConfig) -> JoinHandle<Result<()>> {
        // ---
        let registry = Arc::new(self.registry.clone());
        tokio::spawn(async move {
            // ---
            let make_svc = make_service_fn(move |_conn| {
                let registry = Arc::clone(&registry);
                async move {
                    Ok::<_, hyper::Error>(service_fn(move |req| {
                        let registry = Arc::clone(&registry);
                        async move { handle_metrics_request(req, registry).await }
                    }))
                }
            });

            Server::bind(&cfg.bind)
                .serve(make_svc)
                .await
                .map_err(|e| anyhow::anyhow!(e))
        })
    }
}

fn encode_registry(registry: &Registry) -> Result<Vec<u8>> {
    // ---
    let mut buffer = Vec::new();
    TextEncoder::new().encode(&registry.gather(), &mut buffer)?;
    Ok(buffer)
}

async fn handle_metrics_request(
    req: Request<Body>,
    registry: Arc<Registry>,
) -> Result<Response<Body>, hyper::Error> {
    let resp = match (req.method(), req.uri().path()) {
        (&Method::GET, "/metrics") => match encode_registry(&registry) {
            Ok(buffer) => {
                let mut resp = Response::new(Body::from(buffer));
                resp.headers_mut().insert(
                    hyper::header::CONTENT_TYPE,
                    hyper::header::HeaderValue::from_static("text/plain; version=0.0.4"),
                );
                resp
            }
            Err(e) => {
                let mut resp = Response::new(Body::from(format!("encode error: {e}")));
                *resp.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
                resp
            }
        },
        _ => {
            let mut resp = Response::new(Body::from("not found"));
            *resp.status_mut() = StatusCode::NOT_FOUND;
            resp
        }
    };
    Ok(resp)
}
