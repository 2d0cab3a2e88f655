//! Prometheus metrics for the Second Brain assistant.
//!
//! Exposes:
//! - `second_brain_pipeline_duration_seconds` (histogram)
//! - `second_brain_pipeline_total` (counter with status)
//! - `second_brain_pipeline_inflight` (gauge)
//! - `second_brain_ingest_stage_failures_total` (counter per stage)
//! - process metrics via `process` collector

use std::convert::Infallible;
use std::net::SocketAddr;
use std::time::Duration;

use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use once_cell::sync::Lazy;
use prometheus::process_collector::ProcessCollector;
use prometheus::{
    default_registry, register_histogram_vec, register_int_counter_vec, register_int_gauge_vec,
    Encoder, HistogramVec, IntCounterVec, IntGaugeVec, TextEncoder,
};
use tokio::net::TcpListener;
use tracing::{error, info, warn};

static PROCESS_COLLECTOR: Lazy<()> = Lazy::new(|| {
    if let Err(err) = default_registry().register(Box::new(ProcessCollector::for_self())) {
        warn!("Failed to register process collector: {}", err);
    }
});

static PIPELINE_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    // Exponential buckets from 50ms up to ~3 minutes.
    let buckets =
        prometheus::exponential_buckets(0.05, 2.0, 14).expect("failed to create histogram buckets");
    register_histogram_vec!(
        "second_brain_pipeline_duration_seconds",
        "Pipeline duration in seconds",
        &["pipeline"],
        buckets
    )
    .expect("failed to register pipeline duration histogram")
});

static PIPELINE_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "second_brain_pipeline_total",
        "Total pipeline runs by status",
        &["pipeline", "status"]
    )
    .expect("failed to register pipeline counter")
});

static PIPELINE_INFLIGHT: Lazy<IntGaugeVec> = Lazy::new(|| {
    register_int_gauge_vec!(
        "second_brain_pipeline_inflight",
        "Number of in-flight pipeline runs",
        &["pipeline"]
    )
    .expect("failed to register inflight gauge")
});

static INGEST_STAGE_FAILURES: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "second_brain_ingest_stage_failures_total",
        "Ingestion failures by pipeline stage",
        &["stage"]
    )
    .expect("failed to register stage failure counter")
});

/// Ensure collectors are registered.
fn init_collectors() {
    Lazy::force(&PROCESS_COLLECTOR);
    Lazy::force(&PIPELINE_DURATION);
    Lazy::force(&PIPELINE_TOTAL);
    Lazy::force(&PIPELINE_INFLIGHT);
    Lazy::force(&INGEST_STAGE_FAILURES);
}

/// Increment inflight gauge for a pipeline.
pub fn record_pipeline_start(pipeline: &'static str) {
    init_collectors();
    PIPELINE_INFLIGHT.with_label_values(&[pipeline]).inc();
}

/// Record pipeline completion with duration and status.
pub fn record_pipeline_result(pipeline: &'static str, duration: Duration, success: bool) {
    init_collectors();
    PIPELINE_INFLIGHT.with_label_values(&[pipeline]).dec();
    PIPELINE_DURATION
        .with_label_values(&[pipeline])
        .observe(duration.as_secs_f64());
    PIPELINE_TOTAL
        .with_label_values(&[pipeline, if success { "ok" } else { "error" }])
        .inc();
}

/// Count an ingestion failure against the stage that caused it.
pub fn record_ingest_stage_failure(stage: &'static str) {
    init_collectors();
    INGEST_STAGE_FAILURES.with_label_values(&[stage]).inc();
}

async fn metrics_response() -> Result<Response<Full<Bytes>>, Infallible> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();

    if let Err(err) = encoder.encode(&metric_families, &mut buffer) {
        error!("Failed to encode metrics: {}", err);
        return Ok(Response::builder()
            .status(StatusCode::INTERNAL_SERVER_ERROR)
            .body(Full::from("encode error"))
            .unwrap());
    }

    Ok(Response::builder()
        .status(StatusCode::OK)
        .header(hyper::header::CONTENT_TYPE, encoder.format_type())
        .body(Full::from(buffer))
        .unwrap())
}

async fn handle_request(req: Request<Incoming>) -> Result<Response<Full<Bytes>>, Infallible> {
    match req.uri().path() {
        "/metrics" => metrics_response().await,
        _ => Ok(Response::builder()
            .status(StatusCode::NOT_FOUND)
            .body(Full::new(Bytes::new()))
            .unwrap()),
    }
}

async fn serve(addr: SocketAddr) -> anyhow::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "Prometheus metrics endpoint started");

    loop {
        let (stream, peer) = listener.accept().await?;
        let service = service_fn(handle_request);
        let io = TokioIo::new(stream);

        tokio::spawn(async move {
            if let Err(err) = http1::Builder::new().serve_connection(io, service).await {
                warn!(?peer, "Metrics connection error: {}", err);
            }
        });
    }
}

/// Spawn the metrics HTTP endpoint on the given address.
pub fn spawn_metrics_server(addr: SocketAddr) {
    init_collectors();
    tokio::spawn(async move {
        if let Err(err) = serve(addr).await {
            error!(%addr, "Metrics server failed: {}", err);
        }
    });
}
