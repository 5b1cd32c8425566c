use once_cell::sync::{Lazy, OnceCell};
use prometheus::{Encoder, GaugeVec, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder};
use std::net::SocketAddr;
use warp::Filter;

static REGISTRY: Lazy<Registry> = Lazy::new(Registry::new);

static LATENCY_GAUGE: Lazy<GaugeVec> = Lazy::new(|| {
    let opts = Opts::new("tcping_latency_milliseconds_current", "Latest probe latency in milliseconds");
    let gauge = GaugeVec::new(opts, &["target", "probe_type"]).expect("valid gauge opts");
    REGISTRY.register(Box::new(gauge.clone())).expect("gauge registered once");
    gauge
});

static FAILURE_COUNTER: Lazy<IntCounterVec> = Lazy::new(|| {
    let opts = Opts::new("tcping_failures_total", "Total number of failed probes");
    let ctr = IntCounterVec::new(opts, &["target", "probe_type"]).expect("valid counter opts");
    REGISTRY.register(Box::new(ctr.clone())).expect("counter registered once");
    ctr
});

// Only set when latency history is enabled
static LATENCY_HIST: OnceCell<HistogramVec> = OnceCell::new();

pub fn initialize_metrics(enable_latency_history: bool) -> anyhow::Result<()> {
    Lazy::force(&LATENCY_GAUGE);
    Lazy::force(&FAILURE_COUNTER);

    if enable_latency_history && LATENCY_HIST.get().is_none() {
        let opts = Opts::new("tcping_latency_milliseconds", "Probe latency in milliseconds");
        let hist = HistogramVec::new(
            HistogramOpts {
                common_opts: opts,
                buckets: vec![
                    0.05, 0.1, 0.2, 0.5, 1.0,
                    2.0, 5.0, 10.0, 20.0, 50.0, 100.0, 250.0, 500.0, 1000.0
                ],
            },
            &["target", "probe_type"],
        )?;
        REGISTRY.register(Box::new(hist.clone()))?;
        let _ = LATENCY_HIST.set(hist);
    }
    Ok(())
}

pub fn render() -> anyhow::Result<(String, Vec<u8>)> {
    let encoder = TextEncoder::new();
    let mut buf = Vec::new();
    encoder.encode(&REGISTRY.gather(), &mut buf)?;
    Ok((encoder.format_type().to_string(), buf))
}

pub async fn serve_metrics(addr: SocketAddr) {
    let metrics_route = warp::path!("metrics").map(move || match render() {
        Ok((content_type, body)) => warp::http::Response::builder()
            .header("Content-Type", content_type)
            .body(body),
        Err(e) => {
            tracing::error!("encoding metrics failed: {:?}", e);
            warp::http::Response::builder()
                .status(500)
                .body(Vec::new())
        }
    });

    tracing::info!("serving metrics on {}", addr);
    warp::serve(metrics_route).run(addr).await;
}

pub fn observe_latency(target: &str, probe_type: &str, latency_ms: f64) {
    LATENCY_GAUGE
        .with_label_values(&[target, probe_type])
        .set(latency_ms);

    if let Some(hist) = LATENCY_HIST.get() {
        hist.with_label_values(&[target, probe_type])
            .observe(latency_ms);
    }
}

pub fn inc_failure(target: &str, probe_type: &str) {
    FAILURE_COUNTER
        .with_label_values(&[target, probe_type])
        .inc();
}
