use tcping::config::ProbeConfig;
use tcping::engine::{Completion, Engine, EngineError};
use tcping::metrics::{initialize_metrics, serve_metrics};
use tcping::{prober, report, PingResult};

use tracing::{debug, info};

async fn wait_all(completions: Vec<Completion>) -> Result<Vec<PingResult>, EngineError> {
    let mut results = Vec::with_capacity(completions.len());
    for completion in completions {
        results.push(completion.wait().await?);
    }
    Ok(results)
}

#[tokio::main(flavor = "multi_thread", worker_threads = 4)]
async fn main() -> anyhow::Result<()> {
    // Load config first to get log level
    let config = ProbeConfig::load().await?;
    let log_level = config.get_tracing_level()?;

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env()
                         .add_directive(format!("tcping={}", log_level.as_str().to_lowercase()).parse()?))
        .init();

    initialize_metrics(config.enable_latency_history)?;
    if let Some(port) = config.metrics_port {
        let metrics_addr = ([0, 0, 0, 0], port).into();
        tokio::spawn(serve_metrics(metrics_addr));
    }

    // One engine per target, nothing shared between them
    let mut engines = Vec::with_capacity(config.targets.len());
    let mut completions = Vec::with_capacity(config.targets.len());
    let mut reporters = Vec::with_capacity(config.targets.len());
    for t in &config.targets {
        let target = t.to_target(&config)?;
        let mut engine = Engine::new(prober::build(t.kind)?).with_max_in_flight(config.max_in_flight);
        engine.set_target(target.clone())?;

        let events = engine.subscribe();
        reporters.push(tokio::spawn(report::report_events(t.name.clone(), t.kind, target.clone(), events)));

        info!("TCP PING {} ({}) every {:?}", target, t.kind.as_label(), target.interval);
        completions.push(engine.start()?);
        engines.push(engine);
    }

    let mut all_done = tokio::spawn(wait_all(completions));
    let results = tokio::select! {
        joined = &mut all_done => joined??,
        _ = tokio::signal::ctrl_c() => {
            info!("interrupted, stopping {} engines", engines.len());
            for engine in engines.iter_mut() {
                if let Err(e) = engine.stop() {
                    debug!("stop {:?}: {}", engine.target(), e);
                }
            }
            all_done.await??
        }
    };

    // reporters end once their engine drops the event sender
    for reporter in reporters {
        let seen = reporter.await?;
        debug!("reporter drained {} events", seen);
    }

    for result in &results {
        if config.json_summary {
            println!("{}", serde_json::to_string(result)?);
        } else {
            println!("\n{}", result);
        }
    }

    Ok(())
}
