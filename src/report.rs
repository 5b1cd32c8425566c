use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{info, warn};

use crate::engine::ProbeEvent;
use crate::metrics::{inc_failure, observe_latency};
use crate::prober::{ProbeKind, ProbeOutcome};
use crate::target::Target;

/// Log every probe outcome and feed the metrics. Returns the number of events
/// seen once the engine drops its sender.
pub async fn report_events(
    name: String,
    kind: ProbeKind,
    target: Target,
    mut events: UnboundedReceiver<ProbeEvent>,
) -> u64 {
    let probe_type = kind.as_label();
    let mut seen = 0;
    while let Some(event) = events.recv().await {
        seen += 1;
        match event.outcome {
            ProbeOutcome::Success { elapsed, remote_addr } => {
                let remote = remote_addr.map_or_else(|| "-".to_string(), |a| a.to_string());
                info!(
                    "Ping {}({}) - Connected - seq={} time={:?}",
                    target, remote, event.seq, elapsed
                );
                observe_latency(&name, probe_type, elapsed.as_secs_f64() * 1000.0);
            }
            ProbeOutcome::Failure(err) => {
                warn!("Ping {} - seq={} failed: {}", target, event.seq, err.reason);
                inc_failure(&name, probe_type);
            }
        }
    }
    seen
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::Engine;
    use crate::prober::ProbeError;
    use std::time::Duration;
    use tokio::net::TcpListener;
    use tokio::sync::mpsc;

    #[tokio::test]
    async fn drains_until_sender_closes() {
        let target = Target::new("127.0.0.1", 7);
        let (tx, rx) = mpsc::unbounded_channel();
        tx.send(ProbeEvent {
            seq: 1,
            outcome: ProbeOutcome::Success {
                elapsed: Duration::from_millis(3),
                remote_addr: Some("127.0.0.1:7".parse().unwrap()),
            },
        })
        .unwrap();
        tx.send(ProbeEvent {
            seq: 2,
            outcome: ProbeOutcome::Failure(ProbeError::new(&target, "connection refused")),
        })
        .unwrap();
        drop(tx);

        let seen = report_events("report-test".to_string(), ProbeKind::TcpConnect, target, rx).await;
        assert_eq!(seen, 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn reporter_sees_last_event_after_completion() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let target = Target::new("127.0.0.1", port)
            .with_timeout(Duration::from_millis(200))
            .with_interval(Duration::from_millis(50))
            .with_counter(1);
        let mut engine = Engine::tcp();
        engine.set_target(target.clone()).unwrap();
        let events = engine.subscribe();
        let reporter = tokio::spawn(report_events(
            "reporter-drain".to_string(),
            ProbeKind::TcpConnect,
            target,
            events,
        ));

        let completion = engine.start().unwrap();
        let seen = tokio::time::timeout(Duration::from_secs(2), reporter)
            .await
            .expect("reporter ends when the engine finishes")
            .unwrap();
        assert_eq!(seen, 1);

        let result = completion.wait().await.unwrap();
        assert_eq!(result.counter, 1);
        assert_eq!(result.success_counter, 0);
    }
}
