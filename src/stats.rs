use serde::Serialize;
use std::fmt;
use std::time::Duration;

use crate::prober::ProbeOutcome;
use crate::target::Target;

/// Running statistics for one target.
///
/// `counter` moves once per folded outcome. Failed probes only ever touch
/// `counter`; the duration fields describe successes alone and stay `None`
/// until the first one arrives (a zero `elapsed` is a valid first sample).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PingResult {
    pub target: Target,
    pub counter: u64,
    pub success_counter: u64,
    pub min_duration: Option<Duration>,
    pub max_duration: Option<Duration>,
    pub total_duration: Duration,
}

impl PingResult {
    pub fn new(target: Target) -> Self {
        Self {
            target,
            counter: 0,
            success_counter: 0,
            min_duration: None,
            max_duration: None,
            total_duration: Duration::ZERO,
        }
    }

    pub fn record(&mut self, outcome: &ProbeOutcome) {
        self.counter += 1;
        if let ProbeOutcome::Success { elapsed, .. } = outcome {
            let elapsed = *elapsed;
            self.success_counter += 1;
            self.min_duration = Some(self.min_duration.map_or(elapsed, |d| d.min(elapsed)));
            self.max_duration = Some(self.max_duration.map_or(elapsed, |d| d.max(elapsed)));
            self.total_duration += elapsed;
        }
    }

    pub fn failure_counter(&self) -> u64 {
        self.counter - self.success_counter
    }

    pub fn average(&self) -> Option<Duration> {
        if self.success_counter == 0 {
            return None;
        }
        let nanos = self.total_duration.as_nanos() / self.success_counter as u128;
        Some(Duration::from_nanos(nanos as u64))
    }

    pub fn loss_percent(&self) -> f64 {
        if self.counter == 0 {
            0.0
        } else {
            self.failure_counter() as f64 / self.counter as f64 * 100.0
        }
    }
}

impl fmt::Display for PingResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "--- {} tcping statistics ---", self.target)?;
        write!(
            f,
            "sent={} successful={} failed={} loss={:.2}%",
            self.counter,
            self.success_counter,
            self.failure_counter(),
            self.loss_percent()
        )?;
        if let (Some(min), Some(avg), Some(max)) = (self.min_duration, self.average(), self.max_duration) {
            write!(f, "\nrtt min/avg/max = {:?}/{:?}/{:?}", min, avg, max)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prober::ProbeError;

    fn ok(ms: u64) -> ProbeOutcome {
        ProbeOutcome::Success {
            elapsed: Duration::from_millis(ms),
            remote_addr: None,
        }
    }

    fn failed() -> ProbeOutcome {
        ProbeOutcome::Failure(ProbeError {
            endpoint: "127.0.0.1:1".to_string(),
            reason: "connection refused".to_string(),
        })
    }

    fn fresh() -> PingResult {
        PingResult::new(Target::new("127.0.0.1", 1))
    }

    #[test]
    fn counts_and_totals_follow_outcomes() {
        let outcomes = vec![ok(12), failed(), ok(5), ok(30), failed(), failed(), ok(7)];
        let mut result = fresh();
        for outcome in &outcomes {
            result.record(outcome);
            assert!(result.success_counter <= result.counter);
            if let (Some(min), Some(max)) = (result.min_duration, result.max_duration) {
                assert!(min <= max);
            }
        }

        assert_eq!(result.counter, 7);
        assert_eq!(result.success_counter, 4);
        assert_eq!(result.failure_counter(), 3);
        assert_eq!(result.total_duration, Duration::from_millis(54));
        assert_eq!(result.min_duration, Some(Duration::from_millis(5)));
        assert_eq!(result.max_duration, Some(Duration::from_millis(30)));
        assert_eq!(result.average(), Some(Duration::from_micros(13_500)));
    }

    #[test]
    fn failures_leave_durations_unset() {
        let mut result = fresh();
        result.record(&failed());
        result.record(&failed());

        assert_eq!(result.counter, 2);
        assert_eq!(result.success_counter, 0);
        assert_eq!(result.min_duration, None);
        assert_eq!(result.max_duration, None);
        assert_eq!(result.total_duration, Duration::ZERO);
        assert_eq!(result.average(), None);
        assert_eq!(result.loss_percent(), 100.0);
    }

    #[test]
    fn zero_elapsed_counts_as_first_success() {
        let mut result = fresh();
        result.record(&ok(0));
        assert_eq!(result.min_duration, Some(Duration::ZERO));
        assert_eq!(result.max_duration, Some(Duration::ZERO));

        result.record(&ok(8));
        assert_eq!(result.min_duration, Some(Duration::ZERO));
        assert_eq!(result.max_duration, Some(Duration::from_millis(8)));
    }

    #[test]
    fn decreasing_samples_lower_the_minimum() {
        // a new maximum and a new minimum are tracked independently
        let mut result = fresh();
        for ms in [10, 20, 3] {
            result.record(&ok(ms));
        }
        assert_eq!(result.min_duration, Some(Duration::from_millis(3)));
        assert_eq!(result.max_duration, Some(Duration::from_millis(20)));
    }

    #[test]
    fn summary_skips_rtt_line_without_successes() {
        let mut result = fresh();
        result.record(&failed());
        let text = result.to_string();
        assert!(text.contains("sent=1 successful=0 failed=1 loss=100.00%"));
        assert!(!text.contains("rtt"));

        result.record(&ok(4));
        assert!(result.to_string().contains("rtt min/avg/max = 4ms/4ms/4ms"));
    }
}
