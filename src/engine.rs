use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, warn};

use crate::prober::tcp_connect::TcpConnectProber;
use crate::prober::{ProbeOutcome, Prober};
use crate::stats::PingResult;
use crate::target::Target;

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("no target attached")]
    NoTarget,
    #[error("engine is already running")]
    AlreadyRunning,
    #[error("engine has stopped, attach a target to run again")]
    AlreadyStopped,
    #[error("engine is not running")]
    NotRunning,
    #[error("probe interval must be greater than zero")]
    InvalidInterval,
    #[error("scheduling task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Idle,
    Armed,
    Running,
    Stopped,
}

/// Per-probe notification, `seq` is the 1-based dispatch order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeEvent {
    pub seq: u64,
    pub outcome: ProbeOutcome,
}

/// Fires once the engine reaches `Stopped` and hands over the final result.
#[derive(Debug)]
pub struct Completion {
    handle: JoinHandle<PingResult>,
}

impl Completion {
    pub async fn wait(self) -> Result<PingResult, EngineError> {
        Ok(self.handle.await?)
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

/// Probes one target on a fixed interval and folds the outcomes into a
/// [`PingResult`].
///
/// The scheduling task is the only writer of the result; readers get
/// snapshots through a watch channel.
pub struct Engine {
    prober: Arc<dyn Prober>,
    max_in_flight: usize,
    target: Option<Target>,
    result_tx: Option<watch::Sender<PingResult>>,
    result_rx: Option<watch::Receiver<PingResult>>,
    events: Option<mpsc::UnboundedSender<ProbeEvent>>,
    stop_tx: Option<oneshot::Sender<()>>,
    started: bool,
}

impl Engine {
    pub fn new(prober: Arc<dyn Prober>) -> Self {
        Self {
            prober,
            max_in_flight: 0,
            target: None,
            result_tx: None,
            result_rx: None,
            events: None,
            stop_tx: None,
            started: false,
        }
    }

    pub fn tcp() -> Self {
        Self::new(Arc::new(TcpConnectProber))
    }

    /// Cap on probes awaiting an outcome, zero means unbounded. Ticks that
    /// would exceed the cap are skipped.
    pub fn with_max_in_flight(mut self, max_in_flight: usize) -> Self {
        self.max_in_flight = max_in_flight;
        self
    }

    pub fn state(&self) -> EngineState {
        if self.target.is_none() {
            EngineState::Idle
        } else if !self.started {
            EngineState::Armed
        } else if self.stop_tx.as_ref().is_some_and(|tx| !tx.is_closed()) {
            EngineState::Running
        } else {
            EngineState::Stopped
        }
    }

    pub fn target(&self) -> Option<&Target> {
        self.target.as_ref()
    }

    /// Attach a target with a fresh result. Replaces whatever a previous run
    /// left behind.
    pub fn set_target(&mut self, target: Target) -> Result<(), EngineError> {
        if self.state() == EngineState::Running {
            return Err(EngineError::AlreadyRunning);
        }
        let (result_tx, result_rx) = watch::channel(PingResult::new(target.clone()));
        self.target = Some(target);
        self.result_tx = Some(result_tx);
        self.result_rx = Some(result_rx);
        self.stop_tx = None;
        self.started = false;
        Ok(())
    }

    /// Receive a notification per folded outcome. Only takes effect for the
    /// next `start`.
    pub fn subscribe(&mut self) -> mpsc::UnboundedReceiver<ProbeEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.events = Some(tx);
        rx
    }

    /// Latest snapshot; may be mid-run.
    pub fn result(&self) -> Option<PingResult> {
        self.result_rx.as_ref().map(|rx| rx.borrow().clone())
    }

    pub fn start(&mut self) -> Result<Completion, EngineError> {
        match self.state() {
            EngineState::Idle => return Err(EngineError::NoTarget),
            EngineState::Running => return Err(EngineError::AlreadyRunning),
            EngineState::Stopped => return Err(EngineError::AlreadyStopped),
            EngineState::Armed => {}
        }
        let (Some(target), Some(result)) = (self.target.clone(), self.result_tx.take()) else {
            return Err(EngineError::NoTarget);
        };
        if target.interval.is_zero() {
            self.result_tx = Some(result);
            return Err(EngineError::InvalidInterval);
        }

        let (stop_tx, stop_rx) = oneshot::channel();
        let schedule = Schedule {
            prober: self.prober.clone(),
            target,
            max_in_flight: self.max_in_flight,
            result,
            events: self.events.take(),
        };
        let handle = tokio::spawn(schedule.run(stop_rx));

        self.stop_tx = Some(stop_tx);
        self.started = true;
        Ok(Completion { handle })
    }

    /// Ask the scheduling task to stop. Returns without waiting; use the
    /// [`Completion`] to wait for the final result.
    pub fn stop(&mut self) -> Result<(), EngineError> {
        match self.stop_tx.take() {
            Some(tx) => tx.send(()).map_err(|_| EngineError::NotRunning),
            None => Err(EngineError::NotRunning),
        }
    }
}

struct Schedule {
    prober: Arc<dyn Prober>,
    target: Target,
    max_in_flight: usize,
    result: watch::Sender<PingResult>,
    events: Option<mpsc::UnboundedSender<ProbeEvent>>,
}

impl Schedule {
    async fn run(self, mut stop_rx: oneshot::Receiver<()>) -> PingResult {
        let mut ticker = time::interval(self.target.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        // unbounded so a probe finishing after stop never blocks on delivery
        let (outcome_tx, mut outcome_rx) = mpsc::unbounded_channel::<ProbeEvent>();
        let mut dispatched: u64 = 0;
        let mut in_flight: usize = 0;
        let mut ticking = true;

        debug!("probing {} every {:?}", self.target, self.target.interval);
        loop {
            if !ticking && in_flight == 0 {
                debug!("{} reached its limit of {} probes", self.target, self.target.counter);
                break;
            }

            tokio::select! {
                _ = ticker.tick(), if ticking => {
                    if self.max_in_flight != 0 && in_flight >= self.max_in_flight {
                        warn!("{} has {} probes in flight, skipping tick", self.target, in_flight);
                        continue;
                    }
                    dispatched += 1;
                    in_flight += 1;
                    self.dispatch(dispatched, outcome_tx.clone());

                    if !self.target.is_unlimited() && dispatched >= self.target.counter {
                        ticking = false;
                    }
                }
                Some(event) = outcome_rx.recv() => {
                    in_flight -= 1;
                    self.fold(event);
                }
                _ = &mut stop_rx => {
                    // also reached when the engine handle is dropped
                    debug!("stopping {} with {} probes in flight", self.target, in_flight);
                    break;
                }
            }
        }

        self.result.borrow().clone()
    }

    fn dispatch(&self, seq: u64, tx: mpsc::UnboundedSender<ProbeEvent>) {
        let prober = self.prober.clone();
        let target = self.target.clone();
        debug!("dispatching probe {} to {}", seq, target);
        tokio::spawn(async move {
            let outcome = prober.probe(&target).await;
            let _ = tx.send(ProbeEvent { seq, outcome });
        });
    }

    fn fold(&self, event: ProbeEvent) {
        self.result.send_modify(|result| result.record(&event.outcome));
        if let Some(events) = &self.events {
            let _ = events.send(event);
        }
    }
}
