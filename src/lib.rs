//! TCP "ping": measure reachability and connect latency of a host by
//! repeatedly opening and tearing down TCP connections.

pub mod config;
pub mod engine;
pub mod metrics;
pub mod prober;
pub mod report;
pub mod stats;
pub mod target;
pub mod util;

pub use engine::{Completion, Engine, EngineError, EngineState, ProbeEvent};
pub use prober::{ProbeError, ProbeKind, ProbeOutcome, Prober};
pub use stats::PingResult;
pub use target::Target;
