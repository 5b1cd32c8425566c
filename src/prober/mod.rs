use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use crate::target::Target;

pub mod http;
pub mod tcp_connect;

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ProbeKind {
    #[default]
    TcpConnect,
    Http,
}

impl ProbeKind {
    /// Label used for metrics and log lines.
    pub fn as_label(&self) -> &'static str {
        match self {
            ProbeKind::TcpConnect => "tcp_connect",
            ProbeKind::Http => "http",
        }
    }
}

/// A failed probe. Timeouts, refusals and resolution failures all land here;
/// `reason` keeps the underlying cause for display.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("probe {endpoint} failed: {reason}")]
pub struct ProbeError {
    pub endpoint: String,
    pub reason: String,
}

impl ProbeError {
    pub fn new(target: &Target, err: impl std::fmt::Display) -> Self {
        Self {
            endpoint: target.to_string(),
            reason: err.to_string(),
        }
    }
}

/// Outcome of exactly one probe attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOutcome {
    Success {
        elapsed: Duration,
        remote_addr: Option<SocketAddr>,
    },
    Failure(ProbeError),
}

impl ProbeOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, ProbeOutcome::Success { .. })
    }
}

/// One probe attempt against a target. Implementations never retry and never
/// return early without an outcome; the engine owns the schedule.
#[async_trait]
pub trait Prober: Send + Sync {
    fn kind(&self) -> ProbeKind;

    async fn probe(&self, target: &Target) -> ProbeOutcome;
}

pub fn build(kind: ProbeKind) -> anyhow::Result<Arc<dyn Prober>> {
    let prober: Arc<dyn Prober> = match kind {
        ProbeKind::TcpConnect => Arc::new(tcp_connect::TcpConnectProber),
        ProbeKind::Http => Arc::new(http::HttpProber::new()?),
    };
    Ok(prober)
}
