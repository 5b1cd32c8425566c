use anyhow::Result;
use async_trait::async_trait;
use socket2::SockRef;
use std::net::SocketAddr;
use tokio::net::TcpStream;
use tokio::time::{timeout, Duration, Instant};

use super::{ProbeError, ProbeKind, ProbeOutcome, Prober};
use crate::target::Target;

/// Open a TCP connection and tear it down straight away, returning the
/// connect time and the peer address. The deadline covers name resolution
/// as well as the handshake.
pub async fn probe_tcp(host: &str, port: u16, deadline: Duration) -> Result<(Duration, SocketAddr)> {
    let start = Instant::now();
    let conn_fut = TcpStream::connect((host, port));
    let conn = timeout(deadline, conn_fut)
        .await
        .map_err(|_| anyhow::anyhow!("timed out after {:?}", deadline))??;
    let elapsed = start.elapsed();
    let remote_addr = conn.peer_addr()?;

    // RST on close instead of FIN so nothing lingers in TIME_WAIT
    if let Err(e) = SockRef::from(&conn).set_linger(Some(Duration::ZERO)) {
        tracing::debug!("set_linger on {} failed: {:?}", remote_addr, e);
    }
    drop(conn);
    Ok((elapsed, remote_addr))
}

#[derive(Debug, Default, Clone, Copy)]
pub struct TcpConnectProber;

#[async_trait]
impl Prober for TcpConnectProber {
    fn kind(&self) -> ProbeKind {
        ProbeKind::TcpConnect
    }

    async fn probe(&self, target: &Target) -> ProbeOutcome {
        match probe_tcp(&target.host, target.port, target.connect_timeout()).await {
            Ok((elapsed, remote_addr)) => ProbeOutcome::Success {
                elapsed,
                remote_addr: Some(remote_addr),
            },
            Err(e) => ProbeOutcome::Failure(ProbeError::new(target, e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    async fn closed_port() -> u16 {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);
        port
    }

    #[tokio::test]
    async fn connects_to_listening_port() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let (_, remote) = probe_tcp("127.0.0.1", addr.port(), Duration::from_millis(500))
            .await
            .unwrap();
        assert_eq!(remote, addr);
    }

    #[tokio::test]
    async fn refused_connection_is_a_failure() {
        let target = Target::new("127.0.0.1", closed_port().await)
            .with_timeout(Duration::from_millis(200));

        match TcpConnectProber.probe(&target).await {
            ProbeOutcome::Failure(err) => assert_eq!(err.endpoint, target.to_string()),
            other => panic!("expected failure, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn success_reports_remote_address() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let target = Target::new("127.0.0.1", addr.port()).with_timeout(Duration::from_millis(500));

        match TcpConnectProber.probe(&target).await {
            ProbeOutcome::Success { remote_addr, .. } => assert_eq!(remote_addr, Some(addr)),
            other => panic!("expected success, got {:?}", other),
        }
    }
}
