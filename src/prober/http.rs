use anyhow::Result;
use async_trait::async_trait;
use reqwest::Client;
use std::net::SocketAddr;
use tokio::time::{Duration, Instant};

use super::{ProbeError, ProbeKind, ProbeOutcome, Prober};
use crate::target::Target;

/// Time a plain HTTP GET up to the response headers. Any status counts as
/// reachable; only transport errors fail the probe.
pub async fn probe_http(client: &Client, url: &str, deadline: Duration) -> Result<(Duration, Option<SocketAddr>)> {
    let start = Instant::now();
    let resp = client.get(url).timeout(deadline).send().await?;
    let elapsed = start.elapsed();
    tracing::trace!("http probe {} answered {}", url, resp.status());
    Ok((elapsed, resp.remote_addr()))
}

pub fn http_url(target: &Target) -> String {
    format!("http://{}/", target)
}

pub struct HttpProber {
    client: Client,
}

impl HttpProber {
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Prober for HttpProber {
    fn kind(&self) -> ProbeKind {
        ProbeKind::Http
    }

    async fn probe(&self, target: &Target) -> ProbeOutcome {
        let url = http_url(target);
        match probe_http(&self.client, &url, target.connect_timeout()).await {
            Ok((elapsed, remote_addr)) => ProbeOutcome::Success { elapsed, remote_addr },
            Err(e) => ProbeOutcome::Failure(ProbeError::new(target, e)),
        }
    }
}
