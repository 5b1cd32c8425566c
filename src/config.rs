use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tokio::fs;

use crate::prober::ProbeKind;
use crate::target::Target;
use crate::util::parse_host_port;

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct TargetConfig {
    pub name: String,
    #[serde(default)]
    pub kind: ProbeKind,
    /// Either a bare host or `host:port` (`[v6]:port` for IPv6).
    pub host: String,
    pub port: Option<u16>,
    pub timeout_ms: Option<u64>,
    pub interval_ms: Option<u64>,
    pub count: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct ProbeConfig {
    #[serde(default = "default_probe_interval_ms")]
    pub probe_interval_ms: u64,
    #[serde(default)]
    pub default_timeout_ms: u64,
    #[serde(default)]
    pub count: u64,
    #[serde(default)]
    pub max_in_flight: usize,
    pub targets: Vec<TargetConfig>,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub metrics_port: Option<u16>,
    #[serde(default = "default_enable_latency_history")]
    pub enable_latency_history: bool,
    #[serde(default)]
    pub json_summary: bool,
}

fn default_probe_interval_ms() -> u64 {
    1000
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_enable_latency_history() -> bool {
    false // Default to show current latency only
}

impl ProbeConfig {
    /// Get the log level as a tracing::Level
    pub fn get_tracing_level(&self) -> Result<tracing::Level> {
        match self.log_level.to_lowercase().as_str() {
            "trace" => Ok(tracing::Level::TRACE),
            "debug" => Ok(tracing::Level::DEBUG),
            "info" => Ok(tracing::Level::INFO),
            "warn" | "warning" => Ok(tracing::Level::WARN),
            "error" => Ok(tracing::Level::ERROR),
            _ => Err(anyhow::anyhow!("Invalid log level: {}. Valid levels are: trace, debug, info, warn, error", self.log_level))
        }
    }

    /// Config path from the first argument, then `TARGET_CONFIG`, then `targets.json`.
    pub async fn load() -> Result<Self> {
        let config_file = std::env::args()
            .nth(1)
            .or_else(|| std::env::var("TARGET_CONFIG").ok())
            .unwrap_or_else(|| "targets.json".to_string());
        Self::load_file_config(&config_file).await
    }

    pub async fn load_file_config(file_path: &str) -> Result<Self> {
        if !Path::new(file_path).exists() {
            return Err(anyhow::anyhow!("Config file not found: {}", file_path));
        }

        let content = fs::read_to_string(file_path).await?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self> {
        let config: ProbeConfig = serde_json::from_str(content)?;
        config.get_tracing_level()?;
        if config.targets.is_empty() {
            return Err(anyhow::anyhow!("No targets configured"));
        }
        Ok(config)
    }
}

impl TargetConfig {
    pub fn get_host_port(&self) -> (String, Option<u16>) {
        parse_host_port(&self.host, self.port)
    }

    /// Build a validated [`Target`], filling gaps from the global settings.
    pub fn to_target(&self, defaults: &ProbeConfig) -> Result<Target> {
        let (host, port) = self.get_host_port();
        if host.is_empty() {
            return Err(anyhow::anyhow!("Target {} has an empty host", self.name));
        }
        let port = match port {
            Some(0) | None => {
                return Err(anyhow::anyhow!("Target {} needs a port between 1 and 65535", self.name));
            }
            Some(port) => port,
        };
        let interval_ms = self.interval_ms.unwrap_or(defaults.probe_interval_ms);
        if interval_ms == 0 {
            return Err(anyhow::anyhow!("Target {} has a zero probe interval", self.name));
        }

        Ok(Target::new(host, port)
            .with_timeout(Duration::from_millis(self.timeout_ms.unwrap_or(defaults.default_timeout_ms)))
            .with_interval(Duration::from_millis(interval_ms))
            .with_counter(self.count.unwrap_or(defaults.count)))
    }
}
