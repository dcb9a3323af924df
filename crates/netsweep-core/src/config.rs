//! Configuration management for the scanner.
//!
//! Configuration is loaded from (in priority order):
//! 1. Environment variables (NETSWEEP__SCAN__ prefix)
//! 2. Config file (`<prefix>.toml`, `[scan]` section)
//! 3. Defaults

use std::time::Duration;

use serde::Deserialize;

use crate::error::{Result, SweepError};

/// Tunables for a scan coordinator.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct ScanConfig {
    /// Maximum number of probes in flight at once.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// TCP connect timeout per port probe, in milliseconds.
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,

    /// Timeout per reachability probe, in milliseconds.
    #[serde(default = "default_ping_timeout_ms")]
    pub ping_timeout_ms: u64,

    /// Wall-clock budget for a whole request, in milliseconds.
    #[serde(default = "default_request_deadline_ms")]
    pub request_deadline_ms: u64,

    /// Largest number of addresses a single range may expand to.
    #[serde(default = "default_max_hosts")]
    pub max_hosts: usize,

    /// Template for the service label of an open port.
    /// Supports `{ip}`, `{port}` and `{scheme}`.
    #[serde(default = "default_uri_template")]
    pub uri_template: String,

    /// Path to the system ping binary.
    #[serde(default = "default_ping_path")]
    pub ping_path: String,

    /// Ports tried for TCP liveness when ICMP is unavailable.
    #[serde(default = "default_fallback_ports")]
    pub fallback_ports: Vec<u16>,
}

fn default_concurrency() -> usize {
    100
}

fn default_connect_timeout_ms() -> u64 {
    1000
}

fn default_ping_timeout_ms() -> u64 {
    1000
}

fn default_request_deadline_ms() -> u64 {
    120_000
}

fn default_max_hosts() -> usize {
    65_536
}

fn default_uri_template() -> String {
    "telnet://{ip}:{port}".to_string()
}

fn default_ping_path() -> String {
    "ping".to_string()
}

fn default_fallback_ports() -> Vec<u16> {
    vec![22, 80, 443, 445, 3389]
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            connect_timeout_ms: default_connect_timeout_ms(),
            ping_timeout_ms: default_ping_timeout_ms(),
            request_deadline_ms: default_request_deadline_ms(),
            max_hosts: default_max_hosts(),
            uri_template: default_uri_template(),
            ping_path: default_ping_path(),
            fallback_ports: default_fallback_ports(),
        }
    }
}

impl ScanConfig {
    /// Load from `<file_prefix>` (any format the `config` crate knows) and
    /// `NETSWEEP__SCAN__*` environment variables. A missing file or a missing
    /// `[scan]` section yields the defaults.
    pub fn load(file_prefix: &str) -> Result<Self> {
        let cfg = config::Config::builder()
            .add_source(config::File::with_name(file_prefix).required(false))
            .add_source(
                config::Environment::with_prefix("NETSWEEP")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("scan.fallback_ports")
                    .try_parsing(true),
            )
            .build()?;

        let loaded = match cfg.get::<ScanConfig>("scan") {
            Ok(c) => c,
            Err(config::ConfigError::NotFound(_)) => ScanConfig::default(),
            Err(e) => return Err(e.into()),
        };
        loaded.validate()?;

        tracing::debug!(
            concurrency = loaded.concurrency,
            connect_timeout_ms = loaded.connect_timeout_ms,
            max_hosts = loaded.max_hosts,
            "Scan config loaded"
        );
        Ok(loaded)
    }

    /// Reject values that would stall or disable scanning.
    pub fn validate(&self) -> Result<()> {
        if self.concurrency == 0 {
            return Err(SweepError::Config("concurrency must be at least 1".into()));
        }
        if self.connect_timeout_ms == 0 || self.ping_timeout_ms == 0 {
            return Err(SweepError::Config("probe timeouts must be non-zero".into()));
        }
        if self.request_deadline_ms == 0 {
            return Err(SweepError::Config("request deadline must be non-zero".into()));
        }
        if self.max_hosts == 0 {
            return Err(SweepError::Config("max_hosts must be at least 1".into()));
        }
        Ok(())
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn ping_timeout(&self) -> Duration {
        Duration::from_millis(self.ping_timeout_ms)
    }

    pub fn request_deadline(&self) -> Duration {
        Duration::from_millis(self.request_deadline_ms)
    }
}
