//! Core domain types for scan requests and their results.
//!
//! Result records serialize to the JSON shapes the scan front end consumes:
//! `{ip, port, isOpen, uri?}` for port scans and `{ip, isReachable}` for
//! reachability scans.

use std::fmt;
use std::net::Ipv4Addr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ── Requests ──────────────────────────────────────────────────────

/// Which probe a scan runs against every address.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ScanMode {
    /// TCP connect to a single port.
    Port,
    /// ICMP echo, with a TCP liveness fallback.
    Reachability,
}

impl fmt::Display for ScanMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Port => f.write_str("port"),
            Self::Reachability => f.write_str("reachability"),
        }
    }
}

/// One address to probe, tagged with its position in the expanded range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanTarget {
    pub index: usize,
    pub address: Ipv4Addr,
    pub port: Option<u16>,
}

/// Lifecycle of a single target inside a scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetState {
    Pending,
    Probing,
    Succeeded,
    Failed,
    TimedOut,
}

impl TargetState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::TimedOut)
    }
}

// ── Result records ────────────────────────────────────────────────

/// Common behaviour of per-target records.
pub trait ProbeRecord: Send + 'static {
    /// The record reported when the probe failed, timed out, or never ran.
    fn negative(target: &ScanTarget) -> Self;

    /// Whether the probe observed an open port or a live host.
    fn is_positive(&self) -> bool;
}

/// Outcome of a TCP connect to one address.
///
/// `uri` is present exactly when the port is open.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PortResult {
    ip: Ipv4Addr,
    port: u16,
    is_open: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    uri: Option<String>,
}

impl PortResult {
    pub fn open(ip: Ipv4Addr, port: u16, uri: String) -> Self {
        Self {
            ip,
            port,
            is_open: true,
            uri: Some(uri),
        }
    }

    pub fn closed(ip: Ipv4Addr, port: u16) -> Self {
        Self {
            ip,
            port,
            is_open: false,
            uri: None,
        }
    }

    pub fn ip(&self) -> Ipv4Addr {
        self.ip
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn is_open(&self) -> bool {
        self.is_open
    }

    /// Service label for the open endpoint.
    pub fn uri(&self) -> Option<&str> {
        self.uri.as_deref()
    }
}

impl ProbeRecord for PortResult {
    fn negative(target: &ScanTarget) -> Self {
        Self::closed(target.address, target.port.unwrap_or_default())
    }

    fn is_positive(&self) -> bool {
        self.is_open
    }
}

/// Outcome of a reachability check on one address.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ReachabilityResult {
    ip: Ipv4Addr,
    is_reachable: bool,
}

impl ReachabilityResult {
    pub fn new(ip: Ipv4Addr, is_reachable: bool) -> Self {
        Self { ip, is_reachable }
    }

    pub fn ip(&self) -> Ipv4Addr {
        self.ip
    }

    pub fn is_reachable(&self) -> bool {
        self.is_reachable
    }
}

impl ProbeRecord for ReachabilityResult {
    fn negative(target: &ScanTarget) -> Self {
        Self::new(target.address, false)
    }

    fn is_positive(&self) -> bool {
        self.is_reachable
    }
}

// ── Result sets ───────────────────────────────────────────────────

/// Counters describing how a scan went.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScanSummary {
    pub total: usize,
    pub positive: usize,
    pub negative: usize,
    /// Targets whose probe ran out of time, or never finished before the
    /// request deadline.
    pub timed_out: usize,
    pub deadline_exceeded: bool,
}

/// Ordered, complete outcomes of one scan request.
///
/// `entries` is index-aligned with the expanded address range.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultSet<T> {
    scan_id: Uuid,
    range: String,
    mode: ScanMode,
    started_at: DateTime<Utc>,
    finished_at: DateTime<Utc>,
    summary: ScanSummary,
    entries: Vec<T>,
}

impl<T: ProbeRecord> ResultSet<T> {
    /// Seal a finished scan.
    pub fn new(
        scan_id: Uuid,
        range: &str,
        mode: ScanMode,
        started_at: DateTime<Utc>,
        entries: Vec<T>,
        timed_out: usize,
        deadline_exceeded: bool,
    ) -> Self {
        let positive = entries.iter().filter(|e| e.is_positive()).count();
        let summary = ScanSummary {
            total: entries.len(),
            positive,
            negative: entries.len() - positive,
            timed_out,
            deadline_exceeded,
        };
        Self {
            scan_id,
            range: range.to_string(),
            mode,
            started_at,
            finished_at: Utc::now(),
            summary,
            entries,
        }
    }
}

impl<T> ResultSet<T> {
    pub fn scan_id(&self) -> Uuid {
        self.scan_id
    }

    pub fn range(&self) -> &str {
        &self.range
    }

    pub fn mode(&self) -> ScanMode {
        self.mode
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn finished_at(&self) -> DateTime<Utc> {
        self.finished_at
    }

    pub fn summary(&self) -> &ScanSummary {
        &self.summary
    }

    pub fn entries(&self) -> &[T] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn into_entries(self) -> Vec<T> {
        self.entries
    }
}

impl<T: Serialize> ResultSet<T> {
    /// The bare JSON array returned to the front end.
    pub fn to_json(&self, pretty: bool) -> serde_json::Result<String> {
        if pretty {
            serde_json::to_string_pretty(&self.entries)
        } else {
            serde_json::to_string(&self.entries)
        }
    }
}

/// Result of a scan in either mode.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "mode", content = "results", rename_all = "lowercase")]
pub enum ScanReport {
    Port(ResultSet<PortResult>),
    Reachability(ResultSet<ReachabilityResult>),
}

impl ScanReport {
    pub fn scan_id(&self) -> Uuid {
        match self {
            Self::Port(r) => r.scan_id(),
            Self::Reachability(r) => r.scan_id(),
        }
    }

    pub fn summary(&self) -> &ScanSummary {
        match self {
            Self::Port(r) => r.summary(),
            Self::Reachability(r) => r.summary(),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Self::Port(r) => r.len(),
            Self::Reachability(r) => r.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn to_json(&self, pretty: bool) -> serde_json::Result<String> {
        match self {
            Self::Port(r) => r.to_json(pretty),
            Self::Reachability(r) => r.to_json(pretty),
        }
    }
}
