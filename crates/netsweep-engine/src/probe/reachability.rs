//! Host reachability probe.
//!
//! Sends one ICMP echo through the system `ping` binary, which carries the
//! raw-socket privilege the scanner itself usually lacks. When `ping` cannot
//! run at all, liveness is guessed from TCP connects to a few common ports:
//! a completed handshake or an active refusal both mean something answered.
//! That fallback is a heuristic and says nothing reliable about port state.

use std::future::Future;
use std::io;
use std::net::{Ipv4Addr, SocketAddr};
use std::process::Stdio;
use std::time::Duration;

use netsweep_core::{ProbeError, ReachabilityResult};
use tokio::process::Command;
use tokio::task::JoinSet;
use tokio::time::{timeout_at, Instant};

use super::{connect, ReachabilityProber};

/// What the `ping` child process told us.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Echo {
    Reply,
    NoReply,
    /// `ping` is missing, not permitted, or rejected its arguments.
    Unavailable,
}

impl Echo {
    /// 0 is a reply and 1 is silence. Anything else, including death by
    /// signal, means `ping` itself failed.
    fn from_exit_code(code: Option<i32>) -> Self {
        match code {
            Some(0) => Self::Reply,
            Some(1) => Self::NoReply,
            _ => Self::Unavailable,
        }
    }
}

/// ICMP echo via the system `ping`, with a TCP liveness fallback.
#[derive(Debug, Clone)]
pub struct PingProbe {
    ping_path: String,
    fallback_ports: Vec<u16>,
}

impl PingProbe {
    pub fn new(ping_path: &str, fallback_ports: Vec<u16>) -> Self {
        Self {
            ping_path: ping_path.to_string(),
            fallback_ports,
        }
    }

    async fn icmp_echo(&self, address: Ipv4Addr, timeout: Duration, deadline: Instant) -> Echo {
        let mut child = match Command::new(&self.ping_path)
            .args(ping_args(address, timeout))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
        {
            Ok(child) => child,
            Err(e) => {
                tracing::debug!(path = %self.ping_path, error = %e, "Could not spawn ping");
                return Echo::Unavailable;
            }
        };

        match timeout_at(deadline, child.wait()).await {
            Ok(Ok(status)) => {
                let echo = Echo::from_exit_code(status.code());
                if echo == Echo::Unavailable {
                    tracing::debug!(address = %address, code = ?status.code(), "ping exited abnormally");
                }
                echo
            }
            Ok(Err(e)) => {
                tracing::debug!(address = %address, error = %e, "Waiting on ping failed");
                Echo::Unavailable
            }
            Err(_elapsed) => Echo::NoReply,
        }
    }

    /// True if any fallback port completes a handshake or refuses it before
    /// `deadline`.
    async fn tcp_liveness(&self, address: Ipv4Addr, deadline: Instant) -> bool {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return false;
        }

        let mut attempts = JoinSet::new();
        for &port in &self.fallback_ports {
            attempts.spawn(async move {
                let target = SocketAddr::from((address, port));
                match connect(target, remaining).await {
                    Ok(_) => true,
                    Err(ProbeError::Network(e)) => e.kind() == io::ErrorKind::ConnectionRefused,
                    Err(ProbeError::Timeout) => false,
                }
            });
        }

        while let Some(joined) = attempts.join_next().await {
            if matches!(joined, Ok(true)) {
                return true;
            }
        }
        false
    }
}

impl Default for PingProbe {
    fn default() -> Self {
        Self::new("ping", vec![22, 80, 443, 445, 3389])
    }
}

impl ReachabilityProber for PingProbe {
    fn probe(
        &self,
        address: Ipv4Addr,
        timeout: Duration,
    ) -> impl Future<Output = ReachabilityResult> + Send {
        async move {
            let deadline = Instant::now() + timeout;
            let reachable = match self.icmp_echo(address, timeout, deadline).await {
                Echo::Reply => true,
                Echo::NoReply => false,
                Echo::Unavailable => {
                    tracing::debug!(address = %address, "ICMP unavailable, trying TCP liveness");
                    self.tcp_liveness(address, deadline).await
                }
            };
            tracing::debug!(address = %address, reachable, "Reachability probed");
            ReachabilityResult::new(address, reachable)
        }
    }
}

/// Arguments for a single echo request with a reply timeout.
fn ping_args(address: Ipv4Addr, timeout: Duration) -> Vec<String> {
    let millis = timeout.as_millis().max(1);

    if cfg!(target_os = "windows") {
        vec![
            "-n".into(),
            "1".into(),
            "-w".into(),
            millis.to_string(),
            address.to_string(),
        ]
    } else if cfg!(target_os = "linux") {
        // iputils takes whole seconds.
        let secs = millis.div_ceil(1000);
        vec![
            "-c".into(),
            "1".into(),
            "-W".into(),
            secs.to_string(),
            address.to_string(),
        ]
    } else {
        // macOS and the BSDs take milliseconds.
        vec![
            "-c".into(),
            "1".into(),
            "-W".into(),
            millis.to_string(),
            address.to_string(),
        ]
    }
}
