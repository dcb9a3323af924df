//! Single-target network probes.
//!
//! A probe never fails: every timeout or network error is folded into a
//! negative record before it leaves the probe.

pub mod port;
pub mod reachability;

use std::future::Future;
use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

use netsweep_core::{PortResult, ProbeError, ReachabilityResult};
use tokio::net::TcpStream;

pub use port::TcpPortProbe;
pub use reachability::PingProbe;

/// Checks whether one TCP port accepts connections.
pub trait PortProber: Send + Sync + 'static {
    fn probe(
        &self,
        address: Ipv4Addr,
        port: u16,
        timeout: Duration,
    ) -> impl Future<Output = PortResult> + Send;
}

/// Checks whether one host is alive.
pub trait ReachabilityProber: Send + Sync + 'static {
    fn probe(
        &self,
        address: Ipv4Addr,
        timeout: Duration,
    ) -> impl Future<Output = ReachabilityResult> + Send;
}

/// TCP connect bounded by `timeout`.
pub(crate) async fn connect(target: SocketAddr, timeout: Duration) -> Result<TcpStream, ProbeError> {
    match tokio::time::timeout(timeout, TcpStream::connect(target)).await {
        Ok(Ok(stream)) => Ok(stream),
        Ok(Err(e)) => Err(ProbeError::Network(e)),
        Err(_elapsed) => Err(ProbeError::Timeout),
    }
}
