//! TCP connect probe.

use std::future::Future;
use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

use netsweep_core::PortResult;

use super::{connect, PortProber};
use crate::label::{LabelFormatter, TemplateLabel};

/// Opens a TCP connection and closes it right after the handshake.
pub struct TcpPortProbe {
    label: Box<dyn LabelFormatter>,
}

impl TcpPortProbe {
    pub fn new(label: impl LabelFormatter + 'static) -> Self {
        Self {
            label: Box::new(label),
        }
    }
}

impl Default for TcpPortProbe {
    fn default() -> Self {
        Self::new(TemplateLabel::default())
    }
}

impl PortProber for TcpPortProbe {
    fn probe(
        &self,
        address: Ipv4Addr,
        port: u16,
        timeout: Duration,
    ) -> impl Future<Output = PortResult> + Send {
        async move {
            let target = SocketAddr::from((address, port));
            match connect(target, timeout).await {
                Ok(stream) => {
                    let peer = stream.peer_addr().unwrap_or(target);
                    drop(stream);
                    tracing::debug!(target = %target, "Port open");
                    PortResult::open(address, port, self.label.format(peer))
                }
                Err(e) => {
                    tracing::debug!(target = %target, error = %e, "Port closed");
                    PortResult::closed(address, port)
                }
            }
        }
    }
}
