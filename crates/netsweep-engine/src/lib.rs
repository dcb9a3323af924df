//! netsweep-engine: Concurrent port and reachability scanning.
//!
//! Expands an IPv4 range, probes every address through a bounded worker
//! pool, and returns one record per address in ascending address order.

pub mod coordinator;
pub mod label;
pub mod probe;
pub mod range;

pub use coordinator::ScanCoordinator;
pub use label::{LabelFormatter, TemplateLabel};
pub use probe::{PingProbe, PortProber, ReachabilityProber, TcpPortProbe};
pub use range::AddressRange;
