//! netsweep-core: Shared types, configuration, and error handling for netsweep.
//!
//! This crate provides the foundational types used by the scanning engine:
//! - Scan targets, per-host result records, and ordered result sets
//! - The JSON wire shapes consumed by the scan front end
//! - Configuration management
//! - Request-level and probe-level error types

pub mod config;
pub mod error;
pub mod types;

pub use config::ScanConfig;
pub use error::{ErrorBody, ProbeError, Result, SweepError};
pub use types::{
    PortResult, ProbeRecord, ReachabilityResult, ResultSet, ScanMode, ScanReport, ScanSummary,
    ScanTarget, TargetState,
};
