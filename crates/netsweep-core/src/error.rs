use serde::Serialize;
use thiserror::Error;

/// Request-level error for a scan.
///
/// Every variant aborts the whole request. Target-level failures never show
/// up here; see [`ProbeError`].
#[derive(Error, Debug)]
pub enum SweepError {
    #[error("Invalid IP range format {spec:?}: {reason}")]
    InvalidRangeFormat { spec: String, reason: String },

    #[error("IP range too large: {requested} addresses exceeds the limit of {limit}")]
    RangeTooLarge {
        /// Distinct addresses counted before the limit tripped. For a
        /// comma-separated list this is a lower bound on the full size.
        requested: u64,
        limit: usize,
    },

    #[error("A port is required for a port scan")]
    MissingPort,

    #[error("Invalid port: {0}")]
    InvalidPort(String),

    #[error("Scheduling error: {0}")]
    InternalScheduling(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl SweepError {
    pub fn invalid_range(spec: &str, reason: impl Into<String>) -> Self {
        Self::InvalidRangeFormat {
            spec: spec.to_string(),
            reason: reason.into(),
        }
    }

    /// HTTP status an outer layer should answer with.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::InvalidRangeFormat { .. }
            | Self::RangeTooLarge { .. }
            | Self::MissingPort
            | Self::InvalidPort(_) => 400,
            Self::InternalScheduling(_) | Self::Config(_) => 500,
        }
    }

    /// True when the caller supplied bad input.
    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.status_code())
    }
}

impl From<config::ConfigError> for SweepError {
    fn from(e: config::ConfigError) -> Self {
        Self::Config(e.to_string())
    }
}

/// JSON error payload returned alongside a non-2xx status.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ErrorBody {
    pub error: String,
}

impl From<&SweepError> for ErrorBody {
    fn from(e: &SweepError) -> Self {
        Self {
            error: e.to_string(),
        }
    }
}

/// Failure of a single probe. Absorbed into a negative outcome by the probe
/// that produced it.
#[derive(Error, Debug)]
pub enum ProbeError {
    #[error("probe timed out")]
    Timeout,

    #[error("network error: {0}")]
    Network(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, SweepError>;
