//! Error types for flowmgrd.
//!
//! All errors implement `std::error::Error` via `thiserror`.

use openflow_types::{Dpid, StatsType};
use thiserror::Error;

/// Result type alias for flow manager operations.
pub type Result<T> = std::result::Result<T, FlowMgrError>;

/// Errors that can occur during flow manager operations.
#[derive(Debug, Error)]
pub enum FlowMgrError {
    /// The datapath id does not resolve to a live switch connection.
    #[error("Unknown switch: {dpid}")]
    UnknownSwitch {
        /// The datapath id that failed to resolve.
        dpid: Dpid,
    },

    /// A management flow description failed validation.
    #[error("Malformed flow: {reason}")]
    MalformedFlow {
        /// What was wrong with the description.
        reason: String,
    },

    /// A statistics reply carried a body other than flow statistics.
    ///
    /// Never returned to callers; the reply handler logs and drops it.
    #[error("Unsupported statistics body: {body}")]
    UnsupportedStatisticsBody {
        /// The body type that was received.
        body: StatsType,
    },

    /// Configuration could not be loaded or is invalid.
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl FlowMgrError {
    /// Creates an unknown switch error.
    pub fn unknown_switch(dpid: Dpid) -> Self {
        Self::UnknownSwitch { dpid }
    }

    /// Creates a malformed flow error.
    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedFlow {
            reason: reason.into(),
        }
    }

    /// Returns true if repeating the operation later may succeed.
    ///
    /// A switch that is unknown now may reconnect; a malformed flow stays
    /// malformed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, FlowMgrError::UnknownSwitch { .. })
    }
}
