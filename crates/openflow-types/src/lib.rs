//! OpenFlow 1.0 vocabulary for SONiC flow management.
//!
//! This crate provides the typed, in-memory form of the OpenFlow messages
//! the flow manager exchanges with the controller runtime. Wire encoding is
//! done by the controller; everything here is plain data:
//!
//! - [`Dpid`]: 64-bit datapath identifiers
//! - [`MacAddress`]: 48-bit Ethernet MAC addresses
//! - [`PortNo`]: switch port numbers, including the reserved ports
//! - [`FlowMatch`]: the OF1.0 12-tuple match with wildcards
//! - [`Action`]: OF1.0 actions
//! - [`FlowMod`], [`StatsRequest`], [`StatsReply`]: controller messages
//! - [`OutboundEvent`], [`InboundEvent`]: controller event envelopes

mod action;
mod dpid;
mod event;
mod flow_match;
mod mac;
mod message;
mod port;

pub use action::Action;
pub use dpid::Dpid;
pub use event::{
    event_names, ConnectionId, InboundEvent, InboundMessage, OfMessage, OutboundEvent,
    SwitchConnection,
};
pub use flow_match::{wildcards, FlowMatch, Ipv4Match};
pub use mac::MacAddress;
pub use message::{
    AggregateStats, DescStats, FlowMod, FlowModCommand, FlowModFlags, FlowStats,
    FlowStatsRequest, StatsReply, StatsReplyBody, StatsRequest, StatsRequestBody, StatsType,
    NO_BUFFER, OFP_DEFAULT_PRIORITY, TABLE_ALL,
};
pub use port::PortNo;

/// Common error type for parsing failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("invalid datapath id: {0}")]
    InvalidDpid(String),

    #[error("invalid MAC address format: {0}")]
    InvalidMacAddress(String),

    #[error("invalid IPv4 match: {0}")]
    InvalidIpv4Match(String),

    #[error("invalid port number: {0}")]
    InvalidPort(String),

    #[error("invalid value for {field}: {reason}")]
    InvalidField { field: &'static str, reason: String },
}

impl ParseError {
    pub(crate) fn field(field: &'static str, reason: impl Into<String>) -> Self {
        ParseError::InvalidField {
            field,
            reason: reason.into(),
        }
    }
}
