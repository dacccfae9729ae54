//! Controller event envelopes.
//!
//! The controller runtime moves messages between applications and switch
//! connections as named events. Outbound events carry a destination
//! connection; inbound events carry the datapath id of the switch that sent
//! the message, which is the only correlation key the flow manager uses.

use crate::{Dpid, FlowMod, StatsReply, StatsRequest};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Event names exchanged with the controller.
pub mod event_names {
    /// Outbound flow modification.
    pub const OUT_FLOW_MOD: &str = "flowmgr.messages.out.ofpt_flow_mod";
    /// Outbound statistics request.
    pub const OUT_STATS_REQUEST: &str = "flowmgr.messages.out.ofpt_stats_request";
    /// Inbound statistics reply.
    pub const IN_STATS_REPLY: &str = "of_core.messages.in.ofpt_stats_reply";
}

/// Identifier of a controller-owned switch connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectionId(pub u64);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Opaque handle addressing a switch connection.
///
/// Owned by the controller and valid for a single operation; callers look
/// it up again instead of caching it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SwitchConnection {
    pub id: ConnectionId,
    pub dpid: Dpid,
}

/// Payload of an outbound event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "body", rename_all = "snake_case")]
pub enum OfMessage {
    FlowMod(FlowMod),
    StatsRequest(StatsRequest),
}

impl OfMessage {
    /// Event name this payload travels under.
    pub fn event_name(&self) -> &'static str {
        match self {
            OfMessage::FlowMod(_) => event_names::OUT_FLOW_MOD,
            OfMessage::StatsRequest(_) => event_names::OUT_STATS_REQUEST,
        }
    }
}

/// `{destination, message}` envelope handed to the controller's outbound
/// buffer. Delivery is fire-and-forget.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundEvent {
    pub name: String,
    pub destination: SwitchConnection,
    pub message: OfMessage,
}

impl OutboundEvent {
    /// Wraps a message, naming the event after its payload.
    pub fn new(destination: SwitchConnection, message: OfMessage) -> Self {
        Self {
            name: message.event_name().to_string(),
            destination,
            message,
        }
    }
}

/// Payload of an inbound event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "body", rename_all = "snake_case")]
pub enum InboundMessage {
    StatsReply(StatsReply),
    /// Any other switch-to-controller message, kept as its type name.
    Other(String),
}

/// `{message, switch}` envelope delivered by the controller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundEvent {
    pub name: String,
    pub switch: Dpid,
    pub message: InboundMessage,
}

impl InboundEvent {
    /// A statistics reply event from `switch`.
    pub fn stats_reply(switch: Dpid, reply: StatsReply) -> Self {
        Self {
            name: event_names::IN_STATS_REPLY.to_string(),
            switch,
            message: InboundMessage::StatsReply(reply),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::StatsReplyBody;

    #[test]
    fn test_outbound_event_named_after_payload() {
        let dest = SwitchConnection {
            id: ConnectionId(1),
            dpid: Dpid::new(1),
        };
        let event = OutboundEvent::new(dest, OfMessage::StatsRequest(StatsRequest::all_flows()));
        assert_eq!(event.name, event_names::OUT_STATS_REQUEST);
    }

    #[test]
    fn test_inbound_stats_reply() {
        let event = InboundEvent::stats_reply(
            Dpid::new(9),
            StatsReply::new(StatsReplyBody::Flow(vec![])),
        );
        assert_eq!(event.name, event_names::IN_STATS_REPLY);
        assert_eq!(event.switch, Dpid::new(9));
    }
}
