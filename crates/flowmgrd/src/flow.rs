//! Flow entity: one forwarding rule of a switch flow table.
//!
//! A [`Flow`] is built either from a management request or from a switch
//! statistics record and is never mutated afterwards. Its identifier is a
//! digest of the rule itself, because OpenFlow 1.0 statistics carry no
//! controller-assigned id; the same rule therefore gets the same id whether
//! it was just submitted or read back from a switch.

use std::fmt;
use std::hash::{BuildHasher, Hash, Hasher};

use openflow_types::{
    Action, FlowMatch, FlowMod, FlowModCommand, FlowModFlags, FlowStats, PortNo, NO_BUFFER,
    OFP_DEFAULT_PRIORITY,
};
use serde::{Deserialize, Serialize};

use crate::error::{FlowMgrError, Result};

/// Fixed seeds so ids are stable for the lifetime of the process and
/// across every switch.
const ID_SEEDS: [u64; 4] = [
    0x736f_6e69_635f_666c,
    0x6f77_6d67_7264_5f69,
    0x645f_6469_6765_7374,
    0x0f10_0000_0000_0001,
];

/// Identifier of a flow, unique within one switch table.
///
/// Sixteen lowercase hex digits; parsing lowercases its input.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct FlowId(String);

impl FlowId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FlowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for FlowId {
    fn from(s: &str) -> Self {
        FlowId(s.to_ascii_lowercase())
    }
}

impl From<String> for FlowId {
    fn from(s: String) -> Self {
        FlowId::from(s.as_str())
    }
}

impl From<FlowId> for String {
    fn from(id: FlowId) -> String {
        id.0
    }
}

/// Flow-mod command kinds the flow manager emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowCommand {
    Add,
    Delete,
}

/// Counters reported by the switch for a polled flow.
///
/// Observational only; never part of the flow identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FlowCounters {
    pub table_id: u8,
    pub duration_sec: u32,
    pub duration_nsec: u32,
    pub packet_count: u64,
    pub byte_count: u64,
}

/// Management payload accepted by [`Flow::from_management_request`].
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct FlowRequest {
    #[serde(default)]
    id: Option<FlowId>,
    #[serde(rename = "match")]
    flow_match: FlowMatch,
    actions: Vec<Action>,
    #[serde(default = "default_priority")]
    priority: u16,
    #[serde(default)]
    idle_timeout: u16,
    #[serde(default)]
    hard_timeout: u16,
    #[serde(default)]
    cookie: u64,
}

fn default_priority() -> u16 {
    OFP_DEFAULT_PRIORITY
}

/// An immutable forwarding rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Flow {
    id: FlowId,
    #[serde(rename = "match")]
    flow_match: FlowMatch,
    priority: u16,
    idle_timeout: u16,
    hard_timeout: u16,
    cookie: u64,
    actions: Vec<Action>,
    #[serde(skip_serializing_if = "Option::is_none")]
    counters: Option<FlowCounters>,
}

impl Flow {
    /// Creates a flow with default priority, no timeouts and a zero cookie.
    pub fn new(flow_match: FlowMatch, actions: Vec<Action>) -> Self {
        Self::assemble(flow_match, OFP_DEFAULT_PRIORITY, 0, 0, 0, actions, None)
    }

    /// Returns a copy with a different priority.
    pub fn with_priority(self, priority: u16) -> Self {
        Self::assemble(
            self.flow_match,
            priority,
            self.idle_timeout,
            self.hard_timeout,
            self.cookie,
            self.actions,
            self.counters,
        )
    }

    /// Returns a copy with different idle/hard timeouts (seconds, 0 = none).
    pub fn with_timeouts(self, idle_timeout: u16, hard_timeout: u16) -> Self {
        Self::assemble(
            self.flow_match,
            self.priority,
            idle_timeout,
            hard_timeout,
            self.cookie,
            self.actions,
            self.counters,
        )
    }

    /// Returns a copy with a different cookie.
    pub fn with_cookie(self, cookie: u64) -> Self {
        Self::assemble(
            self.flow_match,
            self.priority,
            self.idle_timeout,
            self.hard_timeout,
            cookie,
            self.actions,
            self.counters,
        )
    }

    /// Parses a management flow description.
    ///
    /// `match` and `actions` are required; `priority` defaults to
    /// `OFP_DEFAULT_PRIORITY` and timeouts and cookie to zero. An `id`, if
    /// given, must equal the id derived from the rest of the description.
    pub fn from_management_request(payload: &serde_json::Value) -> Result<Self> {
        let request = FlowRequest::deserialize(payload)
            .map_err(|e| FlowMgrError::malformed(e.to_string()))?;

        request
            .flow_match
            .validate()
            .map_err(|e| FlowMgrError::malformed(e.to_string()))?;
        for action in &request.actions {
            action
                .validate()
                .map_err(|e| FlowMgrError::malformed(e.to_string()))?;
        }

        let flow = Self::assemble(
            request.flow_match,
            request.priority,
            request.idle_timeout,
            request.hard_timeout,
            request.cookie,
            request.actions,
            None,
        );

        if let Some(id) = request.id {
            if id != flow.id {
                return Err(FlowMgrError::malformed(format!(
                    "id {} does not match flow contents (expected {})",
                    id, flow.id
                )));
            }
        }

        Ok(flow)
    }

    /// Decodes one switch-reported flow statistics record.
    ///
    /// Never fails: any record the switch can produce is a flow it has
    /// installed, whether or not this manager would have accepted it.
    pub fn from_statistics_entry(entry: &FlowStats) -> Self {
        Self::assemble(
            entry.flow_match.clone(),
            entry.priority,
            entry.idle_timeout,
            entry.hard_timeout,
            entry.cookie,
            entry.actions.clone(),
            Some(FlowCounters {
                table_id: entry.table_id,
                duration_sec: entry.duration_sec,
                duration_nsec: entry.duration_nsec,
                packet_count: entry.packet_count,
                byte_count: entry.byte_count,
            }),
        )
    }

    /// Builds the flow-mod command that adds or removes this flow.
    ///
    /// Deletion is strict (exact match and priority) so removing one flow
    /// never takes overlapping flows with it.
    pub fn to_install_command(&self, command: FlowCommand) -> FlowMod {
        let (command, actions) = match command {
            FlowCommand::Add => (FlowModCommand::Add, self.actions.clone()),
            FlowCommand::Delete => (FlowModCommand::DeleteStrict, Vec::new()),
        };

        FlowMod {
            command,
            flow_match: self.flow_match.clone(),
            cookie: self.cookie,
            idle_timeout: self.idle_timeout,
            hard_timeout: self.hard_timeout,
            priority: self.priority,
            buffer_id: NO_BUFFER,
            out_port: PortNo::NONE,
            flags: FlowModFlags::empty(),
            actions,
        }
    }

    pub fn id(&self) -> &FlowId {
        &self.id
    }

    pub fn flow_match(&self) -> &FlowMatch {
        &self.flow_match
    }

    pub fn priority(&self) -> u16 {
        self.priority
    }

    pub fn idle_timeout(&self) -> u16 {
        self.idle_timeout
    }

    pub fn hard_timeout(&self) -> u16 {
        self.hard_timeout
    }

    pub fn cookie(&self) -> u64 {
        self.cookie
    }

    pub fn actions(&self) -> &[Action] {
        &self.actions
    }

    pub fn counters(&self) -> Option<&FlowCounters> {
        self.counters.as_ref()
    }

    fn assemble(
        flow_match: FlowMatch,
        priority: u16,
        idle_timeout: u16,
        hard_timeout: u16,
        cookie: u64,
        actions: Vec<Action>,
        counters: Option<FlowCounters>,
    ) -> Self {
        let id = flow_id(
            &flow_match,
            priority,
            idle_timeout,
            hard_timeout,
            cookie,
            &actions,
        );
        Self {
            id,
            flow_match,
            priority,
            idle_timeout,
            hard_timeout,
            cookie,
            actions,
            counters,
        }
    }
}

fn flow_id(
    flow_match: &FlowMatch,
    priority: u16,
    idle_timeout: u16,
    hard_timeout: u16,
    cookie: u64,
    actions: &[Action],
) -> FlowId {
    let state = ahash::RandomState::with_seeds(ID_SEEDS[0], ID_SEEDS[1], ID_SEEDS[2], ID_SEEDS[3]);
    let mut hasher = state.build_hasher();
    flow_match.hash(&mut hasher);
    priority.hash(&mut hasher);
    idle_timeout.hash(&mut hasher);
    hard_timeout.hash(&mut hasher);
    cookie.hash(&mut hasher);
    actions.hash(&mut hasher);
    FlowId(format!("{:016x}", hasher.finish()))
}
