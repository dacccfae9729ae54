//! Controller-to-switch messages: flow modification and statistics.

use crate::{Action, FlowMatch, PortNo};
use serde::{Deserialize, Serialize};
use std::fmt;

/// `OFP_DEFAULT_PRIORITY`.
pub const OFP_DEFAULT_PRIORITY: u16 = 0x8000;

/// Buffer id meaning "no buffered packet".
pub const NO_BUFFER: u32 = 0xffff_ffff;

/// Table id selecting every table in a flow statistics request.
pub const TABLE_ALL: u8 = 0xff;

/// `ofp_flow_mod_command`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowModCommand {
    /// New flow.
    Add,
    /// Modify all matching flows.
    Modify,
    /// Modify entry strictly matching wildcards and priority.
    ModifyStrict,
    /// Delete all matching flows.
    Delete,
    /// Delete entry strictly matching wildcards and priority.
    DeleteStrict,
}

impl FlowModCommand {
    /// Wire value of the command.
    pub const fn as_u16(&self) -> u16 {
        match self {
            FlowModCommand::Add => 0,
            FlowModCommand::Modify => 1,
            FlowModCommand::ModifyStrict => 2,
            FlowModCommand::Delete => 3,
            FlowModCommand::DeleteStrict => 4,
        }
    }

    pub const fn is_delete(&self) -> bool {
        matches!(self, FlowModCommand::Delete | FlowModCommand::DeleteStrict)
    }
}

impl fmt::Display for FlowModCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FlowModCommand::Add => "OFPFC_ADD",
            FlowModCommand::Modify => "OFPFC_MODIFY",
            FlowModCommand::ModifyStrict => "OFPFC_MODIFY_STRICT",
            FlowModCommand::Delete => "OFPFC_DELETE",
            FlowModCommand::DeleteStrict => "OFPFC_DELETE_STRICT",
        };
        f.write_str(name)
    }
}

/// `ofp_flow_mod_flags` bitmap.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FlowModFlags(u16);

impl FlowModFlags {
    pub const fn empty() -> Self {
        FlowModFlags(0)
    }

    pub const fn bits(&self) -> u16 {
        self.0
    }
}

/// `OFPT_FLOW_MOD`: add, modify or delete entries of a flow table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowMod {
    pub command: FlowModCommand,
    #[serde(rename = "match")]
    pub flow_match: FlowMatch,
    pub cookie: u64,
    pub idle_timeout: u16,
    pub hard_timeout: u16,
    pub priority: u16,
    pub buffer_id: u32,
    /// Restricts delete commands to flows outputting to this port.
    pub out_port: PortNo,
    pub flags: FlowModFlags,
    pub actions: Vec<Action>,
}

/// `ofp_stats_types`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatsType {
    Desc,
    Flow,
    Aggregate,
    Table,
    Port,
    Queue,
    Vendor,
}

impl StatsType {
    pub const fn as_u16(&self) -> u16 {
        match self {
            StatsType::Desc => 0,
            StatsType::Flow => 1,
            StatsType::Aggregate => 2,
            StatsType::Table => 3,
            StatsType::Port => 4,
            StatsType::Queue => 5,
            StatsType::Vendor => 0xffff,
        }
    }
}

impl fmt::Display for StatsType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StatsType::Desc => "OFPST_DESC",
            StatsType::Flow => "OFPST_FLOW",
            StatsType::Aggregate => "OFPST_AGGREGATE",
            StatsType::Table => "OFPST_TABLE",
            StatsType::Port => "OFPST_PORT",
            StatsType::Queue => "OFPST_QUEUE",
            StatsType::Vendor => "OFPST_VENDOR",
        };
        f.write_str(name)
    }
}

/// Body of a flow or aggregate statistics request (`ofp_flow_stats_request`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowStatsRequest {
    #[serde(rename = "match")]
    pub flow_match: FlowMatch,
    pub table_id: u8,
    pub out_port: PortNo,
}

impl FlowStatsRequest {
    /// Every flow in every table.
    pub fn all_flows() -> Self {
        Self {
            flow_match: FlowMatch::all(),
            table_id: TABLE_ALL,
            out_port: PortNo::NONE,
        }
    }
}

/// Typed body of `OFPT_STATS_REQUEST`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StatsRequestBody {
    Desc,
    Flow(FlowStatsRequest),
    Aggregate(FlowStatsRequest),
    Table,
    Port { port_no: PortNo },
    Queue { port_no: PortNo, queue_id: u32 },
}

impl StatsRequestBody {
    pub fn stats_type(&self) -> StatsType {
        match self {
            StatsRequestBody::Desc => StatsType::Desc,
            StatsRequestBody::Flow(_) => StatsType::Flow,
            StatsRequestBody::Aggregate(_) => StatsType::Aggregate,
            StatsRequestBody::Table => StatsType::Table,
            StatsRequestBody::Port { .. } => StatsType::Port,
            StatsRequestBody::Queue { .. } => StatsType::Queue,
        }
    }
}

/// `OFPT_STATS_REQUEST`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsRequest {
    pub flags: u16,
    pub body: StatsRequestBody,
}

impl StatsRequest {
    /// Table-wide flow statistics with an empty (wildcard) match.
    pub fn all_flows() -> Self {
        Self {
            flags: 0,
            body: StatsRequestBody::Flow(FlowStatsRequest::all_flows()),
        }
    }

    pub fn stats_type(&self) -> StatsType {
        self.body.stats_type()
    }
}

/// One `ofp_flow_stats` record of a flow statistics reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowStats {
    pub table_id: u8,
    #[serde(rename = "match")]
    pub flow_match: FlowMatch,
    pub duration_sec: u32,
    pub duration_nsec: u32,
    pub priority: u16,
    pub idle_timeout: u16,
    pub hard_timeout: u16,
    pub cookie: u64,
    pub packet_count: u64,
    pub byte_count: u64,
    pub actions: Vec<Action>,
}

/// `ofp_desc_stats`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DescStats {
    pub mfr_desc: String,
    pub hw_desc: String,
    pub sw_desc: String,
    pub serial_num: String,
    pub dp_desc: String,
}

/// `ofp_aggregate_stats_reply`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregateStats {
    pub packet_count: u64,
    pub byte_count: u64,
    pub flow_count: u32,
}

/// Typed body of `OFPT_STATS_REPLY`.
///
/// Table, port and queue bodies are carried opaquely; the flow manager
/// only interprets flow statistics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "entries", rename_all = "snake_case")]
pub enum StatsReplyBody {
    Desc(DescStats),
    Flow(Vec<FlowStats>),
    Aggregate(AggregateStats),
    Table(Vec<u8>),
    Port(Vec<u8>),
    Queue(Vec<u8>),
    Vendor(Vec<u8>),
}

impl StatsReplyBody {
    pub fn stats_type(&self) -> StatsType {
        match self {
            StatsReplyBody::Desc(_) => StatsType::Desc,
            StatsReplyBody::Flow(_) => StatsType::Flow,
            StatsReplyBody::Aggregate(_) => StatsType::Aggregate,
            StatsReplyBody::Table(_) => StatsType::Table,
            StatsReplyBody::Port(_) => StatsType::Port,
            StatsReplyBody::Queue(_) => StatsType::Queue,
            StatsReplyBody::Vendor(_) => StatsType::Vendor,
        }
    }
}

/// `OFPT_STATS_REPLY`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsReply {
    pub flags: u16,
    pub body: StatsReplyBody,
}

impl StatsReply {
    /// `OFPSF_REPLY_MORE`: more replies follow for the same request.
    pub const REPLY_MORE: u16 = 1 << 0;

    /// A final (unflagged) reply.
    pub fn new(body: StatsReplyBody) -> Self {
        Self { flags: 0, body }
    }

    /// A fragment that announces further fragments.
    pub fn fragment(body: StatsReplyBody) -> Self {
        Self {
            flags: Self::REPLY_MORE,
            body,
        }
    }

    pub fn has_more(&self) -> bool {
        self.flags & Self::REPLY_MORE != 0
    }

    pub fn stats_type(&self) -> StatsType {
        self.body.stats_type()
    }
}
