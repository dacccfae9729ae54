//! OpenFlow 1.0 actions.

use crate::{MacAddress, ParseError, PortNo};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::Ipv4Addr;

fn default_max_len() -> u16 {
    0xffff
}

/// An action applied to packets that hit a flow.
///
/// Serialised with an internal `type` tag, e.g.
/// `{"type": "output", "port": 2}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", deny_unknown_fields)]
pub enum Action {
    /// Output to a port. `max_len` only matters for the controller port.
    Output {
        port: PortNo,
        #[serde(default = "default_max_len")]
        max_len: u16,
    },
    SetVlanVid { vlan_vid: u16 },
    SetVlanPcp { vlan_pcp: u8 },
    StripVlan,
    SetDlSrc { dl_addr: MacAddress },
    SetDlDst { dl_addr: MacAddress },
    SetNwSrc { nw_addr: Ipv4Addr },
    SetNwDst { nw_addr: Ipv4Addr },
    SetNwTos { nw_tos: u8 },
    SetTpSrc { tp_port: u16 },
    SetTpDst { tp_port: u16 },
    /// Output to a queue attached to a port.
    Enqueue { port: PortNo, queue_id: u32 },
}

impl Action {
    /// Output to a port with the default `max_len`.
    pub fn output(port: PortNo) -> Self {
        Action::Output {
            port,
            max_len: default_max_len(),
        }
    }

    /// Checks value ranges the type system does not capture.
    pub fn validate(&self) -> Result<(), ParseError> {
        match self {
            Action::Output { port, .. } if *port == PortNo::NONE => {
                Err(ParseError::field("output.port", "cannot output to port none"))
            }
            Action::SetVlanVid { vlan_vid } if *vlan_vid > 0x0fff => Err(ParseError::field(
                "set_vlan_vid.vlan_vid",
                format!("{} > 4095", vlan_vid),
            )),
            Action::SetVlanPcp { vlan_pcp } if *vlan_pcp > 7 => Err(ParseError::field(
                "set_vlan_pcp.vlan_pcp",
                format!("{} > 7", vlan_pcp),
            )),
            Action::SetNwTos { nw_tos } if nw_tos & 0x03 != 0 => Err(ParseError::field(
                "set_nw_tos.nw_tos",
                format!("{} has ECN bits set", nw_tos),
            )),
            Action::Enqueue { port, .. } if !port.is_physical() && *port != PortNo::IN_PORT => {
                Err(ParseError::field(
                    "enqueue.port",
                    format!("{} is not a physical port", port),
                ))
            }
            _ => Ok(()),
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Output { port, .. } => write!(f, "output:{}", port),
            Action::SetVlanVid { vlan_vid } => write!(f, "mod_vlan_vid:{}", vlan_vid),
            Action::SetVlanPcp { vlan_pcp } => write!(f, "mod_vlan_pcp:{}", vlan_pcp),
            Action::StripVlan => write!(f, "strip_vlan"),
            Action::SetDlSrc { dl_addr } => write!(f, "mod_dl_src:{}", dl_addr),
            Action::SetDlDst { dl_addr } => write!(f, "mod_dl_dst:{}", dl_addr),
            Action::SetNwSrc { nw_addr } => write!(f, "mod_nw_src:{}", nw_addr),
            Action::SetNwDst { nw_addr } => write!(f, "mod_nw_dst:{}", nw_addr),
            Action::SetNwTos { nw_tos } => write!(f, "mod_nw_tos:{}", nw_tos),
            Action::SetTpSrc { tp_port } => write!(f, "mod_tp_src:{}", tp_port),
            Action::SetTpDst { tp_port } => write!(f, "mod_tp_dst:{}", tp_port),
            Action::Enqueue { port, queue_id } => write!(f, "enqueue:{}:{}", port, queue_id),
        }
    }
}
