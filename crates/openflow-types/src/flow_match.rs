//! The OpenFlow 1.0 flow match (`ofp_match`).

use crate::{MacAddress, ParseError, PortNo};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;

/// Wildcard bits of `ofp_match.wildcards`.
pub mod wildcards {
    pub const IN_PORT: u32 = 1 << 0;
    pub const DL_VLAN: u32 = 1 << 1;
    pub const DL_SRC: u32 = 1 << 2;
    pub const DL_DST: u32 = 1 << 3;
    pub const DL_TYPE: u32 = 1 << 4;
    pub const NW_PROTO: u32 = 1 << 5;
    pub const TP_SRC: u32 = 1 << 6;
    pub const TP_DST: u32 = 1 << 7;
    pub const NW_SRC_SHIFT: u32 = 8;
    pub const NW_SRC_MASK: u32 = 0x3f << NW_SRC_SHIFT;
    pub const NW_SRC_ALL: u32 = 32 << NW_SRC_SHIFT;
    pub const NW_DST_SHIFT: u32 = 14;
    pub const NW_DST_MASK: u32 = 0x3f << NW_DST_SHIFT;
    pub const NW_DST_ALL: u32 = 32 << NW_DST_SHIFT;
    pub const DL_VLAN_PCP: u32 = 1 << 20;
    pub const NW_TOS: u32 = 1 << 21;
    pub const ALL: u32 = (1 << 22) - 1;
}

/// Highest VLAN id a match may carry.
const VLAN_VID_MAX: u16 = 0x0fff;
/// `OFP_VLAN_NONE`: match packets without a VLAN tag.
const VLAN_NONE: u16 = 0xffff;

/// An IPv4 address with a prefix length, as matched by nw_src/nw_dst.
///
/// Host bits are cleared on construction so two spellings of the same
/// network compare equal, matching what a switch reports back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Ipv4Match {
    addr: Ipv4Addr,
    prefix_len: u8,
}

impl Ipv4Match {
    pub fn new(addr: Ipv4Addr, prefix_len: u8) -> Result<Self, ParseError> {
        if prefix_len > 32 {
            return Err(ParseError::InvalidIpv4Match(format!(
                "{}/{}",
                addr, prefix_len
            )));
        }
        let mask = if prefix_len == 0 {
            0
        } else {
            u32::MAX << (32 - u32::from(prefix_len))
        };
        Ok(Self {
            addr: Ipv4Addr::from(u32::from(addr) & mask),
            prefix_len,
        })
    }

    pub fn addr(&self) -> Ipv4Addr {
        self.addr
    }

    pub fn prefix_len(&self) -> u8 {
        self.prefix_len
    }

    /// Number of wildcarded low-order bits, as encoded in the wildcards field.
    pub fn wildcard_bits(&self) -> u32 {
        32 - u32::from(self.prefix_len)
    }
}

impl fmt::Display for Ipv4Match {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.prefix_len == 32 {
            write!(f, "{}", self.addr)
        } else {
            write!(f, "{}/{}", self.addr, self.prefix_len)
        }
    }
}

impl FromStr for Ipv4Match {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ParseError::InvalidIpv4Match(s.to_string());
        let (addr, len) = match s.split_once('/') {
            Some((addr, len)) => (addr, len.parse::<u8>().map_err(|_| invalid())?),
            None => (s, 32),
        };
        let addr: Ipv4Addr = addr.parse().map_err(|_| invalid())?;
        Ipv4Match::new(addr, len)
    }
}

impl TryFrom<String> for Ipv4Match {
    type Error = ParseError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Ipv4Match> for String {
    fn from(m: Ipv4Match) -> String {
        m.to_string()
    }
}

/// OpenFlow 1.0 match structure.
///
/// Every field is optional; `None` means the field is wildcarded. The
/// empty match (`FlowMatch::all()`) matches every packet and is what a
/// table-wide flow statistics request carries.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FlowMatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub in_port: Option<PortNo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dl_src: Option<MacAddress>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dl_dst: Option<MacAddress>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dl_vlan: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dl_vlan_pcp: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dl_type: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nw_tos: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nw_proto: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nw_src: Option<Ipv4Match>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nw_dst: Option<Ipv4Match>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tp_src: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tp_dst: Option<u16>,
}

impl FlowMatch {
    /// The fully wildcarded match.
    pub fn all() -> Self {
        Self::default()
    }

    /// Returns true if no field is constrained.
    pub fn is_all(&self) -> bool {
        self.wildcards() == wildcards::ALL
    }

    /// Computes `ofp_match.wildcards` for this match.
    pub fn wildcards(&self) -> u32 {
        let mut w = 0;
        let flag = |present: bool, bit: u32| if present { 0 } else { bit };

        w |= flag(self.in_port.is_some(), wildcards::IN_PORT);
        w |= flag(self.dl_vlan.is_some(), wildcards::DL_VLAN);
        w |= flag(self.dl_src.is_some(), wildcards::DL_SRC);
        w |= flag(self.dl_dst.is_some(), wildcards::DL_DST);
        w |= flag(self.dl_type.is_some(), wildcards::DL_TYPE);
        w |= flag(self.nw_proto.is_some(), wildcards::NW_PROTO);
        w |= flag(self.tp_src.is_some(), wildcards::TP_SRC);
        w |= flag(self.tp_dst.is_some(), wildcards::TP_DST);
        w |= flag(self.dl_vlan_pcp.is_some(), wildcards::DL_VLAN_PCP);
        w |= flag(self.nw_tos.is_some(), wildcards::NW_TOS);

        w |= match self.nw_src {
            Some(m) => m.wildcard_bits() << wildcards::NW_SRC_SHIFT,
            None => wildcards::NW_SRC_ALL,
        };
        w |= match self.nw_dst {
            Some(m) => m.wildcard_bits() << wildcards::NW_DST_SHIFT,
            None => wildcards::NW_DST_ALL,
        };

        w
    }

    /// Checks field ranges the type system does not capture.
    pub fn validate(&self) -> Result<(), ParseError> {
        if let Some(vlan) = self.dl_vlan {
            if vlan > VLAN_VID_MAX && vlan != VLAN_NONE {
                return Err(ParseError::field(
                    "dl_vlan",
                    format!("{} is outside 0..=4095 and is not OFP_VLAN_NONE", vlan),
                ));
            }
        }
        if let Some(pcp) = self.dl_vlan_pcp {
            if pcp > 7 {
                return Err(ParseError::field("dl_vlan_pcp", format!("{} > 7", pcp)));
            }
        }
        if let Some(tos) = self.nw_tos {
            if tos & 0x03 != 0 {
                return Err(ParseError::field(
                    "nw_tos",
                    format!("{} has ECN bits set; only the DSCP bits may be matched", tos),
                ));
            }
        }
        Ok(())
    }
}
