//! OpenFlow 1.0 port numbers.

use crate::ParseError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A 16-bit OpenFlow 1.0 port number.
///
/// Physical ports occupy `1..=MAX`; the top of the range is reserved for
/// virtual ports (flood, controller, ...). Serialised as a number for
/// physical ports and as the lowercase reserved name otherwise, and both
/// forms are accepted when parsing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "PortRepr", into = "PortRepr")]
pub struct PortNo(u16);

impl PortNo {
    /// Highest physical port number.
    pub const MAX: PortNo = PortNo(0xff00);
    /// Send the packet out the input port.
    pub const IN_PORT: PortNo = PortNo(0xfff8);
    /// Perform the actions in the flow table.
    pub const TABLE: PortNo = PortNo(0xfff9);
    /// Process with normal L2/L3 switching.
    pub const NORMAL: PortNo = PortNo(0xfffa);
    /// All physical ports except input port and those disabled by STP.
    pub const FLOOD: PortNo = PortNo(0xfffb);
    /// All physical ports except input port.
    pub const ALL: PortNo = PortNo(0xfffc);
    /// Send to controller.
    pub const CONTROLLER: PortNo = PortNo(0xfffd);
    /// Local openflow "port".
    pub const LOCAL: PortNo = PortNo(0xfffe);
    /// Not associated with a physical port.
    pub const NONE: PortNo = PortNo(0xffff);

    const RESERVED: [(PortNo, &'static str); 8] = [
        (Self::IN_PORT, "in_port"),
        (Self::TABLE, "table"),
        (Self::NORMAL, "normal"),
        (Self::FLOOD, "flood"),
        (Self::ALL, "all"),
        (Self::CONTROLLER, "controller"),
        (Self::LOCAL, "local"),
        (Self::NONE, "none"),
    ];

    /// Creates a port number, rejecting values that are neither physical
    /// ports nor one of the reserved ports.
    pub fn new(value: u16) -> Result<Self, ParseError> {
        let port = PortNo(value);
        if port.is_physical() || port.reserved_name().is_some() {
            Ok(port)
        } else {
            Err(ParseError::InvalidPort(value.to_string()))
        }
    }

    pub const fn as_u16(&self) -> u16 {
        self.0
    }

    /// True for ports in `1..=MAX`.
    pub const fn is_physical(&self) -> bool {
        self.0 >= 1 && self.0 <= Self::MAX.0
    }

    /// Name of a reserved port, `None` for physical ports.
    pub fn reserved_name(&self) -> Option<&'static str> {
        Self::RESERVED
            .iter()
            .find(|(port, _)| port == self)
            .map(|(_, name)| *name)
    }
}

impl fmt::Display for PortNo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.reserved_name() {
            Some(name) => f.write_str(name),
            None => write!(f, "{}", self.0),
        }
    }
}

impl FromStr for PortNo {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.to_ascii_lowercase();
        if let Some((port, _)) = Self::RESERVED.iter().find(|(_, name)| *name == lower) {
            return Ok(*port);
        }
        let value: u16 = s
            .parse()
            .map_err(|_| ParseError::InvalidPort(s.to_string()))?;
        PortNo::new(value)
    }
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum PortRepr {
    Number(u16),
    Name(String),
}

impl TryFrom<PortRepr> for PortNo {
    type Error = ParseError;

    fn try_from(repr: PortRepr) -> Result<Self, Self::Error> {
        match repr {
            PortRepr::Number(n) => PortNo::new(n),
            PortRepr::Name(s) => s.parse(),
        }
    }
}

impl From<PortNo> for PortRepr {
    fn from(port: PortNo) -> Self {
        match port.reserved_name() {
            Some(name) => PortRepr::Name(name.to_string()),
            None => PortRepr::Number(port.0),
        }
    }
}
