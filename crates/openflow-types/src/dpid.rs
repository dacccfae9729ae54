//! Datapath identifier.

use crate::ParseError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A 64-bit OpenFlow datapath identifier, the address of a switch.
///
/// Displayed as eight colon-separated hex octets, the same form switches
/// report in their features reply.
///
/// Parsing accepts, in this order: the colon form, `0x`-prefixed hex, a
/// bare 16-digit hex string with a leading zero or a hex letter (the
/// zero-padded form used in REST paths), and plain decimal. Any other
/// 16-digit string of decimal digits is read as decimal.
///
/// # Examples
///
/// ```
/// use openflow_types::Dpid;
///
/// let dpid: Dpid = "00:00:00:00:00:00:00:0a".parse().unwrap();
/// assert_eq!(dpid.as_u64(), 10);
/// assert_eq!(dpid, "0xa".parse().unwrap());
/// assert_eq!(dpid, "10".parse().unwrap());
/// assert_eq!(dpid.to_string(), "00:00:00:00:00:00:00:0a");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Dpid(u64);

impl Dpid {
    /// Creates a datapath id from its numeric value.
    pub const fn new(value: u64) -> Self {
        Dpid(value)
    }

    /// Returns the numeric value.
    pub const fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for Dpid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let b = self.0.to_be_bytes();
        write!(
            f,
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]
        )
    }
}

impl FromStr for Dpid {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ParseError::InvalidDpid(s.to_string());
        let s = s.trim();

        if s.contains(':') {
            let octets: Vec<&str> = s.split(':').collect();
            if octets.len() != 8 {
                return Err(invalid());
            }
            let mut value = 0u64;
            for octet in octets {
                if octet.is_empty() || octet.len() > 2 {
                    return Err(invalid());
                }
                let byte = u8::from_str_radix(octet, 16).map_err(|_| invalid())?;
                value = (value << 8) | u64::from(byte);
            }
            return Ok(Dpid(value));
        }

        if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
            return u64::from_str_radix(hex, 16).map(Dpid).map_err(|_| invalid());
        }

        let padded_hex = s.starts_with('0') || s.bytes().any(|b| b.is_ascii_alphabetic());
        if s.len() == 16 && padded_hex {
            return u64::from_str_radix(s, 16).map(Dpid).map_err(|_| invalid());
        }

        s.parse::<u64>().map(Dpid).map_err(|_| invalid())
    }
}

impl TryFrom<String> for Dpid {
    type Error = ParseError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Dpid> for String {
    fn from(dpid: Dpid) -> String {
        dpid.to_string()
    }
}

impl From<u64> for Dpid {
    fn from(value: u64) -> Self {
        Dpid(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_colon_form() {
        let dpid: Dpid = "00:00:00:00:00:00:00:01".parse().unwrap();
        assert_eq!(dpid.as_u64(), 1);

        let dpid: Dpid = "de:ad:be:ef:00:00:00:01".parse().unwrap();
        assert_eq!(dpid.as_u64(), 0xdead_beef_0000_0001);
    }

    #[test]
    fn test_parse_hex_and_decimal() {
        assert_eq!("0x2a".parse::<Dpid>().unwrap(), Dpid::new(42));
        assert_eq!("000000000000002a".parse::<Dpid>().unwrap(), Dpid::new(42));
        assert_eq!("42".parse::<Dpid>().unwrap(), Dpid::new(42));
    }

    #[test]
    fn test_sixteen_digit_decimal() {
        assert_eq!(
            "1000000000000000".parse::<Dpid>().unwrap(),
            Dpid::new(1_000_000_000_000_000)
        );
        assert_eq!(
            "100000000000000a".parse::<Dpid>().unwrap(),
            Dpid::new(0x1000_0000_0000_000a)
        );
        assert_eq!("0000000000000010".parse::<Dpid>().unwrap(), Dpid::new(16));
        assert!("1000000000000zzz".parse::<Dpid>().is_err());
    }

    #[test]
    fn test_display_round_trip() {
        let dpid = Dpid::new(0x0102_0304_0506_0708);
        assert_eq!(dpid.to_string(), "01:02:03:04:05:06:07:08");
        assert_eq!(dpid.to_string().parse::<Dpid>().unwrap(), dpid);
    }

    #[test]
    fn test_invalid() {
        assert!("".parse::<Dpid>().is_err());
        assert!("00:00:00:01".parse::<Dpid>().is_err());
        assert!("00:00:00:00:00:00:00:100".parse::<Dpid>().is_err());
        assert!("switch1".parse::<Dpid>().is_err());
        assert!("0xzz".parse::<Dpid>().is_err());
    }

    #[test]
    fn test_serde_as_string() {
        let json = serde_json::to_string(&Dpid::new(3)).unwrap();
        assert_eq!(json, "\"00:00:00:00:00:00:00:03\"");
        let back: Dpid = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Dpid::new(3));
    }
}
