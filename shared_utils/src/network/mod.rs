//! Network primitives shared by the seed server components.
//!
//! Address ranges are plain [`ipnet::IpNet`] values. This module adds the
//! address-family selector used by the tunnel configuration and the
//! deterministic HA client address allocator.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

mod allocator;

pub use allocator::{
    AllocationError, HA_HOST_OFFSET, HA_SLOT_STRIDE, HaClientAddresses, ha_client_address,
    ha_client_addresses, ha_slot_network,
};
pub use ipnet::IpNet;

/// Address families the tunnel is operated with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum IpFamilies {
    /// IPv4 only
    #[default]
    Ipv4,
    /// IPv6 only
    Ipv6,
    /// Both IPv4 and IPv6
    DualStack,
}

impl IpFamilies {
    pub fn as_str(&self) -> &'static str {
        match self {
            IpFamilies::Ipv4 => "IPv4",
            IpFamilies::Ipv6 => "IPv6",
            IpFamilies::DualStack => "IPv4,IPv6",
        }
    }

    pub fn has_ipv4(&self) -> bool {
        matches!(self, IpFamilies::Ipv4 | IpFamilies::DualStack)
    }

    pub fn has_ipv6(&self) -> bool {
        matches!(self, IpFamilies::Ipv6 | IpFamilies::DualStack)
    }
}

impl fmt::Display for IpFamilies {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when an address-family selector cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown IP families selector `{0}` (expected IPv4, IPv6 or IPv4,IPv6)")]
pub struct ParseIpFamiliesError(pub String);

impl FromStr for IpFamilies {
    type Err = ParseIpFamiliesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect::<String>()
            .to_ascii_lowercase();
        match normalized.as_str() {
            "ipv4" | "4" => Ok(IpFamilies::Ipv4),
            "ipv6" | "6" => Ok(IpFamilies::Ipv6),
            "ipv4,ipv6" | "ipv6,ipv4" | "dual" | "dualstack" => Ok(IpFamilies::DualStack),
            _ => Err(ParseIpFamiliesError(s.to_string())),
        }
    }
}

impl TryFrom<String> for IpFamilies {
    type Error = ParseIpFamiliesError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<IpFamilies> for String {
    fn from(value: IpFamilies) -> Self {
        value.as_str().to_string()
    }
}
