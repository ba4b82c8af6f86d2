//! CIDR subnet values for the access whitelist.
//!
//! A `Subnet` is a base address plus a prefix length. A bare address parses
//! to the full-width prefix (/32 for IPv4, /128 for IPv6), so equality and
//! persistence always work on the explicit `address/prefix` canonical form.

use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;

use crate::error::AppError;

/// A parsed CIDR value: base address + prefix length.
///
/// Containment never coerces between address families: an IPv6 candidate
/// checked against an IPv4 subnet is false, and vice versa.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subnet {
    address: IpAddr,
    prefix_len: u8,
}

impl Subnet {
    /// Parse `"addr"` or `"addr/prefix"` notation.
    ///
    /// A bare address gets the full-width prefix of its family. Malformed
    /// addresses, malformed prefixes, and prefixes wider than the address
    /// all fail with `InvalidFormat`.
    pub fn parse(value: &str) -> Result<Self, AppError> {
        let mut parts = value.splitn(2, '/');
        let addr_text = parts.next().unwrap_or_default();

        let address: IpAddr = addr_text
            .parse()
            .map_err(|_| AppError::InvalidFormat(format!("invalid address: {value:?}")))?;
        let width = address_width(&address);

        let prefix_len = match parts.next() {
            None => width,
            Some(prefix_text) => {
                let prefix: u8 = prefix_text.parse().map_err(|_| {
                    AppError::InvalidFormat(format!("invalid prefix length: {value:?}"))
                })?;
                if prefix > width {
                    return Err(AppError::InvalidFormat(format!(
                        "prefix length {prefix} exceeds address width {width}: {value:?}"
                    )));
                }
                prefix
            }
        };

        Ok(Self {
            address,
            prefix_len,
        })
    }

    /// True iff `candidate` falls inside this subnet.
    ///
    /// Whole bytes are compared for `prefix_len / 8` bytes, then the
    /// remaining `< 8` bits are masked and compared.
    pub fn contains(&self, candidate: &IpAddr) -> bool {
        match (&self.address, candidate) {
            (IpAddr::V4(base), IpAddr::V4(other)) => {
                masked_eq(&base.octets(), &other.octets(), self.prefix_len)
            }
            (IpAddr::V6(base), IpAddr::V6(other)) => {
                masked_eq(&base.octets(), &other.octets(), self.prefix_len)
            }
            // IPv4/IPv6 mismatch
            _ => false,
        }
    }

    /// Exact equality with another subnet text: same address, same prefix.
    ///
    /// Distinct from containment; used for whitelist dedup and removal.
    pub fn matches(&self, other: &str) -> Result<bool, AppError> {
        Ok(*self == Subnet::parse(other)?)
    }

    /// The unique textual representation: always `"address/prefix_len"`.
    pub fn canonical_form(&self) -> String {
        self.to_string()
    }

    pub fn prefix_len(&self) -> u8 {
        self.prefix_len
    }
}

/// Address width in bits: 32 for IPv4, 128 for IPv6.
fn address_width(address: &IpAddr) -> u8 {
    match address {
        IpAddr::V4(_) => 32,
        IpAddr::V6(_) => 128,
    }
}

fn masked_eq(base: &[u8], other: &[u8], prefix_len: u8) -> bool {
    debug_assert_eq!(base.len(), other.len());

    let mut index = 0;
    let mut bits = prefix_len;

    while bits >= 8 {
        if base[index] != other[index] {
            return false;
        }
        index += 1;
        bits -= 8;
    }

    if bits > 0 {
        let mask = !(0xffu8 >> bits);
        if (base[index] & mask) != (other[index] & mask) {
            return false;
        }
    }

    true
}

impl fmt::Display for Subnet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.address, self.prefix_len)
    }
}

impl FromStr for Subnet {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
