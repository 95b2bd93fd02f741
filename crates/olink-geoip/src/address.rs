//! Address normalization
//!
//! Node addresses arrive in several shapes: `1.2.3.4`, `1.2.3.4:443`,
//! `[2001:db8::1]:443`, `2001:db8::1`. They are reduced to a bare address
//! and then to the integer key used by the range tables.

use std::fmt;
use std::net::{Ipv4Addr, Ipv6Addr};

/// Integer form of an address
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AddressKey {
    V4(u32),
    V6(u128),
}

impl AddressKey {
    /// Normalize and parse a raw address.
    ///
    /// Returns `None` for anything that is neither a dotted-quad IPv4 nor a
    /// textual IPv6 address, including host names.
    pub fn parse(raw: &str) -> Option<Self> {
        let bare = normalize(raw);
        if let Ok(v4) = bare.parse::<Ipv4Addr>() {
            return Some(AddressKey::V4(u32::from(v4)));
        }
        bare.parse::<Ipv6Addr>().ok().map(|v6| AddressKey::V6(u128::from(v6)))
    }

    /// High and low 64-bit halves of an IPv6 key
    pub fn halves(&self) -> Option<(u64, u64)> {
        match self {
            AddressKey::V6(v) => Some(((v >> 64) as u64, *v as u64)),
            AddressKey::V4(_) => None,
        }
    }
}

impl fmt::Display for AddressKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AddressKey::V4(v) => write!(f, "{}", Ipv4Addr::from(*v)),
            AddressKey::V6(v) => write!(f, "{}", Ipv6Addr::from(*v)),
        }
    }
}

/// Strip brackets and ports.
///
/// - `[v6]...` keeps what is inside the brackets
/// - exactly one `:` is a `host:port` pair; the port is dropped
/// - more than one `:` is a bare IPv6 address and left alone
pub fn normalize(raw: &str) -> &str {
    let trimmed = raw.trim();

    let bare = if let Some(rest) = trimmed.strip_prefix('[') {
        match rest.find(']') {
            Some(end) => &rest[..end],
            None => trimmed,
        }
    } else if trimmed.matches(':').count() == 1 {
        trimmed.rsplit_once(':').map_or(trimmed, |(host, _)| host)
    } else {
        trimmed
    };

    bare.trim()
}
