//! The `Network` value type and the bounded, ordered `NetworkList`.

use crate::address::{self, Address, Family};
use crate::error::{Error, Result};
use std::cmp::Ordering;
use std::fmt;

/// Policy flags a network can carry, mirroring libloc's
/// `LOC_NETWORK_FLAG_*` constants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Flags(u16);

impl Flags {
    /// No flags set.
    pub const NONE: Flags = Flags(0);
    /// The network is a known anonymous proxy (VPN, open proxy, Tor exit).
    pub const ANONYMOUS_PROXY: Flags = Flags(1 << 0);
    /// The network belongs to a satellite internet provider.
    pub const SATELLITE_PROVIDER: Flags = Flags(1 << 1);
    /// The network is announced from more than one location (anycast).
    pub const ANYCAST: Flags = Flags(1 << 2);
    /// Traffic to/from the network should be dropped.
    pub const DROP: Flags = Flags(1 << 3);

    /// Build from a raw on-disk bitmask.
    pub const fn from_bits(bits: u16) -> Self {
        Flags(bits)
    }

    /// The raw on-disk bitmask.
    pub const fn bits(self) -> u16 {
        self.0
    }

    /// Combine with another flag set.
    pub const fn union(self, other: Flags) -> Flags {
        Flags(self.0 | other.0)
    }

    /// Whether `flag` is set.
    pub const fn contains(self, flag: Flags) -> bool {
        self.0 & flag.0 == flag.0
    }
}

/// A CIDR network plus the geolocation/policy data attached to it.
/// Mirrors `struct loc_network`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Network {
    first: Address,
    prefix: u8,
    family: Family,
    country_code: [u8; 2],
    asn: u32,
    flags: Flags,
}

impl Network {
    /// Parse a network from its CIDR string form (`"8.8.8.0/24"`,
    /// `"2001:db8::/32"`) plus its attached data. `country_code` of
    /// `None` leaves the country unset (`"\0\0"` on disk).
    pub fn parse(
        cidr: &str,
        country_code: Option<&str>,
        asn: u32,
        flags: Flags,
    ) -> Result<Self> {
        let (first, prefix, family) = address::parse_cidr(cidr)?;
        if address::is_special(first) {
            return Err(Error::InvalidArgument(format!(
                "{} names a reserved/special address and cannot be a network",
                cidr
            )));
        }
        let country_code = match country_code {
            Some(code) => parse_country_code(code)?,
            None => [0, 0],
        };
        Ok(Network {
            first,
            prefix,
            family,
            country_code,
            asn,
            flags,
        })
    }

    /// Construct directly from already-validated parts, skipping the
    /// string-parsing and special-address checks. Used by the trie's
    /// `subnets`/`exclude` and by the reader, which reconstruct networks
    /// from data that was already validated once.
    pub(crate) fn from_parts(
        first: Address,
        prefix: u8,
        family: Family,
        country_code: [u8; 2],
        asn: u32,
        flags: Flags,
    ) -> Self {
        Network {
            first,
            prefix,
            family,
            country_code,
            asn,
            flags,
        }
    }

    /// First address in the network.
    pub fn first_address(&self) -> Address {
        self.first
    }

    /// Last address in the network.
    pub fn last_address(&self) -> Address {
        address::last(self.first, self.prefix)
    }

    /// Internal (128-bit-space) prefix length.
    pub fn prefix(&self) -> u8 {
        self.prefix
    }

    /// User-facing prefix length (`/24` for IPv4, the same value for
    /// IPv6).
    pub fn user_prefix(&self) -> u8 {
        address::user_prefix(self.family, self.prefix)
    }

    /// Address family.
    pub fn family(&self) -> Family {
        self.family
    }

    /// Two-letter country code, or `None` if unset.
    pub fn country_code(&self) -> Option<&str> {
        if self.country_code == [0, 0] {
            None
        } else {
            std::str::from_utf8(&self.country_code).ok()
        }
    }

    pub(crate) fn country_code_raw(&self) -> [u8; 2] {
        self.country_code
    }

    /// Announcing AS number, 0 if unknown.
    pub fn asn(&self) -> u32 {
        self.asn
    }

    /// Policy flags.
    pub fn flags(&self) -> Flags {
        self.flags
    }

    /// Whether `flag` is set.
    pub fn has_flag(&self, flag: Flags) -> bool {
        self.flags.contains(flag)
    }

    /// Whether `self` and `other` describe exactly the same network
    /// (same first address and prefix) regardless of attached data.
    pub fn eq_network(&self, other: &Network) -> bool {
        self.first == other.first && self.prefix == other.prefix
    }

    /// Whether `self` is contained within `other`.
    pub fn is_subnet_of(&self, other: &Network) -> bool {
        self.prefix >= other.prefix
            && address::first(self.first, other.prefix) == other.first
    }

    /// Whether `addr` falls within this network.
    pub fn matches_address(&self, addr: Address) -> bool {
        address::first(addr, self.prefix) == self.first
    }

    /// Whether this network's country code equals `code`.
    pub fn matches_country_code(&self, code: &str) -> bool {
        self.country_code() == Some(code)
    }

    /// Whether this network's AS number equals `asn`.
    pub fn matches_asn(&self, asn: u32) -> bool {
        self.asn == asn
    }

    /// First address rendered as a string.
    pub fn first_address_string(&self) -> String {
        self.first.to_string()
    }

    /// Last address rendered as a string.
    pub fn last_address_string(&self) -> String {
        self.last_address().to_string()
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.first, self.user_prefix())
    }
}

fn parse_country_code(code: &str) -> Result<[u8; 2]> {
    let bytes = code.as_bytes();
    if bytes.len() != 2 || !bytes.iter().all(|b| b.is_ascii_uppercase()) {
        return Err(Error::InvalidArgument(format!(
            "country code must be two uppercase ASCII letters: {}",
            code
        )));
    }
    Ok([bytes[0], bytes[1]])
}

/// Orders networks by first address, then (on ties) by prefix length
/// ascending, so a supernet sorts before the subnets carved out of it.
/// Mirrors `loc_network_gt`.
pub fn by_first_address_then_prefix(a: &Network, b: &Network) -> Ordering {
    a.first
        .cmp(&b.first)
        .then_with(|| a.prefix.cmp(&b.prefix))
}

const NETWORK_LIST_CAPACITY: usize = 1024;

/// A bounded, optionally-sorted collection of networks. Mirrors
/// `struct loc_network_list`.
#[derive(Debug, Clone, Default)]
pub struct NetworkList {
    items: Vec<Network>,
}

impl NetworkList {
    /// An empty list.
    pub fn new() -> Self {
        NetworkList { items: Vec::new() }
    }

    /// Number of networks currently held.
    pub fn size(&self) -> usize {
        self.items.len()
    }

    /// Whether the list holds no networks.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Append a network to the end of the list.
    pub fn push(&mut self, network: Network) -> Result<()> {
        if self.items.len() >= NETWORK_LIST_CAPACITY {
            return Err(Error::CapacityExceeded(format!(
                "network list is limited to {} entries",
                NETWORK_LIST_CAPACITY
            )));
        }
        self.items.push(network);
        Ok(())
    }

    /// Remove and return the last network, if any.
    pub fn pop(&mut self) -> Option<Network> {
        self.items.pop()
    }

    /// Network at `index`.
    pub fn get(&self, index: usize) -> Option<&Network> {
        self.items.get(index)
    }

    /// Remove all networks.
    pub fn clear(&mut self) {
        self.items.clear();
    }

    /// Sort in place by first address, then prefix length ascending.
    pub fn sort(&mut self) {
        self.items.sort_by(by_first_address_then_prefix);
    }

    /// Reverse the current order in place.
    pub fn reverse(&mut self) {
        self.items.reverse();
    }

    /// Whether an entry naming exactly the same network (first address
    /// and prefix) exists in the list.
    pub fn contains(&self, network: &Network) -> bool {
        self.items.iter().any(|n| n.eq_network(network))
    }

    /// Iterate over the networks currently held.
    pub fn iter(&self) -> impl Iterator<Item = &Network> {
        self.items.iter()
    }

    /// Render one line per network, in current order, the way
    /// `loc_network_list_dump` does.
    pub fn dump(&self) -> String {
        let mut out = String::new();
        for network in &self.items {
            out.push_str(&network.to_string());
            out.push('\n');
        }
        out
    }
}
