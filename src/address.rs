//! 128-bit address algebra.
//!
//! IPv4 and IPv6 addresses are unified into a single 128-bit space using
//! the standard `::ffff:0:0/96` mapping, so the rest of the crate (the
//! trie, the on-disk format, `Network`) never has to branch on address
//! family except to decide how wide a "user" prefix is.

use crate::error::{Error, Result};
use std::cmp::Ordering;
use std::fmt;
use std::net::{Ipv4Addr, Ipv6Addr};
use std::str::FromStr;

/// Prefix length, in bits, of the `::ffff:0:0/96` IPv4-mapped range within
/// the 128-bit address space.
pub const V4_MAPPED_PREFIX: u8 = 96;

const V4_MAPPED_PATTERN: u128 = 0x0000_0000_0000_0000_0000_ffff_0000_0000;

/// Which family a [`Address`] was parsed from or should be displayed as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Family {
    /// An IPv4 address, stored internally mapped into `::ffff:0:0/96`.
    V4,
    /// A native IPv6 address.
    V6,
}

/// A 128-bit address. IPv4 addresses are stored IPv4-mapped
/// (`::ffff:a.b.c.d`). Ordering is plain numeric order on the 128-bit
/// value, which is equivalent to big-endian byte-lexicographic order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Address(u128);

impl Address {
    /// Wrap a raw 128-bit value.
    pub const fn from_bits(bits: u128) -> Self {
        Address(bits)
    }

    /// The raw 128-bit value.
    pub const fn bits(self) -> u128 {
        self.0
    }

    /// Map an IPv4 address into the `::ffff:0:0/96` range.
    pub fn from_ipv4(addr: Ipv4Addr) -> Self {
        Address(V4_MAPPED_PATTERN | u128::from(u32::from(addr)))
    }

    /// Wrap a native IPv6 address.
    pub fn from_ipv6(addr: Ipv6Addr) -> Self {
        Address(u128::from(addr))
    }

    /// Whether this address falls in the `::ffff:0:0/96` IPv4-mapped range.
    pub fn is_ipv4_mapped(self) -> bool {
        self.0 & (!0u128 << 32) == V4_MAPPED_PATTERN
    }

    /// View as an IPv4 address, if it is IPv4-mapped.
    pub fn to_ipv4(self) -> Option<Ipv4Addr> {
        if self.is_ipv4_mapped() {
            Some(Ipv4Addr::from((self.0 & 0xffff_ffff) as u32))
        } else {
            None
        }
    }

    /// View as a native IPv6 address (always succeeds, including for
    /// IPv4-mapped addresses, which render as `::ffff:a.b.c.d`).
    pub fn to_ipv6(self) -> Ipv6Addr {
        Ipv6Addr::from(self.0)
    }

    /// The family this address naturally belongs to.
    pub fn family(self) -> Family {
        if self.is_ipv4_mapped() {
            Family::V4
        } else {
            Family::V6
        }
    }

    /// Value of bit `index` (0 = most significant bit of the 128-bit
    /// address). `index` must be `< 128`.
    pub fn bit(self, index: u8) -> u8 {
        debug_assert!(index < 128);
        ((self.0 >> (127 - index as u32)) & 1) as u8
    }

    /// Increment the address by one. The caller must ensure `self` is not
    /// the all-ones address.
    pub fn increment(self) -> Address {
        debug_assert!(self.0 != u128::MAX, "increment overflows the address space");
        Address(self.0.wrapping_add(1))
    }

    /// Decrement the address by one. The caller must ensure `self` is not
    /// the all-zero address.
    pub fn decrement(self) -> Address {
        debug_assert!(self.0 != 0, "decrement underflows the address space");
        Address(self.0.wrapping_sub(1))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_ipv4() {
            Some(v4) => write!(f, "{}", v4),
            None => write!(f, "{}", self.to_ipv6()),
        }
    }
}

/// A network bit-mask (top `prefix` bits set) as a raw 128-bit value.
pub fn mask(prefix: u8) -> u128 {
    debug_assert!(prefix <= 128);
    if prefix == 0 {
        0
    } else {
        !0u128 << (128 - prefix as u32)
    }
}

/// `is_valid_prefix(family, prefix)`: whether `prefix` is a legal prefix
/// length for `family`, expressed as the internal (128-bit-space) value.
/// This is a positive predicate, unlike `valid_prefix` in the C original,
/// which returns zero on success.
pub fn is_valid_prefix(family: Family, prefix: u8) -> bool {
    match family {
        Family::V4 => (V4_MAPPED_PREFIX..=128).contains(&prefix),
        Family::V6 => prefix <= 128,
    }
}

/// First address of the network containing `addr` with the given prefix.
pub fn first(addr: Address, prefix: u8) -> Address {
    Address(addr.bits() & mask(prefix))
}

/// Last address of the network containing `addr` with the given prefix.
pub fn last(addr: Address, prefix: u8) -> Address {
    Address(addr.bits() | !mask(prefix))
}

/// User-visible prefix length: for an IPv4-mapped address this is the
/// familiar `/0`-`/32` value; for native IPv6 it's the internal prefix
/// unchanged.
pub fn user_prefix(family: Family, internal_prefix: u8) -> u8 {
    match family {
        Family::V4 => internal_prefix.saturating_sub(V4_MAPPED_PREFIX),
        Family::V6 => internal_prefix,
    }
}

/// Reject addresses that can never name a real, routable network: the
/// unspecified address, loopback, link-local, and (deprecated but still
/// excluded) site-local.
pub fn is_special(addr: Address) -> bool {
    if let Some(v4) = addr.to_ipv4() {
        return v4.is_unspecified() || v4.is_loopback() || v4.is_link_local();
    }
    let v6 = addr.to_ipv6();
    v6.is_unspecified()
        || v6.is_loopback()
        || is_unicast_link_local(v6)
        || is_unicast_site_local(v6)
}

fn is_unicast_link_local(addr: Ipv6Addr) -> bool {
    (addr.segments()[0] & 0xffc0) == 0xfe80
}

fn is_unicast_site_local(addr: Ipv6Addr) -> bool {
    (addr.segments()[0] & 0xffc0) == 0xfec0
}

/// Parse a CIDR string (`"1.2.3.0/24"`, `"2001:db8::/32"`, or a bare
/// address meaning a single host) into `(first address of the network,
/// internal prefix length, family)`.
///
/// Mirrors `loc_network_new_from_string`: a missing prefix defaults to
/// `/128` in the internal space, which is `/32` for an IPv4-mapped
/// address and a full host route for IPv6.
pub fn parse_cidr(s: &str) -> Result<(Address, u8, Family)> {
    let (addr_part, prefix_part) = match s.split_once('/') {
        Some((a, p)) => (a, Some(p)),
        None => (s, None),
    };

    let (addr, family) = parse_address(addr_part)?;

    let internal_prefix = match prefix_part {
        None => 128,
        Some(p) => {
            let user_prefix: u8 = p
                .parse()
                .map_err(|_| Error::InvalidArgument(format!("invalid prefix length: {}", p)))?;
            match family {
                Family::V4 => V4_MAPPED_PREFIX
                    .checked_add(user_prefix)
                    .ok_or_else(|| Error::InvalidArgument(format!("prefix out of range: {}", p)))?,
                Family::V6 => user_prefix,
            }
        }
    };

    if !is_valid_prefix(family, internal_prefix) {
        return Err(Error::InvalidArgument(format!(
            "prefix /{} is not valid for this address family",
            prefix_part.unwrap_or("128")
        )));
    }

    Ok((first(addr, internal_prefix), internal_prefix, family))
}

/// Parse a bare address (no prefix) into an [`Address`] and the family it
/// was written in.
pub fn parse(s: &str) -> Result<(Address, Family)> {
    parse_address(s)
}

fn parse_address(s: &str) -> Result<(Address, Family)> {
    if let Ok(v4) = Ipv4Addr::from_str(s) {
        return Ok((Address::from_ipv4(v4), Family::V4));
    }
    if let Ok(v6) = Ipv6Addr::from_str(s) {
        let addr = Address::from_ipv6(v6);
        let family = if addr.is_ipv4_mapped() { Family::V4 } else { Family::V6 };
        return Ok((addr, family));
    }
    Err(Error::InvalidArgument(format!("not a valid IP address: {}", s)))
}

/// Three-way comparison used to order addresses; equivalent to `Ord` on
/// [`Address`] but spelled out for callers that want the libloc-style
/// name.
pub fn cmp(a: Address, b: Address) -> Ordering {
    a.cmp(&b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ipv4_maps_into_v4_mapped_range() {
        let addr = Address::from_ipv4(Ipv4Addr::new(8, 8, 8, 8));
        assert!(addr.is_ipv4_mapped());
        assert_eq!(addr.to_ipv4(), Some(Ipv4Addr::new(8, 8, 8, 8)));
        assert_eq!(addr.family(), Family::V4);
    }

    #[test]
    fn ipv6_native_is_not_mapped() {
        let addr = Address::from_ipv6("2001:db8::1".parse().unwrap());
        assert!(!addr.is_ipv4_mapped());
        assert_eq!(addr.family(), Family::V6);
    }

    #[test]
    fn bit_reads_msb_first() {
        let addr = Address::from_bits(0x8000_0000_0000_0000_0000_0000_0000_0000);
        assert_eq!(addr.bit(0), 1);
        assert_eq!(addr.bit(1), 0);
    }

    #[test]
    fn mask_and_first_last_agree_with_prefix() {
        let addr = Address::from_ipv4(Ipv4Addr::new(10, 1, 2, 3));
        let prefix = V4_MAPPED_PREFIX + 16; // /16
        let f = first(addr, prefix);
        let l = last(addr, prefix);
        assert_eq!(f.to_ipv4(), Some(Ipv4Addr::new(10, 1, 0, 0)));
        assert_eq!(l.to_ipv4(), Some(Ipv4Addr::new(10, 1, 255, 255)));
    }

    #[test]
    fn parse_cidr_defaults_to_host_route() {
        let (addr, prefix, family) = parse_cidr("8.8.8.8").unwrap();
        assert_eq!(family, Family::V4);
        assert_eq!(user_prefix(family, prefix), 32);
        assert_eq!(addr.to_ipv4(), Some(Ipv4Addr::new(8, 8, 8, 8)));
    }

    #[test]
    fn parse_cidr_rejects_out_of_range_prefix() {
        assert!(parse_cidr("10.0.0.0/33").is_err());
        assert!(parse_cidr("2001:db8::/129").is_err());
    }

    #[test]
    fn increment_wraps_host_by_host() {
        let a = Address::from_ipv4(Ipv4Addr::new(1, 2, 3, 4));
        let b = a.increment();
        assert_eq!(b.to_ipv4(), Some(Ipv4Addr::new(1, 2, 3, 5)));
    }

    #[test]
    fn special_addresses_are_rejected() {
        assert!(is_special(Address::from_ipv6(Ipv6Addr::UNSPECIFIED)));
        assert!(is_special(Address::from_ipv6(Ipv6Addr::LOCALHOST)));
        assert!(is_special(Address::from_ipv6("fe80::1".parse().unwrap())));
        assert!(!is_special(Address::from_ipv4(Ipv4Addr::new(8, 8, 8, 8))));
    }
}
