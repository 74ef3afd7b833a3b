//! On-disk layout: magic, header, and the fixed-size section records.
//!
//! Every multi-byte field is big-endian. Structs are read directly out of
//! the mapped file with `zerocopy`, so none of this module touches a raw
//! pointer.

use zerocopy::byteorder::{BigEndian, U16, U32, U64};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

/// 7-byte magic plus the NUL terminator `loc_database_magic` uses.
pub const MAGIC: [u8; 8] = *b"LOCDBXX\0";

/// The only version this crate's [`crate::writer::Writer`] emits.
pub const VERSION_1: u16 = 1;
/// Legacy version this crate's [`crate::reader::Reader`] still reads.
pub const VERSION_0: u16 = 0;

/// Section alignment boundary (re-exported for callers that only need
/// this one constant from [`crate::endian`]).
pub const PAGE_SIZE: usize = crate::endian::PAGE_SIZE;

/// The first 10 bytes of every database: magic plus version.
#[repr(C)]
#[derive(FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned, Clone, Copy, Debug)]
pub struct Magic {
    /// `b"LOCDBXX\0"`.
    pub magic: [u8; 8],
    /// Format version: [`VERSION_0`] or [`VERSION_1`].
    pub version: U16<BigEndian>,
}

/// v1 header: vendor/description/license are string-pool offsets; every
/// other field is a byte offset and length into the file.
#[repr(C)]
#[derive(FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned, Clone, Copy, Debug, Default)]
pub struct HeaderV1 {
    /// Unix timestamp the database was built at.
    pub created_at: U64<BigEndian>,
    /// Stringpool offset of the vendor name.
    pub vendor: U32<BigEndian>,
    /// Stringpool offset of the description.
    pub description: U32<BigEndian>,
    /// Stringpool offset of the license text.
    pub license: U32<BigEndian>,
    /// Byte offset of the AS section.
    pub as_offset: U32<BigEndian>,
    /// Byte length of the AS section.
    pub as_length: U32<BigEndian>,
    /// Byte offset of the serialized trie.
    pub network_tree_offset: U32<BigEndian>,
    /// Byte length of the serialized trie.
    pub network_tree_length: U32<BigEndian>,
    /// Byte offset of the network data section.
    pub network_data_offset: U32<BigEndian>,
    /// Byte length of the network data section.
    pub network_data_length: U32<BigEndian>,
    /// Byte offset of the string pool.
    pub pool_offset: U32<BigEndian>,
    /// Byte length of the string pool.
    pub pool_length: U32<BigEndian>,
    /// Byte offset of the countries section.
    pub countries_offset: U32<BigEndian>,
    /// Byte length of the countries section.
    pub countries_length: U32<BigEndian>,
}

/// Legacy v0 header: no countries, no license, and the network section is
/// a flat self-contained record array rather than a serialized trie plus
/// a data section (see `DESIGN.md` for why the exact historical v0
/// network record couldn't be recovered from the retrieved sources).
#[repr(C)]
#[derive(FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned, Clone, Copy, Debug, Default)]
pub struct HeaderV0 {
    /// Unix timestamp the database was built at.
    pub created_at: U64<BigEndian>,
    /// Stringpool offset of the vendor name.
    pub vendor: U32<BigEndian>,
    /// Stringpool offset of the description.
    pub description: U32<BigEndian>,
    /// Byte offset of the AS section.
    pub as_offset: U32<BigEndian>,
    /// Byte length of the AS section.
    pub as_length: U32<BigEndian>,
    /// Byte offset of the flat network record array.
    pub networks_offset: U32<BigEndian>,
    /// Byte length of the flat network record array.
    pub networks_length: U32<BigEndian>,
    /// Byte offset of the string pool.
    pub pool_offset: U32<BigEndian>,
    /// Byte length of the string pool.
    pub pool_length: U32<BigEndian>,
}

/// One 12-byte trie node: two child indices (0 means "no child"; the
/// root is never anyone's child, so 0 is unambiguous) and a leaf index
/// (`u32::MAX` means "no network here").
#[repr(C)]
#[derive(FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned, Clone, Copy, Debug)]
pub struct TrieNodeRecord {
    /// BFS index of the zero-bit child, or 0 if absent.
    pub child0: U32<BigEndian>,
    /// BFS index of the one-bit child, or 0 if absent.
    pub child1: U32<BigEndian>,
    /// FIFO index into the network data section, or `u32::MAX` if this
    /// node carries no network.
    pub network_index: U32<BigEndian>,
}

/// Sentinel `network_index` meaning "no network at this node."
pub const NO_NETWORK: u32 = u32::MAX;
/// Sentinel child index meaning "no such child."
pub const NO_CHILD: u32 = 0;

impl TrieNodeRecord {
    /// Byte size of one record.
    pub const SIZE: usize = 12;
}

/// 8-byte network data record: everything about a network except its
/// address and prefix, which are implied by its position in the trie.
#[repr(C)]
#[derive(FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned, Clone, Copy, Debug)]
pub struct NetworkDataRecord {
    /// Two-letter country code, `[0, 0]` if unset.
    pub country_code: [u8; 2],
    /// Announcing AS number.
    pub asn: U32<BigEndian>,
    /// Policy flag bitmask.
    pub flags: U16<BigEndian>,
}

impl NetworkDataRecord {
    /// Byte size of one record.
    pub const SIZE: usize = 8;
}

/// 8-byte AS record.
#[repr(C)]
#[derive(FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned, Clone, Copy, Debug)]
pub struct AsRecord {
    /// AS number.
    pub number: U32<BigEndian>,
    /// Stringpool offset of the AS name, 0 if unset.
    pub name_offset: U32<BigEndian>,
}

impl AsRecord {
    /// Byte size of one record.
    pub const SIZE: usize = 8;
}

/// 8-byte country record.
#[repr(C)]
#[derive(FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned, Clone, Copy, Debug)]
pub struct CountryRecord {
    /// Two-letter country code.
    pub code: [u8; 2],
    /// Two-letter continent code, `[0, 0]` if unset.
    pub continent_code: [u8; 2],
    /// Stringpool offset of the country name, 0 if unset.
    pub name_offset: U32<BigEndian>,
}

impl CountryRecord {
    /// Byte size of one record.
    pub const SIZE: usize = 8;
}

/// Self-contained flat network record used only by the v0 read-compat
/// path: unlike v1, each record carries its own address and prefix since
/// there is no serialized trie to imply them.
#[repr(C)]
#[derive(FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned, Clone, Copy, Debug)]
pub struct NetworkRecordV0 {
    /// 128-bit first address, big-endian.
    pub first_address: [u8; 16],
    /// Internal (128-bit-space) prefix length.
    pub prefix: u8,
    /// Two-letter country code, `[0, 0]` if unset.
    pub country_code: [u8; 2],
    /// Announcing AS number.
    pub asn: U32<BigEndian>,
    /// Policy flag bitmask.
    pub flags: U16<BigEndian>,
}

impl NetworkRecordV0 {
    /// Byte size of one record.
    pub const SIZE: usize = 25;
}

#[cfg(test)]
mod tests {
    use super::*;
    use zerocopy::IntoBytes;

    #[test]
    fn magic_roundtrips_through_bytes() {
        let magic = Magic {
            magic: MAGIC,
            version: U16::new(VERSION_1),
        };
        let bytes = magic.as_bytes();
        let parsed = Magic::read_from_bytes(bytes).unwrap();
        assert_eq!(parsed.magic, MAGIC);
        assert_eq!(parsed.version.get(), VERSION_1);
    }

    #[test]
    fn trie_node_record_is_twelve_bytes() {
        assert_eq!(std::mem::size_of::<TrieNodeRecord>(), TrieNodeRecord::SIZE);
    }

    #[test]
    fn fixed_record_sizes_match_the_format() {
        assert_eq!(std::mem::size_of::<NetworkDataRecord>(), NetworkDataRecord::SIZE);
        assert_eq!(std::mem::size_of::<AsRecord>(), AsRecord::SIZE);
        assert_eq!(std::mem::size_of::<CountryRecord>(), CountryRecord::SIZE);
        assert_eq!(std::mem::size_of::<NetworkRecordV0>(), NetworkRecordV0::SIZE);
    }
}
