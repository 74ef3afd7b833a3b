//! The database builder/writer pipeline.
//!
//! Mirrors `struct loc_writer` from the C original: collect AS entries,
//! countries, and networks, then serialize everything into the on-disk
//! layout in one pass. Unlike the C writer (which streams to a file and
//! seeks back to patch the header once section sizes are known), this
//! writer computes every section's size up front — the BFS node count
//! and leaf count come out of [`NetworkTrie::serialize_bfs`] before a
//! single byte is written — so the header can be written once, in order.

use crate::as_record::{self, As};
use crate::binary::{
    AsRecord, CountryRecord, HeaderV1, Magic, NetworkDataRecord, TrieNodeRecord, MAGIC, VERSION_1,
};
use crate::context::Context;
use crate::country::{self, Country};
use crate::endian::align_to_page_boundary;
use crate::error::{Error, Result};
use crate::network::{Flags, Network};
use crate::stringpool::StringPool;
use crate::trie::NetworkTrie;
use std::io::Write;
use std::time::{SystemTime, UNIX_EPOCH};
use zerocopy::byteorder::{BigEndian, U16, U32, U64};
use zerocopy::IntoBytes;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WriterState {
    Empty,
    Populating,
    Writing,
    Done,
    Aborted,
}

/// Builds a database in memory, then serializes it in one pass.
pub struct Writer {
    ctx: Context,
    state: WriterState,
    pool: StringPool,
    vendor_offset: u32,
    description_offset: u32,
    license_offset: u32,
    ases: Vec<As>,
    countries: Vec<Country>,
    trie: NetworkTrie,
}

impl Writer {
    /// A fresh writer with no data.
    pub fn new(ctx: Context) -> Self {
        Writer {
            ctx,
            state: WriterState::Empty,
            pool: StringPool::new(),
            vendor_offset: 0,
            description_offset: 0,
            license_offset: 0,
            ases: Vec::new(),
            countries: Vec::new(),
            trie: NetworkTrie::new(),
        }
    }

    fn ensure_populating(&mut self) -> Result<()> {
        match self.state {
            WriterState::Empty => {
                self.state = WriterState::Populating;
                Ok(())
            }
            WriterState::Populating => Ok(()),
            _ => Err(Error::InvalidArgument(
                "writer is no longer accepting data".to_string(),
            )),
        }
    }

    /// Set the vendor name.
    pub fn set_vendor(&mut self, text: &str) -> Result<()> {
        self.ensure_populating()?;
        self.vendor_offset = self.pool.add(text);
        Ok(())
    }

    /// Set the human-readable description.
    pub fn set_description(&mut self, text: &str) -> Result<()> {
        self.ensure_populating()?;
        self.description_offset = self.pool.add(text);
        Ok(())
    }

    /// Set the license text.
    pub fn set_license(&mut self, text: &str) -> Result<()> {
        self.ensure_populating()?;
        self.license_offset = self.pool.add(text);
        Ok(())
    }

    /// Add an autonomous system entry. Errors if `number` was already
    /// added.
    pub fn add_as(&mut self, number: u32, name: Option<&str>) -> Result<As> {
        self.ensure_populating()?;
        if self.ases.iter().any(|a| a.number() == number) {
            return Err(Error::AlreadyPresent(format!("AS{} already added", number)));
        }
        let name_offset = name.map(|n| self.pool.add(n)).unwrap_or(0);
        let record = As::new(number, name_offset);
        self.ases.push(record);
        crate::context::debug!(self.ctx, "added AS{}", number);
        Ok(record)
    }

    /// Add a country entry. Errors if `code` was already added.
    pub fn add_country(
        &mut self,
        code: &str,
        continent_code: Option<&str>,
        name: Option<&str>,
    ) -> Result<Country> {
        self.ensure_populating()?;
        if self.countries.iter().any(|c| c.code_str() == code) {
            return Err(Error::AlreadyPresent(format!("country {} already added", code)));
        }
        let name_offset = name.map(|n| self.pool.add(n)).unwrap_or(0);
        let record = Country::new(code, continent_code, name_offset)?;
        self.countries.push(record);
        Ok(record)
    }

    /// Add a network. Errors if an identical network (same first address
    /// and prefix) was already added.
    pub fn add_network(
        &mut self,
        cidr: &str,
        country_code: Option<&str>,
        asn: u32,
        flags: Flags,
    ) -> Result<Network> {
        self.ensure_populating()?;
        let network = Network::parse(cidr, country_code, asn, flags)?;
        self.trie.insert(network)?;
        crate::context::debug!(self.ctx, "added network {}", network);
        Ok(network)
    }

    /// Serialize everything collected so far to `sink`.
    pub fn write(&mut self, sink: &mut impl Write) -> Result<()> {
        match self.state {
            WriterState::Empty | WriterState::Populating => {
                self.state = WriterState::Writing;
            }
            _ => {
                return Err(Error::InvalidArgument(
                    "writer has already been finalized".to_string(),
                ));
            }
        }

        match self.write_sections(sink) {
            Ok(()) => {
                self.state = WriterState::Done;
                crate::context::info!(self.ctx, "database written");
                Ok(())
            }
            Err(err) => {
                self.state = WriterState::Aborted;
                crate::context::error!(self.ctx, "writer aborted: {}", err);
                Err(err)
            }
        }
    }

    fn write_sections(&mut self, sink: &mut impl Write) -> Result<()> {
        self.ases.sort_by(as_record::cmp);
        self.countries.sort_by(country::cmp);
        let (nodes, leaves) = self.trie.serialize_bfs();

        let as_bytes = encode_as_records(&self.ases);
        let tree_bytes = encode_tree_records(&nodes);
        let data_bytes = encode_network_data_records(&leaves);
        let pool_bytes = self.pool.as_bytes();
        let countries_bytes = encode_country_records(&self.countries);

        let header_size = std::mem::size_of::<Magic>() + std::mem::size_of::<HeaderV1>();
        let as_offset = align_to_page_boundary(header_size);
        let network_tree_offset = align_to_page_boundary(as_offset + as_bytes.len());
        let network_data_offset = align_to_page_boundary(network_tree_offset + tree_bytes.len());
        let pool_offset = align_to_page_boundary(network_data_offset + data_bytes.len());
        let countries_offset = align_to_page_boundary(pool_offset + pool_bytes.len());

        let created_at = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);

        let header = HeaderV1 {
            created_at: U64::new(created_at),
            vendor: U32::new(self.vendor_offset),
            description: U32::new(self.description_offset),
            license: U32::new(self.license_offset),
            as_offset: U32::new(section_field(as_offset)?),
            as_length: U32::new(section_field(as_bytes.len())?),
            network_tree_offset: U32::new(section_field(network_tree_offset)?),
            network_tree_length: U32::new(section_field(tree_bytes.len())?),
            network_data_offset: U32::new(section_field(network_data_offset)?),
            network_data_length: U32::new(section_field(data_bytes.len())?),
            pool_offset: U32::new(section_field(pool_offset)?),
            pool_length: U32::new(section_field(pool_bytes.len())?),
            countries_offset: U32::new(section_field(countries_offset)?),
            countries_length: U32::new(section_field(countries_bytes.len())?),
        };

        let magic = Magic {
            magic: MAGIC,
            version: U16::new(VERSION_1),
        };

        sink.write_all(magic.as_bytes())?;
        sink.write_all(header.as_bytes())?;
        write_padding(sink, header_size, as_offset)?;
        sink.write_all(&as_bytes)?;
        write_padding(sink, as_offset + as_bytes.len(), network_tree_offset)?;
        sink.write_all(&tree_bytes)?;
        write_padding(sink, network_tree_offset + tree_bytes.len(), network_data_offset)?;
        sink.write_all(&data_bytes)?;
        write_padding(sink, network_data_offset + data_bytes.len(), pool_offset)?;
        sink.write_all(pool_bytes)?;
        write_padding(sink, pool_offset + pool_bytes.len(), countries_offset)?;
        sink.write_all(&countries_bytes)?;
        sink.flush()?;
        Ok(())
    }
}

/// Narrow a section offset or length to `u32`, the width every on-disk
/// header field uses. Errors rather than silently wrapping if a database
/// ever grows past 4 GiB.
fn section_field(value: usize) -> Result<u32> {
    u32::try_from(value).map_err(|_| {
        Error::OutOfMemory(format!("database section offset {} exceeds the 32-bit on-disk format", value))
    })
}

fn write_padding(sink: &mut impl Write, from: usize, to: usize) -> Result<()> {
    debug_assert!(to >= from);
    let zeros = [0u8; PAD_CHUNK];
    let mut remaining = to - from;
    while remaining > 0 {
        let take = remaining.min(PAD_CHUNK);
        sink.write_all(&zeros[..take])?;
        remaining -= take;
    }
    Ok(())
}

const PAD_CHUNK: usize = 4096;

fn encode_as_records(ases: &[As]) -> Vec<u8> {
    let mut out = Vec::with_capacity(ases.len() * AsRecord::SIZE);
    for a in ases {
        let record = AsRecord {
            number: U32::<BigEndian>::new(a.number()),
            name_offset: U32::<BigEndian>::new(a.name_offset()),
        };
        out.extend_from_slice(record.as_bytes());
    }
    out
}

fn encode_country_records(countries: &[Country]) -> Vec<u8> {
    let mut out = Vec::with_capacity(countries.len() * CountryRecord::SIZE);
    for c in countries {
        let record = CountryRecord {
            code: c.code(),
            continent_code: c.continent_code(),
            name_offset: U32::<BigEndian>::new(c.name_offset()),
        };
        out.extend_from_slice(record.as_bytes());
    }
    out
}

fn encode_tree_records(nodes: &[crate::trie::BfsNode]) -> Vec<u8> {
    let mut out = Vec::with_capacity(nodes.len() * TrieNodeRecord::SIZE);
    for node in nodes {
        let record = TrieNodeRecord {
            child0: U32::<BigEndian>::new(node.child0),
            child1: U32::<BigEndian>::new(node.child1),
            network_index: U32::<BigEndian>::new(node.network_index),
        };
        out.extend_from_slice(record.as_bytes());
    }
    out
}

fn encode_network_data_records(leaves: &[std::rc::Rc<Network>]) -> Vec<u8> {
    let mut out = Vec::with_capacity(leaves.len() * NetworkDataRecord::SIZE);
    for net in leaves {
        let record = NetworkDataRecord {
            country_code: net.country_code_raw(),
            asn: U32::<BigEndian>::new(net.asn()),
            flags: U16::<BigEndian>::new(net.flags().bits()),
        };
        out.extend_from_slice(record.as_bytes());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Context;

    #[test]
    fn rejects_duplicate_as_numbers() {
        let mut writer = Writer::new(Context::with_priority(crate::context::LogPriority::Error));
        writer.add_as(15169, Some("Google")).unwrap();
        assert!(writer.add_as(15169, None).is_err());
    }

    #[test]
    fn write_produces_a_well_formed_header() {
        let mut writer = Writer::new(Context::with_priority(crate::context::LogPriority::Error));
        writer.set_vendor("Test Vendor").unwrap();
        writer.add_as(15169, Some("Google")).unwrap();
        writer
            .add_network("8.8.8.0/24", Some("US"), 15169, Flags::NONE)
            .unwrap();

        let mut buf = Vec::new();
        writer.write(&mut buf).unwrap();

        assert_eq!(&buf[0..8], &MAGIC);
        let version = u16::from_be_bytes([buf[8], buf[9]]);
        assert_eq!(version, VERSION_1);
    }

    #[test]
    fn write_twice_errors_on_the_second_call() {
        let mut writer = Writer::new(Context::with_priority(crate::context::LogPriority::Error));
        let mut buf = Vec::new();
        writer.write(&mut buf).unwrap();
        let mut buf2 = Vec::new();
        assert!(writer.write(&mut buf2).is_err());
    }
}
