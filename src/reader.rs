//! The database reader pipeline: open, validate, look up, enumerate.

use crate::address::{self, Address};
use crate::as_record::As;
use crate::binary::{
    AsRecord, CountryRecord, HeaderV0, HeaderV1, Magic, NetworkDataRecord, NetworkRecordV0,
    TrieNodeRecord, MAGIC, NO_CHILD, NO_NETWORK, VERSION_0, VERSION_1,
};
use crate::context::Context;
use crate::country::Country;
use crate::error::{Error, Result};
use crate::mmap::MappedFile;
use crate::network::{Flags, Network};
use crate::stringpool;
use crate::trie::NetworkTrie;
use std::path::Path;
use zerocopy::FromBytes;

enum AsQuery<'a> {
    NumberPrefix(&'a str),
    NameSubstring(String),
}

struct Sections {
    as_offset: usize,
    as_count: usize,
    pool_offset: usize,
    pool_length: usize,
    countries_offset: usize,
    countries_count: usize,
    vendor_offset: u32,
    description_offset: u32,
    license_offset: u32,
}

enum Backing {
    V1 {
        network_tree_offset: usize,
        network_tree_count: usize,
        network_data_offset: usize,
    },
    /// Legacy layout: no on-disk trie, so one is rebuilt in memory at
    /// open time (see `DESIGN.md`'s note on the v0 record format).
    V0 {
        trie: NetworkTrie,
    },
}

/// An open, validated database, ready for lookups and enumeration.
pub struct Reader {
    ctx: Context,
    file: MappedFile,
    version: u16,
    sections: Sections,
    backing: Backing,
}

impl Reader {
    /// Open and validate `path`. Accepts both the v1 layout this crate's
    /// [`crate::writer::Writer`] emits and the legacy v0 layout.
    pub fn open<P: AsRef<Path>>(ctx: Context, path: P) -> Result<Self> {
        let file = MappedFile::open(path)?;
        let bytes = file.as_slice();

        let magic_size = std::mem::size_of::<Magic>();
        if bytes.len() < magic_size {
            return Err(Error::Format("file is too small to contain a header".to_string()));
        }
        let magic = Magic::read_from_bytes(&bytes[..magic_size])
            .map_err(|_| Error::Format("could not parse magic".to_string()))?;
        if magic.magic != MAGIC {
            return Err(Error::Format("bad magic".to_string()));
        }
        let version = magic.version.get();

        let (sections, backing) = match version {
            VERSION_1 => Self::open_v1(bytes, magic_size)?,
            VERSION_0 => Self::open_v0(bytes, magic_size)?,
            other => return Err(Error::Format(format!("unsupported database version: {}", other))),
        };

        crate::context::info!(ctx, "opened database, version {}", version);
        Ok(Reader {
            ctx,
            file,
            version,
            sections,
            backing,
        })
    }

    fn open_v1(bytes: &[u8], magic_size: usize) -> Result<(Sections, Backing)> {
        let header_size = std::mem::size_of::<HeaderV1>();
        let header_bytes = bytes
            .get(magic_size..magic_size + header_size)
            .ok_or_else(|| Error::Format("file is too small to contain a v1 header".to_string()))?;
        let header = HeaderV1::read_from_bytes(header_bytes)
            .map_err(|_| Error::Format("could not parse v1 header".to_string()))?;

        let as_offset = header.as_offset.get() as usize;
        let as_length = header.as_length.get() as usize;
        let network_tree_offset = header.network_tree_offset.get() as usize;
        let network_tree_length = header.network_tree_length.get() as usize;
        let network_data_offset = header.network_data_offset.get() as usize;
        let network_data_length = header.network_data_length.get() as usize;
        let pool_offset = header.pool_offset.get() as usize;
        let pool_length = header.pool_length.get() as usize;
        let countries_offset = header.countries_offset.get() as usize;
        let countries_length = header.countries_length.get() as usize;

        check_section(bytes.len(), as_offset, as_length, AsRecord::SIZE, "AS")?;
        check_section(
            bytes.len(),
            network_tree_offset,
            network_tree_length,
            TrieNodeRecord::SIZE,
            "network tree",
        )?;
        check_section(
            bytes.len(),
            network_data_offset,
            network_data_length,
            NetworkDataRecord::SIZE,
            "network data",
        )?;
        check_section(bytes.len(), pool_offset, pool_length, 1, "string pool")?;
        check_section(
            bytes.len(),
            countries_offset,
            countries_length,
            CountryRecord::SIZE,
            "countries",
        )?;

        let sections = Sections {
            as_offset,
            as_count: as_length / AsRecord::SIZE,
            pool_offset,
            pool_length,
            countries_offset,
            countries_count: countries_length / CountryRecord::SIZE,
            vendor_offset: header.vendor.get(),
            description_offset: header.description.get(),
            license_offset: header.license.get(),
        };
        let backing = Backing::V1 {
            network_tree_offset,
            network_tree_count: network_tree_length / TrieNodeRecord::SIZE,
            network_data_offset,
        };
        Ok((sections, backing))
    }

    fn open_v0(bytes: &[u8], magic_size: usize) -> Result<(Sections, Backing)> {
        let header_size = std::mem::size_of::<HeaderV0>();
        let header_bytes = bytes
            .get(magic_size..magic_size + header_size)
            .ok_or_else(|| Error::Format("file is too small to contain a v0 header".to_string()))?;
        let header = HeaderV0::read_from_bytes(header_bytes)
            .map_err(|_| Error::Format("could not parse v0 header".to_string()))?;

        let as_offset = header.as_offset.get() as usize;
        let as_length = header.as_length.get() as usize;
        let networks_offset = header.networks_offset.get() as usize;
        let networks_length = header.networks_length.get() as usize;
        let pool_offset = header.pool_offset.get() as usize;
        let pool_length = header.pool_length.get() as usize;

        check_section(bytes.len(), as_offset, as_length, AsRecord::SIZE, "AS")?;
        check_section(
            bytes.len(),
            networks_offset,
            networks_length,
            NetworkRecordV0::SIZE,
            "networks",
        )?;
        check_section(bytes.len(), pool_offset, pool_length, 1, "string pool")?;

        let mut trie = NetworkTrie::new();
        let count = networks_length / NetworkRecordV0::SIZE;
        for i in 0..count {
            let start = networks_offset + i * NetworkRecordV0::SIZE;
            let record = NetworkRecordV0::read_from_bytes(&bytes[start..start + NetworkRecordV0::SIZE])
                .map_err(|_| Error::Format("could not parse v0 network record".to_string()))?;
            let first = Address::from_bits(u128::from_be_bytes(record.first_address));
            let family = first.family();
            let network = Network::from_parts(
                first,
                record.prefix,
                family,
                record.country_code,
                record.asn.get(),
                Flags::from_bits(record.flags.get()),
            );
            trie.insert(network)?;
        }

        let sections = Sections {
            as_offset,
            as_count: as_length / AsRecord::SIZE,
            pool_offset,
            pool_length,
            countries_offset: 0,
            countries_count: 0,
            vendor_offset: header.vendor.get(),
            description_offset: header.description.get(),
            license_offset: 0,
        };
        Ok((sections, Backing::V0 { trie }))
    }

    /// The database format version: [`VERSION_0`] or [`VERSION_1`].
    pub fn version(&self) -> u16 {
        self.version
    }

    fn pool(&self) -> &[u8] {
        let start = self.sections.pool_offset;
        &self.file.as_slice()[start..start + self.sections.pool_length]
    }

    /// Vendor name.
    pub fn vendor(&self) -> &str {
        stringpool::get_str(self.pool(), self.sections.vendor_offset)
    }

    /// Human-readable description.
    pub fn description(&self) -> &str {
        stringpool::get_str(self.pool(), self.sections.description_offset)
    }

    /// License text.
    pub fn license(&self) -> &str {
        stringpool::get_str(self.pool(), self.sections.license_offset)
    }

    /// Resolve an AS's name.
    pub fn as_name(&self, as_record: &As) -> &str {
        stringpool::get_str(self.pool(), as_record.name_offset())
    }

    /// Resolve a country's name.
    pub fn country_name(&self, country: &Country) -> &str {
        stringpool::get_str(self.pool(), country.name_offset())
    }

    fn read_as(&self, index: usize) -> Result<As> {
        let start = self.sections.as_offset + index * AsRecord::SIZE;
        let bytes = self
            .file
            .get_slice(start, AsRecord::SIZE)
            .ok_or_else(|| Error::Format("AS record out of bounds".to_string()))?;
        let record = AsRecord::read_from_bytes(bytes)
            .map_err(|_| Error::Format("could not parse AS record".to_string()))?;
        Ok(As::new(record.number.get(), record.name_offset.get()))
    }

    /// Look up an AS by number. AS records are stored sorted, so this is
    /// a binary search.
    pub fn get_as(&self, number: u32) -> Result<As> {
        let mut lo = 0usize;
        let mut hi = self.sections.as_count;
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            let candidate = self.read_as(mid)?;
            match candidate.number().cmp(&number) {
                std::cmp::Ordering::Equal => return Ok(candidate),
                std::cmp::Ordering::Less => lo = mid + 1,
                std::cmp::Ordering::Greater => hi = mid,
            }
        }
        Err(Error::NotFound(format!("AS{} not found", number)))
    }

    /// All AS records matching `query`: if `query` is a decimal number,
    /// match ASes whose number's decimal representation starts with it;
    /// otherwise match ASes whose name contains `query`, case-insensitive.
    /// `None` matches every AS.
    pub fn enumerate_ases(&self, query: Option<&str>) -> Result<Vec<As>> {
        let matcher = match query {
            None => None,
            Some(q) if q.chars().all(|c| c.is_ascii_digit()) && !q.is_empty() => {
                Some(AsQuery::NumberPrefix(q))
            }
            Some(q) => Some(AsQuery::NameSubstring(q.to_lowercase())),
        };

        let mut out = Vec::new();
        for i in 0..self.sections.as_count {
            let record = self.read_as(i)?;
            let matches = match &matcher {
                None => true,
                Some(AsQuery::NumberPrefix(prefix)) => record.number().to_string().starts_with(*prefix),
                Some(AsQuery::NameSubstring(needle)) => {
                    self.as_name(&record).to_lowercase().contains(needle.as_str())
                }
            };
            if matches {
                out.push(record);
            }
        }
        Ok(out)
    }

    fn read_country(&self, index: usize) -> Result<Country> {
        let start = self.sections.countries_offset + index * CountryRecord::SIZE;
        let bytes = self
            .file
            .get_slice(start, CountryRecord::SIZE)
            .ok_or_else(|| Error::Format("country record out of bounds".to_string()))?;
        let record = CountryRecord::read_from_bytes(bytes)
            .map_err(|_| Error::Format("could not parse country record".to_string()))?;
        Country::new(
            std::str::from_utf8(&record.code).unwrap_or("??"),
            if record.continent_code == [0, 0] {
                None
            } else {
                std::str::from_utf8(&record.continent_code).ok()
            },
            record.name_offset.get(),
        )
    }

    /// All countries in the database.
    pub fn countries(&self) -> Result<Vec<Country>> {
        (0..self.sections.countries_count)
            .map(|i| self.read_country(i))
            .collect()
    }

    /// Look up the address a string names (`"8.8.8.8"`,
    /// `"2001:db8::1"`). Returns the most specific matching network, if
    /// any.
    pub fn lookup(&self, addr: &str) -> Result<Option<Network>> {
        let (addr, _family) = address::parse(addr)?;
        self.lookup_address(addr)
    }

    /// Look up an already-parsed address.
    pub fn lookup_address(&self, addr: Address) -> Result<Option<Network>> {
        match &self.backing {
            Backing::V0 { trie } => Ok(trie.lookup(addr).map(|rc| *rc)),
            Backing::V1 {
                network_tree_offset,
                network_data_offset,
                ..
            } => self.lookup_v1(addr, *network_tree_offset, *network_data_offset),
        }
    }

    fn lookup_v1(
        &self,
        addr: Address,
        network_tree_offset: usize,
        network_data_offset: usize,
    ) -> Result<Option<Network>> {
        let mut node_idx = 0u32;
        let mut best: Option<(u32, u8)> = None;
        for depth in 0..128u8 {
            let node = self.read_trie_node(network_tree_offset, node_idx)?;
            if node.network_index != NO_NETWORK {
                best = Some((node.network_index, depth));
            }
            let child = if addr.bit(depth) == 0 { node.child0 } else { node.child1 };
            if child == NO_CHILD {
                return self.resolve_best(best, addr, network_data_offset);
            }
            node_idx = child;
        }
        let node = self.read_trie_node(network_tree_offset, node_idx)?;
        if node.network_index != NO_NETWORK {
            best = Some((node.network_index, 128));
        }
        self.resolve_best(best, addr, network_data_offset)
    }

    fn resolve_best(
        &self,
        best: Option<(u32, u8)>,
        addr: Address,
        network_data_offset: usize,
    ) -> Result<Option<Network>> {
        match best {
            None => Ok(None),
            Some((leaf_index, prefix)) => {
                let data = self.read_network_data(network_data_offset, leaf_index)?;
                let first = address::first(addr, prefix);
                Ok(Some(Network::from_parts(
                    first,
                    prefix,
                    first.family(),
                    data.country_code,
                    data.asn.get(),
                    Flags::from_bits(data.flags.get()),
                )))
            }
        }
    }

    fn read_trie_node(&self, network_tree_offset: usize, index: u32) -> Result<DecodedTrieNode> {
        let start = network_tree_offset + index as usize * TrieNodeRecord::SIZE;
        let bytes = self
            .file
            .get_slice(start, TrieNodeRecord::SIZE)
            .ok_or_else(|| Error::Format("trie node out of bounds".to_string()))?;
        let record = TrieNodeRecord::read_from_bytes(bytes)
            .map_err(|_| Error::Format("could not parse trie node".to_string()))?;
        Ok(DecodedTrieNode {
            child0: record.child0.get(),
            child1: record.child1.get(),
            network_index: record.network_index.get(),
        })
    }

    fn read_network_data(&self, network_data_offset: usize, index: u32) -> Result<NetworkDataRecord> {
        let start = network_data_offset + index as usize * NetworkDataRecord::SIZE;
        let bytes = self
            .file
            .get_slice(start, NetworkDataRecord::SIZE)
            .ok_or_else(|| Error::Format("network data record out of bounds".to_string()))?;
        NetworkDataRecord::read_from_bytes(bytes)
            .map_err(|_| Error::Format("could not parse network data record".to_string()))
    }

    /// All networks for which `filter` returns true, supernets before
    /// the subnets carved out of them.
    pub fn enumerate_networks(&self, filter: impl Fn(&Network) -> bool) -> Result<Vec<Network>> {
        let mut out = Vec::new();
        match &self.backing {
            Backing::V0 { trie } => {
                trie.walk(&filter, |net| out.push(*net));
            }
            Backing::V1 {
                network_tree_offset,
                network_data_offset,
                ..
            } => {
                self.enumerate_v1(*network_tree_offset, *network_data_offset, 0, 0, 0, &filter, &mut out)?;
            }
        }
        Ok(out)
    }

    #[allow(clippy::too_many_arguments)]
    fn enumerate_v1(
        &self,
        network_tree_offset: usize,
        network_data_offset: usize,
        node_idx: u32,
        depth: u8,
        addr_bits: u128,
        filter: &impl Fn(&Network) -> bool,
        out: &mut Vec<Network>,
    ) -> Result<()> {
        if depth > 128 {
            return Err(Error::Format(
                "network tree is deeper than the address space allows; file may be corrupt".to_string(),
            ));
        }
        let node = self.read_trie_node(network_tree_offset, node_idx)?;
        if node.network_index != NO_NETWORK {
            let first = Address::from_bits(addr_bits);
            let data = self.read_network_data(network_data_offset, node.network_index)?;
            let net = Network::from_parts(
                first,
                depth,
                first.family(),
                data.country_code,
                data.asn.get(),
                Flags::from_bits(data.flags.get()),
            );
            if filter(&net) {
                out.push(net);
            }
        }
        if node.child0 != NO_CHILD {
            self.enumerate_v1(
                network_tree_offset,
                network_data_offset,
                node.child0,
                depth + 1,
                addr_bits,
                filter,
                out,
            )?;
        }
        if node.child1 != NO_CHILD {
            let bit_value = 1u128 << (127 - depth as u32);
            self.enumerate_v1(
                network_tree_offset,
                network_data_offset,
                node.child1,
                depth + 1,
                addr_bits | bit_value,
                filter,
                out,
            )?;
        }
        Ok(())
    }
}

struct DecodedTrieNode {
    child0: u32,
    child1: u32,
    network_index: u32,
}

fn check_section(
    file_len: usize,
    offset: usize,
    length: usize,
    record_size: usize,
    name: &str,
) -> Result<()> {
    if record_size > 1 && length % record_size != 0 {
        return Err(Error::Format(format!(
            "{} section length {} is not a multiple of the {}-byte record size",
            name, length, record_size
        )));
    }
    let end = offset
        .checked_add(length)
        .ok_or_else(|| Error::Format(format!("{} section overflows", name)))?;
    if end > file_len {
        return Err(Error::Format(format!("{} section runs past end of file", name)));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Context;
    use crate::network::Flags;
    use crate::writer::Writer;

    fn build_sample() -> Vec<u8> {
        let mut writer = Writer::new(Context::with_priority(crate::context::LogPriority::Error));
        writer.set_vendor("Test").unwrap();
        writer.add_as(15169, Some("Google")).unwrap();
        writer.add_as(151, Some("Example Corp")).unwrap();
        writer
            .add_network("8.8.8.0/24", Some("US"), 15169, Flags::NONE)
            .unwrap();
        writer
            .add_network("8.8.8.0/22", Some("XX"), 1, Flags::NONE)
            .unwrap();
        let mut buf = Vec::new();
        writer.write(&mut buf).unwrap();
        buf
    }

    #[test]
    fn open_and_lookup_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.db");
        std::fs::write(&path, build_sample()).unwrap();

        let reader = Reader::open(Context::with_priority(crate::context::LogPriority::Error), &path).unwrap();
        assert_eq!(reader.vendor(), "Test");

        let net = reader.lookup("8.8.8.8").unwrap().unwrap();
        assert_eq!(net.user_prefix(), 24);
        assert_eq!(net.asn(), 15169);

        let as_record = reader.get_as(15169).unwrap();
        assert_eq!(reader.as_name(&as_record), "Google");

        assert!(reader.get_as(404).is_err());
    }

    #[test]
    fn enumerate_ases_matches_by_number_prefix_or_name() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.db");
        std::fs::write(&path, build_sample()).unwrap();
        let reader = Reader::open(Context::with_priority(crate::context::LogPriority::Error), &path).unwrap();

        let by_number = reader.enumerate_ases(Some("15")).unwrap();
        assert_eq!(by_number.len(), 2);
        assert!(by_number.iter().all(|a| a.number().to_string().starts_with("15")));

        let by_name = reader.enumerate_ases(Some("goo")).unwrap();
        assert_eq!(by_name.len(), 1);
        assert_eq!(reader.as_name(&by_name[0]), "Google");

        assert_eq!(reader.enumerate_ases(None).unwrap().len(), 2);
    }

    #[test]
    fn enumerate_networks_finds_both_entries() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.db");
        std::fs::write(&path, build_sample()).unwrap();

        let reader = Reader::open(Context::with_priority(crate::context::LogPriority::Error), &path).unwrap();
        let nets = reader.enumerate_networks(|_| true).unwrap();
        assert_eq!(nets.len(), 2);
    }

    #[test]
    fn rejects_bad_magic() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.db");
        std::fs::write(&path, b"not a database at all, just junk bytes").unwrap();
        let result = Reader::open(Context::with_priority(crate::context::LogPriority::Error), &path);
        assert!(result.is_err());
    }
}
