//! geodb - a compact, read-mostly geolocation database.
//!
//! Looks up autonomous system number, country, and policy flags for an
//! IPv4 or IPv6 address against a network database built ahead of time.
//! Addresses are unified into a single 128-bit space (IPv4 mapped into
//! `::ffff:0:0/96`), stored in a binary trie for longest-prefix-match
//! lookups, and serialized into a page-aligned on-disk format that a
//! [`Reader`] can memory-map and query without any up-front parsing pass.
//!
//! # Building a database
//!
//! ```
//! use geodb::{Context, Flags, Writer};
//!
//! let mut writer = Writer::new(Context::new());
//! writer.set_vendor("Example Networks, Inc.").unwrap();
//! writer.add_as(15169, Some("Google LLC")).unwrap();
//! writer
//!     .add_network("8.8.8.0/24", Some("US"), 15169, Flags::NONE)
//!     .unwrap();
//!
//! let mut bytes = Vec::new();
//! writer.write(&mut bytes).unwrap();
//! ```
//!
//! # Reading a database
//!
//! ```
//! # use geodb::{Context, Flags, Writer};
//! # let mut writer = Writer::new(Context::new());
//! # writer.add_network("8.8.8.0/24", Some("US"), 15169, Flags::NONE).unwrap();
//! # let mut bytes = Vec::new();
//! # writer.write(&mut bytes).unwrap();
//! # let dir = tempfile::tempdir().unwrap();
//! # let path = dir.path().join("example.db");
//! # std::fs::write(&path, &bytes).unwrap();
//! use geodb::Reader;
//!
//! let reader = Reader::open(Context::new(), &path).unwrap();
//! if let Some(network) = reader.lookup("8.8.8.8").unwrap() {
//!     println!("{} belongs to AS{}", network, network.asn());
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

/// 128-bit address algebra shared by IPv4 and IPv6.
pub mod address;
/// Autonomous system records.
pub mod as_record;
/// On-disk layout: magic, header, and fixed-size section records.
pub mod binary;
/// Shared logging/priority handle.
pub mod context;
/// Country records.
pub mod country;
/// Byte-order helpers used at the serialization boundary.
pub mod endian;
/// Crate-wide error type.
pub mod error;
/// Memory-mapped (with buffered fallback) file access.
pub mod mmap;
/// Network value type and the bounded `NetworkList`.
pub mod network;
/// The database reader pipeline.
pub mod reader;
/// Append-only string intern table.
pub mod stringpool;
/// Binary trie over network prefixes.
pub mod trie;
/// The database builder/writer pipeline.
pub mod writer;

pub use crate::address::{Address, Family};
pub use crate::as_record::As;
pub use crate::context::{Context, LogPriority};
pub use crate::country::Country;
pub use crate::error::{Error, Result};
pub use crate::network::{Flags, Network, NetworkList};
pub use crate::reader::Reader;
pub use crate::trie::NetworkTrie;
pub use crate::writer::Writer;

/// Library version string.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
