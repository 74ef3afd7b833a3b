//! Concrete end-to-end scenarios: an empty database, a lookup against a
//! real-looking AS, duplicate rejection, a three-network longest-prefix
//! match, and malformed input rejection.

use geodb::{Context, Flags, Network, Reader, Writer};

fn write_to_temp(writer: &mut Writer) -> (tempfile::TempDir, std::path::PathBuf) {
    let mut bytes = Vec::new();
    writer.write(&mut bytes).unwrap();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("db.geodb");
    std::fs::write(&path, &bytes).unwrap();
    (dir, path)
}

#[test]
fn empty_database_round_trips() {
    let mut writer = Writer::new(Context::new());
    writer.set_vendor("Nowhere Networks").unwrap();
    let (_dir, path) = write_to_temp(&mut writer);

    let reader = Reader::open(Context::new(), &path).unwrap();
    assert_eq!(reader.vendor(), "Nowhere Networks");
    assert_eq!(reader.lookup("1.1.1.1").unwrap(), None);
    assert!(reader.enumerate_networks(|_| true).unwrap().is_empty());
}

#[test]
fn google_dns_resolves_to_its_asn_and_country() {
    let mut writer = Writer::new(Context::new());
    writer.add_as(15169, Some("Google LLC")).unwrap();
    writer
        .add_network("8.8.8.0/24", Some("US"), 15169, Flags::ANYCAST)
        .unwrap();
    let (_dir, path) = write_to_temp(&mut writer);

    let reader = Reader::open(Context::new(), &path).unwrap();
    let network = reader.lookup("8.8.8.8").unwrap().unwrap();
    assert_eq!(network.asn(), 15169);
    assert_eq!(network.country_code(), Some("US"));
    assert!(network.has_flag(Flags::ANYCAST));

    let as_record = reader.get_as(15169).unwrap();
    assert_eq!(reader.as_name(&as_record), "Google LLC");
}

#[test]
fn duplicate_network_insertion_is_rejected() {
    let mut writer = Writer::new(Context::new());
    writer
        .add_network("10.0.0.0/8", None, 64512, Flags::NONE)
        .unwrap();
    let err = writer
        .add_network("10.0.0.0/8", None, 64513, Flags::NONE)
        .unwrap_err();
    assert!(matches!(err, geodb::Error::AlreadyPresent(_)));
}

#[test]
fn excluding_a_subnet_covers_every_remaining_address() {
    let whole = Network::parse("10.0.0.0/8", None, 0, Flags::NONE).unwrap();
    let carved_out = Network::parse("10.1.0.0/16", None, 0, Flags::NONE).unwrap();
    let remaining = geodb::trie::exclude(&whole, &carved_out).unwrap();
    assert_eq!(remaining.len(), 8);
    for pair in remaining.windows(2) {
        assert!(pair[0].last_address() < pair[1].first_address());
    }
}

#[test]
fn longest_prefix_match_prefers_the_most_specific_network() {
    let mut writer = Writer::new(Context::new());
    writer
        .add_network("10.0.0.0/8", Some("US"), 1, Flags::NONE)
        .unwrap();
    writer
        .add_network("10.1.0.0/16", Some("CA"), 2, Flags::NONE)
        .unwrap();
    writer
        .add_network("10.1.2.0/24", Some("GB"), 3, Flags::NONE)
        .unwrap();
    let (_dir, path) = write_to_temp(&mut writer);

    let reader = Reader::open(Context::new(), &path).unwrap();
    assert_eq!(
        reader.lookup("10.1.2.5").unwrap().unwrap().country_code(),
        Some("GB")
    );
    assert_eq!(
        reader.lookup("10.1.9.5").unwrap().unwrap().country_code(),
        Some("CA")
    );
    assert_eq!(
        reader.lookup("10.9.9.9").unwrap().unwrap().country_code(),
        Some("US")
    );
}

#[test]
fn malformed_prefixes_are_rejected() {
    assert!(Network::parse("10.0.0.0/33", None, 0, Flags::NONE).is_err());
    assert!(Network::parse("not-an-address/8", None, 0, Flags::NONE).is_err());
    assert!(Network::parse("0.0.0.0/0", None, 0, Flags::NONE).is_err());
}
