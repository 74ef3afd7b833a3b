//! Round-trips a database through the writer, the filesystem, and the
//! reader, checking that every section survives the trip intact.

use geodb::{Context, Flags, Reader, Writer};

#[test]
fn header_metadata_and_countries_survive_a_round_trip() {
    let mut writer = Writer::new(Context::new());
    writer.set_vendor("Acme GeoIP").unwrap();
    writer.set_description("Example coverage database").unwrap();
    writer.set_license("CC0").unwrap();
    writer.add_country("US", Some("NA"), Some("United States")).unwrap();
    writer.add_country("DE", Some("EU"), Some("Germany")).unwrap();
    writer.add_as(64512, Some("Example AS")).unwrap();
    writer
        .add_network("192.0.2.0/24", Some("US"), 64512, Flags::NONE)
        .unwrap();
    writer
        .add_network("2001:db8::/32", Some("DE"), 64512, Flags::NONE)
        .unwrap();

    let mut bytes = Vec::new();
    writer.write(&mut bytes).unwrap();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("round_trip.geodb");
    std::fs::write(&path, &bytes).unwrap();

    let reader = Reader::open(Context::new(), &path).unwrap();
    assert_eq!(reader.version(), 1);
    assert_eq!(reader.vendor(), "Acme GeoIP");
    assert_eq!(reader.description(), "Example coverage database");
    assert_eq!(reader.license(), "CC0");

    let countries = reader.countries().unwrap();
    assert_eq!(countries.len(), 2);
    assert!(countries.iter().any(|c| c.code_str() == "DE"));

    let v4 = reader.lookup("192.0.2.1").unwrap().unwrap();
    assert_eq!(v4.user_prefix(), 24);
    assert_eq!(v4.country_code(), Some("US"));

    let v6 = reader.lookup("2001:db8::1").unwrap().unwrap();
    assert_eq!(v6.user_prefix(), 32);
    assert_eq!(v6.country_code(), Some("DE"));
}

#[test]
fn enumerate_networks_orders_supernets_before_subnets() {
    let mut writer = Writer::new(Context::new());
    writer
        .add_network("172.16.0.0/12", None, 1, Flags::NONE)
        .unwrap();
    writer
        .add_network("172.16.1.0/24", None, 2, Flags::NONE)
        .unwrap();

    let mut bytes = Vec::new();
    writer.write(&mut bytes).unwrap();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("order.geodb");
    std::fs::write(&path, &bytes).unwrap();

    let reader = Reader::open(Context::new(), &path).unwrap();
    let networks = reader.enumerate_networks(|_| true).unwrap();
    assert_eq!(networks.len(), 2);
    let supernet_pos = networks.iter().position(|n| n.user_prefix() == 12).unwrap();
    let subnet_pos = networks.iter().position(|n| n.user_prefix() == 24).unwrap();
    assert!(supernet_pos < subnet_pos);
}
