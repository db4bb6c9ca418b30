use std::net::IpAddr;

use dns_magnitude::{codec, Address, Collector, CollectorConfig, DomainName, Hll, HllSettings, StorageType};
use test_case::test_case;

#[test_case("192.0.2.1" => ("192.0.2.0".to_string(), "00000000000000000000ffffc0000200".to_string(), 0xb15c_e949_ae6f_3312); "ipv4")]
#[test_case("2001:503:ba3e::2:30" => ("2001:503:ba3e::".to_string(), "20010503ba3e00000000000000000000".to_string(), 0x1a82_8659_2f9f_366d); "ipv6")]
fn test_address_vectors(input: &str) -> (String, String, u64) {
    let address: Address = input.parse().unwrap();
    (
        address.truncated().to_string(),
        hex::encode(address.hash_input()),
        address.hash(),
    )
}

#[test]
fn test_canonical_estimator_bytes() {
    let mut hll = Hll::new(HllSettings::production());
    assert_eq!(hex::encode(hll.to_bytes()), "118e40");

    hll.add_raw(0xb15c_e949_ae6f_3312);
    assert_eq!(hll.storage_type(), StorageType::Sparse);
    assert_eq!(hex::encode(hll.to_bytes()), "138e40cc4860");

    hll.add_raw(0x1a82_8659_2f9f_366d);
    assert_eq!(hex::encode(hll.to_bytes()), "138e40cc487b368c");
    assert_eq!(hll.cardinality(), 3);

    let decoded = Hll::from_bytes(&hex::decode("138e40cc487b368c").unwrap()).unwrap();
    assert_eq!(decoded, hll);
}

#[test]
fn test_collected_dataset_matches_vectors() {
    let mut collector = Collector::new(CollectorConfig::default(), None);
    collector
        .process_address_str("www.example.com", "192.0.2.1", 1)
        .unwrap();
    collector
        .process_address_str("example.net", "2001:503:ba3e::2:30", 4)
        .unwrap();
    collector.finalize().unwrap();

    let dataset = collector.into_result();
    assert_eq!(hex::encode(dataset.all_clients_hll.to_bytes()), "138e40cc487b368c");
    assert_eq!(dataset.all_queries_count, 5);
    let com = DomainName::parse("com", 1).unwrap();
    assert_eq!(hex::encode(dataset.domains[&com].hll.to_bytes()), "138e40cc4860");

    // survives the wire unchanged
    let decoded = codec::from_slice(&codec::to_vec(&dataset).unwrap()).unwrap();
    assert_eq!(decoded.all_clients_hll, dataset.all_clients_hll);
    assert_eq!(decoded.domains, dataset.domains);
    assert_eq!(decoded.date, dataset.date);
}

#[test]
fn test_records_in_chunks() {
    let config = CollectorConfig {
        chunk_size: 10,
        ..CollectorConfig::default()
    };
    let mut collector = Collector::new(config, None);
    for i in 0..101u32 {
        let address = Address::new(IpAddr::from((0xc000_0000u32 | (i << 8)).to_be_bytes())).unwrap();
        collector.process_record("example.org", &address, 1).unwrap();
    }
    collector.finalize().unwrap();

    assert_eq!(collector.record_count(), 101);
    assert_eq!(collector.chunk_count(), 11);
    assert_eq!(collector.result().all_queries_count, 101);
    let magnitude = collector.result().sorted_by_magnitude()[0].magnitude;
    assert_eq!(magnitude, 10.0);
}
