#![no_main]

use dns_magnitude::Hll;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(mut hll) = Hll::from_bytes(data) {
        // decoding the canonical form gives back the same estimator
        let decoded = Hll::from_bytes(&hll.to_bytes()).unwrap();
        assert_eq!(decoded, hll);

        hll.add_raw(u64::from_le_bytes([0x5a; 8]));
        let _ = hll.cardinality();
        let other = hll.clone();
        hll.strict_union(&other).unwrap();
    }
});
