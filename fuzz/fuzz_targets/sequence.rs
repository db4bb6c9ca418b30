#![no_main]

use dns_magnitude::{DatasetSequence, HllSettings};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let read_size = data.first().map_or(1, |&b| usize::from(b) + 1);
    let mut sequence = DatasetSequence::new(HllSettings::production(), 16).with_read_size(read_size);
    if sequence.load_reader(data, "fuzz").is_ok() {
        for ranked in sequence.result().sorted_by_magnitude() {
            assert!((0.0..=10.0).contains(&ranked.magnitude));
        }
    }
});
