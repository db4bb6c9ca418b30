//! Defaults shared by the collector, the codec and the dataset model.

use crate::settings::HllSettings;

/// Generator label written into every new dataset.
pub const GENERATOR: &str = concat!("dns-magnitude ", env!("CARGO_PKG_VERSION"));
/// Dataset format version written into every encoded dataset.
pub const DATASET_VERSION: u16 = 1;
/// Default number of top domains kept after truncation.
pub const DEFAULT_DOMAIN_COUNT: usize = 2500;
/// Number of trailing labels of a query name to track, 1 keeps just the TLD.
pub const DEFAULT_DOMAIN_LABELS: u8 = 1;
/// Client IPv4 addresses are truncated to this prefix length before hashing.
pub const DEFAULT_IPV4_MASK: u8 = 24;
/// Client IPv6 addresses are truncated to this prefix length before hashing.
pub const DEFAULT_IPV6_MASK: u8 = 48;
/// CBOR tag for a full-date string (RFC 8943).
pub const DATE_TAG: u64 = 1004;
/// Output target meaning "write to the already open output stream".
pub const STDOUT_TARGET: &str = "-";
/// Default size of each read request made by the sequence reader.
pub const DEFAULT_READ_SIZE: usize = 1024 * 1024;

/// Collector configuration
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CollectorConfig {
    /// Number of domains kept when the result is truncated, 0 disables truncation.
    pub top_count: usize,
    /// Number of records between migrations, 0 means never migrate before finalize.
    pub chunk_size: u64,
    /// Keep exact client and domain sets next to the estimators.
    pub verbose: bool,
    /// Number of trailing query name labels to track.
    pub domain_labels: u8,
    /// Settings for every estimator created by the collector.
    pub hll: HllSettings,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            top_count: DEFAULT_DOMAIN_COUNT,
            chunk_size: 0,
            verbose: false,
            domain_labels: DEFAULT_DOMAIN_LABELS,
            hll: HllSettings::production(),
        }
    }
}
