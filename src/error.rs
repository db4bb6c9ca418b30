//! Error types for dataset collection, aggregation and encoding

use std::path::PathBuf;

use chrono::NaiveDate;
use thiserror::Error;

use crate::estimator::HllError;

/// Crate result alias
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Main error type
#[derive(Debug, Error)]
pub enum Error {
    /// Estimator settings or storage bytes are invalid
    #[error(transparent)]
    Hll(#[from] HllError),

    /// Address text could not be parsed
    #[error("invalid IP address {0:?}")]
    InvalidAddress(String),

    /// Truncation mask is out of range for the IPv4 address family
    #[error("invalid IPv4 address: prefix length {0} too large")]
    InvalidIpv4Mask(u8),

    /// Truncation mask is out of range for the IPv6 address family
    #[error("invalid IPv6 address: prefix length {0} too large")]
    InvalidIpv6Mask(u8),

    /// Query name has fewer labels than the number being tracked
    #[error("domain name has {found} parts but {required} required")]
    TooFewLabels { found: usize, required: usize },

    /// Top-level label does not match the TLD grammar
    #[error("invalid domain name: {0} does not match required pattern")]
    InvalidTld(String),

    #[error("no datasets to aggregate")]
    NoDatasets,

    #[error("version mismatch: dataset {name} has version {version}, expected {expected}")]
    VersionMismatch {
        name: String,
        version: u16,
        expected: u16,
    },

    #[error("date mismatch: dataset {name} has date {date}, expected {expected}")]
    DateMismatch {
        name: String,
        date: NaiveDate,
        expected: NaiveDate,
    },

    /// Estimators could not be unioned, `context` is `global` or `domain <name>`
    #[error("failed to union HLL for {context}: {source}")]
    Union {
        context: String,
        #[source]
        source: HllError,
    },

    #[error("failed to marshal dataset to CBOR: {0}")]
    CborEncode(#[from] ciborium::ser::Error<std::io::Error>),

    #[error("failed to unmarshal CBOR from {name}: {reason}")]
    CborDecode { name: String, reason: String },

    #[error("remaining {remaining} bytes in {name} could not be parsed as CBOR")]
    TrailingBytes { name: String, remaining: usize },

    #[error("failed to read {name}: {source}")]
    Read {
        name: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to open {}: {source}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
