//! `dns-magnitude` computes privacy-preserving popularity statistics for DNS domains.
//!
//! Client addresses are truncated to their network prefix and hashed with XXH3 into
//! per-domain HyperLogLog estimators whose storage format is bit-exact with the
//! [storage specification](https://github.com/aggregateknowledge/hll-storage-spec), so
//! datasets produced elsewhere can be merged here and vice versa. A domain's *magnitude*
//! is `10 * ln(domain clients) / ln(all clients)`.
//!
//! Datasets are collected in bounded-memory chunks by [`Collector`], merged with
//! [`aggregate()`], and exchanged as CBOR with the [`codec`] module.
pub mod address;
pub mod aggregate;
mod bits;
pub mod codec;
pub mod collector;
pub mod config;
pub mod dataset;
pub mod domain;
pub mod error;
pub mod estimator;
mod explicit;
mod full;
pub mod report;
mod representation;
mod serde;
pub mod settings;
mod sparse;

pub use address::Address;
pub use aggregate::aggregate;
pub use codec::DatasetSequence;
pub use collector::Collector;
pub use config::CollectorConfig;
pub use dataset::{Dataset, DebugSets, DomainMagnitude, DomainStats};
pub use domain::DomainName;
pub use error::{Error, Result};
pub use estimator::{Hll, HllError};
pub use report::{DatasetSummary, DomainSummary, MagnitudeData, Report};
pub use representation::StorageType;
pub use settings::{ExplicitThreshold, HllSettings};
